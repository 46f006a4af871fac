//! Aave lending pool interfaces.
//!
//! V1 and V2 both emit an event named `Borrow` with different layouts, so
//! they live in separate interfaces and are told apart by topic 0.

use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolEvent;

// Aave V1 LendingPool (Borrow only)
// https://docs.aave.com/developers/v/1.0/developing-on-aave/the-protocol/lendingpool#borrow-1
sol! {
    interface ILendingPoolV1 {
        event Borrow(
            address indexed _reserve,
            address indexed _user,
            uint256 _amount,
            uint256 _borrowRateMode,
            uint256 _borrowRate,
            uint256 _originationFee,
            uint256 _borrowBalanceIncrease,
            uint16 indexed _referral,
            uint256 _timestamp
        );
    }
}

// Aave V2 LendingPool
// https://github.com/aave/protocol-v2/blob/master/contracts/interfaces/ILendingPool.sol
sol! {
    #[derive(Debug)]
    struct ReserveConfigurationMap {
        uint256 data;
    }

    #[derive(Debug)]
    struct UserConfigurationMap {
        uint256 data;
    }

    #[sol(rpc)]
    interface ILendingPoolV2 {
        event Borrow(
            address indexed reserve,
            address user,
            address indexed onBehalfOf,
            uint256 amount,
            uint256 borrowRateMode,
            uint256 borrowRate,
            uint16 indexed referral
        );

        event LiquidationCall(
            address indexed collateralAsset,
            address indexed debtAsset,
            address indexed user,
            uint256 debtToCover,
            uint256 liquidatedCollateralAmount,
            address liquidator,
            bool receiveAToken
        );

        event FlashLoan(
            address indexed target,
            address indexed initiator,
            address indexed asset,
            uint256 amount,
            uint256 premium,
            uint16 referralCode
        );

        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralETH,
            uint256 totalDebtETH,
            uint256 availableBorrowsETH,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );

        function getReservesList() external view returns (address[] memory);

        function getUserConfiguration(address user) external view returns (UserConfigurationMap memory);

        function getConfiguration(address asset) external view returns (ReserveConfigurationMap memory);
    }
}

/// Topic-0 signatures of the decoded pool events.
pub mod signatures {
    use super::*;

    /// V1 `Borrow(address,address,uint256,uint256,uint256,uint256,uint256,uint16,uint256)`
    pub const BORROW_V1: B256 = ILendingPoolV1::Borrow::SIGNATURE_HASH;
    /// V2 `Borrow(address,address,address,uint256,uint256,uint256,uint16)`
    pub const BORROW_V2: B256 = ILendingPoolV2::Borrow::SIGNATURE_HASH;
    /// V2 `LiquidationCall(address,address,address,uint256,uint256,address,bool)`
    pub const LIQUIDATION_CALL: B256 = ILendingPoolV2::LiquidationCall::SIGNATURE_HASH;
    /// V2 `FlashLoan(address,address,address,uint256,uint256,uint16)`
    pub const FLASH_LOAN: B256 = ILendingPoolV2::FlashLoan::SIGNATURE_HASH;
}
