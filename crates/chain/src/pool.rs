//! Lending pool account reads.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::ChainError;

/// Raw `getUserAccountData` output. ETH amounts in wei, ratios in basis
/// points, health factor in WAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawAccountData {
    pub total_collateral_eth: U256,
    pub total_debt_eth: U256,
    pub available_borrows_eth: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

#[async_trait]
pub trait LendingPoolReader: Send + Sync {
    /// Reserve addresses in reserve-index order.
    async fn reserves_list(&self) -> Result<Vec<Address>, ChainError>;

    /// User configuration bitmask.
    async fn user_configuration(&self, user: Address) -> Result<U256, ChainError>;

    /// Reserve configuration bitmask.
    async fn reserve_configuration(&self, asset: Address) -> Result<U256, ChainError>;

    async fn user_account_data(&self, user: Address) -> Result<RawAccountData, ChainError>;
}
