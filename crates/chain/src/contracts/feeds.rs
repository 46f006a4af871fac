//! Chainlink price-feed interfaces.

use alloy::sol;

// Chainlink FeedRegistryInterface (subset)
// https://github.com/smartcontractkit/chainlink/blob/develop/contracts/src/v0.8/interfaces/FeedRegistryInterface.sol
sol! {
    #[sol(rpc)]
    interface IFeedRegistry {
        function getFeed(address base, address quote) external view returns (address);

        function decimals(address base, address quote) external view returns (uint8);

        function latestRoundData(address base, address quote) external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );
    }
}

// Chainlink AggregatorV3 interface
sol! {
    #[sol(rpc)]
    interface IAggregatorV3 {
        function latestRoundData() external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );

        function decimals() external view returns (uint8);

        function description() external view returns (string memory);

        function getRoundData(uint80 _roundId) external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );
    }
}
