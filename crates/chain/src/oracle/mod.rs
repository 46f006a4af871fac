//! Price-feed access: locating a feed for an asset pair and reading it.
//!
//! # Architecture
//!
//! - [`FeedRegistry`], [`Aggregator`], [`NameService`]: the chain reads this
//!   module needs, implemented by [`crate::RpcClient`] and mocked in tests
//! - [`FeedResolver`]: registry → inverse registry → ENS → inverse ENS
//!   fallback chain, plus the static [`LocalFeeds`] table
//! - [`PriceReader`]: round reads normalized by the producing feed's decimals
//!
//! # Example
//!
//! ```rust,ignore
//! let resolver = FeedResolver::new(client.clone(), client.clone(), Denominations::standard());
//! let reader = PriceReader::new(client.clone(), client);
//!
//! if let Some(feed) = resolver.resolve_feed("ETH", "USD").await? {
//!     let observation = reader.read_resolved(&feed).await?;
//! }
//! ```

mod denominations;
mod reader;
mod resolver;
mod types;

pub use denominations::{iso4217, Denominations, BTC, ETH};
pub use reader::PriceReader;
pub use resolver::{FeedResolver, LocalFeeds, StepOutcome, DEFAULT_NAME_DOMAIN};
pub use types::{FeedDirection, FeedReference, FeedSource, PriceObservation, RoundData};

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::ChainError;

/// Central feed registry, keyed by (base, quote) denomination addresses.
#[async_trait]
pub trait FeedRegistry: Send + Sync {
    /// Aggregator address for the pair. Reverts when the pair is unknown.
    async fn get_feed(&self, base: Address, quote: Address) -> Result<Address, ChainError>;

    /// Answer decimals for the pair.
    async fn pair_decimals(&self, base: Address, quote: Address) -> Result<u8, ChainError>;

    /// Latest round for the pair.
    async fn pair_latest_round(&self, base: Address, quote: Address)
        -> Result<RoundData, ChainError>;
}

/// A single AggregatorV3 feed contract.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn feed_decimals(&self, feed: Address) -> Result<u8, ChainError>;

    async fn latest_round(&self, feed: Address) -> Result<RoundData, ChainError>;

    async fn round(&self, feed: Address, round_id: u128) -> Result<RoundData, ChainError>;
}

/// Decentralized name resolution.
#[async_trait]
pub trait NameService: Send + Sync {
    /// Resolve `name` to an address, `None` when nothing is registered.
    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, ChainError>;
}
