//! Contract bindings for the price-feed and lending-protocol contracts.
//!
//! - [`feeds`]: Chainlink feed registry and AggregatorV3 interfaces
//! - [`lending_pool`]: Aave lending pool events (V1 and V2) and read methods
//! - [`ens`]: ENS registry / resolver and namehash

pub mod ens;
pub mod feeds;
pub mod lending_pool;

pub use ens::namehash;
pub use feeds::{IAggregatorV3, IFeedRegistry};
pub use lending_pool::{ILendingPoolV1, ILendingPoolV2};
