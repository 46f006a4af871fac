//! Lendscope chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings for the Chainlink feed registry, AggregatorV3 feeds,
//!   ENS and the Aave lending pool (V1 and V2 events)
//! - An HTTP RPC client with per-call timeout and bounded retry
//! - Feed resolution (registry, ENS, local table) and price reads
//! - Pool event kinds and log decoding
//! - Lending pool account reads
//! - Fixed-point unit conversions
//!
//! Chain reads are expressed as small traits ([`FeedRegistry`],
//! [`Aggregator`], [`NameService`], [`LogSource`], [`LendingPoolReader`]) so
//! callers can be tested against mocks. [`RpcClient`] implements all of them.

pub mod contracts;
mod error;
pub mod events;
pub mod oracle;
pub mod pool;
mod provider;
pub mod units;

pub use error::{ChainError, IntoChainError};
pub use events::{
    decode_log, decode_log_with_meta, pool_filter, BorrowEvent, EventKind, FlashLoanEvent,
    LiquidationCallEvent, LogMeta, LogSource, PoolVersion, ProtocolEvent, ReceiptSummary,
};
pub use oracle::{
    Aggregator, Denominations, FeedDirection, FeedReference, FeedRegistry, FeedResolver,
    FeedSource, LocalFeeds, NameService, PriceObservation, PriceReader, RoundData, StepOutcome,
};
pub use pool::{LendingPoolReader, RawAccountData};
pub use provider::{connect_http, ChainContracts, RpcClient, RpcSettings};
