//! Configuration system.
//!
//! This module provides:
//! - Application configuration (RPC, contracts, feeds, events, report, prices)
//! - Asset configuration (tokens, decimals, price ids)

mod app;
mod asset_config;

pub use app::{
    AppConfig, ContractsConfig, EventsConfig, FeedsConfig, LocalFeedConfig, PricesConfig,
    ReportConfig, RpcConfig, CONFIG_ENV, RPC_URL_ENV,
};
pub use asset_config::{AssetConfig, AssetsConfig};
