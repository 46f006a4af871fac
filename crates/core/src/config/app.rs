//! Application configuration.
//!
//! Every section is optional; a missing file section falls back to the
//! mainnet defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::{address, Address};
use anyhow::{Context, Result};
use lendscope_chain::oracle::ETH;
use lendscope_chain::{ChainContracts, Denominations, LocalFeeds, RpcSettings};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::asset_config::{AssetConfig, AssetsConfig};
use crate::assets::AssetRegistry;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "LENDSCOPE_CONFIG";

/// Environment variable overriding `rpc.http`.
pub const RPC_URL_ENV: &str = "ETH_RPC_URL";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub contracts: ContractsConfig,

    #[serde(default)]
    pub feeds: FeedsConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub prices: PricesConfig,

    /// Replaces the built-in asset list when non-empty
    #[serde(default)]
    pub assets: Vec<AssetConfig>,

    /// Separate `[[assets]]` file, read when no inline assets are given
    #[serde(default)]
    pub assets_file: Option<PathBuf>,
}

/// RPC endpoint and call policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_http")]
    pub http: String,

    /// Per-call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transport failures and timeouts (0 = none)
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_http() -> String {
    "http://localhost:8545".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http: default_http(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl RpcConfig {
    pub fn settings(&self) -> RpcSettings {
        RpcSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

/// Well-known contract addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_feed_registry")]
    pub feed_registry: Address,

    #[serde(default = "default_lending_pool")]
    pub lending_pool: Address,

    #[serde(default = "default_ens_registry")]
    pub ens_registry: Address,

    /// Registry key standing in for native ETH
    #[serde(default = "default_eth_sentinel")]
    pub eth_sentinel: Address,
}

fn default_feed_registry() -> Address {
    address!("47Fb2585D2C56Fe188D0E6ec628a38b74fCeeeDf")
}
fn default_lending_pool() -> Address {
    address!("7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9")
}
fn default_ens_registry() -> Address {
    address!("00000000000C2E074eC69A0dFb2997BA6C7d2e1e")
}
fn default_eth_sentinel() -> Address {
    ETH
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            feed_registry: default_feed_registry(),
            lending_pool: default_lending_pool(),
            ens_registry: default_ens_registry(),
            eth_sentinel: default_eth_sentinel(),
        }
    }
}

impl ContractsConfig {
    pub fn chain_contracts(&self) -> ChainContracts {
        ChainContracts {
            feed_registry: self.feed_registry,
            lending_pool: self.lending_pool,
            ens_registry: self.ens_registry,
        }
    }
}

/// Feed resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// ENS domain feed names live under
    #[serde(default = "default_name_domain")]
    pub name_domain: String,

    /// Extra pair → feed entries for the local table
    #[serde(default)]
    pub local: Vec<LocalFeedConfig>,
}

fn default_name_domain() -> String {
    lendscope_chain::oracle::DEFAULT_NAME_DOMAIN.to_string()
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            name_domain: default_name_domain(),
            local: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalFeedConfig {
    pub base: String,
    pub quote: String,
    pub address: Address,
}

impl FeedsConfig {
    /// Built-in local feeds plus configured entries.
    pub fn local_feeds(&self) -> LocalFeeds {
        let mut table = LocalFeeds::standard();
        for feed in &self.local {
            table.insert(&feed.base, &feed.quote, feed.address);
        }
        table
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// First block scanned when no `--from-block` is given
    #[serde(default = "default_start_block")]
    pub start_block: u64,
}

fn default_start_block() -> u64 {
    13_646_063
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            start_block: default_start_block(),
        }
    }
}

/// Report output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Write Borrow reports (skipped by default)
    #[serde(default)]
    pub persist_borrow: bool,

    /// Fetch and log liquidation receipts
    #[serde(default)]
    pub log_receipts: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            persist_borrow: false,
            log_receipts: false,
        }
    }
}

/// USD spot-price API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesConfig {
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,

    #[serde(default = "default_price_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_coingecko_url() -> String {
    lendscope_api::DEFAULT_BASE_URL.to_string()
}
fn default_price_timeout_secs() -> u64 {
    10
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            coingecko_url: default_coingecko_url(),
            timeout_secs: default_price_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load the file named by `path`, or by `LENDSCOPE_CONFIG`, or use the
    /// defaults. `ETH_RPC_URL` overrides the RPC endpoint in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(RPC_URL_ENV) {
            config.rpc.http = url;
        }

        config.load_assets_file()?;
        Ok(config)
    }

    /// Fill `assets` from `assets_file`. Inline entries win over the file.
    pub fn load_assets_file(&mut self) -> Result<()> {
        let Some(path) = &self.assets_file else {
            return Ok(());
        };
        if !self.assets.is_empty() {
            warn!(path = %path.display(), "Inline assets present, asset file ignored");
            return Ok(());
        }
        self.assets = AssetsConfig::from_file(path)?.assets;
        info!(path = %path.display(), count = self.assets.len(), "Asset file loaded");
        Ok(())
    }

    /// Asset registry: the configured list when present, mainnet otherwise.
    pub fn asset_registry(&self) -> AssetRegistry {
        if self.assets.is_empty() {
            AssetRegistry::mainnet()
        } else {
            AssetRegistry::from_assets(self.assets.iter().map(AssetConfig::to_asset))
        }
    }

    /// Registry denomination keys, with ETH mapped to the configured sentinel.
    pub fn denominations(&self) -> Denominations {
        self.asset_registry()
            .denominations()
            .with("ETH", self.contracts.eth_sentinel)
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!(
            timeout_secs = self.rpc.timeout_secs,
            max_retries = self.rpc.max_retries,
            "RPC settings"
        );
        info!(
            feed_registry = %self.contracts.feed_registry,
            lending_pool = %self.contracts.lending_pool,
            ens_registry = %self.contracts.ens_registry,
            eth_sentinel = %self.contracts.eth_sentinel,
            "Contracts"
        );
        info!(
            name_domain = %self.feeds.name_domain,
            local_feeds = self.feeds.local.len(),
            start_block = self.events.start_block,
            "Feeds and events"
        );
        info!(
            output_dir = %self.report.output_dir.display(),
            persist_borrow = self.report.persist_borrow,
            log_receipts = self.report.log_receipts,
            assets = if self.assets.is_empty() { "mainnet" } else { "configured" },
            "Report settings"
        );
    }
}
