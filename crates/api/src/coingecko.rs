//! CoinGecko simple-price client for USD spot prices.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Public CoinGecko API.
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Asset symbol → CoinGecko coin id for the default asset set.
const DEFAULT_IDS: &[(&str, &str)] = &[
    ("ETH", "ethereum"),
    ("WETH", "weth"),
    ("DAI", "dai"),
    ("USDC", "usd-coin"),
    ("USDT", "tether"),
    ("WBTC", "wrapped-bitcoin"),
    ("LINK", "chainlink"),
    ("AAVE", "aave"),
    ("UNI", "uniswap"),
    ("YFI", "yearn-finance"),
    ("MKR", "maker"),
    ("SNX", "havven"),
    ("CRV", "curve-dao-token"),
    ("BAT", "basic-attention-token"),
    ("ZRX", "0x"),
    ("MANA", "decentraland"),
    ("ENJ", "enjincoin"),
    ("KNC", "kyber-network-crystal"),
    ("REN", "republic-protocol"),
    ("BAL", "balancer"),
    ("TUSD", "true-usd"),
    ("BUSD", "binance-usd"),
    ("SUSD", "nusd"),
    ("GUSD", "gemini-dollar"),
    ("XSUSHI", "xsushi"),
    ("STETH", "staked-ether"),
    ("FRAX", "frax"),
    ("FEI", "fei-usd"),
    ("LUSD", "liquity-usd"),
    ("ENS", "ethereum-name-service"),
    ("CVX", "convex-finance"),
    ("1INCH", "1inch"),
    ("AMPL", "ampleforth"),
    ("RAI", "rai"),
    ("USDP", "paxos-standard"),
    ("DPI", "defipulse-index"),
];

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("no price id known for symbol '{0}'")]
    UnknownSymbol(String),

    #[error("price request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response has no USD quote for '{0}'")]
    MissingQuote(String),
}

/// USD spot price by asset symbol.
#[async_trait]
pub trait UsdPriceSource: Send + Sync {
    async fn spot_usd_price(&self, symbol: &str) -> Result<f64, PriceError>;
}

// {"ethereum": {"usd": 1234.5}}
type SimplePriceResponse = HashMap<String, SimplePrice>;

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
}

/// CoinGecko API client.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    ids: HashMap<String, String>,
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinGeckoClient {
    /// Client for the public API with the default id table.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            ids: DEFAULT_IDS
                .iter()
                .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
                .collect(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add or override symbol → id mappings.
    pub fn with_ids<I, S, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<String>,
    {
        for (symbol, id) in ids {
            self.ids.insert(symbol.as_ref().to_uppercase(), id.into());
        }
        self
    }

    /// CoinGecko id for a symbol.
    pub fn coin_id(&self, symbol: &str) -> Option<&str> {
        self.ids.get(&symbol.to_uppercase()).map(String::as_str)
    }

    fn price_url(&self) -> String {
        format!("{}/simple/price", self.base_url)
    }
}

fn extract_usd(response: &SimplePriceResponse, id: &str) -> Option<f64> {
    response.get(id).and_then(|p| p.usd)
}

#[async_trait]
impl UsdPriceSource for CoinGeckoClient {
    #[instrument(skip(self))]
    async fn spot_usd_price(&self, symbol: &str) -> Result<f64, PriceError> {
        let id = self
            .coin_id(symbol)
            .ok_or_else(|| PriceError::UnknownSymbol(symbol.to_string()))?;

        let response: SimplePriceResponse = self
            .client
            .get(self.price_url())
            .query(&[("ids", id), ("vs_currencies", "usd")])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let price = extract_usd(&response, id).ok_or_else(|| PriceError::MissingQuote(id.to_string()))?;
        debug!(symbol, id, price, "Fetched USD spot price");
        Ok(price)
    }
}
