//! Asset entries, inline under `[[assets]]` or in a separate asset file.

use std::collections::HashSet;
use std::path::Path;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::assets::Asset;

/// Contents of the file named by `assets_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    pub assets: Vec<AssetConfig>,
}

/// One reserve token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    /// CoinGecko coin id
    #[serde(default)]
    pub price_id: Option<String>,
}

impl AssetConfig {
    pub fn to_asset(&self) -> Asset {
        Asset {
            symbol: self.symbol.clone(),
            address: self.address,
            decimals: self.decimals,
            price_id: self.price_id.clone(),
        }
    }
}

impl AssetsConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AssetsConfig = toml::from_str(content).context("Failed to parse asset list")?;
        config.check_unique()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read asset file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid asset file {}", path.display()))
    }

    /// Two entries for the same address would make symbol lookups ambiguous.
    fn check_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for asset in &self.assets {
            if !seen.insert(asset.address) {
                bail!("Asset {} listed twice ({})", asset.address, asset.symbol);
            }
        }
        Ok(())
    }
}
