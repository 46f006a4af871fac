//! Asset registry for the Aave V2 mainnet lending pool.
//!
//! Maps reserve token addresses to symbols and decimals. Event amounts are
//! raw base units, so every conversion to whole tokens goes through here.

use std::collections::HashMap;

use alloy::primitives::{address, Address, U256};
use lendscope_chain::oracle::ETH;
use lendscope_chain::units::{to_whole, WEI_DECIMALS};
use lendscope_chain::Denominations;
use serde::{Deserialize, Serialize};

/// Symbol reported for addresses missing from the registry.
pub const NOT_KNOWN: &str = "not_known";

/// A registered asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Symbol (e.g., "WETH", "USDC")
    pub symbol: String,
    /// Token contract address
    pub address: Address,
    /// Token decimals
    pub decimals: u8,
    /// CoinGecko coin id, when it differs from the built-in table
    #[serde(default)]
    pub price_id: Option<String>,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            decimals,
            price_id: None,
        }
    }
}

// ============================================================================
// Default asset list - Aave V2 mainnet reserves
// ============================================================================

const MAINNET: &[(&str, Address, u8)] = &[
    ("ETH", ETH, 18),
    ("WETH", address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 18),
    ("DAI", address!("6B175474E89094C44Da98b954EedeAC495271d0F"), 18),
    ("USDC", address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6),
    ("USDT", address!("dAC17F958D2ee523a2206206994597C13D831ec7"), 6),
    ("WBTC", address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"), 8),
    ("LINK", address!("514910771AF9Ca656af840dff83E8264EcF986CA"), 18),
    ("AAVE", address!("7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9"), 18),
    ("UNI", address!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984"), 18),
    ("YFI", address!("0bc529c00C6401aEF6D220BE8C6Ea1667F6Ad93e"), 18),
    ("MKR", address!("9f8F72aA9304c8B593d555F12eF6589cC3A579A2"), 18),
    ("SNX", address!("C011a73ee8576Fb46F5E1c5751cA3B9Fe0af2a6F"), 18),
    ("CRV", address!("D533a949740bb3306d119CC777fa900bA034cd52"), 18),
    ("BAT", address!("0D8775F648430679A709E98d2b0Cb6250d2887EF"), 18),
    ("ZRX", address!("E41d2489571d322189246DaFA5ebDe1F4699F498"), 18),
    ("MANA", address!("0F5D2fB29fb7d3CFeE444a200298f468908cC942"), 18),
    ("ENJ", address!("F629cBd94d3791C9250152BD8dfBDF380E2a3B9c"), 18),
    ("KNC", address!("dd974D5C2e2928deA5F71b9825b8b646686BD200"), 18),
    ("REN", address!("408e41876cCCDC0F92210600ef50372656052a38"), 18),
    ("BAL", address!("ba100000625a3754423978a60c9317c58a424e3D"), 18),
    ("TUSD", address!("0000000000085d4780B73119b644AE5ecd22b376"), 18),
    ("BUSD", address!("4Fabb145d64652a948d72533023f6E7A623C7C53"), 18),
    ("sUSD", address!("57Ab1ec28D129707052df4dF418D58a2D46d5f51"), 18),
    ("GUSD", address!("056Fd409E1d7A124BD7017459dFEa2F387b6d5Cd"), 2),
    ("xSUSHI", address!("8798249c2E607446EfB7Ad49eC89dD1865Ff4272"), 18),
    ("stETH", address!("ae7ab96520DE3A18E5e111B5EaAb095312D7fE84"), 18),
    ("FRAX", address!("853d955aCEf822Db058eb8505911ED77F175b99e"), 18),
    ("FEI", address!("956F47F50A910163D8BF957Cf5846D573E7f87CA"), 18),
    ("LUSD", address!("5f98805A4E8be255a32880FDeC7F6728C6568bA0"), 18),
    ("ENS", address!("C18360217D8F7Ab5e7c516566761Ea12Ce7F9D72"), 18),
    ("CVX", address!("4e3FBD56CD56c3e72c1403e103b45Db9da5B9D2B"), 18),
    ("1INCH", address!("111111111117dC0aa78b770fA6A738034120C302"), 18),
    ("AMPL", address!("D46bA6D942050d489DBd938a2C909A5d5039A161"), 9),
    ("RAI", address!("03ab458634910AaD20eF5f1C8ee96F1D6ac54919"), 18),
    ("USDP", address!("8E870D67F660D95d5be530380D0eC0bd388289E1"), 18),
    ("DPI", address!("1494CA1F11D487c2bBe4543E90080AeBa4BA3C2b"), 18),
];

// ============================================================================
// Asset Registry (runtime lookup)
// ============================================================================

/// Immutable asset lookup by address and by symbol.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
    by_address: HashMap<Address, usize>,
    by_symbol: HashMap<String, usize>,
}

impl AssetRegistry {
    /// Registry over the built-in mainnet reserve list.
    pub fn mainnet() -> Self {
        Self::from_assets(
            MAINNET
                .iter()
                .map(|(symbol, address, decimals)| Asset::new(*symbol, *address, *decimals)),
        )
    }

    /// Build from an explicit asset list. Later duplicates win.
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let assets: Vec<Asset> = assets.into_iter().collect();
        let mut by_address = HashMap::with_capacity(assets.len());
        let mut by_symbol = HashMap::with_capacity(assets.len());

        for (i, asset) in assets.iter().enumerate() {
            by_address.insert(asset.address, i);
            by_symbol.insert(asset.symbol.to_uppercase(), i);
        }

        Self {
            assets,
            by_address,
            by_symbol,
        }
    }

    /// Get asset by token address.
    pub fn get_by_address(&self, address: &Address) -> Option<&Asset> {
        self.by_address.get(address).map(|&i| &self.assets[i])
    }

    /// Get asset by symbol (case-insensitive).
    pub fn get_by_symbol(&self, symbol: &str) -> Option<&Asset> {
        self.by_symbol
            .get(&symbol.to_uppercase())
            .map(|&i| &self.assets[i])
    }

    /// Symbol for an address, [`NOT_KNOWN`] when unregistered.
    pub fn symbol_for_address(&self, address: &Address) -> &str {
        self.get_by_address(address)
            .map(|a| a.symbol.as_str())
            .unwrap_or(NOT_KNOWN)
    }

    pub fn decimals_for_symbol(&self, symbol: &str) -> Option<u8> {
        self.get_by_symbol(symbol).map(|a| a.decimals)
    }

    pub fn address_for_symbol(&self, symbol: &str) -> Option<Address> {
        self.get_by_symbol(symbol).map(|a| a.address)
    }

    /// Convert a raw amount of `address` to whole tokens. Unregistered
    /// assets are treated as 18-decimal tokens.
    pub fn to_whole_for(&self, address: &Address, raw: U256) -> f64 {
        let decimals = self
            .get_by_address(address)
            .map(|a| a.decimals)
            .unwrap_or(WEI_DECIMALS);
        to_whole(raw, decimals)
    }

    /// Registry keys for feed resolution: ETH, BTC and fiat, plus every
    /// registered token under its symbol.
    pub fn denominations(&self) -> Denominations {
        let mut table = Denominations::standard();
        for asset in &self.assets {
            table.insert_if_absent(&asset.symbol, asset.address);
        }
        table
    }

    /// Explicit (symbol, price id) overrides.
    pub fn price_ids(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assets
            .iter()
            .filter_map(|a| a.price_id.as_deref().map(|id| (a.symbol.as_str(), id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::mainnet()
    }
}
