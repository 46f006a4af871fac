//! Lendscope API clients for external services.
//!
//! This crate provides HTTP clients for:
//! - CoinGecko: USD spot prices by asset symbol

mod coingecko;

pub use coingecko::{CoinGeckoClient, PriceError, UsdPriceSource, DEFAULT_BASE_URL};
