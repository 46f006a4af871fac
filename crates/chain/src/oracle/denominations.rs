//! Feed registry denominations.
//!
//! The Chainlink feed registry keys pairs by address: ERC-20 tokens by their
//! token address, ETH and BTC by sentinel addresses and fiat currencies by
//! their ISO 4217 numeric code.

use std::collections::HashMap;

use alloy::primitives::{address, Address};

/// ETH sentinel address.
pub const ETH: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// BTC sentinel address.
pub const BTC: Address = address!("bBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB");

const FIAT: &[(&str, u16)] = &[
    ("USD", 840),
    ("EUR", 978),
    ("GBP", 826),
    ("JPY", 392),
    ("CHF", 756),
    ("CAD", 124),
    ("AUD", 36),
    ("NZD", 554),
    ("CNY", 156),
    ("KRW", 410),
    ("SGD", 702),
    ("INR", 356),
    ("BRL", 986),
    ("ARS", 32),
    ("PHP", 608),
    ("ZAR", 710),
    ("NGN", 566),
    ("RUB", 643),
];

/// Registry address of a fiat currency, from its ISO 4217 numeric code.
pub const fn iso4217(code: u16) -> Address {
    let be = code.to_be_bytes();
    let mut bytes = [0u8; 20];
    bytes[18] = be[0];
    bytes[19] = be[1];
    Address::new(bytes)
}

/// Symbol → registry key lookup. Symbols are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Denominations {
    by_symbol: HashMap<String, Address>,
}

impl Denominations {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// ETH, BTC and the fiat currencies the registry lists.
    pub fn standard() -> Self {
        let mut table = Self::new().with("ETH", ETH).with("BTC", BTC);
        for (symbol, code) in FIAT {
            table = table.with(symbol, iso4217(*code));
        }
        table
    }

    /// Add (or replace) a symbol.
    pub fn with(mut self, symbol: &str, key: Address) -> Self {
        self.insert(symbol, key);
        self
    }

    /// Add a symbol unless it is already present.
    pub fn insert_if_absent(&mut self, symbol: &str, key: Address) {
        self.by_symbol.entry(symbol.to_uppercase()).or_insert(key);
    }

    pub fn insert(&mut self, symbol: &str, key: Address) {
        self.by_symbol.insert(symbol.to_uppercase(), key);
    }

    /// Registry key for a symbol.
    pub fn get(&self, symbol: &str) -> Option<Address> {
        self.by_symbol.get(&symbol.to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
