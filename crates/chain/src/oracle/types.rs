//! Feed and price observation types.

use alloy::primitives::{Address, I256};
use serde::{Deserialize, Serialize};

use crate::units::signed_to_whole;

/// Raw round data as returned by a feed or the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundData {
    /// Round ID
    pub round_id: u128,
    /// Raw answer, scaled by the feed's decimals
    pub answer: I256,
    /// Timestamp when round started
    pub started_at: u64,
    /// Timestamp when answer was computed
    pub updated_at: u64,
    /// Round ID for which answer was computed
    pub answered_in_round: u128,
}

impl RoundData {
    /// Normalize with the decimals of the feed that produced this round.
    pub fn normalize(&self, decimals: u8) -> PriceObservation {
        PriceObservation {
            round_id: self.round_id,
            price: Some(signed_to_whole(self.answer, decimals)),
            decimals,
            started_at: self.started_at,
            updated_at: self.updated_at,
            answered_in_round: self.answered_in_round,
        }
    }

    /// Like [`normalize`](Self::normalize), but a zero answer means the
    /// registry has no answer for the pair and is passed through as `None`.
    pub fn normalize_nullable(&self, decimals: u8) -> PriceObservation {
        if self.answer.is_zero() {
            PriceObservation {
                price: None,
                ..self.normalize(decimals)
            }
        } else {
            self.normalize(decimals)
        }
    }
}

/// A normalized price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub round_id: u128,
    /// Answer divided by `10^decimals`; `None` only for registry reads that
    /// reported no answer.
    pub price: Option<f64>,
    /// Decimals of the feed that produced the answer
    pub decimals: u8,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

impl PriceObservation {
    /// Price quoted the other way round (quote/base).
    pub fn inverted(&self) -> Self {
        Self {
            price: self.price.filter(|p| *p != 0.0).map(|p| 1.0 / p),
            ..self.clone()
        }
    }
}

/// Orientation of a feed relative to the requested pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedDirection {
    /// Feed quotes base in units of quote
    Direct,
    /// Feed quotes quote in units of base
    Inverse,
}

impl FeedDirection {
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }
}

/// Where a feed address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedSource {
    /// Static local table
    Local,
    /// Central feed registry contract
    Registry,
    /// ENS name under the feed domain
    NameService,
}

/// A resolved feed for a base/quote pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReference {
    pub base: String,
    pub quote: String,
    pub address: Address,
    pub direction: FeedDirection,
    pub source: FeedSource,
}
