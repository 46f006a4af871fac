//! Error taxonomy for chain reads.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single chain interaction.
///
/// Reverts are the node telling us "no such thing" (an unregistered feed, a
/// call into an address without code) and are the only variant that fallback
/// chains treat as an expected negative outcome.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The node executed the call and it reverted (or returned no data).
    #[error("{method} reverted: {reason}")]
    Revert { method: &'static str, reason: String },

    /// Connectivity or node-side failure.
    #[error("{method} transport failure: {reason}")]
    Transport { method: &'static str, reason: String },

    /// The call did not complete within the configured read timeout.
    #[error("{method} timed out after {after:?}")]
    Timeout { method: &'static str, after: Duration },

    /// The response could not be decoded.
    #[error("{method} returned malformed data: {reason}")]
    Decode { method: &'static str, reason: String },

    /// Event kind outside Borrow / LiquidationCall / FlashLoan.
    #[error("unsupported event type '{0}' (expected Borrow, LiquidationCall or FlashLoan)")]
    UnsupportedEventType(String),
}

impl ChainError {
    /// Whether this failure means "not found" rather than "broken".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Revert { .. })
    }

    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

/// Conversion of client-library errors into [`ChainError`], tagged with the
/// RPC method that produced them.
pub trait IntoChainError {
    fn into_chain_error(self, method: &'static str) -> ChainError;
}

impl IntoChainError for alloy::transports::TransportError {
    fn into_chain_error(self, method: &'static str) -> ChainError {
        if self.is_error_resp() {
            ChainError::Revert {
                method,
                reason: self.to_string(),
            }
        } else {
            ChainError::Transport {
                method,
                reason: self.to_string(),
            }
        }
    }
}

impl IntoChainError for alloy::contract::Error {
    fn into_chain_error(self, method: &'static str) -> ChainError {
        match self {
            alloy::contract::Error::TransportError(e) => e.into_chain_error(method),
            alloy::contract::Error::ZeroData(..) => ChainError::Revert {
                method,
                reason: self.to_string(),
            },
            other => ChainError::Decode {
                method,
                reason: other.to_string(),
            },
        }
    }
}
