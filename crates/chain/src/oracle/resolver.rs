//! Feed address resolution.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{address, Address};
use tracing::{debug, info, warn};

use super::{Denominations, FeedDirection, FeedReference, FeedRegistry, FeedSource, NameService};
use crate::ChainError;

/// ENS domain under which Chainlink publishes feed names.
pub const DEFAULT_NAME_DOMAIN: &str = "data.eth";

/// Outcome of one resolution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Found(Address),
    NotFound,
}

/// Small static pair → feed table that skips the network entirely.
#[derive(Debug, Clone, Default)]
pub struct LocalFeeds {
    feeds: HashMap<(String, String), Address>,
}

impl LocalFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Well-known mainnet feeds.
    pub fn standard() -> Self {
        Self::new().with(
            "ETH",
            "USD",
            address!("5f4ec3df9cbd43714fe2740f5e3616155c5b8419"),
        )
    }

    pub fn with(mut self, base: &str, quote: &str, feed: Address) -> Self {
        self.insert(base, quote, feed);
        self
    }

    pub fn insert(&mut self, base: &str, quote: &str, feed: Address) {
        self.feeds
            .insert((base.to_uppercase(), quote.to_uppercase()), feed);
    }

    /// Feed for the exact pair orientation, if listed.
    pub fn get(&self, base: &str, quote: &str) -> Option<Address> {
        self.feeds
            .get(&(base.to_uppercase(), quote.to_uppercase()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

/// Locates the feed contract for a base/quote pair.
///
/// Resolution order, first hit wins:
/// 1. registry `getFeed(base, quote)` (direct)
/// 2. registry `getFeed(quote, base)` (inverse)
/// 3. ENS `{base}-{quote}.{domain}` (direct)
/// 4. ENS `{quote}-{base}.{domain}` (inverse)
///
/// A revert, a zero address, a symbol without a registry key or an
/// unregistered name moves on to the next step. Any other failure of steps
/// 1-3 is logged and also moves on; only a failing last step is returned as
/// an error.
pub struct FeedResolver<R, N> {
    registry: Arc<R>,
    names: Arc<N>,
    denominations: Denominations,
    local: LocalFeeds,
    domain: String,
}

impl<R: FeedRegistry, N: NameService> FeedResolver<R, N> {
    pub fn new(registry: Arc<R>, names: Arc<N>, denominations: Denominations) -> Self {
        Self {
            registry,
            names,
            denominations,
            local: LocalFeeds::standard(),
            domain: DEFAULT_NAME_DOMAIN.to_string(),
        }
    }

    /// Replace the local feed table.
    pub fn with_local_feeds(mut self, local: LocalFeeds) -> Self {
        self.local = local;
        self
    }

    /// Set the ENS domain used for name lookups.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn denominations(&self) -> &Denominations {
        &self.denominations
    }

    /// Static table lookup; never touches the network.
    pub fn local_feed(&self, base: &str, quote: &str) -> Option<FeedReference> {
        self.local.get(base, quote).map(|address| FeedReference {
            base: base.to_string(),
            quote: quote.to_string(),
            address,
            direction: FeedDirection::Direct,
            source: FeedSource::Local,
        })
    }

    /// Run the fallback chain. `Ok(None)` when every step came up empty.
    pub async fn resolve_feed(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<Option<FeedReference>, ChainError> {
        let steps = [
            (FeedSource::Registry, base, quote, FeedDirection::Direct),
            (FeedSource::Registry, quote, base, FeedDirection::Inverse),
            (FeedSource::NameService, base, quote, FeedDirection::Direct),
            (FeedSource::NameService, quote, base, FeedDirection::Inverse),
        ];

        let last = steps.len() - 1;
        for (step, (source, first, second, direction)) in steps.into_iter().enumerate() {
            let result = match source {
                FeedSource::Registry => self.registry_step(first, second).await,
                FeedSource::NameService => self.name_step(first, second).await,
                FeedSource::Local => Ok(StepOutcome::NotFound),
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if step == last => return Err(e),
                Err(e) => {
                    warn!(
                        base,
                        quote,
                        ?source,
                        ?direction,
                        error = %e,
                        "Resolution step failed, trying next"
                    );
                    StepOutcome::NotFound
                }
            };

            if let StepOutcome::Found(address) = outcome {
                info!(
                    base,
                    quote,
                    feed = %address,
                    ?source,
                    ?direction,
                    "Feed resolved"
                );
                return Ok(Some(FeedReference {
                    base: base.to_string(),
                    quote: quote.to_string(),
                    address,
                    direction,
                    source,
                }));
            }
        }

        info!(base, quote, "No feed found for pair");
        Ok(None)
    }

    /// Registry lookup for one orientation.
    pub async fn registry_step(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<StepOutcome, ChainError> {
        let (Some(base_key), Some(quote_key)) =
            (self.denominations.get(base), self.denominations.get(quote))
        else {
            debug!(base, quote, "No registry key for pair, skipping registry");
            return Ok(StepOutcome::NotFound);
        };

        match self.registry.get_feed(base_key, quote_key).await {
            Ok(feed) if feed.is_zero() => Ok(StepOutcome::NotFound),
            Ok(feed) => Ok(StepOutcome::Found(feed)),
            Err(e) if e.is_not_found() => {
                debug!(base, quote, error = %e, "Registry has no feed");
                Ok(StepOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// ENS lookup of `{base}-{quote}.{domain}`.
    pub async fn name_step(&self, base: &str, quote: &str) -> Result<StepOutcome, ChainError> {
        let name = self.feed_name(base, quote);

        match self.names.resolve_name(&name).await {
            Ok(Some(feed)) if !feed.is_zero() => Ok(StepOutcome::Found(feed)),
            Ok(_) => {
                debug!(name = %name, "Name not registered");
                Ok(StepOutcome::NotFound)
            }
            Err(e) if e.is_not_found() => {
                debug!(name = %name, error = %e, "Name resolution reverted");
                Ok(StepOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// ENS name of a pair's feed.
    pub fn feed_name(&self, base: &str, quote: &str) -> String {
        format!(
            "{}-{}.{}",
            base.to_lowercase(),
            quote.to_lowercase(),
            self.domain
        )
    }
}
