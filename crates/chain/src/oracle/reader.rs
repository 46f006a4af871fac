//! Round reads, normalized by the decimals of the feed that produced them.

use std::sync::Arc;

use alloy::primitives::Address;
use tracing::debug;

use super::{Aggregator, FeedReference, FeedRegistry, PriceObservation};
use crate::ChainError;

/// Reads prices from aggregator feeds and from the feed registry.
pub struct PriceReader<R, A> {
    registry: Arc<R>,
    aggregator: Arc<A>,
}

impl<R: FeedRegistry, A: Aggregator> PriceReader<R, A> {
    pub fn new(registry: Arc<R>, aggregator: Arc<A>) -> Self {
        Self {
            registry,
            aggregator,
        }
    }

    /// Latest round of `feed`, scaled by the feed's own decimals.
    pub async fn read_latest(&self, feed: Address) -> Result<PriceObservation, ChainError> {
        let round = self.aggregator.latest_round(feed).await?;
        let decimals = self.aggregator.feed_decimals(feed).await?;
        debug!(%feed, round_id = round.round_id, decimals, "Read latest round");
        Ok(round.normalize(decimals))
    }

    /// A specific historical round of `feed`.
    pub async fn read_round(
        &self,
        feed: Address,
        round_id: u128,
    ) -> Result<PriceObservation, ChainError> {
        let round = self.aggregator.round(feed, round_id).await?;
        let decimals = self.aggregator.feed_decimals(feed).await?;
        debug!(%feed, round_id, decimals, "Read historical round");
        Ok(round.normalize(decimals))
    }

    /// Answer decimals the registry reports for a pair.
    pub async fn decimals_by_pair(&self, base: Address, quote: Address) -> Result<u8, ChainError> {
        self.registry.pair_decimals(base, quote).await
    }

    /// Latest registry round for a pair. A zero answer is passed through as
    /// a `None` price rather than treated as an error.
    pub async fn read_latest_by_pair(
        &self,
        base: Address,
        quote: Address,
        decimals: u8,
    ) -> Result<PriceObservation, ChainError> {
        let round = self.registry.pair_latest_round(base, quote).await?;
        Ok(round.normalize_nullable(decimals))
    }

    /// Latest price for a resolved feed, in the orientation the caller asked
    /// for. Inverse feeds are inverted after normalization.
    pub async fn read_resolved(
        &self,
        feed: &FeedReference,
    ) -> Result<PriceObservation, ChainError> {
        let observation = self.read_latest(feed.address).await?;
        if feed.direction.is_direct() {
            return Ok(observation);
        }

        debug!(
            base = %feed.base,
            quote = %feed.quote,
            source = ?feed.source,
            "Inverting feed answer"
        );
        Ok(observation.inverted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{FeedDirection, FeedSource, RoundData};
    use alloy::primitives::I256;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const ETH_USD: Address = Address::repeat_byte(0x01);
    const BTC_ETH: Address = Address::repeat_byte(0x02);

    fn round(answer: i128) -> RoundData {
        RoundData {
            round_id: 7,
            answer: I256::try_from(answer).unwrap(),
            started_at: 1,
            updated_at: 2,
            answered_in_round: 7,
        }
    }

    struct MockFeeds {
        answers: HashMap<Address, (i128, u8)>,
    }

    #[async_trait]
    impl Aggregator for MockFeeds {
        async fn feed_decimals(&self, feed: Address) -> Result<u8, ChainError> {
            Ok(self.answers[&feed].1)
        }

        async fn latest_round(&self, feed: Address) -> Result<RoundData, ChainError> {
            Ok(round(self.answers[&feed].0))
        }

        async fn round(&self, feed: Address, round_id: u128) -> Result<RoundData, ChainError> {
            if round_id > 7 {
                return Err(ChainError::Revert {
                    method: "getRoundData",
                    reason: "No data present".into(),
                });
            }
            Ok(RoundData {
                round_id,
                answered_in_round: round_id,
                ..round(self.answers[&feed].0)
            })
        }
    }

    struct MockRegistry {
        answer: i128,
    }

    #[async_trait]
    impl FeedRegistry for MockRegistry {
        async fn get_feed(&self, _: Address, _: Address) -> Result<Address, ChainError> {
            Ok(ETH_USD)
        }

        async fn pair_decimals(&self, _: Address, _: Address) -> Result<u8, ChainError> {
            Ok(8)
        }

        async fn pair_latest_round(&self, _: Address, _: Address) -> Result<RoundData, ChainError> {
            Ok(round(self.answer))
        }
    }

    fn reader(registry_answer: i128) -> PriceReader<MockRegistry, MockFeeds> {
        let mut answers = HashMap::new();
        answers.insert(ETH_USD, (123_456_789_000, 8));
        answers.insert(BTC_ETH, (16_000_000_000_000_000_000, 18));
        PriceReader::new(
            Arc::new(MockRegistry {
                answer: registry_answer,
            }),
            Arc::new(MockFeeds { answers }),
        )
    }

    #[tokio::test]
    async fn test_latest_uses_feed_decimals() {
        let reader = reader(0);

        let eth = reader.read_latest(ETH_USD).await.unwrap();
        assert!((eth.price.unwrap() - 1234.56789).abs() < 1e-9);
        assert_eq!(eth.decimals, 8);

        let btc = reader.read_latest(BTC_ETH).await.unwrap();
        assert!((btc.price.unwrap() - 16.0).abs() < 1e-9);
        assert_eq!(btc.decimals, 18);
    }

    #[tokio::test]
    async fn test_historical_round() {
        let reader = reader(0);

        let obs = reader.read_round(ETH_USD, 5).await.unwrap();
        assert_eq!(obs.round_id, 5);

        let err = reader.read_round(ETH_USD, 99).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_registry_read_null_passthrough() {
        let empty = reader(0);
        let decimals = empty
            .decimals_by_pair(Address::ZERO, Address::ZERO)
            .await
            .unwrap();
        let obs = empty
            .read_latest_by_pair(Address::ZERO, Address::ZERO, decimals)
            .await
            .unwrap();
        assert_eq!(obs.price, None);

        let priced = reader(250_000_000_000);
        let obs = priced
            .read_latest_by_pair(Address::ZERO, Address::ZERO, 8)
            .await
            .unwrap();
        assert_eq!(obs.price, Some(2500.0));
    }

    #[tokio::test]
    async fn test_inverse_feed_is_inverted() {
        let reader = reader(0);
        let feed = FeedReference {
            base: "ETH".into(),
            quote: "BTC".into(),
            address: BTC_ETH,
            direction: FeedDirection::Inverse,
            source: FeedSource::Registry,
        };

        let obs = reader.read_resolved(&feed).await.unwrap();
        assert!((obs.price.unwrap() - 0.0625).abs() < 1e-12);
    }
}
