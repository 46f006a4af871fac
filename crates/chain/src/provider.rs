//! HTTP RPC client.
//!
//! Every read goes through [`RpcClient::call`], which bounds it with the
//! configured timeout and retries transport failures and timeouts with
//! exponential backoff. Reverts are returned immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Uint, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::contracts::ens::{IEnsRegistry, IEnsResolver};
use crate::contracts::{namehash, IAggregatorV3, IFeedRegistry, ILendingPoolV2};
use crate::error::IntoChainError;
use crate::events::{LogSource, ReceiptSummary};
use crate::oracle::{Aggregator, FeedRegistry, NameService, RoundData};
use crate::pool::{LendingPoolReader, RawAccountData};
use crate::ChainError;

/// Upper bound on the backoff between retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Per-call timeout and retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RpcSettings {
    pub timeout: Duration,
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Well-known contract addresses the client talks to.
#[derive(Debug, Clone, Copy)]
pub struct ChainContracts {
    pub feed_registry: Address,
    pub lending_pool: Address,
    pub ens_registry: Address,
}

/// Typed reads over an alloy provider.
pub struct RpcClient<P> {
    provider: Arc<P>,
    contracts: ChainContracts,
    settings: RpcSettings,
}

impl<P> Clone for RpcClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            contracts: self.contracts,
            settings: self.settings,
        }
    }
}

impl<P> std::fmt::Debug for RpcClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("contracts", &self.contracts)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Connect over HTTP and verify the node answers.
pub async fn connect_http(
    url: &str,
    contracts: ChainContracts,
    settings: RpcSettings,
) -> Result<RpcClient<impl Provider + Clone + 'static>> {
    info!(
        url,
        timeout_secs = settings.timeout.as_secs(),
        max_retries = settings.max_retries,
        "Connecting to RPC endpoint"
    );

    let provider = ProviderBuilder::new().on_http(url.parse().context("invalid RPC URL")?);
    let client = RpcClient::new(provider, contracts, settings);

    let block = client.block_number().await.context("RPC endpoint unreachable")?;
    info!(block, "Provider connection verified");

    Ok(client)
}

impl<P: Provider + Clone + 'static> RpcClient<P> {
    pub fn new(provider: P, contracts: ChainContracts, settings: RpcSettings) -> Self {
        Self {
            provider: Arc::new(provider),
            contracts,
            settings,
        }
    }

    pub fn contracts(&self) -> &ChainContracts {
        &self.contracts
    }

    pub fn settings(&self) -> &RpcSettings {
        &self.settings
    }

    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let provider = &*self.provider;
        self.call("eth_blockNumber", move || async move {
            provider.get_block_number().await
        })
        .await
    }

    /// Run one RPC interaction under the timeout and retry policy.
    async fn call<T, E, F, Fut>(&self, method: &'static str, mut f: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: IntoChainError,
    {
        let mut delay = self.settings.retry_base_delay;
        let mut attempt = 0u32;

        loop {
            let outcome = match tokio::time::timeout(self.settings.timeout, f()).await {
                Ok(result) => result.map_err(|e| e.into_chain_error(method)),
                Err(_) => Err(ChainError::Timeout {
                    method,
                    after: self.settings.timeout,
                }),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        method,
                        attempt,
                        max_retries = self.settings.max_retries,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "RPC call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_RETRY_DELAY);
                }
                other => return other,
            }
        }
    }
}

fn round_from_parts(
    round_id: Uint<80, 2>,
    answer: alloy::primitives::I256,
    started_at: U256,
    updated_at: U256,
    answered_in_round: Uint<80, 2>,
) -> RoundData {
    RoundData {
        round_id: round_id.to::<u128>(),
        answer,
        started_at: started_at.saturating_to::<u64>(),
        updated_at: updated_at.saturating_to::<u64>(),
        answered_in_round: answered_in_round.to::<u128>(),
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> FeedRegistry for RpcClient<P> {
    async fn get_feed(&self, base: Address, quote: Address) -> Result<Address, ChainError> {
        let contract = IFeedRegistry::new(self.contracts.feed_registry, &*self.provider);
        let c = &contract;
        let feed = self
            .call("getFeed", move || async move { c.getFeed(base, quote).call().await })
            .await?;
        Ok(feed._0)
    }

    async fn pair_decimals(&self, base: Address, quote: Address) -> Result<u8, ChainError> {
        let contract = IFeedRegistry::new(self.contracts.feed_registry, &*self.provider);
        let c = &contract;
        let decimals = self
            .call("decimals", move || async move { c.decimals(base, quote).call().await })
            .await?;
        Ok(decimals._0)
    }

    async fn pair_latest_round(
        &self,
        base: Address,
        quote: Address,
    ) -> Result<RoundData, ChainError> {
        let contract = IFeedRegistry::new(self.contracts.feed_registry, &*self.provider);
        let c = &contract;
        let round = self
            .call("latestRoundData", move || async move {
                c.latestRoundData(base, quote).call().await
            })
            .await?;
        Ok(round_from_parts(
            round.roundId,
            round.answer,
            round.startedAt,
            round.updatedAt,
            round.answeredInRound,
        ))
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> Aggregator for RpcClient<P> {
    async fn feed_decimals(&self, feed: Address) -> Result<u8, ChainError> {
        let contract = IAggregatorV3::new(feed, &*self.provider);
        let c = &contract;
        let decimals = self
            .call("decimals", move || async move { c.decimals().call().await })
            .await?;
        Ok(decimals._0)
    }

    async fn latest_round(&self, feed: Address) -> Result<RoundData, ChainError> {
        let contract = IAggregatorV3::new(feed, &*self.provider);
        let c = &contract;
        let round = self
            .call("latestRoundData", move || async move {
                c.latestRoundData().call().await
            })
            .await?;
        Ok(round_from_parts(
            round.roundId,
            round.answer,
            round.startedAt,
            round.updatedAt,
            round.answeredInRound,
        ))
    }

    async fn round(&self, feed: Address, round_id: u128) -> Result<RoundData, ChainError> {
        let id = Uint::<80, 2>::try_from(round_id).map_err(|e| ChainError::Decode {
            method: "getRoundData",
            reason: format!("round id {round_id} does not fit uint80: {e}"),
        })?;
        let contract = IAggregatorV3::new(feed, &*self.provider);
        let c = &contract;
        let round = self
            .call("getRoundData", move || async move { c.getRoundData(id).call().await })
            .await?;
        Ok(round_from_parts(
            round.roundId,
            round.answer,
            round.startedAt,
            round.updatedAt,
            round.answeredInRound,
        ))
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> NameService for RpcClient<P> {
    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, ChainError> {
        let node = namehash(name);

        let registry = IEnsRegistry::new(self.contracts.ens_registry, &*self.provider);
        let r = &registry;
        let resolver = self
            .call("resolver", move || async move { r.resolver(node).call().await })
            .await?
            ._0;
        if resolver.is_zero() {
            debug!(name, "No resolver set");
            return Ok(None);
        }

        let resolver = IEnsResolver::new(resolver, &*self.provider);
        let r = &resolver;
        let addr = self
            .call("addr", move || async move { r.addr(node).call().await })
            .await?
            ._0;

        Ok((!addr.is_zero()).then_some(addr))
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> LogSource for RpcClient<P> {
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError> {
        let provider = &*self.provider;
        self.call("eth_getLogs", move || async move { provider.get_logs(filter).await })
            .await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ReceiptSummary>, ChainError> {
        let provider = &*self.provider;
        let receipt = self
            .call("eth_getTransactionReceipt", move || async move {
                provider.get_transaction_receipt(tx_hash).await
            })
            .await?;

        Ok(receipt.map(|r| ReceiptSummary {
            gas_used: u128::from(r.gas_used()),
            effective_gas_price: r.effective_gas_price(),
            success: r.status(),
        }))
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> LendingPoolReader for RpcClient<P> {
    async fn reserves_list(&self) -> Result<Vec<Address>, ChainError> {
        let pool = ILendingPoolV2::new(self.contracts.lending_pool, &*self.provider);
        let p = &pool;
        let list = self
            .call("getReservesList", move || async move { p.getReservesList().call().await })
            .await?;
        Ok(list._0)
    }

    async fn user_configuration(&self, user: Address) -> Result<U256, ChainError> {
        let pool = ILendingPoolV2::new(self.contracts.lending_pool, &*self.provider);
        let p = &pool;
        let config = self
            .call("getUserConfiguration", move || async move {
                p.getUserConfiguration(user).call().await
            })
            .await?;
        Ok(config._0.data)
    }

    async fn reserve_configuration(&self, asset: Address) -> Result<U256, ChainError> {
        let pool = ILendingPoolV2::new(self.contracts.lending_pool, &*self.provider);
        let p = &pool;
        let config = self
            .call("getConfiguration", move || async move {
                p.getConfiguration(asset).call().await
            })
            .await?;
        Ok(config._0.data)
    }

    async fn user_account_data(&self, user: Address) -> Result<RawAccountData, ChainError> {
        let pool = ILendingPoolV2::new(self.contracts.lending_pool, &*self.provider);
        let p = &pool;
        let data = self
            .call("getUserAccountData", move || async move {
                p.getUserAccountData(user).call().await
            })
            .await?;
        Ok(RawAccountData {
            total_collateral_eth: data.totalCollateralETH,
            total_debt_eth: data.totalDebtETH,
            available_borrows_eth: data.availableBorrowsETH,
            current_liquidation_threshold: data.currentLiquidationThreshold,
            ltv: data.ltv,
            health_factor: data.healthFactor,
        })
    }
}
