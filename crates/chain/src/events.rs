//! Lending pool event kinds and log decoding.
//!
//! Logs are decoded by their own topic 0, not by the kind that was requested:
//! a filter for one kind can still return other pool events, and those come
//! back as their own [`ProtocolEvent`] variant for the caller to ignore.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;

use crate::contracts::lending_pool::signatures;
use crate::contracts::{ILendingPoolV1, ILendingPoolV2};
use crate::ChainError;

/// Pool event kinds a fetch cycle can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Borrow,
    LiquidationCall,
    FlashLoan,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [Self::Borrow, Self::LiquidationCall, Self::FlashLoan];

    /// Event name as emitted by the pool contract.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Borrow => "Borrow",
            Self::LiquidationCall => "LiquidationCall",
            Self::FlashLoan => "FlashLoan",
        }
    }

    /// Topic-0 values that identify this kind. Borrow covers both pool
    /// versions.
    pub fn topics(&self) -> Vec<B256> {
        match self {
            Self::Borrow => vec![signatures::BORROW_V1, signatures::BORROW_V2],
            Self::LiquidationCall => vec![signatures::LIQUIDATION_CALL],
            Self::FlashLoan => vec![signatures::FLASH_LOAN],
        }
    }
}

impl FromStr for EventKind {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ChainError::UnsupportedEventType(s.to_string()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a log came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMeta {
    pub block_number: u64,
    pub address: Address,
    pub tx_hash: B256,
}

impl LogMeta {
    /// Extract block number, emitter and transaction hash. Pending logs
    /// without a block or transaction are malformed for our purposes.
    pub fn from_log(log: &Log) -> Result<Self, ChainError> {
        let block_number = log.block_number.ok_or_else(|| ChainError::Decode {
            method: "eth_getLogs",
            reason: "log without block number".into(),
        })?;
        let tx_hash = log.transaction_hash.ok_or_else(|| ChainError::Decode {
            method: "eth_getLogs",
            reason: "log without transaction hash".into(),
        })?;

        Ok(Self {
            block_number,
            address: log.address(),
            tx_hash,
        })
    }
}

/// Lending pool generation that emitted a Borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolVersion {
    V1,
    V2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowEvent {
    pub meta: LogMeta,
    pub version: PoolVersion,
    pub reserve: Address,
    pub user: Address,
    /// V2 only
    pub on_behalf_of: Option<Address>,
    pub amount: U256,
    pub rate_mode: U256,
    pub borrow_rate: U256,
    pub referral: u16,
    /// V1 only
    pub balance_increase: Option<U256>,
    /// V1 only, unix seconds
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationCallEvent {
    pub meta: LogMeta,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub user: Address,
    pub debt_to_cover: U256,
    pub liquidated_collateral_amount: U256,
    pub liquidator: Address,
    pub receive_a_token: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLoanEvent {
    pub meta: LogMeta,
    pub target: Address,
    pub initiator: Address,
    pub asset: Address,
    pub amount: U256,
    pub premium: U256,
}

/// A decoded pool event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    Borrow(BorrowEvent),
    LiquidationCall(LiquidationCallEvent),
    FlashLoan(FlashLoanEvent),
}

impl ProtocolEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Borrow(_) => EventKind::Borrow,
            Self::LiquidationCall(_) => EventKind::LiquidationCall,
            Self::FlashLoan(_) => EventKind::FlashLoan,
        }
    }

    pub fn meta(&self) -> &LogMeta {
        match self {
            Self::Borrow(e) => &e.meta,
            Self::LiquidationCall(e) => &e.meta,
            Self::FlashLoan(e) => &e.meta,
        }
    }
}

fn decode_error(event: &'static str, e: alloy::sol_types::Error) -> ChainError {
    ChainError::Decode {
        method: event,
        reason: e.to_string(),
    }
}

fn is_pool_topic(topic: &B256) -> bool {
    EventKind::ALL.iter().any(|kind| kind.topics().contains(topic))
}

/// Decode a pool log by its topic 0.
///
/// Returns `Ok(None)` for logs that are not one of the three pool events.
pub fn decode_log(log: &Log) -> Result<Option<ProtocolEvent>, ChainError> {
    if !log.topics().first().is_some_and(is_pool_topic) {
        return Ok(None);
    }
    decode_log_with_meta(log, LogMeta::from_log(log)?)
}

/// [`decode_log`] for callers that already extracted the log's metadata.
pub fn decode_log_with_meta(
    log: &Log,
    meta: LogMeta,
) -> Result<Option<ProtocolEvent>, ChainError> {
    let Some(topic0) = log.topics().first().copied() else {
        return Ok(None);
    };
    let data = &log.inner.data;

    let event = match topic0 {
        signatures::LIQUIDATION_CALL => {
            let e = ILendingPoolV2::LiquidationCall::decode_log_data(data, true)
                .map_err(|e| decode_error("LiquidationCall", e))?;
            ProtocolEvent::LiquidationCall(LiquidationCallEvent {
                meta,
                collateral_asset: e.collateralAsset,
                debt_asset: e.debtAsset,
                user: e.user,
                debt_to_cover: e.debtToCover,
                liquidated_collateral_amount: e.liquidatedCollateralAmount,
                liquidator: e.liquidator,
                receive_a_token: e.receiveAToken,
            })
        }
        signatures::BORROW_V2 => {
            let e = ILendingPoolV2::Borrow::decode_log_data(data, true)
                .map_err(|e| decode_error("Borrow", e))?;
            ProtocolEvent::Borrow(BorrowEvent {
                meta,
                version: PoolVersion::V2,
                reserve: e.reserve,
                user: e.user,
                on_behalf_of: Some(e.onBehalfOf),
                amount: e.amount,
                rate_mode: e.borrowRateMode,
                borrow_rate: e.borrowRate,
                referral: e.referral,
                balance_increase: None,
                timestamp: None,
            })
        }
        signatures::BORROW_V1 => {
            let e = ILendingPoolV1::Borrow::decode_log_data(data, true)
                .map_err(|e| decode_error("Borrow", e))?;
            ProtocolEvent::Borrow(BorrowEvent {
                meta,
                version: PoolVersion::V1,
                reserve: e._reserve,
                user: e._user,
                on_behalf_of: None,
                amount: e._amount,
                rate_mode: e._borrowRateMode,
                borrow_rate: e._borrowRate,
                referral: e._referral,
                balance_increase: Some(e._borrowBalanceIncrease),
                timestamp: Some(e._timestamp.saturating_to::<u64>()),
            })
        }
        signatures::FLASH_LOAN => {
            let e = ILendingPoolV2::FlashLoan::decode_log_data(data, true)
                .map_err(|e| decode_error("FlashLoan", e))?;
            ProtocolEvent::FlashLoan(FlashLoanEvent {
                meta,
                target: e.target,
                initiator: e.initiator,
                asset: e.asset,
                amount: e.amount,
                premium: e.premium,
            })
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// Log filter for one event kind on the pool. `to_block = None` means latest.
pub fn pool_filter(pool: Address, kind: EventKind, from_block: u64, to_block: Option<u64>) -> Filter {
    let to_block = to_block
        .map(BlockNumberOrTag::Number)
        .unwrap_or(BlockNumberOrTag::Latest);

    Filter::new()
        .address(pool)
        .event_signature(kind.topics())
        .from_block(from_block)
        .to_block(to_block)
}

/// Gas figures from a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub gas_used: u128,
    pub effective_gas_price: u128,
    pub success: bool,
}

impl ReceiptSummary {
    /// Transaction fee in wei.
    pub fn fee_wei(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Source of historical logs and receipts.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError>;

    /// Receipt of a mined transaction, `None` when the node does not know it.
    async fn transaction_receipt(&self, tx_hash: B256)
        -> Result<Option<ReceiptSummary>, ChainError>;
}

#[cfg(test)]
pub(crate) mod test_logs {
    //! Builders for encoded pool logs.

    use super::*;
    use alloy::primitives::LogData;

    pub fn rpc_log(pool: Address, data: LogData, block: u64, tx: B256) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: pool,
                data,
            },
            block_number: Some(block),
            transaction_hash: Some(tx),
            ..Default::default()
        }
    }

    pub fn liquidation(collateral: Address, debt: Address, collected: u128, covered: u128) -> LogData {
        ILendingPoolV2::LiquidationCall {
            collateralAsset: collateral,
            debtAsset: debt,
            user: Address::repeat_byte(0x11),
            debtToCover: U256::from(covered),
            liquidatedCollateralAmount: U256::from(collected),
            liquidator: Address::repeat_byte(0x22),
            receiveAToken: false,
        }
        .encode_log_data()
    }

    pub fn borrow_v2(reserve: Address, amount: u128) -> LogData {
        ILendingPoolV2::Borrow {
            reserve,
            user: Address::repeat_byte(0x33),
            onBehalfOf: Address::repeat_byte(0x44),
            amount: U256::from(amount),
            borrowRateMode: U256::from(2),
            borrowRate: U256::from(1_000u64),
            referral: 0,
        }
        .encode_log_data()
    }

    pub fn borrow_v1(reserve: Address, amount: u128, timestamp: u64) -> LogData {
        ILendingPoolV1::Borrow {
            _reserve: reserve,
            _user: Address::repeat_byte(0x55),
            _amount: U256::from(amount),
            _borrowRateMode: U256::from(1),
            _borrowRate: U256::from(500u64),
            _originationFee: U256::from(10u64),
            _borrowBalanceIncrease: U256::from(7u64),
            _referral: 3,
            _timestamp: U256::from(timestamp),
        }
        .encode_log_data()
    }

    pub fn flash_loan(asset: Address) -> LogData {
        ILendingPoolV2::FlashLoan {
            target: Address::repeat_byte(0x66),
            initiator: Address::repeat_byte(0x77),
            asset,
            amount: U256::from(1_000_000u64),
            premium: U256::from(900u64),
            referralCode: 0,
        }
        .encode_log_data()
    }
}
