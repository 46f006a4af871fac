//! Event pipeline: fetch pool logs, decode, deduplicate, aggregate rows.
//!
//! One [`FetchCycle`] per run owns the seen-transaction set, the issue log
//! and the accumulated rows. Any price or RPC failure while decoding aborts
//! the cycle; nothing is written for an aborted cycle.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use anyhow::{Context, Result};
use chrono::Local;
use lendscope_api::UsdPriceSource;
use lendscope_chain::units::wei_to_eth;
use lendscope_chain::{
    decode_log_with_meta, pool_filter, BorrowEvent, ChainError, EventKind, FlashLoanEvent,
    LiquidationCallEvent, LogMeta, LogSource, ProtocolEvent,
};
use tracing::{debug, info, warn};

use crate::assets::{AssetRegistry, NOT_KNOWN};
use crate::report::{
    build_report, BorrowRow, CsvSink, FlashLoanRow, LiquidationRow, ReportRow, ReportTable,
};

/// Issue-log category for collateral assets missing from the registry.
pub const NOT_KNOWN_ASSET: &str = "not_known_asset";

/// Net result of a liquidation in USD: collateral received minus debt paid.
/// Gas is not included.
#[inline]
pub fn net_balance(received_usd: f64, paid_usd: f64) -> f64 {
    received_usd - paid_usd
}

/// Fetch cycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Decoding,
    Aggregated,
    Written,
}

impl CycleState {
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Fetching,
            Self::Fetching => Self::Decoding,
            Self::Decoding => Self::Aggregated,
            Self::Aggregated => Self::Written,
            Self::Written => Self::Idle,
        }
    }
}

/// Non-fatal problems collected during a cycle, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueLog {
    entries: BTreeMap<String, Vec<Address>>,
}

impl IssueLog {
    pub fn record(&mut self, category: &str, address: Address) {
        self.entries
            .entry(category.to_string())
            .or_default()
            .push(address);
    }

    pub fn get(&self, category: &str) -> &[Address] {
        self.entries.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Address])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// State of one fetch cycle.
#[derive(Debug)]
pub struct FetchCycle {
    kind: EventKind,
    state: CycleState,
    seen: HashSet<B256>,
    issues: IssueLog,
    rows: Vec<ReportRow>,
    logs_fetched: usize,
    duplicates: usize,
}

impl FetchCycle {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            state: CycleState::Idle,
            seen: HashSet::new(),
            issues: IssueLog::default(),
            rows: Vec::new(),
            logs_fetched: 0,
            duplicates: 0,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Move to the next state.
    pub fn advance(&mut self) -> CycleState {
        let next = self.state.next();
        debug!(kind = %self.kind, from = ?self.state, to = ?next, "Cycle state");
        self.state = next;
        next
    }

    /// Record `tx_hash`; `false` if it was already seen this cycle.
    pub fn mark_seen(&mut self, tx_hash: B256) -> bool {
        let fresh = self.seen.insert(tx_hash);
        if !fresh {
            self.duplicates += 1;
        }
        fresh
    }

    pub fn issues(&self) -> &IssueLog {
        &self.issues
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Move the aggregated rows and issues out into a report.
    fn take_report(&mut self) -> CycleReport {
        CycleReport {
            table: build_report(self.kind, std::mem::take(&mut self.rows)),
            issues: std::mem::take(&mut self.issues),
            logs_fetched: self.logs_fetched,
            duplicates: self.duplicates,
        }
    }
}

/// Outcome of an aggregated cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub table: ReportTable,
    pub issues: IssueLog,
    pub logs_fetched: usize,
    pub duplicates: usize,
}

/// Runs fetch cycles against a lending pool.
pub struct EventPipeline<L, S> {
    logs: Arc<L>,
    prices: Arc<S>,
    assets: Arc<AssetRegistry>,
    pool: Address,
    log_receipts: bool,
}

impl<L: LogSource, S: UsdPriceSource> EventPipeline<L, S> {
    pub fn new(logs: Arc<L>, prices: Arc<S>, assets: Arc<AssetRegistry>, pool: Address) -> Self {
        Self {
            logs,
            prices,
            assets,
            pool,
            log_receipts: false,
        }
    }

    /// Fetch and log the receipt of every liquidation.
    pub fn with_log_receipts(mut self, enabled: bool) -> Self {
        self.log_receipts = enabled;
        self
    }

    /// Pool logs of `kind` in `[from_block, to_block]` (`None` = latest).
    pub async fn fetch_logs(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<Log>, ChainError> {
        let filter = pool_filter(self.pool, kind, from_block, to_block);
        self.logs.get_logs(&filter).await
    }

    /// Parse the kind name, then run a cycle. Unsupported names fail before
    /// any network call.
    pub async fn run_named(
        &self,
        name: &str,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<CycleReport> {
        let kind: EventKind = name.parse()?;
        self.run(kind, from_block, to_block).await
    }

    /// Fetch, decode and aggregate one cycle.
    pub async fn run(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<CycleReport> {
        let mut cycle = FetchCycle::new(kind);
        self.aggregate(&mut cycle, from_block, to_block).await?;
        Ok(cycle.take_report())
    }

    /// Run a cycle and write its table through `sink`. Returns the report
    /// and the written path (`None` when the sink skipped the table).
    pub async fn run_and_write(
        &self,
        kind: EventKind,
        from_block: u64,
        to_block: Option<u64>,
        sink: &CsvSink,
    ) -> Result<(CycleReport, Option<PathBuf>)> {
        let mut cycle = FetchCycle::new(kind);
        self.aggregate(&mut cycle, from_block, to_block).await?;
        let report = cycle.take_report();

        let path = sink.write(&report.table, Local::now().naive_local())?;
        cycle.advance();
        cycle.advance();
        Ok((report, path))
    }

    async fn aggregate(
        &self,
        cycle: &mut FetchCycle,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<()> {
        let kind = cycle.kind();

        cycle.advance();
        info!(%kind, from_block, ?to_block, pool = %self.pool, "Fetching pool events");
        let logs = self
            .fetch_logs(kind, from_block, to_block)
            .await
            .with_context(|| format!("Failed to fetch {kind} logs"))?;
        cycle.logs_fetched = logs.len();

        cycle.advance();
        if let Err(e) = self.process_logs(cycle, &logs).await {
            warn!(%kind, error = %e, "Cycle aborted");
            return Err(e);
        }

        cycle.advance();
        info!(
            %kind,
            logs = cycle.logs_fetched,
            rows = cycle.rows.len(),
            duplicates = cycle.duplicates,
            "Cycle aggregated"
        );
        for (category, addresses) in cycle.issues().iter() {
            warn!(category, count = addresses.len(), ?addresses, "Cycle issues");
        }
        Ok(())
    }

    /// Decode logs in arrival order, skipping repeated transactions.
    pub async fn process_logs(&self, cycle: &mut FetchCycle, logs: &[Log]) -> Result<()> {
        for log in logs {
            let meta = LogMeta::from_log(log)?;
            let tx_hash = meta.tx_hash;
            let Some(event) = decode_log_with_meta(log, meta)? else {
                debug!(tx = %tx_hash, "Log is not a pool event");
                continue;
            };
            if event.kind() != cycle.kind() {
                debug!(tx = %tx_hash, event = %event.kind(), "Event outside cycle kind");
                continue;
            }
            if !cycle.mark_seen(tx_hash) {
                debug!(tx = %tx_hash, "Transaction already handled");
                continue;
            }

            debug!(block = event.meta().block_number, tx = %tx_hash, "Handling log");
            let row = self.handle_event(cycle, event).await?;
            cycle.rows.push(row);
        }
        Ok(())
    }

    /// Exhaustive dispatch over the decoded event.
    pub async fn handle_event(
        &self,
        cycle: &mut FetchCycle,
        event: ProtocolEvent,
    ) -> Result<ReportRow> {
        Ok(match event {
            ProtocolEvent::Borrow(e) => ReportRow::Borrow(self.handle_borrow(&e)),
            ProtocolEvent::LiquidationCall(e) => {
                ReportRow::LiquidationCall(self.handle_liquidation(cycle, &e).await?)
            }
            ProtocolEvent::FlashLoan(e) => ReportRow::FlashLoan(handle_flash_loan(&e)),
        })
    }

    fn handle_borrow(&self, e: &BorrowEvent) -> BorrowRow {
        let asset = self.assets.symbol_for_address(&e.reserve).to_string();
        let amount = self.assets.to_whole_for(&e.reserve, e.amount);
        let balance_increase = e
            .balance_increase
            .map(|raw| self.assets.to_whole_for(&e.reserve, raw));

        debug!(
            asset = %asset,
            amount,
            ?balance_increase,
            rate_mode = %e.rate_mode,
            user = %e.user,
            on_behalf_of = ?e.on_behalf_of,
            timestamp = ?e.timestamp.and_then(|t| chrono::DateTime::from_timestamp(t as i64, 0)),
            version = ?e.version,
            "Borrow"
        );

        BorrowRow {
            transaction: e.meta.tx_hash,
            block: e.meta.block_number,
            asset,
            amount,
            balance_increase,
            rate_mode: e.rate_mode.saturating_to::<u64>(),
            user: e.user,
            on_behalf_of: e.on_behalf_of,
        }
    }

    async fn handle_liquidation(
        &self,
        cycle: &mut FetchCycle,
        e: &LiquidationCallEvent,
    ) -> Result<LiquidationRow> {
        let col_asset = self.assets.symbol_for_address(&e.collateral_asset).to_string();
        let debt_asset = self.assets.symbol_for_address(&e.debt_asset).to_string();
        let col_collected = self
            .assets
            .to_whole_for(&e.collateral_asset, e.liquidated_collateral_amount);
        let debt_covered = self.assets.to_whole_for(&e.debt_asset, e.debt_to_cover);

        let balance = if col_asset == NOT_KNOWN {
            warn!(collateral = %e.collateral_asset, tx = %e.meta.tx_hash, "Unknown collateral asset");
            cycle.issues.record(NOT_KNOWN_ASSET, e.collateral_asset);
            None
        } else if debt_asset == NOT_KNOWN {
            warn!(debt = %e.debt_asset, tx = %e.meta.tx_hash, "Unknown debt asset, balance left empty");
            None
        } else {
            let received = col_collected * self.spot(&col_asset).await?;
            let paid = debt_covered * self.spot(&debt_asset).await?;
            Some(net_balance(received, paid))
        };

        info!(
            tx = %e.meta.tx_hash,
            col_asset = %col_asset,
            col_collected,
            debt_asset = %debt_asset,
            debt_covered,
            ?balance,
            user = %e.user,
            liquidator = %e.liquidator,
            "LiquidationCall"
        );

        if self.log_receipts {
            self.log_receipt(e.meta.tx_hash).await;
        }

        Ok(LiquidationRow {
            transaction: e.meta.tx_hash,
            balance,
            user: e.user,
            liquidator: e.liquidator,
            col_asset,
            col_collected,
            debt_asset,
            debt_covered,
            block: e.meta.block_number,
        })
    }

    async fn spot(&self, symbol: &str) -> Result<f64> {
        self.prices
            .spot_usd_price(symbol)
            .await
            .with_context(|| format!("No USD price for {symbol}"))
    }

    async fn log_receipt(&self, tx_hash: B256) {
        match self.logs.transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) => info!(
                tx = %tx_hash,
                gas_used = receipt.gas_used,
                effective_gas_price = receipt.effective_gas_price,
                fee_eth = wei_to_eth(receipt.fee_wei()),
                success = receipt.success,
                "Liquidation receipt"
            ),
            Ok(None) => warn!(tx = %tx_hash, "Receipt not found"),
            Err(e) => warn!(tx = %tx_hash, error = %e, "Receipt fetch failed"),
        }
    }
}

fn handle_flash_loan(e: &FlashLoanEvent) -> FlashLoanRow {
    debug!(
        tx = %e.meta.tx_hash,
        asset = %e.asset,
        amount = %e.amount,
        premium = %e.premium,
        initiator = %e.initiator,
        target = %e.target,
        "FlashLoan"
    );
    FlashLoanRow {
        transaction: e.meta.tx_hash,
        block: e.meta.block_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{LogData, U256};
    use alloy::rpc::types::Filter;
    use alloy::sol_types::SolEvent;
    use async_trait::async_trait;
    use lendscope_api::PriceError;
    use lendscope_chain::contracts::lending_pool::signatures;
    use lendscope_chain::contracts::{ILendingPoolV1, ILendingPoolV2};
    use lendscope_chain::ReceiptSummary;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const POOL: Address = Address::repeat_byte(0x99);
    const UNKNOWN: Address = Address::repeat_byte(0x42);
    const USER: Address = Address::repeat_byte(0x11);
    const LIQUIDATOR: Address = Address::repeat_byte(0x22);

    fn asset(symbol: &str) -> Address {
        AssetRegistry::mainnet().address_for_symbol(symbol).unwrap()
    }

    fn rpc_log(data: LogData, block: u64, tx: u8) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: POOL,
                data,
            },
            block_number: Some(block),
            transaction_hash: Some(B256::repeat_byte(tx)),
            ..Default::default()
        }
    }

    fn liquidation(collateral: Address, collected: u128, debt: Address, covered: u128) -> LogData {
        ILendingPoolV2::LiquidationCall {
            collateralAsset: collateral,
            debtAsset: debt,
            user: USER,
            debtToCover: U256::from(covered),
            liquidatedCollateralAmount: U256::from(collected),
            liquidator: LIQUIDATOR,
            receiveAToken: false,
        }
        .encode_log_data()
    }

    fn borrow(reserve: Address, amount: u128) -> LogData {
        ILendingPoolV2::Borrow {
            reserve,
            user: USER,
            onBehalfOf: USER,
            amount: U256::from(amount),
            borrowRateMode: U256::from(2),
            borrowRate: U256::from(1u64),
            referral: 0,
        }
        .encode_log_data()
    }

    fn flash_loan(asset: Address) -> LogData {
        ILendingPoolV2::FlashLoan {
            target: USER,
            initiator: USER,
            asset,
            amount: U256::from(1u64),
            premium: U256::ZERO,
            referralCode: 0,
        }
        .encode_log_data()
    }

    #[derive(Default)]
    struct MockLogs {
        logs: Vec<Log>,
        fail: bool,
        get_logs_calls: Mutex<usize>,
        filters: Mutex<Vec<Filter>>,
        receipt_calls: Mutex<Vec<B256>>,
    }

    #[async_trait]
    impl LogSource for MockLogs {
        async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError> {
            *self.get_logs_calls.lock().unwrap() += 1;
            self.filters.lock().unwrap().push(filter.clone());
            if self.fail {
                return Err(ChainError::Timeout {
                    method: "eth_getLogs",
                    after: std::time::Duration::from_secs(30),
                });
            }
            Ok(self.logs.clone())
        }

        async fn transaction_receipt(
            &self,
            tx_hash: B256,
        ) -> Result<Option<ReceiptSummary>, ChainError> {
            self.receipt_calls.lock().unwrap().push(tx_hash);
            Err(ChainError::Transport {
                method: "eth_getTransactionReceipt",
                reason: "connection reset".into(),
            })
        }
    }

    struct MockPrices {
        prices: HashMap<String, f64>,
        requested: Mutex<Vec<String>>,
    }

    impl MockPrices {
        fn new(prices: &[(&str, f64)]) -> Self {
            Self {
                prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UsdPriceSource for MockPrices {
        async fn spot_usd_price(&self, symbol: &str) -> Result<f64, PriceError> {
            self.requested.lock().unwrap().push(symbol.to_string());
            self.prices
                .get(symbol)
                .copied()
                .ok_or_else(|| PriceError::UnknownSymbol(symbol.to_string()))
        }
    }

    fn pipeline(logs: MockLogs, prices: MockPrices) -> EventPipeline<MockLogs, MockPrices> {
        EventPipeline::new(
            Arc::new(logs),
            Arc::new(prices),
            Arc::new(AssetRegistry::mainnet()),
            POOL,
        )
    }

    fn standard_prices() -> MockPrices {
        MockPrices::new(&[("WETH", 4000.0), ("USDC", 1.0), ("DAI", 1.0)])
    }

    fn liquidation_rows(table: &ReportTable) -> &[LiquidationRow] {
        match table {
            ReportTable::LiquidationCall(rows) => rows,
            other => panic!("expected liquidation table, got {other:?}"),
        }
    }

    #[test]
    fn test_net_balance_is_exact_difference() {
        assert_eq!(net_balance(2.0 * 4000.0, 3000.0 * 1.0), 5000.0);
        assert_eq!(net_balance(10.0, 12.5), -2.5);
    }

    #[test]
    fn test_state_order() {
        let mut cycle = FetchCycle::new(EventKind::FlashLoan);
        let visited: Vec<CycleState> = (0..5).map(|_| cycle.advance()).collect();
        assert_eq!(
            visited,
            vec![
                CycleState::Fetching,
                CycleState::Decoding,
                CycleState::Aggregated,
                CycleState::Written,
                CycleState::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn test_liquidation_balance() {
        let logs = MockLogs {
            logs: vec![rpc_log(
                liquidation(asset("WETH"), 2_000_000_000_000_000_000, asset("USDC"), 3_000_000_000),
                13_700_000,
                0xA1,
            )],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());

        let report = pipeline.run(EventKind::LiquidationCall, 0, None).await.unwrap();
        let rows = liquidation_rows(&report.table);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.col_asset, "WETH");
        assert_eq!(row.col_collected, 2.0);
        assert_eq!(row.debt_asset, "USDC");
        assert_eq!(row.debt_covered, 3000.0);
        assert_eq!(row.balance, Some(2.0 * 4000.0 - 3000.0 * 1.0));
        assert_eq!(row.user, USER);
        assert_eq!(row.liquidator, LIQUIDATOR);
        assert_eq!(row.block, 13_700_000);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_is_scoped_to_pool_and_kind() {
        let pipeline = pipeline(MockLogs::default(), standard_prices());
        pipeline
            .run(EventKind::FlashLoan, 13_000_000, Some(13_000_100))
            .await
            .unwrap();

        let filters = pipeline.logs.filters.lock().unwrap();
        assert_eq!(filters.len(), 1);
        let filter = &filters[0];
        assert!(filter.address.matches(&POOL));
        assert!(!filter.address.matches(&asset("WETH")));
        assert!(filter.topics[0].matches(&signatures::FLASH_LOAN));
        assert!(!filter.topics[0].matches(&signatures::LIQUIDATION_CALL));
        assert_eq!(filter.get_from_block(), Some(13_000_000));
        assert_eq!(filter.get_to_block(), Some(13_000_100));
    }

    #[tokio::test]
    async fn test_off_kind_events_are_not_dispatched() {
        // LINK has no price; pricing it would abort the cycle
        let logs = MockLogs {
            logs: vec![
                rpc_log(
                    liquidation(asset("LINK"), 10u128.pow(18), asset("DAI"), 10u128.pow(18)),
                    1,
                    0x01,
                ),
                rpc_log(flash_loan(asset("USDC")), 2, 0x02),
            ],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());

        let report = pipeline.run(EventKind::FlashLoan, 0, None).await.unwrap();
        assert_eq!(report.table.len(), 1);
        assert_eq!(report.duplicates, 0);
        assert!(pipeline.prices.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_transactions_are_skipped() {
        let log = rpc_log(
            liquidation(asset("WETH"), 1_000_000_000_000_000_000, asset("DAI"), 10u128.pow(18)),
            1,
            0xB1,
        );
        let logs = MockLogs {
            logs: vec![log.clone(), log],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());

        let report = pipeline.run(EventKind::LiquidationCall, 0, None).await.unwrap();
        assert_eq!(report.table.len(), 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.logs_fetched, 2);
    }

    #[tokio::test]
    async fn test_borrows_do_not_reach_liquidation_report() {
        let logs = MockLogs {
            logs: vec![
                rpc_log(borrow(asset("DAI"), 10u128.pow(20)), 1, 0x01),
                rpc_log(borrow(asset("USDC"), 5_000_000), 2, 0x02),
                rpc_log(
                    liquidation(asset("WETH"), 10u128.pow(18), asset("DAI"), 10u128.pow(21)),
                    3,
                    0x03,
                ),
            ],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());

        let report = pipeline.run(EventKind::LiquidationCall, 0, None).await.unwrap();
        let rows = liquidation_rows(&report.table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction, B256::repeat_byte(0x03));
        assert_eq!(rows[0].balance, Some(4000.0 - 1000.0));
    }

    #[tokio::test]
    async fn test_unknown_collateral_is_reported_not_fatal() {
        let logs = MockLogs {
            logs: vec![
                rpc_log(liquidation(UNKNOWN, 10u128.pow(18), asset("DAI"), 10u128.pow(18)), 1, 0x01),
                rpc_log(
                    liquidation(asset("WETH"), 10u128.pow(18), asset("DAI"), 10u128.pow(18)),
                    2,
                    0x02,
                ),
            ],
            ..Default::default()
        };
        let prices = standard_prices();
        let pipeline = pipeline(logs, prices);

        let report = pipeline.run(EventKind::LiquidationCall, 0, None).await.unwrap();
        let rows = liquidation_rows(&report.table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].col_asset, NOT_KNOWN);
        assert_eq!(rows[0].balance, None);
        assert_eq!(rows[0].col_collected, 1.0);
        assert_eq!(rows[1].balance, Some(3999.0));

        assert_eq!(report.issues.get(NOT_KNOWN_ASSET), &[UNKNOWN]);
        let requested = pipeline.prices.requested.lock().unwrap();
        assert!(!requested.iter().any(|s| s == NOT_KNOWN));
    }

    #[tokio::test]
    async fn test_price_failure_aborts_cycle() {
        let logs = MockLogs {
            logs: vec![rpc_log(
                liquidation(asset("LINK"), 10u128.pow(18), asset("DAI"), 10u128.pow(18)),
                1,
                0x01,
            )],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());
        let dir = std::env::temp_dir().join(format!("lendscope-abort-{}", std::process::id()));
        let sink = CsvSink::new(&dir);

        let err = pipeline
            .run_and_write(EventKind::LiquidationCall, 0, None, &sink)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("LINK"));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_rpc_failure_aborts_cycle() {
        let logs = MockLogs {
            fail: true,
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());
        assert!(pipeline.run(EventKind::FlashLoan, 0, None).await.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_event_type_fails_before_fetch() {
        let pipeline = pipeline(MockLogs::default(), standard_prices());

        let err = pipeline.run_named("Repay", 0, None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChainError>(),
            Some(ChainError::UnsupportedEventType(name)) if name == "Repay"
        ));
        assert_eq!(*pipeline.logs.get_logs_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flash_loan_rows() {
        let logs = MockLogs {
            logs: vec![
                rpc_log(flash_loan(asset("USDC")), 10, 0x01),
                rpc_log(flash_loan(asset("DAI")), 11, 0x02),
            ],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());

        let report = pipeline.run(EventKind::FlashLoan, 0, Some(20)).await.unwrap();
        match report.table {
            ReportTable::FlashLoan(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1].block, 11);
                assert_eq!(rows[1].transaction, B256::repeat_byte(0x02));
            }
            other => panic!("expected flash loan table, got {other:?}"),
        }
        assert!(pipeline.prices.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_borrow_rows_use_reserve_decimals() {
        let v1 = ILendingPoolV1::Borrow {
            _reserve: asset("USDC"),
            _user: USER,
            _amount: U256::from(2_500_000u64),
            _borrowRateMode: U256::from(1),
            _borrowRate: U256::ZERO,
            _originationFee: U256::ZERO,
            _borrowBalanceIncrease: U256::from(500_000u64),
            _referral: 0,
            _timestamp: U256::from(1_600_000_000u64),
        }
        .encode_log_data();
        let logs = MockLogs {
            logs: vec![
                rpc_log(v1, 1, 0x01),
                rpc_log(borrow(UNKNOWN, 3 * 10u128.pow(18)), 2, 0x02),
            ],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());

        let report = pipeline.run(EventKind::Borrow, 0, None).await.unwrap();
        let ReportTable::Borrow(rows) = report.table else {
            panic!("expected borrow table");
        };
        assert_eq!(rows[0].asset, "USDC");
        assert_eq!(rows[0].amount, 2.5);
        assert_eq!(rows[0].balance_increase, Some(0.5));
        assert_eq!(rows[0].rate_mode, 1);
        assert_eq!(rows[0].on_behalf_of, None);

        assert_eq!(rows[1].asset, NOT_KNOWN);
        assert_eq!(rows[1].amount, 3.0);
        assert_eq!(rows[1].on_behalf_of, Some(USER));
    }

    #[tokio::test]
    async fn test_receipt_failure_is_not_fatal() {
        let logs = MockLogs {
            logs: vec![rpc_log(
                liquidation(asset("WETH"), 10u128.pow(18), asset("DAI"), 10u128.pow(18)),
                1,
                0x0F,
            )],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices()).with_log_receipts(true);

        let report = pipeline.run(EventKind::LiquidationCall, 0, None).await.unwrap();
        assert_eq!(report.table.len(), 1);
        assert_eq!(
            *pipeline.logs.receipt_calls.lock().unwrap(),
            vec![B256::repeat_byte(0x0F)]
        );
    }

    #[tokio::test]
    async fn test_borrow_report_written_only_when_enabled() {
        let logs = MockLogs {
            logs: vec![rpc_log(borrow(asset("DAI"), 10u128.pow(18)), 1, 0x01)],
            ..Default::default()
        };
        let pipeline = pipeline(logs, standard_prices());
        let dir = std::env::temp_dir().join(format!("lendscope-borrow-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let (report, path) = pipeline
            .run_and_write(EventKind::Borrow, 0, None, &CsvSink::new(&dir))
            .await
            .unwrap();
        assert_eq!(report.table.len(), 1);
        assert_eq!(path, None);

        let (_, path) = pipeline
            .run_and_write(
                EventKind::Borrow,
                0,
                None,
                &CsvSink::new(&dir).with_persist_borrow(true),
            )
            .await
            .unwrap();
        assert!(path.unwrap().exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
