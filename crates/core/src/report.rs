//! Report rows, tables and the CSV sink.

use std::fs;
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use lendscope_chain::EventKind;
use serde::Serialize;
use tracing::{debug, info};

pub const LIQUIDATION_COLUMNS: [&str; 9] = [
    "transaction",
    "balance",
    "user",
    "liquidator",
    "col_asset",
    "col_collected",
    "debt_asset",
    "debt_covered",
    "block",
];

pub const FLASH_LOAN_COLUMNS: [&str; 2] = ["transaction", "block"];

pub const BORROW_COLUMNS: [&str; 8] = [
    "transaction",
    "block",
    "asset",
    "amount",
    "balance_increase",
    "rate_mode",
    "user",
    "on_behalf_of",
];

/// One processed LiquidationCall. Field order matches [`LIQUIDATION_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidationRow {
    pub transaction: B256,
    /// `received_usd - paid_usd`, gas excluded. Empty when the collateral
    /// asset is unknown.
    pub balance: Option<f64>,
    pub user: Address,
    pub liquidator: Address,
    pub col_asset: String,
    pub col_collected: f64,
    pub debt_asset: String,
    pub debt_covered: f64,
    pub block: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashLoanRow {
    pub transaction: B256,
    pub block: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorrowRow {
    pub transaction: B256,
    pub block: u64,
    pub asset: String,
    pub amount: f64,
    /// V1 pools only
    pub balance_increase: Option<f64>,
    pub rate_mode: u64,
    pub user: Address,
    /// V2 pools only
    pub on_behalf_of: Option<Address>,
}

/// A row produced by one event handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRow {
    Borrow(BorrowRow),
    LiquidationCall(LiquidationRow),
    FlashLoan(FlashLoanRow),
}

impl ReportRow {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Borrow(_) => EventKind::Borrow,
            Self::LiquidationCall(_) => EventKind::LiquidationCall,
            Self::FlashLoan(_) => EventKind::FlashLoan,
        }
    }
}

/// Rows of a single event kind, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportTable {
    Borrow(Vec<BorrowRow>),
    LiquidationCall(Vec<LiquidationRow>),
    FlashLoan(Vec<FlashLoanRow>),
}

impl ReportTable {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Borrow(_) => EventKind::Borrow,
            Self::LiquidationCall(_) => EventKind::LiquidationCall,
            Self::FlashLoan(_) => EventKind::FlashLoan,
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        columns_for(self.kind())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Borrow(rows) => rows.len(),
            Self::LiquidationCall(rows) => rows.len(),
            Self::FlashLoan(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed column set of a kind's report.
pub fn columns_for(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::Borrow => &BORROW_COLUMNS,
        EventKind::LiquidationCall => &LIQUIDATION_COLUMNS,
        EventKind::FlashLoan => &FLASH_LOAN_COLUMNS,
    }
}

/// Collect the rows belonging to `kind`; rows of other kinds are dropped.
pub fn build_report(kind: EventKind, rows: Vec<ReportRow>) -> ReportTable {
    match kind {
        EventKind::Borrow => ReportTable::Borrow(
            rows.into_iter()
                .filter_map(|row| match row {
                    ReportRow::Borrow(r) => Some(r),
                    _ => None,
                })
                .collect(),
        ),
        EventKind::LiquidationCall => ReportTable::LiquidationCall(
            rows.into_iter()
                .filter_map(|row| match row {
                    ReportRow::LiquidationCall(r) => Some(r),
                    _ => None,
                })
                .collect(),
        ),
        EventKind::FlashLoan => ReportTable::FlashLoan(
            rows.into_iter()
                .filter_map(|row| match row {
                    ReportRow::FlashLoan(r) => Some(r),
                    _ => None,
                })
                .collect(),
        ),
    }
}

/// `<Kind>_<YYYYMMDD_HHMMSS>.csv`
pub fn report_file_name(kind: EventKind, at: NaiveDateTime) -> String {
    format!("{}_{}.csv", kind.name(), at.format("%Y%m%d_%H%M%S"))
}

/// Writes report tables as CSV files into one directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
    persist_borrow: bool,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            persist_borrow: false,
        }
    }

    /// Also write Borrow tables.
    pub fn with_persist_borrow(mut self, persist_borrow: bool) -> Self {
        self.persist_borrow = persist_borrow;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `table`, returning the file path. Borrow tables are skipped
    /// (`Ok(None)`) unless persistence was enabled.
    pub fn write(&self, table: &ReportTable, at: NaiveDateTime) -> Result<Option<PathBuf>> {
        if table.kind() == EventKind::Borrow && !self.persist_borrow {
            debug!(rows = table.len(), "Borrow report not persisted");
            return Ok(None);
        }

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output dir {}", self.output_dir.display())
        })?;
        let path = self.output_dir.join(report_file_name(table.kind(), at));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        writer.write_record(table.columns())?;
        match table {
            ReportTable::Borrow(rows) => write_rows(&mut writer, rows)?,
            ReportTable::LiquidationCall(rows) => write_rows(&mut writer, rows)?,
            ReportTable::FlashLoan(rows) => write_rows(&mut writer, rows)?,
        }
        writer.flush()?;

        info!(
            kind = %table.kind(),
            rows = table.len(),
            path = %path.display(),
            "Report written"
        );
        Ok(Some(path))
    }
}

fn write_rows<W: std::io::Write, R: Serialize>(
    writer: &mut csv::Writer<W>,
    rows: &[R],
) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 11, 20)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lendscope-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn liquidation_row(balance: Option<f64>) -> LiquidationRow {
        LiquidationRow {
            transaction: B256::repeat_byte(0xAA),
            balance,
            user: Address::repeat_byte(0x11),
            liquidator: Address::repeat_byte(0x22),
            col_asset: "WETH".into(),
            col_collected: 2.0,
            debt_asset: "DAI".into(),
            debt_covered: 3000.0,
            block: 13_700_000,
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            report_file_name(EventKind::LiquidationCall, at()),
            "LiquidationCall_20211120_090503.csv"
        );
        assert_eq!(report_file_name(EventKind::FlashLoan, at()), "FlashLoan_20211120_090503.csv");
    }

    #[test]
    fn test_build_report_drops_other_kinds() {
        let rows = vec![
            ReportRow::FlashLoan(FlashLoanRow {
                transaction: B256::repeat_byte(1),
                block: 1,
            }),
            ReportRow::LiquidationCall(liquidation_row(Some(1.0))),
        ];

        let table = build_report(EventKind::LiquidationCall, rows);
        assert_eq!(table.kind(), EventKind::LiquidationCall);
        assert_eq!(table.len(), 1);
        assert_eq!(table.columns(), &LIQUIDATION_COLUMNS);
    }

    #[test]
    fn test_liquidation_csv() {
        let dir = temp_dir("liq");
        let sink = CsvSink::new(&dir);
        let table = ReportTable::LiquidationCall(vec![
            liquidation_row(Some(500.0)),
            liquidation_row(None),
        ]);

        let path = sink.write(&table, at()).unwrap().unwrap();
        assert_eq!(path, dir.join("LiquidationCall_20211120_090503.csv"));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "transaction,balance,user,liquidator,col_asset,col_collected,debt_asset,debt_covered,block"
        );
        assert_eq!(lines.len(), 3);

        let first: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(first.len(), 9);
        assert_eq!(first[1], "500.0");
        assert_eq!(first[4], "WETH");
        assert_eq!(first[8], "13700000");

        // unknown collateral leaves the balance empty
        let second: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(second[1], "");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_flash_loan_csv_has_two_columns() {
        let dir = temp_dir("flash");
        let table = ReportTable::FlashLoan(vec![FlashLoanRow {
            transaction: B256::repeat_byte(0xBB),
            block: 42,
        }]);

        let path = CsvSink::new(&dir).write(&table, at()).unwrap().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("transaction,block"));
        assert!(lines.next().unwrap().ends_with(",42"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let dir = temp_dir("empty");
        let path = CsvSink::new(&dir)
            .write(&ReportTable::FlashLoan(Vec::new()), at())
            .unwrap()
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "transaction,block\n");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_borrow_persistence_switch() {
        let dir = temp_dir("borrow");
        let table = ReportTable::Borrow(vec![BorrowRow {
            transaction: B256::repeat_byte(0xCC),
            block: 7,
            asset: "DAI".into(),
            amount: 100.0,
            balance_increase: None,
            rate_mode: 2,
            user: Address::repeat_byte(0x33),
            on_behalf_of: Some(Address::repeat_byte(0x44)),
        }]);

        assert_eq!(CsvSink::new(&dir).write(&table, at()).unwrap(), None);
        assert!(!dir.exists());

        let path = CsvSink::new(&dir)
            .with_persist_borrow(true)
            .write(&table, at())
            .unwrap()
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(
            "transaction,block,asset,amount,balance_increase,rate_mode,user,on_behalf_of\n"
        ));

        fs::remove_dir_all(&dir).unwrap();
    }
}
