//! Lending protocol analytics.
//!
//! This crate ties the chain and price clients together:
//! - Asset registry (address ↔ symbol ↔ decimals)
//! - Event pipeline: fetch, deduplicate and aggregate pool events
//! - CSV reports for liquidations, flash loans and borrows
//! - Account inspection (bitmask decoding, health factor)
//! - TOML configuration

pub mod account;
mod assets;
pub mod config;
pub mod pipeline;
pub mod report;

pub use account::{AccountInspector, AccountReport, AccountSummary, ReserveConfiguration, ReservePosition};
pub use assets::{Asset, AssetRegistry, NOT_KNOWN};
pub use config::{AppConfig, AssetConfig, AssetsConfig};
pub use pipeline::{CycleReport, CycleState, EventPipeline, FetchCycle, IssueLog, NOT_KNOWN_ASSET};
pub use report::{
    build_report, report_file_name, BorrowRow, CsvSink, FlashLoanRow, LiquidationRow, ReportRow,
    ReportTable,
};
