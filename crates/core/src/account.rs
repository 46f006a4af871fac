//! Lending pool account inspection.
//!
//! Reads a user's position from the pool and decodes the two bitmasks the
//! pool stores configuration in:
//!
//! - user configuration: bit `2*i` = borrowing reserve `i`, bit `2*i+1` =
//!   using reserve `i` as collateral
//! - reserve configuration: packed LTV, liquidation threshold and bonus,
//!   decimals, state flags and reserve factor

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use lendscope_chain::units::{bps_to_pct, wad_to_f64, wei_to_eth};
use lendscope_chain::{LendingPoolReader, RawAccountData};
use tracing::{debug, info};

use crate::assets::AssetRegistry;

const LTV_OFFSET: usize = 0;
const LIQUIDATION_THRESHOLD_OFFSET: usize = 16;
const LIQUIDATION_BONUS_OFFSET: usize = 32;
const DECIMALS_OFFSET: usize = 48;
const ACTIVE_BIT: usize = 56;
const FROZEN_BIT: usize = 57;
const BORROWING_ENABLED_BIT: usize = 58;
const STABLE_BORROWING_ENABLED_BIT: usize = 59;
const RESERVE_FACTOR_OFFSET: usize = 64;

/// `width` bits of `data` starting at `offset`.
fn bit_range(data: U256, offset: usize, width: usize) -> u64 {
    let mask = (U256::from(1u64) << width) - U256::from(1u64);
    ((data >> offset) & mask).saturating_to::<u64>()
}

/// Whether the user borrows reserve `index`.
#[inline]
pub fn is_borrowing(user_config: U256, index: usize) -> bool {
    user_config.bit(2 * index)
}

/// Whether the user has reserve `index` enabled as collateral.
#[inline]
pub fn is_using_as_collateral(user_config: U256, index: usize) -> bool {
    user_config.bit(2 * index + 1)
}

/// Decoded reserve configuration bitmask. Ratios stay in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveConfiguration {
    pub ltv_bps: u16,
    pub liquidation_threshold_bps: u16,
    /// Includes the 100% base (10500 = 5% bonus)
    pub liquidation_bonus_bps: u16,
    pub decimals: u8,
    pub active: bool,
    pub frozen: bool,
    pub borrowing_enabled: bool,
    pub stable_borrowing_enabled: bool,
    pub reserve_factor_bps: u16,
}

impl ReserveConfiguration {
    pub fn decode(data: U256) -> Self {
        Self {
            ltv_bps: bit_range(data, LTV_OFFSET, 16) as u16,
            liquidation_threshold_bps: bit_range(data, LIQUIDATION_THRESHOLD_OFFSET, 16) as u16,
            liquidation_bonus_bps: bit_range(data, LIQUIDATION_BONUS_OFFSET, 16) as u16,
            decimals: bit_range(data, DECIMALS_OFFSET, 8) as u8,
            active: data.bit(ACTIVE_BIT),
            frozen: data.bit(FROZEN_BIT),
            borrowing_enabled: data.bit(BORROWING_ENABLED_BIT),
            stable_borrowing_enabled: data.bit(STABLE_BORROWING_ENABLED_BIT),
            reserve_factor_bps: bit_range(data, RESERVE_FACTOR_OFFSET, 16) as u16,
        }
    }
}

/// `getUserAccountData` in reporting units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccountSummary {
    pub total_collateral_eth: f64,
    pub total_debt_eth: f64,
    pub available_borrows_eth: f64,
    /// Percent (82.5 = 8250 bps)
    pub liquidation_threshold_pct: f64,
    pub ltv_pct: f64,
    /// As reported by the pool
    pub health_factor: f64,
}

impl AccountSummary {
    pub fn from_raw(raw: &RawAccountData) -> Self {
        Self {
            total_collateral_eth: wei_to_eth(raw.total_collateral_eth),
            total_debt_eth: wei_to_eth(raw.total_debt_eth),
            available_borrows_eth: wei_to_eth(raw.available_borrows_eth),
            liquidation_threshold_pct: bps_to_pct(raw.current_liquidation_threshold),
            ltv_pct: bps_to_pct(raw.ltv),
            health_factor: wad_to_f64(raw.health_factor),
        }
    }

    /// `collateral * threshold / debt`, infinite without debt.
    pub fn local_health_factor(&self) -> f64 {
        if self.total_debt_eth == 0.0 {
            return f64::INFINITY;
        }
        self.total_collateral_eth * self.liquidation_threshold_pct / 100.0 / self.total_debt_eth
    }
}

/// One reserve of the pool as seen from a user.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservePosition {
    pub index: usize,
    pub asset: Address,
    pub symbol: String,
    pub borrowing: bool,
    pub collateral: bool,
    pub configuration: ReserveConfiguration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountReport {
    pub user: Address,
    pub summary: AccountSummary,
    /// Every pool reserve, in reserve-index order
    pub reserves: Vec<ReservePosition>,
}

impl AccountReport {
    pub fn collateral_reserves(&self) -> impl Iterator<Item = &ReservePosition> {
        self.reserves.iter().filter(|r| r.collateral)
    }

    pub fn borrowed_reserves(&self) -> impl Iterator<Item = &ReservePosition> {
        self.reserves.iter().filter(|r| r.borrowing)
    }
}

pub struct AccountInspector<P> {
    pool: Arc<P>,
    assets: Arc<AssetRegistry>,
}

impl<P: LendingPoolReader> AccountInspector<P> {
    pub fn new(pool: Arc<P>, assets: Arc<AssetRegistry>) -> Self {
        Self { pool, assets }
    }

    pub async fn inspect_account(&self, user: Address) -> Result<AccountReport> {
        let reserves = self
            .pool
            .reserves_list()
            .await
            .context("Failed to read reserves list")?;
        let user_config = self
            .pool
            .user_configuration(user)
            .await
            .with_context(|| format!("Failed to read configuration of {user}"))?;
        debug!(%user, reserves = reserves.len(), config = %user_config, "User configuration");

        let mut positions = Vec::with_capacity(reserves.len());
        for (index, asset) in reserves.into_iter().enumerate() {
            let data = self
                .pool
                .reserve_configuration(asset)
                .await
                .with_context(|| format!("Failed to read configuration of reserve {asset}"))?;
            positions.push(ReservePosition {
                index,
                asset,
                symbol: self.assets.symbol_for_address(&asset).to_string(),
                borrowing: is_borrowing(user_config, index),
                collateral: is_using_as_collateral(user_config, index),
                configuration: ReserveConfiguration::decode(data),
            });
        }

        let raw = self
            .pool
            .user_account_data(user)
            .await
            .with_context(|| format!("Failed to read account data of {user}"))?;
        let summary = AccountSummary::from_raw(&raw);

        let report = AccountReport {
            user,
            summary,
            reserves: positions,
        };
        info!(
            %user,
            collateral_eth = summary.total_collateral_eth,
            debt_eth = summary.total_debt_eth,
            health_factor = summary.health_factor,
            local_health_factor = summary.local_health_factor(),
            collateral = report.collateral_reserves().count(),
            borrowed = report.borrowed_reserves().count(),
            "Account inspected"
        );
        Ok(report)
    }
}
