//! Fixed-point conversions for on-chain integer amounts.
//!
//! Token amounts, oracle answers and protocol ratios arrive as integers
//! scaled by a per-source decimal count. Everything here converts them to
//! `f64` for reporting; nothing here feeds back into on-chain values.

use alloy::primitives::{I256, U256};

/// Decimals of ETH-denominated protocol values (wei).
pub const WEI_DECIMALS: u8 = 18;

/// WAD fixed point (health factors).
pub const WAD_DECIMALS: u8 = 18;

const LIMB_BASE: f64 = 18_446_744_073_709_551_616.0; // 2^64

/// Convert a U256 to the nearest f64.
#[inline]
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * LIMB_BASE + limb as f64)
}

/// Convert a signed I256 to the nearest f64.
#[inline]
pub fn i256_to_f64(value: I256) -> f64 {
    let (sign, abs) = value.into_sign_and_abs();
    let magnitude = u256_to_f64(abs);
    if sign.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// `raw / 10^decimals` in double precision.
///
/// Example: `to_whole(1_500_000, 6) == 1.5` (1.5 USDC).
#[inline]
pub fn to_whole(raw: U256, decimals: u8) -> f64 {
    u256_to_f64(raw) / 10_f64.powi(decimals as i32)
}

/// Signed variant of [`to_whole`] for int256 oracle answers.
#[inline]
pub fn signed_to_whole(raw: I256, decimals: u8) -> f64 {
    i256_to_f64(raw) / 10_f64.powi(decimals as i32)
}

/// Wei to ETH.
#[inline]
pub fn wei_to_eth(raw: U256) -> f64 {
    to_whole(raw, WEI_DECIMALS)
}

/// WAD value to a plain ratio (1e18 -> 1.0).
#[inline]
pub fn wad_to_f64(raw: U256) -> f64 {
    to_whole(raw, WAD_DECIMALS)
}

/// Basis points to a percentage (8250 bps -> 82.5).
#[inline]
pub fn bps_to_pct(bps: U256) -> f64 {
    u256_to_f64(bps) / 100.0
}
