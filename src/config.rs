//! # Vault Constants
//!
//! The numbers the whole engine is calibrated against, collected in one
//! file so nothing accounting-critical hides inside a function body. A
//! constant that isn't in here shouldn't exist.
//!
//! Treat the decimal conventions as load-bearing: once buckets custody
//! real value, changing them isn't an edit, it's a migration with victims.

use chrono::Duration;

// ---------------------------------------------------------------------------
// Decimal Conventions
// ---------------------------------------------------------------------------

/// USD values and oracle prices are 8-decimal fixed point.
/// $2,000.00 is represented as `200_000_000_000`.
pub const PRICE_DECIMALS: u32 = 8;

/// Scale factor for 8-decimal USD values: `10^PRICE_DECIMALS`.
pub const USD_UNIT: u128 = 100_000_000;

/// Vault shares are 18-decimal fixed point, like every ERC-20 that wants
/// to be taken seriously.
pub const SHARE_DECIMALS: u32 = 18;

/// Scale factor for share amounts: `10^SHARE_DECIMALS`.
pub const SHARE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// The share price a bucket bootstraps with on its first-ever deposit:
/// exactly 1.00 USD in 8-decimal representation. Before any shares exist
/// there is no market-derived price, so the first depositor mints at par.
pub const BASELINE_SHARE_PRICE: u128 = USD_UNIT;

// ---------------------------------------------------------------------------
// Basis Points
// ---------------------------------------------------------------------------

/// All fee and threshold parameters are expressed in basis points.
/// 1 bp = 0.01%, so 10_000 bps = 100%. No floating point in fee math.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Maximum value any configurable bps parameter may take (100%).
pub const MAX_BPS: u16 = 10_000;

/// Accountability floor: the owner must retain at least this fraction of
/// total supply (500 bps = 5%) for privileged operations to succeed.
/// Skin-in-the-game, enforced mechanically.
pub const MIN_OWNER_BPS: u16 = 500;

/// Flash-loan premium charged on every loan. Fixed, not owner-tunable:
/// a configurable flash fee is an invitation to rug the receiver.
pub const FLASH_LOAN_FEE_BPS: u16 = 9;

/// Maximum total USD value a rebalance batch is allowed to burn through
/// slippage and fees before the whole batch reverts (50 bps = 0.5%).
pub const MAX_VALUE_LOSS_BPS: u16 = 50;

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// How old a price quote may be before the oracle fails closed.
///
/// Thirty days is deliberately generous — it exists to catch feeds that
/// are wired up but dead, not to bound intra-day drift. Hosts with live
/// feeds should run far tighter windows at the feed layer.
pub fn price_staleness_window() -> Duration {
    Duration::days(30)
}

/// Snapshot schema version written by [`crate::snapshot::save_snapshot`]
/// and checked on load. Bump on any breaking change to persisted state.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_scales_match_exponents() {
        assert_eq!(USD_UNIT, 10u128.pow(PRICE_DECIMALS));
        assert_eq!(SHARE_PRECISION, 10u128.pow(SHARE_DECIMALS));
    }

    #[test]
    fn baseline_price_is_one_dollar() {
        assert_eq!(BASELINE_SHARE_PRICE, 100_000_000);
    }

    #[test]
    fn accountability_floor_is_five_percent() {
        assert_eq!(MIN_OWNER_BPS as u128 * 100 / BPS_DENOMINATOR, 5);
    }
}
