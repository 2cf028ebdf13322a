//! # Rebalance Engine Building Blocks
//!
//! Rebalancing moves the bucket's holdings toward a goal by trading on
//! external venues. Two execution styles exist:
//!
//! - **Aggregator-delegated** — the caller hands over an opaque
//!   [`AggregatorOrder`] and the configured router executes it, trusting
//!   the aggregator's own slippage protection.
//! - **Adapter-quoted** — the engine asks every enabled [`DexConfig`]'s
//!   adapter for a quote at the trade size, picks the strictly best one,
//!   and executes only through that venue.
//!
//! Either way, the batch-level safety net is the same: the bucket snapshots
//! its total USD value before the batch and reverts everything if the batch
//! burns more than the configured value-loss budget (see
//! [`crate::bucket::Bucket`]). This module provides the venue traits, the
//! order/report types, and the best-quote selection; the value guard lives
//! with the bucket because only the bucket knows its holdings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a swap venue during execution.
#[derive(Debug, Error)]
pub enum SwapError {
    /// The venue produced less output than the required minimum.
    #[error("insufficient output: minimum {min_out}, got {actual}")]
    InsufficientOutput {
        /// The minimum acceptable output.
        min_out: u128,
        /// What the venue actually delivered.
        actual: u128,
    },

    /// The venue failed outright (reverted, rejected the order, etc.).
    #[error("swap execution failed: {0}")]
    ExecutionFailed(String),
}

/// Errors raised while assembling or selecting a rebalance trade.
#[derive(Debug, Error)]
pub enum RebalanceError {
    /// No enabled adapter produced a usable quote for the trade.
    #[error("no valid quotes found")]
    NoValidQuotesFound,

    /// The trade size is zero (or rounds to zero after fee deduction).
    #[error("swap amount too small")]
    SwapAmountTooSmall,

    /// A venue failed during execution.
    #[error(transparent)]
    Swap(#[from] SwapError),
}

// ---------------------------------------------------------------------------
// Venue Traits
// ---------------------------------------------------------------------------

/// A direct DEX integration: quoting and execution against one venue.
///
/// `quote` returns `None` when the venue cannot price the pair at all;
/// a `Some(0)` quote is treated as no quote by the selector.
pub trait DexAdapter {
    /// Expected output for swapping `amount_in` of `asset_in` into
    /// `asset_out` at the given fee tier.
    fn quote(&self, asset_in: &str, asset_out: &str, fee_tier: u32, amount_in: u128)
        -> Option<u128>;

    /// Executes the swap, returning the delivered output amount.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::InsufficientOutput`] if the delivered amount
    /// is below `min_out`, or [`SwapError::ExecutionFailed`] on venue
    /// failure.
    fn execute(
        &mut self,
        asset_in: &str,
        asset_out: &str,
        fee_tier: u32,
        amount_in: u128,
        min_out: u128,
    ) -> Result<u128, SwapError>;
}

/// An opaque calldata-accepting aggregator (1inch-style). The aggregator is
/// trusted to enforce its own internal slippage bound; the bucket's
/// value-loss guard is the backstop.
pub trait SwapAggregator {
    /// Executes the order, returning the delivered output amount.
    fn execute(&mut self, order: &AggregatorOrder) -> Result<u128, SwapError>;
}

// ---------------------------------------------------------------------------
// Configuration & Orders
// ---------------------------------------------------------------------------

/// A configured DEX venue entry. The adapter instance itself is injected at
/// call time; this is the persisted metadata that pairs with it by index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DexConfig {
    /// Router address the adapter executes through.
    pub router: String,
    /// Quoter address the adapter prices through.
    pub quoter: String,
    /// Pool fee tier the adapter targets (venue-specific units).
    pub fee_tier: u32,
    /// Disabled entries are skipped during quote selection.
    pub enabled: bool,
}

/// One adapter-quoted trade in a rebalance batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapOrder {
    /// Asset to sell out of custody.
    pub asset_in: String,
    /// Asset to buy into custody.
    pub asset_out: String,
    /// Amount of `asset_in` to sell, smallest units.
    pub amount_in: u128,
}

/// One aggregator-delegated trade. `payload` is the opaque routing calldata
/// the aggregator understands; the engine never inspects it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatorOrder {
    /// Asset to sell out of custody.
    pub asset_in: String,
    /// Asset to buy into custody.
    pub asset_out: String,
    /// Amount of `asset_in` to sell, smallest units.
    pub amount_in: u128,
    /// Opaque routing payload forwarded to the aggregator.
    #[serde(with = "serde_bytes_hex")]
    pub payload: Vec<u8>,
}

/// Hex-encode opaque payloads in JSON instead of emitting byte arrays.
mod serde_bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push_str(&format!("{b:02x}"));
        }
        ser.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        if s.len() % 2 != 0 {
            return Err(serde::de::Error::custom("odd-length hex payload"));
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&s[i..i + 2], 16)
                    .map_err(|_| serde::de::Error::custom("invalid hex payload"))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Best-Quote Selection
// ---------------------------------------------------------------------------

/// Picks the best venue for a trade by quoting every enabled config.
///
/// Selection is strict: a venue wins only by quoting strictly more output
/// than the current best, so ties keep the earliest-configured adapter.
/// Returns the winning `(config index, quoted output)`.
///
/// # Errors
///
/// Returns [`RebalanceError::SwapAmountTooSmall`] for a zero trade size and
/// [`RebalanceError::NoValidQuotesFound`] when no enabled adapter quotes a
/// non-zero output.
pub fn select_best_quote(
    configs: &[DexConfig],
    adapters: &[&dyn DexAdapter],
    order: &SwapOrder,
) -> Result<(usize, u128), RebalanceError> {
    if order.amount_in == 0 {
        return Err(RebalanceError::SwapAmountTooSmall);
    }

    let mut best: Option<(usize, u128)> = None;
    for (index, config) in configs.iter().enumerate() {
        if !config.enabled {
            continue;
        }
        let Some(adapter) = adapters.get(index) else {
            continue;
        };

        let quoted = adapter.quote(
            &order.asset_in,
            &order.asset_out,
            config.fee_tier,
            order.amount_in,
        );
        debug!(
            index,
            router = %config.router,
            quoted = ?quoted,
            "rebalance quote"
        );

        match (quoted, best) {
            (Some(out), _) if out == 0 => {}
            (Some(out), None) => best = Some((index, out)),
            (Some(out), Some((_, best_out))) if out > best_out => best = Some((index, out)),
            _ => {}
        }
    }

    best.ok_or(RebalanceError::NoValidQuotesFound)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One executed trade inside a committed rebalance batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutedSwap {
    /// Asset sold.
    pub asset_in: String,
    /// Asset bought.
    pub asset_out: String,
    /// Amount sold, smallest units.
    pub amount_in: u128,
    /// Amount received, smallest units, before fee skim.
    pub amount_out: u128,
    /// Router the trade went through.
    pub venue: String,
}

/// Receipt for a committed rebalance batch.
///
/// Produced only when the whole batch passes the value-loss guard — a
/// reverted batch leaves no report because it leaves no state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// Unique id for this batch.
    pub id: Uuid,
    /// When the batch committed (UTC).
    pub timestamp: DateTime<Utc>,
    /// Address that triggered the rebalance.
    pub caller: String,
    /// Every trade in commit order.
    pub executed: Vec<ExecutedSwap>,
    /// Total bucket USD value before the batch (8-decimal).
    pub value_before_usd: u128,
    /// Total bucket USD value after the batch, before fee skim (8-decimal).
    pub value_after_usd: u128,
    /// Per-asset amounts skimmed from proceeds and paid to the caller.
    pub caller_fees: Vec<(String, u128)>,
    /// Per-asset amounts skimmed from proceeds and paid to the owner.
    pub owner_fees: Vec<(String, u128)>,
}
