//! # Fees & Governance Guard
//!
//! The vault's safety valves. Three independent mechanisms:
//!
//! - **Pause state** — a global pause that freezes deposits, redemptions,
//!   flash loans, and rebalancing, plus an independent swap pause that
//!   freezes only the trading paths. The global pause is an idempotent
//!   toggle; the swap pause has strict, non-idempotent transitions (pausing
//!   an already-paused swap state is an error, as is unpausing an active
//!   one).
//! - **Accountability** — the owner must keep at least
//!   [`MIN_OWNER_BPS`] of total supply. Every privileged operation
//!   recomputes this from live ledger numbers at call time; the result is
//!   never cached across calls.
//! - **Fee parameters** — owner-tunable bps values, each bounded to
//!   [0, 10_000] at the setter.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{MAX_BPS, MIN_OWNER_BPS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the governance guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The bucket is globally paused.
    #[error("bucket is paused")]
    Paused,

    /// Swap operations are paused.
    #[error("swaps are paused")]
    SwapsPaused,

    /// `pause_swaps` called while swaps were already paused.
    #[error("swap pause is already engaged")]
    SwapIsPaused,

    /// `unpause_swaps` called while swaps were not paused.
    #[error("swap pause is not engaged")]
    SwapNotPaused,

    /// The caller is not the bucket owner.
    #[error("caller {0} is not the bucket owner")]
    NotOwner(String),

    /// The owner's stake is below the accountability floor.
    #[error("owner is not accountable: holds {owner_bps} bps, floor is {floor_bps} bps")]
    OwnerNotAccountable {
        /// The owner's current stake in basis points.
        owner_bps: u128,
        /// The required floor.
        floor_bps: u16,
    },

    /// A fee setter was handed a value above 100%.
    #[error("fee out of range: {bps} bps exceeds {max} bps")]
    FeeOutOfRange {
        /// The rejected value.
        bps: u16,
        /// The permitted maximum.
        max: u16,
    },
}

// ---------------------------------------------------------------------------
// Accountability
// ---------------------------------------------------------------------------

/// Returns `true` if an owner holding `owner_shares` of `total_supply`
/// satisfies the skin-in-the-game floor.
///
/// An empty vault is accountable by definition — there is nobody to be
/// accountable *to*.
pub fn is_accountable(owner_shares: u128, total_supply: u128) -> bool {
    if total_supply == 0 {
        return true;
    }
    owner_bps(owner_shares, total_supply) >= MIN_OWNER_BPS as u128
}

/// The owner's stake in basis points of total supply.
pub fn owner_bps(owner_shares: u128, total_supply: u128) -> u128 {
    if total_supply == 0 {
        return 0;
    }
    match owner_shares.checked_mul(10_000) {
        Some(scaled) => scaled / total_supply,
        // Supplies past ~3.4e34 shares: divide first, precision loss is
        // irrelevant at that scale.
        None => owner_shares / (total_supply / 10_000).max(1),
    }
}

// ---------------------------------------------------------------------------
// Pause State
// ---------------------------------------------------------------------------

/// The two independent pause flags.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PauseState {
    paused: bool,
    swaps_paused: bool,
}

impl PauseState {
    /// Creates the fully-active state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the global pause is engaged.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns `true` if the swap pause is engaged.
    pub fn are_swaps_paused(&self) -> bool {
        self.swaps_paused
    }

    /// Engages the global pause. Idempotent.
    pub fn pause(&mut self) {
        self.paused = true;
        info!("bucket paused");
    }

    /// Releases the global pause. Idempotent.
    pub fn unpause(&mut self) {
        self.paused = false;
        info!("bucket unpaused");
    }

    /// Engages the swap pause.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::SwapIsPaused`] if swaps are already paused.
    pub fn pause_swaps(&mut self) -> Result<(), GuardError> {
        if self.swaps_paused {
            return Err(GuardError::SwapIsPaused);
        }
        self.swaps_paused = true;
        info!("swaps paused");
        Ok(())
    }

    /// Releases the swap pause.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::SwapNotPaused`] if swaps are not paused.
    pub fn unpause_swaps(&mut self) -> Result<(), GuardError> {
        if !self.swaps_paused {
            return Err(GuardError::SwapNotPaused);
        }
        self.swaps_paused = false;
        info!("swaps unpaused");
        Ok(())
    }

    /// Gate for deposit/redeem/flash-loan paths.
    pub fn ensure_active(&self) -> Result<(), GuardError> {
        if self.paused {
            return Err(GuardError::Paused);
        }
        Ok(())
    }

    /// Gate for rebalance/swap paths: both pauses must be clear.
    pub fn ensure_swaps_active(&self) -> Result<(), GuardError> {
        self.ensure_active()?;
        if self.swaps_paused {
            return Err(GuardError::SwapsPaused);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Owner-tunable fee rates. The flash-loan fee and the value-loss budget
/// are deliberately *not* here — they are fixed constants
/// ([`crate::config::FLASH_LOAN_FEE_BPS`],
/// [`crate::config::MAX_VALUE_LOSS_BPS`]).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeeParams {
    /// Skim rate against realized rebalance gains (policy hook; accrued,
    /// not collected — see the bucket's performance-fee accumulator).
    pub performance_fee_bps: u16,
    /// Cut of rebalance proceeds paid to the owner.
    pub rebalance_owner_fee_bps: u16,
    /// Cut of rebalance proceeds paid to whoever triggered the rebalance.
    pub rebalance_caller_fee_bps: u16,
}

impl FeeParams {
    /// Validates a bps value against the [0, 10_000] bound.
    pub fn check_bps(bps: u16) -> Result<u16, GuardError> {
        if bps > MAX_BPS {
            return Err(GuardError::FeeOutOfRange { bps, max: MAX_BPS });
        }
        Ok(bps)
    }

    /// Sets the performance fee.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::FeeOutOfRange`] above 10_000 bps.
    pub fn set_performance_fee(&mut self, bps: u16) -> Result<(), GuardError> {
        self.performance_fee_bps = Self::check_bps(bps)?;
        Ok(())
    }

    /// Sets both rebalance fee cuts.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::FeeOutOfRange`] if either value exceeds
    /// 10_000 bps.
    pub fn set_rebalance_fees(&mut self, owner_bps: u16, caller_bps: u16) -> Result<(), GuardError> {
        let owner_bps = Self::check_bps(owner_bps)?;
        let caller_bps = Self::check_bps(caller_bps)?;
        self.rebalance_owner_fee_bps = owner_bps;
        self.rebalance_caller_fee_bps = caller_bps;
        Ok(())
    }
}
