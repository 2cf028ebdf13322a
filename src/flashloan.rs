//! # Flash Loan Module
//!
//! Uncollateralized lending that exists for exactly one call frame: the
//! bucket hands `amount` of an asset to a receiver, the receiver does
//! whatever it does, and before the operation returns the bucket must hold
//! at least what it started with plus the fee. No repayment, no loan —
//! the whole thing, initial transfer included, unwinds.
//!
//! There is deliberately no loan state to persist. A flash loan that could
//! outlive its call frame would need collateral, liquidation, interest
//! accrual — a lending protocol. This is not that.
//!
//! The orchestration (balance snapshot, callback, post-condition, commit)
//! lives in [`crate::bucket::Bucket::flash_loan`]; this module defines the
//! receiver seam, the fee math, and the receipt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{BPS_DENOMINATOR, FLASH_LOAN_FEE_BPS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during a flash loan.
#[derive(Debug, Error)]
pub enum FlashLoanError {
    /// Zero-amount loans are pointless and rejected.
    #[error("zero-amount flash loans are not permitted")]
    ZeroAmount,

    /// The receiver address is empty.
    #[error("flash loan receiver address is empty")]
    ZeroReceiver,

    /// The bucket does not hold enough of the asset to lend.
    #[error("insufficient liquidity for flash loan of {asset}: available {available}, requested {requested}")]
    InsufficientLiquidity {
        /// The asset requested.
        asset: String,
        /// Amount currently in custody.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    /// The receiver returned less than principal + fee. The entire loan,
    /// including the initial transfer, is rolled back.
    #[error("insufficient repayment: required {required}, returned {returned}")]
    InsufficientRepayment {
        /// Principal plus fee.
        required: u128,
        /// What the receiver actually returned.
        returned: u128,
    },
}

// ---------------------------------------------------------------------------
// Receiver Seam
// ---------------------------------------------------------------------------

/// The borrower side of a flash loan.
///
/// `on_flash_loan` is invoked synchronously inside the lending operation
/// with the loaned amount already in the receiver's hands. The return value
/// is the amount the receiver sends back to the bucket; the bucket then
/// asserts `returned >= amount + fee` before committing anything.
pub trait FlashLoanReceiver {
    /// Flash-loan callback.
    ///
    /// * `initiator` — address that triggered the loan on the bucket.
    /// * `asset` / `amount` — what was lent.
    /// * `fee` — the premium owed on top of `amount`.
    /// * `data` — opaque bytes passed through from the initiator.
    ///
    /// Returns the amount repaid to the bucket.
    fn on_flash_loan(
        &mut self,
        initiator: &str,
        asset: &str,
        amount: u128,
        fee: u128,
        data: &[u8],
    ) -> u128;
}

// ---------------------------------------------------------------------------
// Fee & Receipt
// ---------------------------------------------------------------------------

/// Premium owed on a flash loan of `amount`, at the fixed
/// [`FLASH_LOAN_FEE_BPS`] rate. Rounds down; a loan small enough to round
/// to a zero fee is effectively free, which is fine — the fee exists to
/// make large-scale extraction unprofitable, not to monetize dust.
pub fn flash_fee(amount: u128) -> u128 {
    amount.saturating_mul(FLASH_LOAN_FEE_BPS as u128) / BPS_DENOMINATOR
}

/// Receipt for a completed (repaid) flash loan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlashLoanReceipt {
    /// Unique id for this loan.
    pub id: Uuid,
    /// When the loan completed (UTC).
    pub timestamp: DateTime<Utc>,
    /// Address that initiated the loan.
    pub initiator: String,
    /// Receiver the funds were lent to.
    pub receiver: String,
    /// Asset lent.
    pub asset: String,
    /// Principal amount.
    pub amount: u128,
    /// Fee collected on top of the principal.
    pub fee: u128,
}
