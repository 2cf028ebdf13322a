//! # Vault Error Taxonomy
//!
//! Every rejection in the engine is synchronous, attributable to exactly
//! one named condition, and leaves zero state change behind. This module
//! aggregates the per-module error enums into the single [`VaultError`]
//! that bucket operations return, plus a coarse [`ErrorKind`]
//! classification for hosts that want to branch on failure class rather
//! than the specific condition (e.g., "retry nothing, alert on Safety").

use thiserror::Error;

use crate::flashloan::FlashLoanError;
use crate::guard::GuardError;
use crate::ledger::LedgerError;
use crate::oracle::OracleError;
use crate::rebalance::RebalanceError;
use crate::registry::RegistryError;

// ---------------------------------------------------------------------------
// VaultError
// ---------------------------------------------------------------------------

/// Any error a bucket operation can return.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The asset is not eligible for deposit (not whitelisted, or the
    /// platform is down).
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The platform behind the oracle is not operational.
    #[error("platform is not operational")]
    PlatformNotOperational,

    /// An address argument was empty.
    #[error("empty address argument")]
    ZeroAddress,

    /// Adapter-quoted rebalances may only be triggered by a current
    /// shareholder.
    #[error("caller {0} holds no shares")]
    NotShareholder(String),

    /// Distribution updates only exist on passive buckets.
    #[error("bucket has no target distribution (active bucket)")]
    NotPassiveBucket,

    /// Discretionary rebalancing only exists on active buckets.
    #[error("discretionary rebalance requires an active bucket")]
    NotActiveBucket,

    /// `configure_dex` was handed an index past the end of the config list.
    #[error("dex config index {index} out of range (len {len})")]
    DexIndexOutOfRange {
        /// The rejected index.
        index: usize,
        /// Current number of configured entries.
        len: usize,
    },

    /// `recover_tokens` refuses to touch oracle-whitelisted assets —
    /// it rescues strays, never vault-managed holdings.
    #[error("cannot recover whitelisted asset {0}")]
    WhitelistedAssetRecovery(String),

    /// A rebalance batch would lose more value than the budget allows.
    /// Nothing from the batch persists.
    #[error(
        "value loss exceeded: before {value_before} after {value_after}, budget {max_loss_bps} bps"
    )]
    ValueLossExceeded {
        /// Total USD value before the batch (8-decimal).
        value_before: u128,
        /// Total USD value the batch would have left (8-decimal).
        value_after: u128,
        /// The loss budget in basis points.
        max_loss_bps: u16,
    },

    /// Oracle failure (unlisted asset, stale price, platform down).
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Share ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Holdings or distribution failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Governance guard failure.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// Rebalance quoting/execution failure.
    #[error(transparent)]
    Rebalance(#[from] RebalanceError),

    /// Flash-loan failure.
    #[error(transparent)]
    FlashLoan(#[from] FlashLoanError),
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Coarse failure classes. Mirrors how operators triage: validation and
/// state errors are caller mistakes or timing, resource errors are market
/// conditions, safety errors mean an invariant tripped and someone should
/// look at it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: zero amounts, bad weights, unknown assets.
    Validation,
    /// The operation is valid but the bucket/platform state forbids it.
    State,
    /// Not enough of something: balance, liquidity, quotes.
    Resource,
    /// A safety invariant rejected the outcome of an otherwise-valid
    /// operation.
    Safety,
}

impl VaultError {
    /// Classifies this error per the taxonomy above.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidToken(_)
            | VaultError::ZeroAddress
            | VaultError::NotShareholder(_)
            | VaultError::NotPassiveBucket
            | VaultError::NotActiveBucket
            | VaultError::DexIndexOutOfRange { .. }
            | VaultError::WhitelistedAssetRecovery(_) => ErrorKind::Validation,

            VaultError::PlatformNotOperational => ErrorKind::State,
            VaultError::ValueLossExceeded { .. } => ErrorKind::Safety,

            VaultError::Oracle(e) => match e {
                OracleError::NotWhitelisted(_) => ErrorKind::Validation,
                OracleError::StalePrice { .. } | OracleError::NotOperational => ErrorKind::State,
            },

            VaultError::Ledger(e) => match e {
                LedgerError::ZeroAmount
                | LedgerError::InvalidRedeemAmount { .. }
                | LedgerError::Overflow => ErrorKind::Validation,
            },

            VaultError::Registry(e) => match e {
                RegistryError::InsufficientHolding { .. } => ErrorKind::Resource,
                RegistryError::HoldingOverflow(_)
                | RegistryError::EmptyDistribution
                | RegistryError::WeightSumMismatch { .. }
                | RegistryError::DuplicateAsset(_) => ErrorKind::Validation,
            },

            VaultError::Guard(e) => match e {
                GuardError::FeeOutOfRange { .. } => ErrorKind::Validation,
                GuardError::Paused
                | GuardError::SwapsPaused
                | GuardError::SwapIsPaused
                | GuardError::SwapNotPaused
                | GuardError::NotOwner(_)
                | GuardError::OwnerNotAccountable { .. } => ErrorKind::State,
            },

            VaultError::Rebalance(_) => ErrorKind::Resource,

            VaultError::FlashLoan(e) => match e {
                FlashLoanError::ZeroAmount | FlashLoanError::ZeroReceiver => ErrorKind::Validation,
                FlashLoanError::InsufficientLiquidity { .. } => ErrorKind::Resource,
                FlashLoanError::InsufficientRepayment { .. } => ErrorKind::Safety,
            },
        }
    }
}
