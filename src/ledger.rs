//! # Share Ledger
//!
//! The books. Every depositor's claim on the bucket is a share balance in
//! this ledger, and the ledger enforces the one invariant everything else
//! leans on: **the sum of all holder balances equals total supply, always.**
//!
//! The ledger deliberately knows nothing about assets, prices, or custody —
//! it mints and burns 18-decimal shares and converts between share counts
//! and 8-decimal USD values at a given share price. Deciding *what* a share
//! is worth is the caller's job (see [`crate::bucket::Bucket`]).
//!
//! ## Mutation Discipline
//!
//! [`mint`](ShareLedger::mint) and [`burn`](ShareLedger::burn) are the only
//! two ways a balance or the supply can change. Each one either applies a
//! matched balance+supply update or returns an error having touched
//! nothing, which is what makes the sum invariant mechanically checkable
//! after every operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{BASELINE_SHARE_PRICE, SHARE_PRECISION};
use crate::math::mul_div;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Zero-share mints and burns are no-ops and indicate a caller bug.
    #[error("zero-amount share operations are not permitted")]
    ZeroAmount,

    /// Attempted to burn more shares than the holder owns.
    #[error("invalid redeem amount: requested {requested}, balance {balance}")]
    InvalidRedeemAmount {
        /// Shares the caller tried to burn.
        requested: u128,
        /// The holder's actual balance.
        balance: u128,
    },

    /// Arithmetic overflow. With u128 share math this means something is
    /// feeding the ledger garbage, not that a real vault got too big.
    #[error("share arithmetic overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// ShareLedger
// ---------------------------------------------------------------------------

/// Holder balances, total supply, and the deposit/withdraw value counters.
///
/// Balances are keyed by holder address string. An entry is created on a
/// holder's first mint and removed when a burn takes it to zero, so
/// iteration only ever sees live holders.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShareLedger {
    /// Holder address → share balance (18-decimal).
    balances: BTreeMap<String, u128>,
    /// Total shares outstanding. Changed by mint/burn only.
    total_supply: u128,
    /// Lifetime USD value deposited (8-decimal). Analytics only —
    /// never consulted for accounting.
    total_deposit_value_usd: u128,
    /// Lifetime USD value withdrawn (8-decimal). Analytics only.
    total_withdraw_value_usd: u128,
}

impl ShareLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the share balance of `holder`, 0 if they hold nothing.
    pub fn balance_of(&self, holder: &str) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Returns total shares outstanding.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Returns the number of distinct holders with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Returns all holders and their balances.
    pub fn holders(&self) -> impl Iterator<Item = (&str, u128)> {
        self.balances.iter().map(|(h, b)| (h.as_str(), *b))
    }

    /// Lifetime deposited USD value (8-decimal), monotonic.
    pub fn total_deposit_value_usd(&self) -> u128 {
        self.total_deposit_value_usd
    }

    /// Lifetime withdrawn USD value (8-decimal), monotonic.
    pub fn total_withdraw_value_usd(&self) -> u128 {
        self.total_withdraw_value_usd
    }

    /// Sums every holder balance. Exists so callers (and tests) can check
    /// the supply invariant mechanically; not used on any hot path.
    pub fn balances_total(&self) -> u128 {
        self.balances.values().sum()
    }

    // -----------------------------------------------------------------------
    // Mint / Burn
    // -----------------------------------------------------------------------

    /// Mints `shares` to `holder`, growing total supply by the same amount.
    ///
    /// Returns the holder's new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAmount`] if `shares` is 0 and
    /// [`LedgerError::Overflow`] on arithmetic overflow (nothing mutated).
    pub fn mint(&mut self, holder: &str, shares: u128) -> Result<u128, LedgerError> {
        if shares == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let new_supply = self
            .total_supply
            .checked_add(shares)
            .ok_or(LedgerError::Overflow)?;
        let new_balance = self
            .balance_of(holder)
            .checked_add(shares)
            .ok_or(LedgerError::Overflow)?;

        self.total_supply = new_supply;
        self.balances.insert(holder.to_string(), new_balance);

        debug!(holder, shares, new_supply, "minted shares");
        Ok(new_balance)
    }

    /// Burns `shares` from `holder`, shrinking total supply by the same
    /// amount. Removes the balance entry if it reaches zero.
    ///
    /// Returns the holder's remaining balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAmount`] if `shares` is 0 and
    /// [`LedgerError::InvalidRedeemAmount`] if the holder owns fewer than
    /// `shares` (nothing mutated).
    pub fn burn(&mut self, holder: &str, shares: u128) -> Result<u128, LedgerError> {
        if shares == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let balance = self.balance_of(holder);
        if shares > balance {
            return Err(LedgerError::InvalidRedeemAmount {
                requested: shares,
                balance,
            });
        }

        // balance >= shares implies total_supply >= shares via the sum
        // invariant, so this subtraction cannot underflow.
        self.total_supply -= shares;
        let remaining = balance - shares;
        if remaining == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(holder.to_string(), remaining);
        }

        debug!(holder, shares, remaining, "burned shares");
        Ok(remaining)
    }

    // -----------------------------------------------------------------------
    // Value Math
    // -----------------------------------------------------------------------

    /// Returns the current share price (8-decimal USD) given the bucket's
    /// total USD value. Bootstraps to [`BASELINE_SHARE_PRICE`] when no
    /// shares exist yet.
    pub fn share_price(&self, total_value_usd: u128) -> Result<u128, LedgerError> {
        if self.total_supply == 0 {
            return Ok(BASELINE_SHARE_PRICE);
        }
        mul_div(total_value_usd, SHARE_PRECISION, self.total_supply).ok_or(LedgerError::Overflow)
    }

    /// Converts an 8-decimal USD value into an 18-decimal share count at
    /// the given share price.
    pub fn shares_for_value(value_usd: u128, share_price: u128) -> Result<u128, LedgerError> {
        mul_div(value_usd, SHARE_PRECISION, share_price).ok_or(LedgerError::Overflow)
    }

    /// Records deposited USD value in the lifetime counter (saturating —
    /// an analytics counter is not worth an abort at the u128 ceiling).
    pub fn record_deposit_value(&mut self, value_usd: u128) {
        self.total_deposit_value_usd = self.total_deposit_value_usd.saturating_add(value_usd);
    }

    /// Records withdrawn USD value in the lifetime counter.
    pub fn record_withdraw_value(&mut self, value_usd: u128) {
        self.total_withdraw_value_usd = self.total_withdraw_value_usd.saturating_add(value_usd);
    }

    /// Returns `holder`'s stake as basis points of total supply
    /// (0 when no shares exist).
    pub fn stake_bps(&self, holder: &str) -> u128 {
        if self.total_supply == 0 {
            return 0;
        }
        // The scaled product can only overflow for supplies past ~3.4e34
        // shares; divide-first keeps the answer sane even there.
        self.balance_of(holder)
            .checked_mul(10_000)
            .map(|scaled| scaled / self.total_supply)
            .unwrap_or_else(|| self.balance_of(holder) / (self.total_supply / 10_000).max(1))
    }
}
