//! # Asset Registry
//!
//! Two pieces of bookkeeping live here:
//!
//! - [`Holdings`] — what the bucket actually has in custody right now, as a
//!   map from asset id to smallest-unit amount. This is the ground truth
//!   that pro-rata redemptions and valuations run over.
//! - [`Distribution`] — what a *passive* bucket is supposed to hold, as an
//!   ordered list of (asset, weight%) targets. Validated on construction so
//!   an invalid distribution can never exist as a value.
//!
//! Active buckets have holdings but no distribution; their allocation is
//! wherever the manager last rebalanced it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur in holdings or distribution bookkeeping.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Attempted to pay out or debit more of an asset than is in custody.
    #[error("insufficient holding of {asset}: available {available}, requested {requested}")]
    InsufficientHolding {
        /// The asset being debited.
        asset: String,
        /// Amount currently in custody.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    /// Arithmetic overflow crediting an asset.
    #[error("holding overflow for {0}")]
    HoldingOverflow(String),

    /// A distribution must name at least one asset.
    #[error("distribution is empty")]
    EmptyDistribution,

    /// Distribution weights must sum to exactly 100.
    #[error("distribution weights sum to {sum}, expected 100")]
    WeightSumMismatch {
        /// The actual sum of the proposed weights.
        sum: u32,
    },

    /// The same asset appears twice in a distribution.
    #[error("duplicate asset in distribution: {0}")]
    DuplicateAsset(String),
}

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

/// Custodied asset amounts, keyed by asset id, in smallest units.
///
/// Entries are created on first credit and removed when a debit takes them
/// to zero, so iteration only sees assets the bucket actually holds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Holdings {
    amounts: BTreeMap<String, u128>,
}

impl Holdings {
    /// Creates an empty custody map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the custodied amount of `asset`, 0 if none.
    pub fn amount_of(&self, asset: &str) -> u128 {
        self.amounts.get(asset).copied().unwrap_or(0)
    }

    /// Returns the number of distinct assets held.
    pub fn asset_count(&self) -> usize {
        self.amounts.len()
    }

    /// Returns `true` if nothing is in custody.
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Iterates over `(asset, amount)` pairs in asset order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
        self.amounts.iter().map(|(a, v)| (a.as_str(), *v))
    }

    /// Credits `amount` of `asset` into custody.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HoldingOverflow`] on arithmetic overflow.
    pub fn credit(&mut self, asset: &str, amount: u128) -> Result<u128, RegistryError> {
        let new_amount = self
            .amount_of(asset)
            .checked_add(amount)
            .ok_or_else(|| RegistryError::HoldingOverflow(asset.to_string()))?;
        self.amounts.insert(asset.to_string(), new_amount);
        Ok(new_amount)
    }

    /// Debits `amount` of `asset` from custody, dropping the entry if it
    /// reaches zero.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InsufficientHolding`] if custody holds less
    /// than `amount` (nothing mutated).
    pub fn debit(&mut self, asset: &str, amount: u128) -> Result<u128, RegistryError> {
        let available = self.amount_of(asset);
        if amount > available {
            return Err(RegistryError::InsufficientHolding {
                asset: asset.to_string(),
                available,
                requested: amount,
            });
        }

        let remaining = available - amount;
        if remaining == 0 {
            self.amounts.remove(asset);
        } else {
            self.amounts.insert(asset.to_string(), remaining);
        }
        Ok(remaining)
    }
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// One target in a passive distribution: an asset and its weight in
/// whole percent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedAsset {
    /// Asset identifier.
    pub asset: String,
    /// Target weight in whole percent (1–100).
    pub weight_pct: u8,
}

impl WeightedAsset {
    /// Convenience constructor.
    pub fn new(asset: &str, weight_pct: u8) -> Self {
        Self {
            asset: asset.to_string(),
            weight_pct,
        }
    }
}

/// A validated passive target-weight distribution.
///
/// Construction is the only way to obtain one, and construction enforces:
/// non-empty, weights sum to exactly 100, no duplicate assets. Updates
/// replace the distribution wholesale with a freshly validated value —
/// there is no partial edit path to sneak an invalid state through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    targets: Vec<WeightedAsset>,
}

impl Distribution {
    /// Validates and builds a distribution from the proposed targets.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyDistribution`],
    /// [`RegistryError::DuplicateAsset`], or
    /// [`RegistryError::WeightSumMismatch`] as applicable.
    pub fn new(targets: Vec<WeightedAsset>) -> Result<Self, RegistryError> {
        if targets.is_empty() {
            return Err(RegistryError::EmptyDistribution);
        }

        let mut seen = BTreeMap::new();
        for target in &targets {
            if seen.insert(target.asset.clone(), ()).is_some() {
                return Err(RegistryError::DuplicateAsset(target.asset.clone()));
            }
        }

        let sum: u32 = targets.iter().map(|t| t.weight_pct as u32).sum();
        if sum != 100 {
            return Err(RegistryError::WeightSumMismatch { sum });
        }

        Ok(Self { targets })
    }

    /// Returns the targets in declaration order.
    pub fn targets(&self) -> &[WeightedAsset] {
        &self.targets
    }

    /// Returns the target weight for `asset`, if it is part of the
    /// distribution.
    pub fn weight_of(&self, asset: &str) -> Option<u8> {
        self.targets
            .iter()
            .find(|t| t.asset == asset)
            .map(|t| t.weight_pct)
    }
}
