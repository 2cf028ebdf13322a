//! # Valuation Oracle
//!
//! The oracle is the vault's single source of truth for two questions it
//! must never answer itself: *is this asset allowed in here?* and *what is
//! it worth?* Everything downstream — share minting, pro-rata payouts, the
//! rebalance value-loss guard — is only as honest as the answers it gets
//! from this seam.
//!
//! The engine consumes the [`ValuationOracle`] trait; hosts wire in a real
//! feed-backed implementation. [`StaticOracle`] is the reference
//! implementation used in tests and single-process deployments: an
//! in-memory listing table with a fail-closed staleness window.
//!
//! ## Fail-Closed Pricing
//!
//! A price lookup succeeds only when the asset is whitelisted AND its quote
//! is younger than the staleness window. There is no "best effort" path —
//! a vault that silently values holdings with a dead feed is a vault that
//! mints shares for free.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{price_staleness_window, BPS_DENOMINATOR};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by oracle queries.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The asset is not on the oracle's whitelist.
    #[error("asset not whitelisted: {0}")]
    NotWhitelisted(String),

    /// The asset is whitelisted but its quote is older than the staleness
    /// window. The vault refuses to price anything with this quote.
    #[error("stale price for {asset}: last updated {last_updated}")]
    StalePrice {
        /// The asset whose quote went stale.
        asset: String,
        /// Timestamp of the last quote update.
        last_updated: DateTime<Utc>,
    },

    /// The platform behind the oracle reports itself non-operational.
    #[error("platform is not operational")]
    NotOperational,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// External pricing and eligibility authority consumed by the vault.
///
/// Prices are 8-decimal USD fixed point (see [`crate::config::PRICE_DECIMALS`]).
/// Asset decimals come from the same authority as prices so that a bucket
/// can never pair a price from one registry with decimals from another.
pub trait ValuationOracle {
    /// Returns `true` if the asset is on the whitelist.
    fn is_token_whitelisted(&self, asset: &str) -> bool;

    /// Returns `true` if the platform behind the oracle is operational.
    fn is_platform_operational(&self) -> bool;

    /// Returns `true` if the asset is whitelisted AND the platform is
    /// operational. This is the eligibility gate for deposits.
    fn is_token_valid(&self, asset: &str) -> bool {
        self.is_token_whitelisted(asset) && self.is_platform_operational()
    }

    /// Returns the current USD price (8-decimal) for the asset.
    ///
    /// # Errors
    ///
    /// Fails closed: [`OracleError::NotWhitelisted`] for unlisted assets,
    /// [`OracleError::StalePrice`] when the quote is too old.
    fn token_price(&self, asset: &str) -> Result<u128, OracleError>;

    /// Returns the number of decimals the asset's smallest unit carries.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::NotWhitelisted`] for unlisted assets.
    fn token_decimals(&self, asset: &str) -> Result<u32, OracleError>;

    /// Returns all currently whitelisted asset identifiers.
    fn whitelisted_tokens(&self) -> Vec<String>;

    /// Platform fee rate in basis points, applied by hosts at their own
    /// boundaries. The vault engine only reports it.
    fn platform_fee_bps(&self) -> u16;

    /// Computes the platform fee for `amount` at [`platform_fee_bps`](Self::platform_fee_bps).
    fn calculate_fee(&self, amount: u128) -> u128 {
        amount.saturating_mul(self.platform_fee_bps() as u128) / BPS_DENOMINATOR
    }
}

// ---------------------------------------------------------------------------
// StaticOracle
// ---------------------------------------------------------------------------

/// A single whitelist entry: price, decimals, and when the price was set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenListing {
    /// USD price in 8-decimal fixed point.
    pub price: u128,
    /// Decimals of the asset's smallest unit (18 for ETH-likes, 6 for
    /// the common stablecoins).
    pub decimals: u32,
    /// When `price` was last written. Drives the staleness check.
    pub updated_at: DateTime<Utc>,
}

/// In-memory reference oracle.
///
/// Prices are pushed by the host (or test) rather than pulled from a feed.
/// The staleness window still applies: a listing whose price hasn't been
/// refreshed within [`price_staleness_window`] fails closed exactly like a
/// dead feed would.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticOracle {
    listings: BTreeMap<String, TokenListing>,
    operational: bool,
    platform_fee_bps: u16,
}

impl StaticOracle {
    /// Creates an empty, operational oracle with the given platform fee.
    pub fn new(platform_fee_bps: u16) -> Self {
        Self {
            listings: BTreeMap::new(),
            operational: true,
            platform_fee_bps,
        }
    }

    /// Whitelists an asset with a fresh price quote.
    pub fn list_token(&mut self, asset: &str, price: u128, decimals: u32) {
        self.listings.insert(
            asset.to_string(),
            TokenListing {
                price,
                decimals,
                updated_at: Utc::now(),
            },
        );
    }

    /// Updates the price of an already-listed asset, refreshing its
    /// timestamp. No-op if the asset is not listed.
    pub fn set_price(&mut self, asset: &str, price: u128) {
        if let Some(listing) = self.listings.get_mut(asset) {
            listing.price = price;
            listing.updated_at = Utc::now();
        }
    }

    /// Backdates a listing's quote timestamp. Exists so hosts replaying
    /// historical state (and tests exercising staleness) can control the
    /// clock without waiting thirty days.
    pub fn set_quote_timestamp(&mut self, asset: &str, at: DateTime<Utc>) {
        if let Some(listing) = self.listings.get_mut(asset) {
            listing.updated_at = at;
        }
    }

    /// Removes an asset from the whitelist.
    pub fn delist(&mut self, asset: &str) {
        self.listings.remove(asset);
    }

    /// Flips the platform operational flag.
    pub fn set_operational(&mut self, operational: bool) {
        self.operational = operational;
    }
}

impl ValuationOracle for StaticOracle {
    fn is_token_whitelisted(&self, asset: &str) -> bool {
        self.listings.contains_key(asset)
    }

    fn is_platform_operational(&self) -> bool {
        self.operational
    }

    fn token_price(&self, asset: &str) -> Result<u128, OracleError> {
        let listing = self
            .listings
            .get(asset)
            .ok_or_else(|| OracleError::NotWhitelisted(asset.to_string()))?;

        if Utc::now() - listing.updated_at > price_staleness_window() {
            return Err(OracleError::StalePrice {
                asset: asset.to_string(),
                last_updated: listing.updated_at,
            });
        }

        Ok(listing.price)
    }

    fn token_decimals(&self, asset: &str) -> Result<u32, OracleError> {
        self.listings
            .get(asset)
            .map(|l| l.decimals)
            .ok_or_else(|| OracleError::NotWhitelisted(asset.to_string()))
    }

    fn whitelisted_tokens(&self) -> Vec<String> {
        self.listings.keys().cloned().collect()
    }

    fn platform_fee_bps(&self) -> u16 {
        self.platform_fee_bps
    }
}
