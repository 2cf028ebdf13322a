// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bucket Vault — Pooled Multi-Asset Vault Engine
//!
//! A bucket is a pooled vault: many depositors, one multi-asset portfolio,
//! fungible 18-decimal shares against the whole thing. Deposit any
//! whitelisted asset and get shares at the live USD share price; redeem
//! shares and get a pro-rata slice of everything in custody. In between,
//! the portfolio gets rebalanced across swap venues, lent out for
//! single-call flash loans, and kept honest by a set of mechanical guards.
//!
//! ## Architecture
//!
//! The engine is split into modules that mirror the actual concerns of
//! running pooled money:
//!
//! - **bucket** — The vault instance itself. Every operation starts here.
//! - **ledger** — Share balances and supply. The books.
//! - **registry** — Custodied holdings and passive target distributions.
//! - **oracle** — The pricing/eligibility seam. Fails closed, always.
//! - **rebalance** — Swap venue traits, best-quote selection, batch reports.
//! - **flashloan** — Single-call-frame lending. Repay or it never happened.
//! - **guard** — Pause machinery, the accountability floor, fee bounds.
//! - **snapshot** — Atomic JSON persistence for bucket state.
//! - **math** — The one place `a * b / d` gets computed on u128.
//! - **error** — One error taxonomy across all of the above.
//! - **config** — Every constant, in one file, with its reasoning.
//!
//! ## Design Philosophy
//!
//! 1. Shares are claims, holdings are truth. The two never drift.
//! 2. Every operation commits completely or changes nothing.
//! 3. Guards are recomputed at call time, never cached.
//! 4. The oracle fails closed. A vault pricing with a dead feed is a
//!    vault minting shares for free.
//! 5. If it touches money, it has tests. Plural.

pub mod bucket;
pub mod config;
pub mod error;
pub mod flashloan;
pub mod guard;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod rebalance;
pub mod registry;
pub mod snapshot;

pub use bucket::{Bucket, BucketKind, DepositReceipt, RedeemReceipt};
pub use error::{ErrorKind, VaultError};
pub use flashloan::{FlashLoanReceipt, FlashLoanReceiver};
pub use oracle::{StaticOracle, ValuationOracle};
pub use rebalance::{
    AggregatorOrder, DexAdapter, DexConfig, RebalanceReport, SwapAggregator, SwapOrder,
};
pub use registry::{Distribution, WeightedAsset};
