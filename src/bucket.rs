//! # Bucket — the Vault Instance
//!
//! A [`Bucket`] pools deposits from many holders into a multi-asset
//! portfolio and issues fungible shares against it. Everything else in this
//! crate exists to serve this struct: the [`ShareLedger`] keeps the claims
//! straight, [`Holdings`] is the custody ground truth, the guard module
//! supplies the safety valves, and the oracle/venue traits are the seams to
//! the outside world.
//!
//! Two flavors exist. An **active** bucket is manager-directed: the owner
//! rebalances at their discretion. A **passive** bucket declares a target
//! [`Distribution`] and anyone with shares may trigger rebalancing toward
//! it (for a fee cut). Share accounting is identical in both.
//!
//! ## Operation Shape
//!
//! Every public operation follows the same discipline:
//!
//! 1. Guard checks first — pause flags, operational state, ownership,
//!    accountability — recomputed fresh, never cached.
//! 2. Oracle consulted for valuation.
//! 3. Internal state mutated completely, on a working copy where the
//!    operation spans multiple steps.
//! 4. External effects (transfers, callbacks, swaps) observed last, with
//!    their outcomes verified before anything is committed.
//!
//! An error anywhere leaves `self` byte-for-byte unchanged. There is no
//! partial rebalance, no half-repaid flash loan, no orphaned mint.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::MAX_VALUE_LOSS_BPS;
use crate::error::VaultError;
use crate::flashloan::{flash_fee, FlashLoanError, FlashLoanReceipt, FlashLoanReceiver};
use crate::guard::{is_accountable, owner_bps, FeeParams, GuardError, PauseState};
use crate::ledger::{LedgerError, ShareLedger};
use crate::math::{bps_of, mul_div};
use crate::oracle::ValuationOracle;
use crate::rebalance::{
    select_best_quote, AggregatorOrder, DexAdapter, DexConfig, ExecutedSwap, RebalanceError,
    RebalanceReport, SwapAggregator, SwapOrder,
};
use crate::registry::{Distribution, Holdings, WeightedAsset};

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Receipt for a committed deposit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositReceipt {
    /// Unique id for this deposit.
    pub id: Uuid,
    /// When the deposit committed (UTC).
    pub timestamp: chrono::DateTime<Utc>,
    /// Address the shares were minted to.
    pub depositor: String,
    /// Asset taken into custody.
    pub asset: String,
    /// Amount taken into custody, smallest units.
    pub amount: u128,
    /// USD value of the deposit (8-decimal).
    pub value_usd: u128,
    /// Shares minted (18-decimal).
    pub shares_minted: u128,
    /// Share price the mint executed at (8-decimal USD).
    pub share_price: u128,
}

/// Receipt for a committed redemption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedeemReceipt {
    /// Unique id for this redemption.
    pub id: Uuid,
    /// When the redemption committed (UTC).
    pub timestamp: chrono::DateTime<Utc>,
    /// Address whose shares were burned.
    pub holder: String,
    /// Shares burned (18-decimal).
    pub shares_burned: u128,
    /// USD value of the payout basket (8-decimal).
    pub value_usd: u128,
    /// Pro-rata payout per custodied asset, smallest units.
    pub payouts: Vec<(String, u128)>,
}

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// Whether the bucket is manager-directed or index-style.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BucketKind {
    /// Manager-directed: the owner rebalances at their discretion.
    Active,
    /// Index-style: holdings are steered toward a declared target
    /// distribution.
    Passive {
        /// The current target weights.
        distribution: Distribution,
    },
}

/// A pooled multi-asset vault instance.
///
/// Pure serializable state. External collaborators — the oracle, swap
/// venues, flash-loan receivers — are passed into each operation as trait
/// objects, so persisting a bucket is just serializing this struct (see
/// [`crate::snapshot`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bucket {
    /// The operator address. Privileged, but leashed by accountability.
    owner: String,
    /// Active or passive variant.
    kind: BucketKind,
    /// Share balances and supply.
    ledger: ShareLedger,
    /// Custodied assets.
    holdings: Holdings,
    /// Global and swap pause flags.
    pause: PauseState,
    /// Owner-tunable fee rates.
    fees: FeeParams,
    /// Configured DEX venues, paired by index with injected adapters.
    dex_configs: Vec<DexConfig>,
    /// Router address of the opaque-calldata aggregator.
    aggregator_router: String,
    /// Performance-fee entitlement accrued against realized rebalance
    /// gains (8-decimal USD). Analytics only; never moves assets.
    accrued_performance_fee_usd: u128,
}

impl Bucket {
    /// Creates a manager-directed bucket.
    pub fn active(owner: &str) -> Self {
        Self::new(owner, BucketKind::Active)
    }

    /// Creates an index-style bucket with the given target distribution.
    pub fn passive(owner: &str, distribution: Distribution) -> Self {
        Self::new(owner, BucketKind::Passive { distribution })
    }

    fn new(owner: &str, kind: BucketKind) -> Self {
        Self {
            owner: owner.to_string(),
            kind,
            ledger: ShareLedger::new(),
            holdings: Holdings::new(),
            pause: PauseState::new(),
            fees: FeeParams::default(),
            dex_configs: Vec::new(),
            aggregator_router: String::new(),
            accrued_performance_fee_usd: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The operator address.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns `true` for passive (index-style) buckets.
    pub fn is_passive(&self) -> bool {
        matches!(self.kind, BucketKind::Passive { .. })
    }

    /// The target distribution, if this is a passive bucket.
    pub fn distribution(&self) -> Option<&Distribution> {
        match &self.kind {
            BucketKind::Passive { distribution } => Some(distribution),
            BucketKind::Active => None,
        }
    }

    /// The share ledger (read-only).
    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    /// Custodied holdings (read-only).
    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    /// Pause flags (read-only).
    pub fn pause_state(&self) -> &PauseState {
        &self.pause
    }

    /// Fee parameters (read-only).
    pub fn fees(&self) -> &FeeParams {
        &self.fees
    }

    /// Configured DEX venues.
    pub fn dex_configs(&self) -> &[DexConfig] {
        &self.dex_configs
    }

    /// The configured aggregator router address.
    pub fn aggregator_router(&self) -> &str {
        &self.aggregator_router
    }

    /// Accrued performance-fee entitlement (8-decimal USD).
    pub fn accrued_performance_fee_usd(&self) -> u128 {
        self.accrued_performance_fee_usd
    }

    /// Recomputes the accountability invariant from live ledger numbers.
    pub fn is_accountable(&self) -> bool {
        is_accountable(self.ledger.balance_of(&self.owner), self.ledger.total_supply())
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Total USD value (8-decimal) of all whitelisted holdings.
    ///
    /// Non-whitelisted strays in custody are valued at zero — they are
    /// invisible to accounting and rescuable via
    /// [`recover_tokens`](Self::recover_tokens). A whitelisted asset with
    /// a stale price fails the whole valuation closed.
    pub fn total_value_usd(&self, oracle: &dyn ValuationOracle) -> Result<u128, VaultError> {
        Self::value_of_holdings(&self.holdings, oracle)
    }

    /// Current share price in 8-decimal USD.
    pub fn share_price(&self, oracle: &dyn ValuationOracle) -> Result<u128, VaultError> {
        let total = self.total_value_usd(oracle)?;
        Ok(self.ledger.share_price(total)?)
    }

    fn value_of_holdings(
        holdings: &Holdings,
        oracle: &dyn ValuationOracle,
    ) -> Result<u128, VaultError> {
        let mut total: u128 = 0;
        for (asset, amount) in holdings.iter() {
            if !oracle.is_token_whitelisted(asset) {
                continue;
            }
            let value = Self::asset_value_usd(asset, amount, oracle)?;
            total = total.checked_add(value).ok_or(LedgerError::Overflow)?;
        }
        Ok(total)
    }

    fn asset_value_usd(
        asset: &str,
        amount: u128,
        oracle: &dyn ValuationOracle,
    ) -> Result<u128, VaultError> {
        let price = oracle.token_price(asset)?;
        let decimals = oracle.token_decimals(asset)?;
        let unit = 10u128.checked_pow(decimals).ok_or(LedgerError::Overflow)?;
        mul_div(amount, price, unit).ok_or_else(|| LedgerError::Overflow.into())
    }

    // -----------------------------------------------------------------------
    // Deposit / Redeem
    // -----------------------------------------------------------------------

    /// Deposits `amount` of `asset` and mints shares to `depositor`.
    ///
    /// The first-ever deposit bootstraps the share price at 1.00 USD;
    /// afterwards shares are minted at the live price so late depositors
    /// neither dilute nor subsidize earlier ones.
    ///
    /// # Errors
    ///
    /// [`GuardError::Paused`] when globally paused,
    /// [`VaultError::PlatformNotOperational`] when the platform is down,
    /// [`LedgerError::ZeroAmount`] for zero deposits,
    /// [`VaultError::InvalidToken`] for non-whitelisted assets, plus
    /// oracle failures (stale price fails closed).
    pub fn deposit(
        &mut self,
        depositor: &str,
        asset: &str,
        amount: u128,
        oracle: &dyn ValuationOracle,
    ) -> Result<DepositReceipt, VaultError> {
        self.pause.ensure_active()?;
        if !oracle.is_platform_operational() {
            return Err(VaultError::PlatformNotOperational);
        }
        if amount == 0 {
            return Err(LedgerError::ZeroAmount.into());
        }
        if !oracle.is_token_valid(asset) {
            return Err(VaultError::InvalidToken(asset.to_string()));
        }

        let value_usd = Self::asset_value_usd(asset, amount, oracle)?;
        let share_price = self.share_price(oracle)?;
        let shares = ShareLedger::shares_for_value(value_usd, share_price)?;

        // Custody first: a failed credit must not leave minted shares
        // behind. If the mint itself fails, unwind the credit.
        self.holdings.credit(asset, amount)?;
        if let Err(err) = self.ledger.mint(depositor, shares) {
            self.holdings.debit(asset, amount)?;
            return Err(err.into());
        }
        self.ledger.record_deposit_value(value_usd);

        info!(depositor, asset, amount, value_usd, shares, "deposit committed");
        Ok(DepositReceipt {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            depositor: depositor.to_string(),
            asset: asset.to_string(),
            amount,
            value_usd,
            shares_minted: shares,
            share_price,
        })
    }

    /// Burns `shares` from `holder` and pays out a pro-rata slice of every
    /// custodied asset.
    ///
    /// Payouts are proportional to *actual holdings*, never target
    /// weights, so no single asset can be cornered by redeemers. Shares
    /// are burned before any payout leaves custody.
    ///
    /// # Errors
    ///
    /// [`GuardError::Paused`], [`VaultError::PlatformNotOperational`],
    /// [`LedgerError::InvalidRedeemAmount`] for zero or over-balance
    /// amounts, and [`GuardError::OwnerNotAccountable`] when the owner
    /// tries to redeem below the accountability floor.
    pub fn redeem(
        &mut self,
        holder: &str,
        shares: u128,
        oracle: &dyn ValuationOracle,
    ) -> Result<RedeemReceipt, VaultError> {
        self.pause.ensure_active()?;
        if !oracle.is_platform_operational() {
            return Err(VaultError::PlatformNotOperational);
        }

        let balance = self.ledger.balance_of(holder);
        if shares == 0 || shares > balance {
            return Err(LedgerError::InvalidRedeemAmount {
                requested: shares,
                balance,
            }
            .into());
        }

        let supply_before = self.ledger.total_supply();

        // An owner redemption must leave the post-burn state accountable.
        if holder == self.owner {
            let remaining_owner = balance - shares;
            let remaining_supply = supply_before - shares;
            if !is_accountable(remaining_owner, remaining_supply) {
                return Err(GuardError::OwnerNotAccountable {
                    owner_bps: owner_bps(remaining_owner, remaining_supply),
                    floor_bps: crate::config::MIN_OWNER_BPS,
                }
                .into());
            }
        }

        // Price the payout basket before mutating anything.
        let mut payouts: Vec<(String, u128)> = Vec::new();
        let mut value_usd: u128 = 0;
        for (asset, held) in self.holdings.iter() {
            if !oracle.is_token_whitelisted(asset) {
                continue;
            }
            let payout = mul_div(held, shares, supply_before).ok_or(LedgerError::Overflow)?;
            if payout == 0 {
                continue;
            }
            let payout_value = Self::asset_value_usd(asset, payout, oracle)?;
            value_usd = value_usd
                .checked_add(payout_value)
                .ok_or(LedgerError::Overflow)?;
            payouts.push((asset.to_string(), payout));
        }

        // Burn first, pay out after: the reentrancy-safe ordering.
        self.ledger.burn(holder, shares)?;
        for (asset, payout) in &payouts {
            // payout <= holding by construction.
            self.holdings.debit(asset, *payout)?;
        }
        self.ledger.record_withdraw_value(value_usd);

        info!(holder, shares, value_usd, assets = payouts.len(), "redeem committed");
        Ok(RedeemReceipt {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            holder: holder.to_string(),
            shares_burned: shares,
            value_usd,
            payouts,
        })
    }

    /// Records an asset transfer that arrived outside the deposit flow
    /// (airdrops, mistaken sends). No shares are minted; whitelisted
    /// amounts simply raise the share price, strays sit until recovered.
    pub fn receive_transfer(&mut self, asset: &str, amount: u128) -> Result<u128, VaultError> {
        Ok(self.holdings.credit(asset, amount)?)
    }

    // -----------------------------------------------------------------------
    // Flash Loans
    // -----------------------------------------------------------------------

    /// Lends `amount` of `asset` to `receiver` for the duration of this
    /// call. The receiver's [`FlashLoanReceiver::on_flash_loan`] runs
    /// synchronously; unless it returns at least `amount + fee`, the whole
    /// loan — initial transfer included — is rolled back.
    ///
    /// # Errors
    ///
    /// [`GuardError::NotOwner`] for non-owner callers, pause/operational
    /// errors, [`FlashLoanError`] variants for the loan-specific
    /// conditions.
    #[allow(clippy::too_many_arguments)]
    pub fn flash_loan(
        &mut self,
        caller: &str,
        asset: &str,
        amount: u128,
        receiver_addr: &str,
        receiver: &mut dyn FlashLoanReceiver,
        data: &[u8],
        oracle: &dyn ValuationOracle,
    ) -> Result<FlashLoanReceipt, VaultError> {
        self.ensure_owner(caller)?;
        self.pause.ensure_active()?;
        if !oracle.is_platform_operational() {
            return Err(VaultError::PlatformNotOperational);
        }
        if amount == 0 {
            return Err(FlashLoanError::ZeroAmount.into());
        }
        if receiver_addr.is_empty() {
            return Err(FlashLoanError::ZeroReceiver.into());
        }

        let available = self.holdings.amount_of(asset);
        if amount > available {
            return Err(FlashLoanError::InsufficientLiquidity {
                asset: asset.to_string(),
                available,
                requested: amount,
            }
            .into());
        }

        let fee = flash_fee(amount);
        let required = amount
            .checked_add(fee)
            .ok_or(LedgerError::Overflow)?;

        // The loan lives entirely inside this call: hand the amount to the
        // receiver, observe what comes back, and only then decide whether
        // any of it happened.
        let returned = receiver.on_flash_loan(caller, asset, amount, fee, data);
        debug!(asset, amount, fee, returned, "flash loan callback returned");

        if returned < required {
            return Err(FlashLoanError::InsufficientRepayment {
                required,
                returned,
            }
            .into());
        }

        // returned >= amount + fee, so the whole loan nets out to a single
        // credit of the surplus. One mutation, nothing to half-commit.
        self.holdings.credit(asset, returned - amount)?;

        info!(caller, receiver_addr, asset, amount, fee, "flash loan repaid");
        Ok(FlashLoanReceipt {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            initiator: caller.to_string(),
            receiver: receiver_addr.to_string(),
            asset: asset.to_string(),
            amount,
            fee,
        })
    }

    // -----------------------------------------------------------------------
    // Rebalancing
    // -----------------------------------------------------------------------

    /// Rebalances through the configured opaque-calldata aggregator.
    /// Callable by any current shareholder; proceeds are skimmed by the
    /// caller/owner fee cuts.
    ///
    /// The aggregator is trusted for per-trade slippage; the batch-level
    /// value-loss guard is the vault's own backstop. The batch commits
    /// atomically or not at all.
    pub fn rebalance_via_aggregator(
        &mut self,
        caller: &str,
        orders: &[AggregatorOrder],
        aggregator: &mut dyn SwapAggregator,
        oracle: &dyn ValuationOracle,
    ) -> Result<RebalanceReport, VaultError> {
        self.ensure_shareholder(caller)?;
        self.rebalance_checks(oracle)?;

        let value_before = self.total_value_usd(oracle)?;
        let mut working = self.holdings.clone();
        let mut executed = Vec::with_capacity(orders.len());

        for order in orders {
            if order.amount_in == 0 {
                return Err(RebalanceError::SwapAmountTooSmall.into());
            }
            working.debit(&order.asset_in, order.amount_in)?;
            let out = aggregator
                .execute(order)
                .map_err(RebalanceError::Swap)?;
            working.credit(&order.asset_out, out)?;
            executed.push(ExecutedSwap {
                asset_in: order.asset_in.clone(),
                asset_out: order.asset_out.clone(),
                amount_in: order.amount_in,
                amount_out: out,
                venue: self.aggregator_router.clone(),
            });
        }

        self.commit_rebalance(caller, value_before, working, executed, true, oracle)
    }

    /// Rebalances by quoting every enabled DEX adapter per order and
    /// executing each trade only through the strictly best venue. Callable
    /// by any current shareholder.
    pub fn rebalance_via_adapters(
        &mut self,
        caller: &str,
        orders: &[SwapOrder],
        adapters: &mut [&mut dyn DexAdapter],
        oracle: &dyn ValuationOracle,
    ) -> Result<RebalanceReport, VaultError> {
        self.ensure_shareholder(caller)?;
        self.rebalance_checks(oracle)?;

        let value_before = self.total_value_usd(oracle)?;
        let mut working = self.holdings.clone();
        let mut executed = Vec::with_capacity(orders.len());

        for order in orders {
            let (index, quoted) = {
                let quote_refs: Vec<&dyn DexAdapter> =
                    adapters.iter().map(|a| &**a as &dyn DexAdapter).collect();
                select_best_quote(&self.dex_configs, &quote_refs, order)?
            };

            working.debit(&order.asset_in, order.amount_in)?;
            let config = &self.dex_configs[index];
            // The winning venue must deliver at least its own quote.
            let out = adapters[index]
                .execute(
                    &order.asset_in,
                    &order.asset_out,
                    config.fee_tier,
                    order.amount_in,
                    quoted,
                )
                .map_err(RebalanceError::Swap)?;
            working.credit(&order.asset_out, out)?;
            executed.push(ExecutedSwap {
                asset_in: order.asset_in.clone(),
                asset_out: order.asset_out.clone(),
                amount_in: order.amount_in,
                amount_out: out,
                venue: config.router.clone(),
            });
        }

        self.commit_rebalance(caller, value_before, working, executed, true, oracle)
    }

    /// Owner-directed discretionary rebalance for active buckets:
    /// arbitrary aggregator orders, same value-loss guard, no proceeds
    /// skim. Realized USD gains accrue the performance-fee entitlement.
    pub fn rebalance_discretionary(
        &mut self,
        caller: &str,
        orders: &[AggregatorOrder],
        aggregator: &mut dyn SwapAggregator,
        oracle: &dyn ValuationOracle,
    ) -> Result<RebalanceReport, VaultError> {
        self.ensure_owner(caller)?;
        if self.is_passive() {
            return Err(VaultError::NotActiveBucket);
        }
        self.rebalance_checks(oracle)?;

        let value_before = self.total_value_usd(oracle)?;
        let mut working = self.holdings.clone();
        let mut executed = Vec::with_capacity(orders.len());

        for order in orders {
            if order.amount_in == 0 {
                return Err(RebalanceError::SwapAmountTooSmall.into());
            }
            working.debit(&order.asset_in, order.amount_in)?;
            let out = aggregator
                .execute(order)
                .map_err(RebalanceError::Swap)?;
            working.credit(&order.asset_out, out)?;
            executed.push(ExecutedSwap {
                asset_in: order.asset_in.clone(),
                asset_out: order.asset_out.clone(),
                amount_in: order.amount_in,
                amount_out: out,
                venue: self.aggregator_router.clone(),
            });
        }

        self.commit_rebalance(caller, value_before, working, executed, false, oracle)
    }

    fn rebalance_checks(&self, oracle: &dyn ValuationOracle) -> Result<(), VaultError> {
        self.pause.ensure_swaps_active()?;
        if !oracle.is_platform_operational() {
            return Err(VaultError::PlatformNotOperational);
        }
        Ok(())
    }

    /// Applies the value-loss guard, skims fees, and commits the batch.
    /// Called with fully-executed working holdings; `self` is untouched
    /// until the final assignment.
    fn commit_rebalance(
        &mut self,
        caller: &str,
        value_before: u128,
        mut working: Holdings,
        executed: Vec<ExecutedSwap>,
        skim_fees: bool,
        oracle: &dyn ValuationOracle,
    ) -> Result<RebalanceReport, VaultError> {
        let value_after = Self::value_of_holdings(&working, oracle)?;

        let loss = value_before.saturating_sub(value_after);
        let budget = bps_of(value_before, MAX_VALUE_LOSS_BPS);
        if loss > budget {
            return Err(VaultError::ValueLossExceeded {
                value_before,
                value_after,
                max_loss_bps: MAX_VALUE_LOSS_BPS,
            });
        }

        let mut caller_fees: BTreeMap<String, u128> = BTreeMap::new();
        let mut owner_fees: BTreeMap<String, u128> = BTreeMap::new();
        if skim_fees {
            for swap in &executed {
                // A later order may have spent part of this output; skim
                // only what is still in custody.
                let caller_cut = bps_of(swap.amount_out, self.fees.rebalance_caller_fee_bps)
                    .min(working.amount_of(&swap.asset_out));
                if caller_cut > 0 {
                    working.debit(&swap.asset_out, caller_cut)?;
                    *caller_fees.entry(swap.asset_out.clone()).or_insert(0) += caller_cut;
                }
                let owner_cut = bps_of(swap.amount_out, self.fees.rebalance_owner_fee_bps)
                    .min(working.amount_of(&swap.asset_out));
                if owner_cut > 0 {
                    working.debit(&swap.asset_out, owner_cut)?;
                    *owner_fees.entry(swap.asset_out.clone()).or_insert(0) += owner_cut;
                }
            }
        } else {
            // Discretionary mode: gains accrue the performance entitlement.
            let gain = value_after.saturating_sub(value_before);
            let accrual = bps_of(gain, self.fees.performance_fee_bps);
            self.accrued_performance_fee_usd =
                self.accrued_performance_fee_usd.saturating_add(accrual);
        }

        self.holdings = working;

        info!(
            caller,
            value_before,
            value_after,
            trades = executed.len(),
            "rebalance committed"
        );
        Ok(RebalanceReport {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            caller: caller.to_string(),
            executed,
            value_before_usd: value_before,
            value_after_usd: value_after,
            caller_fees: caller_fees.into_iter().collect(),
            owner_fees: owner_fees.into_iter().collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Governance & Configuration
    // -----------------------------------------------------------------------

    /// Replaces the passive target distribution wholesale.
    ///
    /// # Errors
    ///
    /// Owner/accountability/operational gating plus distribution
    /// validation; [`VaultError::NotPassiveBucket`] on active buckets.
    pub fn update_distribution(
        &mut self,
        caller: &str,
        targets: Vec<WeightedAsset>,
        oracle: &dyn ValuationOracle,
    ) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        if !oracle.is_platform_operational() {
            return Err(VaultError::PlatformNotOperational);
        }
        let distribution = Distribution::new(targets)?;
        match &mut self.kind {
            BucketKind::Passive {
                distribution: current,
            } => {
                *current = distribution;
                info!(caller, "distribution updated");
                Ok(())
            }
            BucketKind::Active => Err(VaultError::NotPassiveBucket),
        }
    }

    /// Engages the global pause (idempotent).
    pub fn pause(&mut self, caller: &str) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        self.pause.pause();
        Ok(())
    }

    /// Releases the global pause (idempotent).
    pub fn unpause(&mut self, caller: &str) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        self.pause.unpause();
        Ok(())
    }

    /// Engages the swap pause. Strict: errors if already engaged.
    pub fn pause_swaps(&mut self, caller: &str) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        Ok(self.pause.pause_swaps()?)
    }

    /// Releases the swap pause. Strict: errors if not engaged.
    pub fn unpause_swaps(&mut self, caller: &str) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        Ok(self.pause.unpause_swaps()?)
    }

    /// Sets the performance fee (bounded to 10_000 bps).
    pub fn set_performance_fee(&mut self, caller: &str, bps: u16) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        Ok(self.fees.set_performance_fee(bps)?)
    }

    /// Sets the rebalance owner/caller fee cuts (each bounded).
    pub fn set_rebalance_fees(
        &mut self,
        caller: &str,
        owner_fee_bps: u16,
        caller_fee_bps: u16,
    ) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        Ok(self.fees.set_rebalance_fees(owner_fee_bps, caller_fee_bps)?)
    }

    /// Replaces the DEX config at `index`, or appends when
    /// `index == len()`.
    pub fn configure_dex(
        &mut self,
        caller: &str,
        index: usize,
        config: DexConfig,
    ) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        match index.cmp(&self.dex_configs.len()) {
            std::cmp::Ordering::Less => {
                self.dex_configs[index] = config;
                Ok(())
            }
            std::cmp::Ordering::Equal => {
                self.dex_configs.push(config);
                Ok(())
            }
            std::cmp::Ordering::Greater => Err(VaultError::DexIndexOutOfRange {
                index,
                len: self.dex_configs.len(),
            }),
        }
    }

    /// Sets the aggregator router address.
    pub fn set_aggregator_router(&mut self, caller: &str, router: &str) -> Result<(), VaultError> {
        self.ensure_accountable_owner(caller)?;
        if router.is_empty() {
            return Err(VaultError::ZeroAddress);
        }
        self.aggregator_router = router.to_string();
        Ok(())
    }

    /// Rescues accidentally-sent, non-whitelisted assets from custody.
    /// Refuses to touch anything the oracle whitelists — vault-managed
    /// holdings leave only through [`redeem`](Self::redeem).
    ///
    /// Returns the amount released to `to`.
    pub fn recover_tokens(
        &mut self,
        caller: &str,
        asset: &str,
        amount: u128,
        to: &str,
        oracle: &dyn ValuationOracle,
    ) -> Result<u128, VaultError> {
        self.ensure_owner(caller)?;
        if to.is_empty() {
            return Err(VaultError::ZeroAddress);
        }
        if oracle.is_token_whitelisted(asset) {
            return Err(VaultError::WhitelistedAssetRecovery(asset.to_string()));
        }
        self.holdings.debit(asset, amount)?;
        info!(caller, asset, amount, to, "stray tokens recovered");
        Ok(amount)
    }

    // -----------------------------------------------------------------------
    // Guard Helpers
    // -----------------------------------------------------------------------

    fn ensure_owner(&self, caller: &str) -> Result<(), GuardError> {
        if caller != self.owner {
            return Err(GuardError::NotOwner(caller.to_string()));
        }
        Ok(())
    }

    /// Owner check plus a fresh accountability evaluation. Never cached —
    /// the ledger may have changed since the last privileged call.
    fn ensure_accountable_owner(&self, caller: &str) -> Result<(), GuardError> {
        self.ensure_owner(caller)?;
        let owner_shares = self.ledger.balance_of(&self.owner);
        let supply = self.ledger.total_supply();
        if !is_accountable(owner_shares, supply) {
            return Err(GuardError::OwnerNotAccountable {
                owner_bps: owner_bps(owner_shares, supply),
                floor_bps: crate::config::MIN_OWNER_BPS,
            });
        }
        Ok(())
    }

    fn ensure_shareholder(&self, caller: &str) -> Result<(), VaultError> {
        if self.ledger.balance_of(caller) == 0 {
            return Err(VaultError::NotShareholder(caller.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SHARE_PRECISION, USD_UNIT};
    use crate::oracle::StaticOracle;
    use crate::registry::RegistryError;

    const OWNER: &str = "owner";

    fn oracle_with_eth() -> StaticOracle {
        let mut oracle = StaticOracle::new(10);
        // ETH at $2000, 18 decimals.
        oracle.list_token("ETH", 2_000 * USD_UNIT, 18);
        oracle
    }

    fn eth(whole: u128) -> u128 {
        whole * 10u128.pow(18)
    }

    #[test]
    fn first_deposit_bootstraps_at_par() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);

        let receipt = bucket.deposit("alice", "ETH", eth(1), &oracle).unwrap();

        assert_eq!(receipt.share_price, USD_UNIT);
        assert_eq!(receipt.value_usd, 2_000 * USD_UNIT);
        assert_eq!(receipt.shares_minted, 2_000 * SHARE_PRECISION);
        assert_eq!(bucket.ledger().balance_of("alice"), 2_000 * SHARE_PRECISION);
        assert_eq!(bucket.ledger().total_deposit_value_usd(), 2_000 * USD_UNIT);
        assert_eq!(bucket.holdings().amount_of("ETH"), eth(1));
    }

    #[test]
    fn deposit_zero_amount_rejected() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        let result = bucket.deposit("alice", "ETH", 0, &oracle);
        assert!(matches!(
            result,
            Err(VaultError::Ledger(LedgerError::ZeroAmount))
        ));
    }

    #[test]
    fn deposit_unlisted_token_rejected() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        let result = bucket.deposit("alice", "SCAM", 100, &oracle);
        assert!(matches!(result, Err(VaultError::InvalidToken(_))));
    }

    #[test]
    fn deposit_overflowing_custody_mints_nothing() {
        let mut oracle = StaticOracle::new(10);
        // A dust-priced 18-decimal asset so custody can approach the
        // u128 ceiling while valuations stay small.
        oracle.list_token("GLD", 1, 18);
        let mut bucket = Bucket::active(OWNER);

        let first = u128::MAX - 5 * 10u128.pow(17);
        bucket.deposit("alice", "GLD", first, &oracle).unwrap();
        let supply = bucket.ledger().total_supply();

        // The second deposit values fine but cannot be credited.
        let result = bucket.deposit("bob", "GLD", 10u128.pow(18), &oracle);
        assert!(matches!(
            result,
            Err(VaultError::Registry(RegistryError::HoldingOverflow(_)))
        ));

        // Nothing minted, nothing credited.
        assert_eq!(bucket.ledger().balance_of("bob"), 0);
        assert_eq!(bucket.ledger().total_supply(), supply);
        assert_eq!(bucket.holdings().amount_of("GLD"), first);
    }

    #[test]
    fn deposit_while_paused_rejected() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.pause(OWNER).unwrap();
        let result = bucket.deposit("alice", "ETH", eth(1), &oracle);
        assert!(matches!(
            result,
            Err(VaultError::Guard(GuardError::Paused))
        ));
    }

    #[test]
    fn deposit_when_platform_down_rejected() {
        let mut oracle = oracle_with_eth();
        oracle.set_operational(false);
        let mut bucket = Bucket::active(OWNER);
        let result = bucket.deposit("alice", "ETH", eth(1), &oracle);
        assert!(matches!(result, Err(VaultError::PlatformNotOperational)));
    }

    #[test]
    fn redeem_pays_pro_rata_and_burns_first() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.deposit("alice", "ETH", eth(4), &oracle).unwrap();

        let receipt = bucket
            .redeem("alice", 2_000 * SHARE_PRECISION, &oracle)
            .unwrap();

        // 2000 of 8000 shares → a quarter of 4 ETH.
        assert_eq!(receipt.payouts, vec![("ETH".to_string(), eth(1))]);
        assert_eq!(receipt.value_usd, 2_000 * USD_UNIT);
        assert_eq!(bucket.holdings().amount_of("ETH"), eth(3));
        assert_eq!(
            bucket.ledger().total_supply(),
            6_000 * SHARE_PRECISION
        );
        assert_eq!(bucket.ledger().total_withdraw_value_usd(), 2_000 * USD_UNIT);
    }

    #[test]
    fn redeem_more_than_balance_rejected() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.deposit("alice", "ETH", eth(1), &oracle).unwrap();

        let result = bucket.redeem("alice", 3_000 * SHARE_PRECISION, &oracle);
        assert!(matches!(
            result,
            Err(VaultError::Ledger(LedgerError::InvalidRedeemAmount { .. }))
        ));
        // Nothing changed.
        assert_eq!(bucket.holdings().amount_of("ETH"), eth(1));
    }

    #[test]
    fn owner_cannot_redeem_below_accountability_floor() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.deposit(OWNER, "ETH", eth(10), &oracle).unwrap();
        bucket.deposit("whale", "ETH", eth(90), &oracle).unwrap();

        // Owner holds 10%. Redeeming down to ~1% must fail...
        let result = bucket.redeem(OWNER, 18_000 * SHARE_PRECISION, &oracle);
        assert!(matches!(
            result,
            Err(VaultError::Guard(GuardError::OwnerNotAccountable { .. }))
        ));

        // ...but a redemption that keeps 5% is fine.
        bucket.redeem(OWNER, 10_000 * SHARE_PRECISION, &oracle).unwrap();
        assert!(bucket.is_accountable());
    }

    #[test]
    fn owner_redeeming_everything_empties_vault_accountably() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.deposit(OWNER, "ETH", eth(1), &oracle).unwrap();

        bucket
            .redeem(OWNER, 2_000 * SHARE_PRECISION, &oracle)
            .unwrap();
        assert_eq!(bucket.ledger().total_supply(), 0);
        assert!(bucket.is_accountable());
    }

    #[test]
    fn non_owner_cannot_pause() {
        let mut bucket = Bucket::active(OWNER);
        assert!(matches!(
            bucket.pause("mallory"),
            Err(VaultError::Guard(GuardError::NotOwner(_)))
        ));
    }

    #[test]
    fn unaccountable_owner_cannot_pause() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.deposit(OWNER, "ETH", eth(1), &oracle).unwrap();
        bucket.deposit("whale", "ETH", eth(99), &oracle).unwrap();

        // Owner at 1% — below the 5% floor.
        assert!(!bucket.is_accountable());
        assert!(matches!(
            bucket.pause(OWNER),
            Err(VaultError::Guard(GuardError::OwnerNotAccountable { .. }))
        ));

        // Ordinary holders are unaffected.
        bucket.deposit("alice", "ETH", eth(1), &oracle).unwrap();
        bucket.redeem("whale", SHARE_PRECISION, &oracle).unwrap();
    }

    #[test]
    fn recover_tokens_rescues_strays_only() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.receive_transfer("AIRDROP", 500).unwrap();
        bucket.deposit(OWNER, "ETH", eth(1), &oracle).unwrap();

        // Whitelisted assets are untouchable.
        assert!(matches!(
            bucket.recover_tokens(OWNER, "ETH", 1, "treasury", &oracle),
            Err(VaultError::WhitelistedAssetRecovery(_))
        ));

        let recovered = bucket
            .recover_tokens(OWNER, "AIRDROP", 500, "treasury", &oracle)
            .unwrap();
        assert_eq!(recovered, 500);
        assert_eq!(bucket.holdings().amount_of("AIRDROP"), 0);
    }

    #[test]
    fn strays_are_invisible_to_valuation() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.deposit("alice", "ETH", eth(1), &oracle).unwrap();
        bucket.receive_transfer("AIRDROP", 1_000_000).unwrap();

        assert_eq!(bucket.total_value_usd(&oracle).unwrap(), 2_000 * USD_UNIT);
    }

    #[test]
    fn update_distribution_replaces_wholesale() {
        let oracle = oracle_with_eth();
        let initial =
            Distribution::new(vec![WeightedAsset::new("ETH", 100)]).unwrap();
        let mut bucket = Bucket::passive(OWNER, initial);

        bucket
            .update_distribution(
                OWNER,
                vec![
                    WeightedAsset::new("ETH", 60),
                    WeightedAsset::new("USDC", 40),
                ],
                &oracle,
            )
            .unwrap();

        let dist = bucket.distribution().unwrap();
        assert_eq!(dist.weight_of("USDC"), Some(40));
    }

    #[test]
    fn update_distribution_on_active_bucket_rejected() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        let result = bucket.update_distribution(
            OWNER,
            vec![WeightedAsset::new("ETH", 100)],
            &oracle,
        );
        assert!(matches!(result, Err(VaultError::NotPassiveBucket)));
    }

    #[test]
    fn configure_dex_replaces_and_appends() {
        let mut bucket = Bucket::active(OWNER);
        let config = DexConfig {
            router: "uni-router".into(),
            quoter: "uni-quoter".into(),
            fee_tier: 3_000,
            enabled: true,
        };
        bucket.configure_dex(OWNER, 0, config.clone()).unwrap();
        bucket.configure_dex(OWNER, 1, config.clone()).unwrap();
        assert_eq!(bucket.dex_configs().len(), 2);

        assert!(matches!(
            bucket.configure_dex(OWNER, 5, config),
            Err(VaultError::DexIndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn bucket_serialization_roundtrip() {
        let oracle = oracle_with_eth();
        let mut bucket = Bucket::active(OWNER);
        bucket.deposit("alice", "ETH", eth(2), &oracle).unwrap();
        bucket.set_performance_fee(OWNER, 1_000).unwrap();

        let json = serde_json::to_string(&bucket).expect("serialize");
        let recovered: Bucket = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(recovered.owner(), OWNER);
        assert_eq!(
            recovered.ledger().balance_of("alice"),
            bucket.ledger().balance_of("alice")
        );
        assert_eq!(recovered.fees().performance_fee_bps, 1_000);
        assert_eq!(recovered.holdings().amount_of("ETH"), eth(2));
    }
}
