//! Rebalancing engine: replays a bar series once and records a ledger entry
//! per bar.
//!
//! The main asset trades at the bar's close. The inverse asset is priced by
//! the config's [`InversePricing`]: the bar's close by default, or a -1x
//! proxy of the close-to-close return.
//!
//! On each bar after the first, main-asset trades execute before
//! inverse-asset trades, so the inverse leg sees the cash left by the main leg.
//! Requested sizes are capped at the cash or holding they are a ratio of.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::KrxError;
use super::execution::{self, ExecutionResult, Side, Trade};
use super::position::{Asset, Position};
use super::strategy::{Signal, StrategyConfig};
use super::bar::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub position: Position,
    pub trades: Vec<Trade>,
    pub main_close: f64,
    pub inverse_close: f64,
    pub portfolio_value: f64,
    pub cumulative_return: f64,
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunStats {
    pub buys: usize,
    pub sells: usize,
    pub clipped: usize,
    pub skipped: usize,
    pub total_fees: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub initial_capital: f64,
    pub entries: Vec<LedgerEntry>,
    pub stats: RunStats,
}

impl Ledger {
    fn new(initial_capital: f64, capacity: usize) -> Self {
        Ledger {
            initial_capital,
            entries: Vec::with_capacity(capacity),
            stats: RunStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LedgerEntry> {
        self.entries.iter()
    }
}

/// Replay `bars` under `config`. An empty series yields an empty ledger.
pub fn run(bars: &[Bar], config: &StrategyConfig) -> Result<Ledger, KrxError> {
    replay(bars, config, None)
}

/// Like [`run`], but checks `cancel` before every bar and stops with
/// [`KrxError::Cancelled`] once it is set.
pub fn run_cancellable(
    bars: &[Bar],
    config: &StrategyConfig,
    cancel: &AtomicBool,
) -> Result<Ledger, KrxError> {
    replay(bars, config, Some(cancel))
}

fn replay(
    bars: &[Bar],
    config: &StrategyConfig,
    cancel: Option<&AtomicBool>,
) -> Result<Ledger, KrxError> {
    config.validate()?;

    let mut ledger = Ledger::new(config.initial_capital, bars.len());
    let mut state = RunState {
        config,
        position: Position::new(config.initial_capital),
        stats: RunStats::default(),
    };
    let mut inverse_price = 0.0_f64;
    let mut prev_close: Option<f64> = None;

    for (i, bar) in bars.iter().enumerate() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            tracing::info!(processed = i, "backtest cancelled");
            return Err(KrxError::Cancelled { processed: i });
        }

        let mut trades = Vec::new();
        let change = prev_close.map(|prev| bar.change_from(prev));
        inverse_price = config.inverse_pricing.price(bar.close, inverse_price, change);

        match change {
            None => {
                if config.use_initial_entry {
                    let budget = config.initial_capital * config.initial_entry_ratio / 100.0;
                    let budget = budget.min(state.position.cash);
                    state.buy(bar.date, Asset::Main, bar.close, budget, &mut trades);
                }
            }
            Some(change) => {
                let weight = state.position.main_weight(bar.close, inverse_price);

                match config.trigger.evaluate(change, weight) {
                    Signal::LeanMain => {
                        let budget = state.cash_share(config.main_buy_ratio);
                        state.buy(bar.date, Asset::Main, bar.close, budget, &mut trades);
                        let shares = state.holding_share(Asset::Inverse, config.inverse_sell_ratio);
                        state.sell(bar.date, Asset::Inverse, inverse_price, shares, &mut trades);
                    }
                    Signal::LeanInverse => {
                        let shares = state.holding_share(Asset::Main, config.main_sell_ratio);
                        state.sell(bar.date, Asset::Main, bar.close, shares, &mut trades);
                        let budget = state.cash_share(config.inverse_buy_ratio);
                        state.buy(bar.date, Asset::Inverse, inverse_price, budget, &mut trades);
                    }
                    Signal::Hold => {}
                }
            }
        }

        let portfolio_value = state.position.market_value(bar.close, inverse_price);
        ledger.entries.push(LedgerEntry {
            date: bar.date,
            position: state.position,
            trades,
            main_close: bar.close,
            inverse_close: inverse_price,
            portfolio_value,
            cumulative_return: portfolio_value / config.initial_capital - 1.0,
        });
        prev_close = Some(bar.close);
    }

    ledger.stats = state.stats;
    if let Some(last) = ledger.last() {
        tracing::debug!(
            bars = ledger.len(),
            buys = ledger.stats.buys,
            sells = ledger.stats.sells,
            clipped = ledger.stats.clipped,
            skipped = ledger.stats.skipped,
            final_value = last.portfolio_value,
            "rebalancing run complete"
        );
    }
    Ok(ledger)
}

struct RunState<'a> {
    config: &'a StrategyConfig,
    position: Position,
    stats: RunStats,
}

impl RunState<'_> {
    /// `ratio_pct` of available cash, never more than the cash itself.
    fn cash_share(&self, ratio_pct: f64) -> f64 {
        (self.position.cash * ratio_pct / 100.0).min(self.position.cash)
    }

    fn holding_share(&self, asset: Asset, ratio_pct: f64) -> f64 {
        let held = self.position.shares(asset);
        (held * ratio_pct / 100.0).min(held)
    }

    fn buy(
        &mut self,
        date: NaiveDate,
        asset: Asset,
        price: f64,
        budget: f64,
        trades: &mut Vec<Trade>,
    ) {
        if budget <= 0.0 {
            return;
        }
        let result = execution::buy(
            &mut self.position,
            asset,
            price,
            budget,
            self.config.buy_fee_rate,
        );
        self.record(date, asset, Side::Buy, result, trades);
    }

    fn sell(
        &mut self,
        date: NaiveDate,
        asset: Asset,
        price: f64,
        shares: f64,
        trades: &mut Vec<Trade>,
    ) {
        if shares <= 0.0 {
            return;
        }
        let result = execution::sell(
            &mut self.position,
            asset,
            price,
            shares,
            self.config.sell_fee_rate,
        );
        self.record(date, asset, Side::Sell, result, trades);
    }

    fn record(
        &mut self,
        date: NaiveDate,
        asset: Asset,
        side: Side,
        result: ExecutionResult,
        trades: &mut Vec<Trade>,
    ) {
        match result {
            ExecutionResult::Filled(trade) => {
                if trade.clipped {
                    self.stats.clipped += 1;
                    tracing::warn!(%date, %asset, %side, shares = trade.shares, "trade clipped to feasible size");
                }
                match side {
                    Side::Buy => self.stats.buys += 1,
                    Side::Sell => self.stats.sells += 1,
                }
                self.stats.total_fees += trade.fee;
                trades.push(trade);
            }
            ExecutionResult::Skipped => {
                self.stats.skipped += 1;
                tracing::debug!(%date, %asset, %side, "trade skipped: nothing feasible");
            }
        }
    }
}
