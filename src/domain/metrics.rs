//! Summary statistics over a finished ledger.

use super::engine::{Ledger, LedgerEntry};
use super::error::KrxError;
use super::execution::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub bars: usize,
    pub buys: usize,
    pub sells: usize,
    pub total_fees: f64,
    pub clipped_trades: usize,
    pub skipped_trades: usize,
}

impl LedgerSummary {
    pub fn compute(ledger: &Ledger) -> Result<Self, KrxError> {
        let last = ledger.last().ok_or(KrxError::EmptyInput)?;
        let initial_capital = ledger.initial_capital;
        let final_value = last.portfolio_value;

        let total_return = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&ledger.entries);

        let (buys, sells) = ledger
            .iter()
            .flat_map(|e| e.trades.iter())
            .fold((0, 0), |(b, s), t| match t.side {
                Side::Buy => (b + 1, s),
                Side::Sell => (b, s + 1),
            });

        Ok(LedgerSummary {
            initial_capital,
            final_value,
            total_return,
            max_drawdown,
            max_drawdown_duration,
            bars: ledger.len(),
            buys,
            sells,
            total_fees: ledger.stats.total_fees,
            clipped_trades: ledger.stats.clipped,
            skipped_trades: ledger.stats.skipped,
        })
    }
}

/// Largest peak-to-trough fall as a fraction of the peak, and the longest
/// run of bars spent below a previous peak.
fn compute_drawdown(entries: &[LedgerEntry]) -> (f64, usize) {
    let Some(first) = entries.first() else {
        return (0.0, 0);
    };

    let mut peak = first.portfolio_value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for entry in entries {
        let value = entry.portfolio_value;
        if value >= peak {
            peak = value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::RunStats;
    use crate::domain::position::Position;
    use chrono::NaiveDate;

    fn make_ledger(values: &[f64]) -> Ledger {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let entries = values
            .iter()
            .enumerate()
            .map(|(i, &v)| LedgerEntry {
                date: start + chrono::Duration::days(i as i64),
                position: Position::new(v),
                trades: vec![],
                main_close: 100.0,
                inverse_close: 100.0,
                portfolio_value: v,
                cumulative_return: v / values[0] - 1.0,
            })
            .collect();
        Ledger {
            initial_capital: values[0],
            entries,
            stats: RunStats::default(),
        }
    }

    #[test]
    fn empty_ledger_is_an_error() {
        let ledger = Ledger {
            initial_capital: 1_000.0,
            entries: vec![],
            stats: RunStats::default(),
        };
        assert!(matches!(
            LedgerSummary::compute(&ledger),
            Err(KrxError::EmptyInput)
        ));
    }

    #[test]
    fn total_return_positive() {
        let s = LedgerSummary::compute(&make_ledger(&[1_000.0, 1_100.0, 1_200.0])).unwrap();
        assert!((s.total_return - 0.2).abs() < 1e-12);
        assert_eq!(s.final_value, 1_200.0);
        assert_eq!(s.bars, 3);
    }

    #[test]
    fn total_return_negative() {
        let s = LedgerSummary::compute(&make_ledger(&[1_000.0, 900.0])).unwrap();
        assert!((s.total_return + 0.1).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown() {
        // peak 120, trough 90 -> 25%
        let s = LedgerSummary::compute(&make_ledger(&[100.0, 120.0, 100.0, 90.0, 130.0]))
            .unwrap();
        assert!((s.max_drawdown - 0.25).abs() < 1e-12);
        assert_eq!(s.max_drawdown_duration, 2);
    }

    #[test]
    fn monotonic_rise_has_no_drawdown() {
        let s = LedgerSummary::compute(&make_ledger(&[100.0, 101.0, 102.0])).unwrap();
        assert_eq!(s.max_drawdown, 0.0);
        assert_eq!(s.max_drawdown_duration, 0);
    }

    #[test]
    fn counts_come_from_stats_and_trades() {
        let mut ledger = make_ledger(&[100.0, 100.0]);
        ledger.stats = RunStats {
            buys: 0,
            sells: 0,
            clipped: 1,
            skipped: 2,
            total_fees: 3.5,
        };
        let s = LedgerSummary::compute(&ledger).unwrap();
        assert_eq!(s.clipped_trades, 1);
        assert_eq!(s.skipped_trades, 2);
        assert_eq!(s.total_fees, 3.5);
        assert_eq!(s.buys, 0);
    }
}
