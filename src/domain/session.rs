//! Per-session backtest context.
//!
//! Holds the last request and its ledger so that re-sorting or re-reading
//! results does not refetch or replay. Each front-end session owns one.

use chrono::NaiveDate;

use super::bar::{Granularity, IndexName};
use super::engine::{self, Ledger};
use super::error::KrxError;
use super::projection::{project, ResultRow, SortOrder};
use super::strategy::StrategyConfig;
use crate::ports::data_port::MarketDataPort;

/// Everything that determines a ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub index: IndexName,
    pub granularity: Granularity,
    pub start_date: NaiveDate,
    pub strategy: StrategyConfig,
}

#[derive(Debug, Default)]
pub struct BacktestSession {
    last: Option<(BacktestRequest, Ledger)>,
}

impl BacktestSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and replay `request`, or reuse the cached ledger when the
    /// request is unchanged. A failed submit keeps the previous result.
    pub fn submit(
        &mut self,
        request: BacktestRequest,
        data_port: &dyn MarketDataPort,
    ) -> Result<&Ledger, KrxError> {
        let cached = matches!(&self.last, Some((prev, _)) if *prev == request);
        if cached {
            tracing::debug!(index = %request.index, "reusing cached ledger");
        } else {
            request.strategy.validate()?;
            let bars = data_port.fetch(request.index, request.start_date, request.granularity)?;
            let ledger = engine::run(&bars, &request.strategy)?;
            tracing::info!(
                index = %request.index,
                granularity = %request.granularity,
                bars = ledger.len(),
                "backtest complete"
            );
            self.last = Some((request, ledger));
        }

        match &self.last {
            Some((_, ledger)) => Ok(ledger),
            None => Err(KrxError::EmptyInput),
        }
    }

    pub fn request(&self) -> Option<&BacktestRequest> {
        self.last.as_ref().map(|(req, _)| req)
    }

    pub fn ledger(&self) -> Option<&Ledger> {
        self.last.as_ref().map(|(_, ledger)| ledger)
    }

    /// Rows of the cached ledger; empty before the first successful submit.
    pub fn rows(&self, order: SortOrder) -> Vec<ResultRow> {
        self.ledger()
            .map(|ledger| project(ledger, order))
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use std::cell::Cell;

    struct CountingPort {
        closes: Vec<f64>,
        calls: Cell<usize>,
    }

    impl MarketDataPort for CountingPort {
        fn fetch_daily(&self, _index: IndexName, start: NaiveDate) -> Result<Vec<Bar>, KrxError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self
                .closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar::new(start + chrono::Duration::days(i as i64), c, c, c, c))
                .collect())
        }

        fn data_range(
            &self,
            _index: IndexName,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxError> {
            Ok(None)
        }
    }

    fn request() -> BacktestRequest {
        BacktestRequest {
            index: IndexName::Kospi,
            granularity: Granularity::Daily,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            strategy: StrategyConfig::default(),
        }
    }

    fn port(closes: &[f64]) -> CountingPort {
        CountingPort {
            closes: closes.to_vec(),
            calls: Cell::new(0),
        }
    }

    #[test]
    fn identical_request_reuses_ledger() {
        let port = port(&[100.0, 101.0, 99.0]);
        let mut session = BacktestSession::new();

        assert_eq!(session.submit(request(), &port).unwrap().len(), 3);
        assert_eq!(session.submit(request(), &port).unwrap().len(), 3);
        assert_eq!(port.calls.get(), 1);
    }

    #[test]
    fn changed_request_reruns() {
        let port = port(&[100.0, 101.0]);
        let mut session = BacktestSession::new();
        session.submit(request(), &port).unwrap();

        let mut changed = request();
        changed.strategy.main_buy_ratio = 50.0;
        session.submit(changed, &port).unwrap();

        assert_eq!(port.calls.get(), 2);
        assert_eq!(session.request().unwrap().strategy.main_buy_ratio, 50.0);
    }

    #[test]
    fn failed_submit_keeps_previous_result() {
        let port = port(&[100.0, 101.0]);
        let mut session = BacktestSession::new();
        session.submit(request(), &port).unwrap();

        let mut bad = request();
        bad.strategy.sell_fee_rate = -1.0;
        assert!(session.submit(bad, &port).is_err());
        assert_eq!(session.ledger().unwrap().len(), 2);
        assert_eq!(port.calls.get(), 1);
    }

    #[test]
    fn empty_store_reports_unavailable() {
        let port = port(&[]);
        let mut session = BacktestSession::new();
        let err = session.submit(request(), &port).unwrap_err();
        assert!(matches!(err, KrxError::DataUnavailable { index: IndexName::Kospi, .. }));
        assert!(session.rows(SortOrder::Ascending).is_empty());
    }

    #[test]
    fn rows_follow_requested_order() {
        let port = port(&[100.0, 101.0, 102.0]);
        let mut session = BacktestSession::new();
        session.submit(request(), &port).unwrap();

        let desc = session.rows(SortOrder::Descending);
        assert_eq!(desc.len(), 3);
        assert!(desc[0].date > desc[2].date);

        session.clear();
        assert!(session.rows(SortOrder::Descending).is_empty());
    }
}
