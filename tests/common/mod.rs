#![allow(dead_code)]

use chrono::NaiveDate;
pub use krx_rebalancer::domain::bar::{Bar, Granularity, IndexName};
use krx_rebalancer::domain::error::KrxError;
use krx_rebalancer::domain::strategy::StrategyConfig;
use krx_rebalancer::ports::data_port::MarketDataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<IndexName, Vec<Bar>>,
    pub errors: HashMap<IndexName, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, index: IndexName, bars: Vec<Bar>) -> Self {
        self.data.insert(index, bars);
        self
    }

    pub fn with_error(mut self, index: IndexName, reason: &str) -> Self {
        self.errors.insert(index, reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_daily(&self, index: IndexName, start_date: NaiveDate) -> Result<Vec<Bar>, KrxError> {
        if let Some(reason) = self.errors.get(&index) {
            return Err(KrxError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(&index)
            .map(|bars| bars.iter().filter(|b| b.date >= start_date).copied().collect())
            .unwrap_or_default())
    }

    fn data_range(
        &self,
        index: IndexName,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxError> {
        match self.data.get(&index) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date_str: &str, close: f64) -> Bar {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap();
    Bar::new(date, close, close * 1.01, close * 0.99, close)
}

/// Consecutive calendar days from `start`, one bar per close.
pub fn make_series(start: NaiveDate, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(
                start + chrono::Duration::days(i as i64),
                c,
                c * 1.01,
                c * 0.99,
                c,
            )
        })
        .collect()
}

pub fn sample_config() -> StrategyConfig {
    StrategyConfig::new(1_000_000.0, 20.0, 20.0, 20.0, 20.0, 20.0, 0.015, 0.2).unwrap()
}
