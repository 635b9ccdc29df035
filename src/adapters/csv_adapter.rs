//! CSV directory data adapter.
//!
//! Each index lives in `{base_path}/{INDEX}.csv` with a
//! `date,open,high,low,close` header. A missing file means no stored data.

use crate::domain::bar::{Bar, IndexName};
use crate::domain::error::KrxError;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, index: IndexName) -> PathBuf {
        self.base_path.join(format!("{}.csv", index.as_str()))
    }

    fn read_all(&self, index: IndexName) -> Result<Vec<Bar>, KrxError> {
        let path = self.csv_path(index);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "no data file for index");
            return Ok(Vec::new());
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| KrxError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvBar>().enumerate() {
            let row = result.map_err(|e| KrxError::DatabaseQuery {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            bars.push(Bar::new(row.date, row.open, row.high, row.low, row.close));
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_daily(&self, index: IndexName, start_date: NaiveDate) -> Result<Vec<Bar>, KrxError> {
        let mut bars = self.read_all(index)?;
        bars.retain(|b| b.date >= start_date);
        Ok(bars)
    }

    fn data_range(
        &self,
        index: IndexName,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxError> {
        let bars = self.read_all(index)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
