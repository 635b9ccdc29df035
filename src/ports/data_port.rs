//! Market data access port.

use crate::domain::bar::{resample, Bar, Granularity, IndexName};
use crate::domain::error::KrxError;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Daily bars for `index` on or after `start_date`, in any order.
    fn fetch_daily(&self, index: IndexName, start_date: NaiveDate) -> Result<Vec<Bar>, KrxError>;

    /// First date, last date and bar count stored for `index`.
    fn data_range(&self, index: IndexName)
        -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxError>;

    /// Ascending bars at `granularity` covering `[start_date, latest]`.
    ///
    /// Fails with [`KrxError::DataUnavailable`] when nothing is stored for
    /// the range, and with [`KrxError::DatabaseQuery`] when a stored bar has
    /// a non-finite or non-positive price.
    fn fetch(
        &self,
        index: IndexName,
        start_date: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<Bar>, KrxError> {
        let mut daily: Vec<Bar> = self
            .fetch_daily(index, start_date)?
            .into_iter()
            .filter(|b| b.date >= start_date)
            .collect();
        if let Some(bad) = daily.iter().find(|b| !b.has_valid_prices()) {
            return Err(KrxError::DatabaseQuery {
                reason: format!(
                    "{} bar on {} has an invalid price (open {}, high {}, low {}, close {})",
                    index, bad.date, bad.open, bad.high, bad.low, bad.close
                ),
            });
        }
        daily.sort_by_key(|b| b.date);
        daily.dedup_by_key(|b| b.date);

        let bars = resample(&daily, granularity);
        if bars.is_empty() {
            return Err(KrxError::DataUnavailable { index, start_date });
        }

        tracing::debug!(
            %index,
            %granularity,
            %start_date,
            daily = daily.len(),
            bars = bars.len(),
            "fetched index bars"
        );
        Ok(bars)
    }
}
