//! Index price bars, index names, bar granularity and resampling.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// One OHLC observation for a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Every price is finite and positive.
    pub fn has_valid_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }

    /// Close-to-close return relative to `prev_close`. Zero when the previous close is not positive.
    pub fn change_from(&self, prev_close: f64) -> f64 {
        if prev_close > 0.0 {
            self.close / prev_close - 1.0
        } else {
            0.0
        }
    }
}

/// Indices the backtester knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexName {
    Kospi,
    Kosdaq,
    Nasdaq,
}

impl IndexName {
    pub const ALL: [IndexName; 3] = [IndexName::Kospi, IndexName::Kosdaq, IndexName::Nasdaq];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexName::Kospi => "KOSPI",
            IndexName::Kosdaq => "KOSDAQ",
            IndexName::Nasdaq => "NASDAQ",
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KOSPI" => Ok(IndexName::Kospi),
            "KOSDAQ" => Ok(IndexName::Kosdaq),
            "NASDAQ" => Ok(IndexName::Nasdaq),
            other => Err(format!(
                "unknown index '{other}' (expected KOSPI, KOSDAQ or NASDAQ)"
            )),
        }
    }
}

/// Bar period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// Single-letter code used in config files and table names.
    pub fn code(&self) -> &'static str {
        match self {
            Granularity::Daily => "D",
            Granularity::Weekly => "W",
            Granularity::Monthly => "M",
        }
    }

    fn bucket(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            Granularity::Daily => (date.year(), date.ordinal()),
            Granularity::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Granularity::Monthly => (date.year(), date.month()),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(Granularity::Daily),
            "w" | "week" | "weekly" => Ok(Granularity::Weekly),
            "m" | "month" | "monthly" => Ok(Granularity::Monthly),
            other => Err(format!(
                "unknown granularity '{other}' (expected D, W or M)"
            )),
        }
    }
}

/// Collapse ascending daily bars into bars of `granularity`.
///
/// Each output bar takes the first open, highest high, lowest low and last
/// close of its group and is dated at the last trading day in the group.
pub fn resample(daily: &[Bar], granularity: Granularity) -> Vec<Bar> {
    if granularity == Granularity::Daily {
        return daily.to_vec();
    }

    let mut out: Vec<Bar> = Vec::new();
    let mut current: Option<((i32, u32), Bar)> = None;

    for bar in daily {
        let key = granularity.bucket(bar.date);
        current = match current {
            Some((k, mut agg)) if k == key => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.date = bar.date;
                Some((k, agg))
            }
            Some((_, done)) => {
                out.push(done);
                Some((key, *bar))
            }
            None => Some((key, *bar)),
        };
    }

    if let Some((_, last)) = current {
        out.push(last);
    }
    out
}
