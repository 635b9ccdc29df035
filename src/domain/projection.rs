//! Flatten a ledger into display/export rows.

use chrono::NaiveDate;
use serde::Serialize;
use std::str::FromStr;

use super::engine::{Ledger, LedgerEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{other}' (expected asc or desc)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub date: NaiveDate,
    pub cash: f64,
    pub main_shares: f64,
    pub inverse_shares: f64,
    pub portfolio_value: f64,
    pub return_pct: f64,
}

impl From<&LedgerEntry> for ResultRow {
    fn from(entry: &LedgerEntry) -> Self {
        ResultRow {
            date: entry.date,
            cash: entry.position.cash,
            main_shares: entry.position.main_shares,
            inverse_shares: entry.position.inverse_shares,
            portfolio_value: entry.portfolio_value,
            return_pct: entry.cumulative_return * 100.0,
        }
    }
}

/// One row per ledger entry, sorted by date in `order`.
pub fn project(ledger: &Ledger, order: SortOrder) -> Vec<ResultRow> {
    project_entries(&ledger.entries, order)
}

pub fn project_entries(entries: &[LedgerEntry], order: SortOrder) -> Vec<ResultRow> {
    let mut rows: Vec<ResultRow> = entries.iter().map(ResultRow::from).collect();
    match order {
        SortOrder::Ascending => rows.sort_by(|a, b| a.date.cmp(&b.date)),
        SortOrder::Descending => rows.sort_by(|a, b| b.date.cmp(&a.date)),
    }
    rows
}
