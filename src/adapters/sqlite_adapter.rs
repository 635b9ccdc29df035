//! SQLite data adapter.

use crate::domain::bar::{Bar, IndexName};
use crate::domain::config_validation::read_pool_size;
use crate::domain::error::KrxError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn parse_date(value: &str) -> Result<NaiveDate, KrxError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e: chrono::ParseError| {
        KrxError::Database {
            reason: format!("invalid stored date '{}': {}", value, e),
        }
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, KrxError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| KrxError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = read_pool_size(config, "sqlite")?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| KrxError::Database {
                    reason: e.to_string(),
                })?;

        tracing::debug!(path = %db_path, pool_size, "opened sqlite pool");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, KrxError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| KrxError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, KrxError> {
        self.pool.get().map_err(|e: r2d2::Error| KrxError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), KrxError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS index_ohlcv (
                    index_name TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    PRIMARY KEY (index_name, date)
                );
                CREATE INDEX IF NOT EXISTS idx_index_ohlcv_date ON index_ohlcv(date);",
            )
            .map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })
    }

    /// Upsert daily bars for `index` in one transaction.
    pub fn insert_bars(&self, index: IndexName, bars: &[Bar]) -> Result<(), KrxError> {
        let mut conn = self.conn()?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO index_ohlcv (index_name, date, open, high, low, close)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    index.as_str(),
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close
                ],
            )
            .map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        tracing::debug!(%index, rows = bars.len(), "inserted bars");
        Ok(())
    }
}

impl MarketDataPort for SqliteAdapter {
    fn fetch_daily(&self, index: IndexName, start_date: NaiveDate) -> Result<Vec<Bar>, KrxError> {
        let conn = self.conn()?;
        let start_str = start_date.format("%Y-%m-%d").to_string();

        let query = "SELECT date, open, high, low, close
                     FROM index_ohlcv
                     WHERE index_name = ?1 AND date >= ?2
                     ORDER BY date ASC";

        let mut stmt = conn
            .prepare(query)
            .map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![index.as_str(), start_str], |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Bar::new(date, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }

        Ok(bars)
    }

    fn data_range(
        &self,
        index: IndexName,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxError> {
        let conn = self.conn()?;
        let query = "SELECT MIN(date), MAX(date), COUNT(*) FROM index_ohlcv WHERE index_name = ?1";

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(query, params![index.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e: rusqlite::Error| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Granularity;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        let bars = [
            Bar::new(date(2024, 1, 2), 2650.0, 2670.0, 2640.0, 2660.0),
            Bar::new(date(2024, 1, 3), 2600.0, 2610.0, 2580.0, 2590.0),
            Bar::new(date(2024, 1, 8), 2590.0, 2620.0, 2570.0, 2610.0),
        ];
        adapter.insert_bars(IndexName::Kospi, &bars).unwrap();
        adapter
            .insert_bars(
                IndexName::Kosdaq,
                &[Bar::new(date(2024, 1, 2), 870.0, 880.0, 860.0, 875.0)],
            )
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_rejects_oversized_pool() {
        let config = crate::adapters::file_config_adapter::FileConfigAdapter::from_string(
            "[sqlite]\npath = krx.db\npool_size = 4294967296\n",
        )
        .unwrap();
        match SqliteAdapter::from_config(&config) {
            Err(KrxError::ConfigValue { section, key, .. }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "pool_size");
            }
            Err(other) => panic!("expected ConfigValue, got: {other}"),
            Ok(_) => panic!("expected ConfigValue"),
        }
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(KrxError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn fetch_daily_is_per_index_and_from_start() {
        let adapter = seeded();
        let bars = adapter.fetch_daily(IndexName::Kospi, date(2024, 1, 3)).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 2590.0);
        assert_eq!(bars[1].date, date(2024, 1, 8));

        let kosdaq = adapter.fetch_daily(IndexName::Kosdaq, date(2020, 1, 1)).unwrap();
        assert_eq!(kosdaq.len(), 1);
    }

    #[test]
    fn insert_replaces_existing_day() {
        let adapter = seeded();
        adapter
            .insert_bars(
                IndexName::Kospi,
                &[Bar::new(date(2024, 1, 2), 1.0, 1.0, 1.0, 1.0)],
            )
            .unwrap();
        let bars = adapter.fetch_daily(IndexName::Kospi, date(2024, 1, 2)).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].close, 1.0);
    }

    #[test]
    fn data_range_reports_span() {
        let adapter = seeded();
        assert_eq!(
            adapter.data_range(IndexName::Kospi).unwrap(),
            Some((date(2024, 1, 2), date(2024, 1, 8), 3))
        );
        assert_eq!(adapter.data_range(IndexName::Nasdaq).unwrap(), None);
    }

    #[test]
    fn weekly_fetch_groups_by_week() {
        let adapter = seeded();
        let weekly = adapter
            .fetch(IndexName::Kospi, date(2024, 1, 1), Granularity::Weekly)
            .unwrap();
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].date, date(2024, 1, 3));
        assert_eq!(weekly[0].open, 2650.0);
        assert_eq!(weekly[0].close, 2590.0);
    }

    #[test]
    fn fetch_after_last_bar_is_unavailable() {
        let adapter = seeded();
        let err = adapter
            .fetch(IndexName::Kospi, date(2025, 1, 1), Granularity::Daily)
            .unwrap_err();
        assert!(matches!(err, KrxError::DataUnavailable { .. }));
    }
}
