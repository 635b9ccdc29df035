//! PostgreSQL data adapter.
//!
//! Reads daily bars from `index_ohlcv(index_name, date, open, high, low, close)`
//! through an r2d2 pool.

use crate::domain::bar::{Bar, IndexName};
use crate::domain::config_validation::read_pool_size;
use crate::domain::error::KrxError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

/// `[postgres]` keys and the environment variables they fall back to.
const CONNECTION_KEYS: [(&str, &str); 5] = [
    ("host", "POSTGRESQL_HOST"),
    ("port", "POSTGRESQL_PORT"),
    ("user", "POSTGRESQL_USER"),
    ("password", "POSTGRESQL_PASSWORD"),
    ("dbname", "POSTGRESQL_DB"),
];

pub struct PostgresAdapter {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

/// Resolve the libpq connection string.
///
/// `[postgres] connection_string` wins; otherwise the individual keys are
/// assembled, each falling back to its environment variable.
pub fn connection_string(config: &dyn ConfigPort) -> Result<String, KrxError> {
    connection_string_with(config, |name| std::env::var(name).ok())
}

fn connection_string_with(
    config: &dyn ConfigPort,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, KrxError> {
    if let Some(conninfo) = config.get_string("postgres", "connection_string") {
        return Ok(conninfo);
    }

    let mut parts = Vec::new();
    for (key, var) in CONNECTION_KEYS {
        let value = config
            .get_string("postgres", key)
            .or_else(|| env(var))
            .filter(|v| !v.is_empty());
        match value {
            Some(v) => parts.push(format!("{}={}", key, v)),
            None if key == "host" || key == "dbname" => {
                return Err(KrxError::ConfigMissing {
                    section: "postgres".into(),
                    key: key.into(),
                });
            }
            None => {}
        }
    }
    Ok(parts.join(" "))
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, KrxError> {
        let conninfo = connection_string(config)?;
        let pg_config = conninfo
            .parse::<postgres::Config>()
            .map_err(|e| KrxError::ConfigValue {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            })?;

        let pool_size = read_pool_size(config, "postgres")?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| KrxError::Database {
                reason: e.to_string(),
            })?;

        tracing::debug!(pool_size, "opened postgres pool");
        Ok(Self { pool })
    }

    fn query(
        &self,
        sql: &str,
        params: &[&(dyn postgres::types::ToSql + Sync)],
    ) -> Result<Vec<postgres::Row>, KrxError> {
        let mut conn = self.pool.get().map_err(|e: r2d2::Error| KrxError::Database {
            reason: e.to_string(),
        })?;
        conn.query(sql, params)
            .map_err(|e| KrxError::DatabaseQuery {
                reason: e.to_string(),
            })
    }
}

impl MarketDataPort for PostgresAdapter {
    fn fetch_daily(&self, index: IndexName, start_date: NaiveDate) -> Result<Vec<Bar>, KrxError> {
        let query = "SELECT date, \
                            open::double precision, high::double precision, \
                            low::double precision, close::double precision \
                     FROM public.index_ohlcv \
                     WHERE index_name = $1 AND date >= $2 \
                     ORDER BY date ASC";

        let rows = self.query(query, &[&index.as_str(), &start_date])?;

        Ok(rows
            .into_iter()
            .map(|row| Bar::new(row.get(0), row.get(1), row.get(2), row.get(3), row.get(4)))
            .collect())
    }

    fn data_range(
        &self,
        index: IndexName,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, KrxError> {
        let query =
            "SELECT MIN(date), MAX(date), COUNT(*) FROM public.index_ohlcv WHERE index_name = $1";

        let rows = self.query(query, &[&index.as_str()])?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let min: Option<NaiveDate> = row.get(0);
        let max: Option<NaiveDate> = row.get(1);
        let count: i64 = row.get(2);

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((min, max, count as usize))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn explicit_connection_string_wins() {
        let config = FileConfigAdapter::from_string(
            "[postgres]\nconnection_string = host=db dbname=krx\nhost = other\n",
        )
        .unwrap();
        assert_eq!(
            connection_string_with(&config, no_env).unwrap(),
            "host=db dbname=krx"
        );
    }

    #[test]
    fn keys_fall_back_to_environment() {
        let config = FileConfigAdapter::from_string("[postgres]\nhost = localhost\n").unwrap();
        let env = |name: &str| match name {
            "POSTGRESQL_USER" => Some("trader".to_string()),
            "POSTGRESQL_DB" => Some("market".to_string()),
            _ => None,
        };
        assert_eq!(
            connection_string_with(&config, env).unwrap(),
            "host=localhost user=trader dbname=market"
        );
    }

    #[test]
    fn missing_host_is_reported() {
        let config = FileConfigAdapter::from_string("[postgres]\ndbname = market\n").unwrap();
        match connection_string_with(&config, no_env) {
            Err(KrxError::ConfigMissing { section, key }) => {
                assert_eq!(section, "postgres");
                assert_eq!(key, "host");
            }
            other => panic!("expected ConfigMissing, got: {other:?}"),
        }
    }
}
