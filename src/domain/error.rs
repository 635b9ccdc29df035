//! Crate-wide error type.

use chrono::NaiveDate;

use super::bar::IndexName;

/// Top-level error type for krx-rebalancer.
#[derive(Debug, thiserror::Error)]
pub enum KrxError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigValue {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid strategy parameter {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("no {index} bars available from {start_date}")]
    DataUnavailable {
        index: IndexName,
        start_date: NaiveDate,
    },

    #[error("ledger is empty")]
    EmptyInput,

    #[error("backtest cancelled after {processed} bars")]
    Cancelled { processed: usize },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KrxError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        KrxError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error family.
    pub fn exit_status(&self) -> u8 {
        match self {
            KrxError::Io(_) | KrxError::Report { .. } => 1,
            KrxError::ConfigParse { .. }
            | KrxError::ConfigMissing { .. }
            | KrxError::ConfigValue { .. }
            | KrxError::InvalidConfig { .. } => 2,
            KrxError::Database { .. } | KrxError::DatabaseQuery { .. } => 3,
            KrxError::DataUnavailable { .. } | KrxError::EmptyInput => 5,
            KrxError::Cancelled { .. } => 6,
        }
    }
}

impl From<&KrxError> for std::process::ExitCode {
    fn from(err: &KrxError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
