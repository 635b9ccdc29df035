//! Configuration validation.
//!
//! Validates all config fields before a backtest runs: unknown names,
//! malformed dates, non-numeric and out-of-range values are rejected here so
//! the engine only ever sees a well-formed [`StrategyConfig`].
//!
//! [`StrategyConfig`]: crate::domain::strategy::StrategyConfig

use crate::domain::bar::{Granularity, IndexName};
use crate::domain::error::KrxError;
use crate::domain::projection::SortOrder;
use crate::domain::strategy::InversePricing;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const RATIO_KEYS: [&str; 5] = [
    "initial_entry_ratio",
    "main_buy_ratio",
    "main_sell_ratio",
    "inverse_buy_ratio",
    "inverse_sell_ratio",
];

pub const FEE_KEYS: [&str; 2] = ["buy_fee_rate", "sell_fee_rate"];

pub const DATA_SOURCES: [&str; 3] = ["postgres", "sqlite", "csv"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), KrxError> {
    validate_index(config)?;
    validate_granularity(config)?;
    validate_start_date(config)?;
    validate_sort_order(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), KrxError> {
    validate_initial_capital(config)?;
    for key in RATIO_KEYS {
        validate_ratio(config, "strategy", key)?;
    }
    for key in FEE_KEYS {
        validate_fee(config, key)?;
    }
    validate_trigger(config)?;
    read_bool(config, "strategy", "use_initial_entry", true)?;
    read_inverse_pricing(config)?;
    Ok(())
}

/// Check `[data] source` names a known backend and that file-based
/// backends have a path.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), KrxError> {
    let source = data_source(config);
    if !DATA_SOURCES.contains(&source.as_str()) {
        return Err(KrxError::ConfigValue {
            section: "data".to_string(),
            key: "source".to_string(),
            reason: format!("unknown data source '{}' (expected postgres, sqlite or csv)", source),
        });
    }
    if source != "postgres" && config.get_string(&source, "path").is_none() {
        return Err(KrxError::ConfigMissing {
            section: source,
            key: "path".to_string(),
        });
    }
    Ok(())
}

/// Lower-cased `[data] source`, defaulting to postgres.
pub fn data_source(config: &dyn ConfigPort) -> String {
    config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "postgres".to_string())
}

/// Read a numeric value, distinguishing "absent" (default) from "not a number" (error).
pub fn read_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, KrxError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| KrxError::ConfigValue {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("'{}' is not a number", raw.trim()),
            }),
    }
}

/// Boolean spellings accepted in config files.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Read a boolean, rejecting text that is neither true nor false.
pub fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, KrxError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or_else(|| KrxError::ConfigValue {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("'{}' is not a boolean (expected true or false)", raw.trim()),
        }),
    }
}

/// Connection pool size for a database section: a positive integer that
/// fits `u32`, 4 when absent.
pub fn read_pool_size(config: &dyn ConfigPort, section: &str) -> Result<u32, KrxError> {
    let Some(raw) = config.get_string(section, "pool_size") else {
        return Ok(4);
    };
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|size| *size > 0)
        .ok_or_else(|| KrxError::ConfigValue {
            section: section.to_string(),
            key: "pool_size".to_string(),
            reason: format!("'{}' is not a pool size between 1 and {}", raw.trim(), u32::MAX),
        })
}

/// `[strategy] inverse_pricing`, defaulting to the bar close.
pub fn read_inverse_pricing(config: &dyn ConfigPort) -> Result<InversePricing, KrxError> {
    match config.get_string("strategy", "inverse_pricing") {
        None => Ok(InversePricing::default()),
        Some(raw) => raw.parse().map_err(|reason| KrxError::ConfigValue {
            section: "strategy".to_string(),
            key: "inverse_pricing".to_string(),
            reason,
        }),
    }
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, KrxError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| KrxError::ConfigValue {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("invalid {} format, expected YYYY-MM-DD", key),
    })
}

fn validate_index(config: &dyn ConfigPort) -> Result<(), KrxError> {
    let Some(raw) = config.get_string("backtest", "index") else {
        return Ok(());
    };
    for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
        name.parse::<IndexName>()
            .map_err(|reason| KrxError::ConfigValue {
                section: "backtest".to_string(),
                key: "index".to_string(),
                reason,
            })?;
    }
    Ok(())
}

fn validate_granularity(config: &dyn ConfigPort) -> Result<(), KrxError> {
    match config.get_string("backtest", "granularity") {
        Some(raw) => raw
            .parse::<Granularity>()
            .map(|_| ())
            .map_err(|reason| KrxError::ConfigValue {
                section: "backtest".to_string(),
                key: "granularity".to_string(),
                reason,
            }),
        None => Ok(()),
    }
}

fn validate_start_date(config: &dyn ConfigPort) -> Result<(), KrxError> {
    match config.get_string("backtest", "start_date") {
        Some(raw) => parse_date(&raw, "backtest", "start_date").map(|_| ()),
        None => Ok(()),
    }
}

fn validate_sort_order(config: &dyn ConfigPort) -> Result<(), KrxError> {
    match config.get_string("backtest", "order") {
        Some(raw) => raw
            .parse::<SortOrder>()
            .map(|_| ())
            .map_err(|reason| KrxError::ConfigValue {
                section: "backtest".to_string(),
                key: "order".to_string(),
                reason,
            }),
        None => Ok(()),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), KrxError> {
    let value = read_number(config, "strategy", "initial_capital", 100_000_000.0)?;
    if value <= 0.0 {
        return Err(KrxError::ConfigValue {
            section: "strategy".to_string(),
            key: "initial_capital".to_string(),
            reason: "initial_capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_ratio(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), KrxError> {
    let value = read_number(config, section, key, 0.0)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(KrxError::ConfigValue {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{} must be between 0 and 100", key),
        });
    }
    Ok(())
}

fn validate_fee(config: &dyn ConfigPort, key: &str) -> Result<(), KrxError> {
    let value = read_number(config, "strategy", key, 0.0)?;
    if value < 0.0 {
        return Err(KrxError::ConfigValue {
            section: "strategy".to_string(),
            key: key.to_string(),
            reason: format!("{} must be non-negative", key),
        });
    }
    Ok(())
}

fn validate_trigger(config: &dyn ConfigPort) -> Result<(), KrxError> {
    let kind = config
        .get_string("strategy", "trigger")
        .unwrap_or_else(|| "price_move".to_string());

    match kind.trim().to_lowercase().as_str() {
        "price_move" => {
            let threshold = read_number(config, "strategy", "trigger_threshold", 0.0)?;
            if threshold < 0.0 {
                return Err(KrxError::ConfigValue {
                    section: "strategy".to_string(),
                    key: "trigger_threshold".to_string(),
                    reason: "trigger_threshold must be non-negative".to_string(),
                });
            }
            Ok(())
        }
        "drift" => {
            validate_ratio(config, "strategy", "target_main_weight")?;
            validate_ratio(config, "strategy", "drift_band")
        }
        other => Err(KrxError::ConfigValue {
            section: "strategy".to_string(),
            key: "trigger".to_string(),
            reason: format!("unknown trigger '{}' (expected price_move or drift)", other),
        }),
    }
}
