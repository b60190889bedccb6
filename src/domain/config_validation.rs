//! Configuration validation.
//!
//! Every key is checked before a run starts; the first problem found is
//! reported as `ConfigMissing` or `ConfigInvalid` naming its section and key.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

pub const BACKTEST: &str = "backtest";
pub const SANDBOX: &str = "sandbox";
pub const LOGGING: &str = "logging";

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_CALL_BUDGET_MS: i64 = 50;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_DATA_DIR: &str = "data";

/// Validated settings for one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub call_budget: Duration,
    pub data_dir: PathBuf,
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_symbol(config)?;
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_dates(config)?;
    validate_call_budget(config)?;
    Ok(())
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<RunSettings, EngineError> {
    validate_backtest_config(config)?;
    let (start_date, end_date) = validate_dates(config)?;
    Ok(RunSettings {
        symbol: validate_symbol(config)?,
        start_date,
        end_date,
        initial_capital: config.get_double(BACKTEST, "initial_capital", DEFAULT_INITIAL_CAPITAL),
        commission_per_trade: config.get_double(BACKTEST, "commission_per_trade", 0.0),
        call_budget: Duration::from_millis(validate_call_budget(config)?),
        data_dir: PathBuf::from(config.get_string_or(BACKTEST, "data_dir", DEFAULT_DATA_DIR)),
    })
}

/// The configured log level, used when `RUST_LOG` is unset.
pub fn log_level(config: &dyn ConfigPort) -> String {
    config.get_string_or(LOGGING, "level", DEFAULT_LOG_LEVEL)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<String, EngineError> {
    match config.get_string(BACKTEST, "symbol") {
        Some(s) if !s.trim().is_empty() => {
            let symbol = s.trim().to_string();
            if symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
            {
                Ok(symbol)
            } else {
                Err(invalid(BACKTEST, "symbol", "symbol may only contain letters, digits, '.', '-' and '_'"))
            }
        }
        _ => Err(EngineError::ConfigMissing {
            section: BACKTEST.to_string(),
            key: "symbol".to_string(),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if config.has_key(BACKTEST, "initial_capital")
        && config.get_double(BACKTEST, "initial_capital", f64::NAN).is_nan()
    {
        return Err(invalid(BACKTEST, "initial_capital", "initial_capital must be a number"));
    }
    let value = config.get_double(BACKTEST, "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(BACKTEST, "initial_capital", "initial_capital must be positive"));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double(BACKTEST, "commission_per_trade", 0.0);
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(
            BACKTEST,
            "commission_per_trade",
            "commission_per_trade must be non-negative",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(NaiveDate, NaiveDate), EngineError> {
    let start_str = config.get_string(BACKTEST, "start_date");
    let end_str = config.get_string(BACKTEST, "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(invalid(BACKTEST, "start_date", "start_date must be before end_date"));
    }
    Ok((start_date, end_date))
}

fn validate_call_budget(config: &dyn ConfigPort) -> Result<u64, EngineError> {
    let value = config.get_int(SANDBOX, "call_budget_ms", DEFAULT_CALL_BUDGET_MS);
    if value <= 0 {
        return Err(invalid(SANDBOX, "call_budget_ms", "call_budget_ms must be positive"));
    }
    Ok(value as u64)
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, EngineError> {
    match value {
        None => Err(EngineError::ConfigMissing {
            section: BACKTEST.to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                BACKTEST,
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID: &str = "[backtest]\nsymbol = AAPL\nstart_date = 2022-01-03\nend_date = 2023-12-29\n";

    fn assert_invalid(result: Result<RunSettings, EngineError>, expected_key: &str) {
        match result {
            Err(EngineError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {}, got {:?}", expected_key, other),
        }
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let settings = build_settings(&config(VALID)).unwrap();
        assert_eq!(settings.symbol, "AAPL");
        assert_eq!(settings.initial_capital, DEFAULT_INITIAL_CAPITAL);
        assert_eq!(settings.commission_per_trade, 0.0);
        assert_eq!(settings.call_budget, Duration::from_millis(50));
        assert_eq!(settings.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(settings.start_date, NaiveDate::from_ymd_opt(2022, 1, 3).unwrap());
    }

    #[test]
    fn explicit_values_are_used() {
        let content = format!(
            "{}initial_capital = 5000\ncommission_per_trade = 2\ndata_dir = /srv/prices\n[sandbox]\ncall_budget_ms = 10\n",
            VALID
        );
        let settings = build_settings(&config(&content)).unwrap();
        assert_eq!(settings.initial_capital, 5000.0);
        assert_eq!(settings.commission_per_trade, 2.0);
        assert_eq!(settings.call_budget, Duration::from_millis(10));
        assert_eq!(settings.data_dir, PathBuf::from("/srv/prices"));
    }

    #[test]
    fn missing_symbol() {
        let result = build_settings(&config("[backtest]\nstart_date = 2022-01-03\nend_date = 2023-01-03\n"));
        assert!(matches!(result, Err(EngineError::ConfigMissing { key, .. }) if key == "symbol"));
    }

    #[test]
    fn symbol_with_path_characters_rejected() {
        let content = VALID.replace("AAPL", "../etc/passwd");
        assert_invalid(build_settings(&config(&content)), "symbol");
    }

    #[test]
    fn missing_dates() {
        let result = build_settings(&config("[backtest]\nsymbol = AAPL\nend_date = 2023-01-03\n"));
        assert!(matches!(result, Err(EngineError::ConfigMissing { key, .. }) if key == "start_date"));
    }

    #[test]
    fn malformed_date() {
        let content = VALID.replace("2022-01-03", "03/01/2022");
        assert_invalid(build_settings(&config(&content)), "start_date");
    }

    #[test]
    fn start_must_precede_end() {
        let content = VALID.replace("2023-12-29", "2022-01-03");
        assert_invalid(build_settings(&config(&content)), "start_date");
    }

    #[test]
    fn non_positive_capital() {
        let content = format!("{}initial_capital = 0\n", VALID);
        assert_invalid(build_settings(&config(&content)), "initial_capital");
        let content = format!("{}initial_capital = lots\n", VALID);
        assert_invalid(build_settings(&config(&content)), "initial_capital");
    }

    #[test]
    fn negative_commission() {
        let content = format!("{}commission_per_trade = -1\n", VALID);
        assert_invalid(build_settings(&config(&content)), "commission_per_trade");
    }

    #[test]
    fn non_positive_budget() {
        let content = format!("{}[sandbox]\ncall_budget_ms = 0\n", VALID);
        assert_invalid(build_settings(&config(&content)), "call_budget_ms");
    }

    #[test]
    fn log_level_default_and_override() {
        assert_eq!(log_level(&config(VALID)), "info");
        let content = format!("{}[logging]\nlevel = warn\n", VALID);
        assert_eq!(log_level(&config(&content)), "warn");
    }
}
