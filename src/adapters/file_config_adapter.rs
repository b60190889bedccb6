//! INI file configuration adapter.

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| EngineError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, EngineError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| EngineError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Replace one value in memory, as command-line flags do.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.config.set(section, key, Some(value.into()));
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[backtest]
symbol = AAPL
initial_capital = 250000.5
commission_per_trade = 1.5
start_date = 2022-01-03
end_date = 2023-12-29
data_dir = ./data

[sandbox]
call_budget_ms = 25

[logging]
level = debug
"#;

    #[test]
    fn from_string_parses_all_sections() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("backtest", "symbol"), Some("AAPL".into()));
        assert_eq!(adapter.get_double("backtest", "initial_capital", 0.0), 250000.5);
        assert_eq!(adapter.get_double("backtest", "commission_per_trade", 0.0), 1.5);
        assert_eq!(adapter.get_int("sandbox", "call_budget_ms", 50), 25);
        assert_eq!(adapter.get_string("logging", "level"), Some("debug".into()));
    }

    #[test]
    fn missing_keys_fall_back() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "symbol"), None);
        assert_eq!(adapter.get_string("nope", "key"), None);
        assert_eq!(adapter.get_int("sandbox", "call_budget_ms", 50), 50);
        assert_eq!(adapter.get_double("backtest", "initial_capital", 100_000.0), 100_000.0);
        assert_eq!(adapter.get_string_or("logging", "level", "info"), "info");
        assert!(!adapter.has_key("backtest", "symbol"));
    }

    #[test]
    fn non_numeric_values_fall_back() {
        let adapter =
            FileConfigAdapter::from_string("[sandbox]\ncall_budget_ms = soon\n[backtest]\ninitial_capital = lots\n")
                .unwrap();
        assert_eq!(adapter.get_int("sandbox", "call_budget_ms", 50), 50);
        assert_eq!(adapter.get_double("backtest", "initial_capital", 1.0), 1.0);
        assert!(adapter.has_key("backtest", "initial_capital"));
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[logging]\na = true\nb = Off\nc = 1\nd = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("logging", "a", false));
        assert!(!adapter.get_bool("logging", "b", true));
        assert!(adapter.get_bool("logging", "c", false));
        assert!(adapter.get_bool("logging", "d", true));
        assert!(!adapter.get_bool("logging", "missing", false));
    }

    #[test]
    fn set_overrides_file_value() {
        let mut adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        adapter.set("backtest", "symbol", "MSFT");
        adapter.set("backtest", "initial_capital", "500");
        adapter.set("extra", "key", "value");
        assert_eq!(adapter.get_string("backtest", "symbol"), Some("MSFT".into()));
        assert_eq!(adapter.get_double("backtest", "initial_capital", 0.0), 500.0);
        assert_eq!(adapter.get_string("extra", "key"), Some("value".into()));
    }

    #[test]
    fn blank_string_uses_default() {
        let adapter = FileConfigAdapter::from_string("[logging]\nlevel =\n").unwrap();
        assert_eq!(adapter.get_string_or("logging", "level", "info"), "info");
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("backtest", "data_dir"), Some("./data".into()));
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/stratsim.ini");
        match result {
            Err(EngineError::ConfigParse { file, .. }) => {
                assert!(file.contains("stratsim.ini"));
            }
            _ => panic!("expected ConfigParse error"),
        }
    }
}
