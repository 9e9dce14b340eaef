//! INI file configuration adapter.

use crate::domain::error::PapertraderError;
use crate::ports::config_port::{ConfigPort, ConfigWriter};
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn new() -> Self {
        Self { config: Ini::new() }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PapertraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| PapertraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, PapertraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| PapertraderError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Serialize to INI text.
    pub fn writes(&self) -> String {
        self.config.writes()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PapertraderError> {
        self.config.write(path)?;
        Ok(())
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl Default for FileConfigAdapter {
    fn default() -> Self {
        Self::new()
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
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

impl ConfigWriter for FileConfigAdapter {
    fn set_string(&mut self, section: &str, key: &str, value: &str) {
        self.config.set(section, key, Some(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[data]
dir = ./prices

[screening]
min_market_cap = 10000

[strategy]
name = MA Crossover
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_string("data", "dir"), Some("./prices".to_string()));
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("MA Crossover".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[trading]\nhmax = 100\n").unwrap();
        assert_eq!(adapter.get_string("trading", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string("[trading]\nhmax = 50\nseed = abc\n").unwrap();
        assert_eq!(adapter.get_int("trading", "hmax", 0), 50);
        assert_eq!(adapter.get_int("trading", "seed", 42), 42);
        assert_eq!(adapter.get_int("trading", "missing", 7), 7);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[trading]\ninitial_cash = 100000.5\nbad = x\n").unwrap();
        assert_eq!(adapter.get_double("trading", "initial_cash", 0.0), 100000.5);
        assert_eq!(adapter.get_double("trading", "bad", 99.9), 99.9);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[screening]\na = true\nb = yes\nc = 1\nd = off\ne = No\n",
        )
        .unwrap();
        assert!(adapter.get_bool("screening", "a", false));
        assert!(adapter.get_bool("screening", "b", false));
        assert!(adapter.get_bool("screening", "c", false));
        assert!(!adapter.get_bool("screening", "d", true));
        assert!(!adapter.get_bool("screening", "e", true));
        assert!(adapter.get_bool("screening", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\ndir = /var/prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("data", "dir"), Some("/var/prices".to_string()));
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(PapertraderError::ConfigParse { .. })));
    }

    #[test]
    fn set_then_get() {
        let mut adapter = FileConfigAdapter::new();
        adapter.set_string("strategy", "name", "rsi");
        adapter.set_int("trading", "hmax", 25);
        adapter.set_double("trading", "reward_scaling", 0.0001);
        adapter.set_bool("screening", "parallel", true);
        assert_eq!(adapter.get_string("strategy", "name"), Some("rsi".to_string()));
        assert_eq!(adapter.get_int("trading", "hmax", 0), 25);
        assert_eq!(adapter.get_double("trading", "reward_scaling", 0.0), 0.0001);
        assert!(adapter.get_bool("screening", "parallel", false));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("saved.ini");
        let mut adapter = FileConfigAdapter::new();
        adapter.set_string("data", "dir", "./prices");
        adapter.set_int("screening", "top_n", 5);
        adapter.save(&path).unwrap();

        let reloaded = FileConfigAdapter::from_file(&path).unwrap();
        assert_eq!(reloaded.get_string("data", "dir"), Some("./prices".to_string()));
        assert_eq!(reloaded.get_int("screening", "top_n", 0), 5);
        assert!(adapter.writes().contains("[screening]"));
    }
}
