//! Runtime settings
//!
//! Settings are read from a TOML file, then individual fields may be
//! overridden from `COUNCIL_*` environment variables. The resulting value is
//! passed explicitly to the orchestrator; nothing reads it from global state.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::db::get_default_db_path;
use crate::error::CouncilError;
use crate::pricing::DEFAULT_CACHE_TTL_MINUTES;
use crate::strategies::StrategiesConfig;

pub const CONFIG_ENV: &str = "COUNCIL_CONFIG";
const STARTING_CASH_ENV: &str = "COUNCIL_STARTING_CASH";
const CONFIDENCE_ENV: &str = "COUNCIL_CONFIDENCE_THRESHOLD";
const DB_PATH_ENV: &str = "COUNCIL_DB_PATH";
const LOG_LEVEL_ENV: &str = "COUNCIL_LOG_LEVEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cash a new portfolio is created with
    pub starting_cash: Decimal,
    /// Recommendations below this confidence are recorded but not executed
    pub confidence_threshold: Decimal,
    /// SQLite database file; defaults to ~/.council/council.db
    pub db_path: Option<PathBuf>,
    pub cache_ttl_minutes: i64,
    pub log_level: String,
    /// Emit run and trade notifications
    pub notifications: bool,
    pub strategies: StrategiesConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            starting_cash: dec!(100000),
            confidence_threshold: dec!(0.70),
            db_path: None,
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            log_level: "info".to_string(),
            notifications: true,
            strategies: StrategiesConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, `$COUNCIL_CONFIG`, or the user config
    /// directory, in that order. A missing default file means defaults;
    /// an explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut settings = match explicit {
            Some(file) => Self::from_file(&file)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(file) => Self::from_file(&file)?,
                None => Self::default(),
            },
        };

        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading settings from {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CouncilError::Config(e.to_string()).into())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(cash) = env_decimal(STARTING_CASH_ENV)? {
            self.starting_cash = cash;
        }
        if let Some(threshold) = env_decimal(CONFIDENCE_ENV)? {
            self.confidence_threshold = threshold;
        }
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|v| !v.is_empty()) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.log_level = level.trim().to_string();
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.starting_cash < Decimal::ZERO {
            return Err(CouncilError::Config(format!(
                "starting_cash must not be negative, got {}",
                self.starting_cash
            ))
            .into());
        }
        if self.confidence_threshold < Decimal::ZERO || self.confidence_threshold > Decimal::ONE {
            return Err(CouncilError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ))
            .into());
        }
        if self.cache_ttl_minutes < 0 {
            return Err(CouncilError::Config("cache_ttl_minutes must not be negative".into()).into());
        }
        self.strategies.validate()
    }

    /// Configured database path, or the default location
    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => get_default_db_path(),
        }
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_ttl_minutes)
    }
}

/// `<config_home>/council/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join("council").join("config.toml"))
}

fn env_decimal(name: &str) -> Result<Option<Decimal>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => Decimal::from_str(raw.trim())
            .map(Some)
            .map_err(|e| CouncilError::Config(format!("{} is not a number: {}", name, e)).into()),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.starting_cash, dec!(100000));
        assert_eq!(settings.confidence_threshold, dec!(0.70));
        assert_eq!(settings.cache_ttl_minutes, 15);
        assert!(settings.notifications);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            starting_cash = "250000"
            notifications = false

            [strategies.passive]
            target_stock_pct = "0.6"
            stock_symbol = "VOO"

            [strategies.quality]
            max_positions = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.starting_cash, dec!(250000));
        assert!(!settings.notifications);
        assert_eq!(settings.confidence_threshold, dec!(0.70));
        assert_eq!(settings.strategies.passive.target_stock_pct, dec!(0.6));
        assert_eq!(settings.strategies.passive.stock_symbol, "VOO");
        assert_eq!(settings.strategies.passive.bond_symbol, "BND");
        assert_eq!(settings.strategies.quality.max_positions, 5);
        assert_eq!(settings.strategies.garp.max_positions, 15);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold = \"0.8\"\ncache_ttl_minutes = 5").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.confidence_threshold, dec!(0.8));
        assert_eq!(settings.cache_ttl(), chrono::Duration::minutes(5));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.confidence_threshold = dec!(1.5);
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.starting_cash = dec!(-1);
        let err = settings.validate().unwrap_err();
        assert!(err.downcast_ref::<CouncilError>().is_some());

        let err = Settings::from_toml(
            r#"
            [[strategies.risk_parity.targets]]
            symbol = "VTI"
            weight = "0.5"
            "#,
        )
        .and_then(|s| s.validate().map(|_| s))
        .unwrap_err();
        assert!(err.to_string().contains("must sum to 1"));
    }

    #[test]
    fn test_malformed_toml_is_a_config_error() {
        let err = Settings::from_toml("starting_cash = [").unwrap_err();
        assert!(matches!(err.downcast_ref::<CouncilError>(), Some(CouncilError::Config(_))));
    }

    #[test]
    fn test_db_path_resolution() {
        let mut settings = Settings::default();
        settings.db_path = Some(PathBuf::from("/tmp/council-test.db"));
        assert_eq!(settings.db_path().unwrap(), PathBuf::from("/tmp/council-test.db"));
    }
}
