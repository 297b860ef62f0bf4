//! Configuration loading for the pairstake engine
//!
//! Reads an optional TOML file, applies `PAIRSTAKE_*` environment overrides
//! and validates the result.

use crate::config::PairstakeConfig;
use crate::errors::{ConfigError, PairstakeResult};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration loader with environment variable support
#[derive(Debug)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader reading `PAIRSTAKE_*` variables
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "PAIRSTAKE".to_string(),
        }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a different environment prefix (tests use this to stay isolated)
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> PairstakeResult<PairstakeConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => PairstakeConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;

        config.validate()?;

        Ok(config)
    }

    fn load_from_file(&self, path: &Path) -> PairstakeResult<PairstakeConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut PairstakeConfig) -> PairstakeResult<()> {
        if let Some(value) = self.env_parse("ECONOMY_START_BALANCE")? {
            config.economy.start_balance = value;
        }
        if let Some(value) = self.env_parse("ECONOMY_FEEDING_COST")? {
            config.economy.feeding_cost = value;
        }
        if let Some(value) = self.env_parse("ECONOMY_FEEDING_INTERVAL_SECS")? {
            config.economy.feeding_interval_secs = value;
        }
        if let Some(value) = self.env_parse("WAGERS_REVEAL_WINDOW_SECS")? {
            config.wagers.reveal_window_secs = value;
        }
        if let Some(value) = self.env_parse("WAGERS_REBET_COOLDOWN_SECS")? {
            config.wagers.rebet_cooldown_secs = value;
        }
        if let Some(value) = self.env_parse("WAGERS_EVENT_BUFFER")? {
            config.wagers.event_buffer = value;
        }
        if let Some(value) = self.env_parse("ROLES_REFEREE")? {
            config.roles.referee = value;
        }
        if let Some(value) = self.env_parse("ROLES_MINTER")? {
            config.roles.minter = value;
        }
        if let Some(value) = self.env_parse("LOG_LEVEL")? {
            config.logging.level = value;
        }

        Ok(())
    }

    fn env_parse<T: FromStr>(&self, suffix: &str) -> Result<Option<T>, ConfigError> {
        let key = format!("{}_{}", self.env_prefix, suffix);
        match env::var(&key) {
            Ok(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
                field: key,
                value: raw,
                reason: format!("could not parse as {}", std::any::type_name::<T>()),
            }),
            Err(_) => Ok(None),
        }
    }

    /// Save configuration to file
    pub fn save(&self, config: &PairstakeConfig, path: &Path) -> PairstakeResult<()> {
        let toml_string = render_toml(config)?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigError::SaveFailed(format!("Failed to write to {}: {}", path.display(), e)).into()
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a configuration as pretty TOML
pub fn render_toml(config: &PairstakeConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config)
        .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Address;
    use crate::errors::PairstakeError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_defaults_without_file() {
        let config = ConfigLoader::new()
            .with_env_prefix("PAIRSTAKE_TEST_NOFILE")
            .load()
            .unwrap();
        assert_eq!(config, PairstakeConfig::default());
    }

    #[test]
    fn test_save_and_load_config() -> PairstakeResult<()> {
        let temp_file = NamedTempFile::new().unwrap();

        let mut original = PairstakeConfig::testing();
        original.roles.referee = Address::from_low_u64(77);

        let loader = ConfigLoader::new().with_env_prefix("PAIRSTAKE_TEST_SAVE");
        loader.save(&original, temp_file.path())?;

        let loaded = ConfigLoader::new()
            .with_env_prefix("PAIRSTAKE_TEST_SAVE")
            .with_path(temp_file.path())
            .load()?;
        assert_eq!(loaded, original);

        Ok(())
    }

    #[test]
    fn test_env_overrides_apply() {
        env::set_var("PAIRSTAKE_TEST_ENV_ECONOMY_FEEDING_COST", "7");
        env::set_var("PAIRSTAKE_TEST_ENV_LOG_LEVEL", "trace");

        let config = ConfigLoader::new()
            .with_env_prefix("PAIRSTAKE_TEST_ENV")
            .load()
            .unwrap();
        assert_eq!(config.economy.feeding_cost, 7);
        assert_eq!(config.logging.level.as_directive(), "trace");

        env::remove_var("PAIRSTAKE_TEST_ENV_ECONOMY_FEEDING_COST");
        env::remove_var("PAIRSTAKE_TEST_ENV_LOG_LEVEL");
    }

    #[test]
    fn test_bad_env_value_names_variable() {
        env::set_var("PAIRSTAKE_TEST_BAD_WAGERS_EVENT_BUFFER", "lots");

        let err = ConfigLoader::new()
            .with_env_prefix("PAIRSTAKE_TEST_BAD")
            .load()
            .unwrap_err();
        match err {
            PairstakeError::Configuration(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "PAIRSTAKE_TEST_BAD_WAGERS_EVENT_BUFFER");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        env::remove_var("PAIRSTAKE_TEST_BAD_WAGERS_EVENT_BUFFER");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[economy]\nfeeding_interval_secs = 0\nstart_balance = 1\nfeeding_cost = 1").unwrap();

        let err = ConfigLoader::new()
            .with_env_prefix("PAIRSTAKE_TEST_INVALID")
            .with_path(temp_file.path())
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("economy.feeding_interval_secs"));
    }

    #[test]
    fn test_unparseable_file_reports_load_failure() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is = = not toml").unwrap();

        let err = ConfigLoader::new()
            .with_env_prefix("PAIRSTAKE_TEST_GARBAGE")
            .with_path(temp_file.path())
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            PairstakeError::Configuration(ConfigError::LoadFailed(_))
        ));
    }
}
