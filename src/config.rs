//! Configuration with validation and defaults
//!
//! Economy constants, wager timing, privileged role holders and logging,
//! grouped the way the TOML file lays them out.

use crate::common::types::{Address, Amount};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PairstakeConfig {
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub wagers: WagerConfig,
    #[serde(default)]
    pub roles: RoleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Currency and feeding constants
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Currency minted to the owner of every new item
    pub start_balance: Amount,
    /// Currency burned per meal
    pub feeding_cost: Amount,
    /// Seconds between meals
    pub feeding_interval_secs: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            start_balance: 100,
            feeding_cost: 20,
            feeding_interval_secs: 60,
        }
    }
}

/// Largest accepted broadcast capacity for engine events
pub const MAX_EVENT_BUFFER: usize = 1 << 20;

/// Commit-reveal timing and event fan-out
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WagerConfig {
    /// How long the second party has to reveal after the first reveal
    pub reveal_window_secs: u64,
    /// Delay before a settled pair may be wagered again (0 disables)
    pub rebet_cooldown_secs: u64,
    /// Capacity of the broadcast channel carrying engine events
    pub event_buffer: usize,
}

impl Default for WagerConfig {
    fn default() -> Self {
        Self {
            reveal_window_secs: 86_400,
            rebet_cooldown_secs: 0,
            event_buffer: 1024,
        }
    }
}

/// Initial holders of the privileged roles
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub referee: Address,
    pub minter: Address,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            referee: Address::from_low_u64(0x00ee_f001),
            minter: Address::from_low_u64(0x00ee_f002),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: LogLevel::Info }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: other.to_string(),
                reason: "expected one of error, warn, info, debug, trace".to_string(),
            }),
        }
    }
}

impl PairstakeConfig {
    /// Configuration for tests and simulations: short feeding interval, a
    /// one-minute reveal window and verbose logs
    pub fn testing() -> Self {
        Self {
            economy: EconomyConfig {
                feeding_interval_secs: 10,
                ..Default::default()
            },
            wagers: WagerConfig {
                reveal_window_secs: 60,
                event_buffer: 256,
                ..Default::default()
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.economy.feeding_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "economy.feeding_interval_secs".to_string(),
                value: "0".to_string(),
                reason: "Feeding interval cannot be zero".to_string(),
            });
        }

        if self.economy.feeding_cost == 0 {
            return Err(ConfigError::InvalidValue {
                field: "economy.feeding_cost".to_string(),
                value: "0".to_string(),
                reason: "Feeding cost cannot be zero".to_string(),
            });
        }

        if self.wagers.event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "wagers.event_buffer".to_string(),
                value: "0".to_string(),
                reason: "Event buffer cannot be zero".to_string(),
            });
        }

        if self.wagers.event_buffer > MAX_EVENT_BUFFER {
            return Err(ConfigError::InvalidValue {
                field: "wagers.event_buffer".to_string(),
                value: self.wagers.event_buffer.to_string(),
                reason: format!("Event buffer cannot exceed {}", MAX_EVENT_BUFFER),
            });
        }

        if self.roles.referee.is_null() {
            return Err(ConfigError::InvalidValue {
                field: "roles.referee".to_string(),
                value: self.roles.referee.to_string(),
                reason: "Referee cannot be the null identifier".to_string(),
            });
        }

        if self.roles.minter.is_null() {
            return Err(ConfigError::InvalidValue {
                field: "roles.minter".to_string(),
                value: self.roles.minter.to_string(),
                reason: "Minter cannot be the null identifier".to_string(),
            });
        }

        Ok(())
    }

    pub fn feeding_interval(&self) -> Duration {
        Duration::from_secs(self.economy.feeding_interval_secs)
    }

    pub fn reveal_window(&self) -> Duration {
        Duration::from_secs(self.wagers.reveal_window_secs)
    }
}
