//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `pwm.toml` in the working directory (or the file named by
//! `PWM_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use pwm_adapter_virtual::HydraulicsConfig;
use pwm_app::control_loop::ControlLoopConfig;

const DEFAULT_CONFIG_PATH: &str = "pwm.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry file locations.
    pub store: StoreConfig,
    /// Control loop timing.
    pub control: ControlConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Virtual field simulation.
    pub simulation: SimulationConfig,
}

/// Where the topology and settings documents live.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub topology_path: PathBuf,
    pub settings_path: PathBuf,
}

/// Control loop timing.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Seconds between scheduled ticks.
    pub tick_interval_secs: u64,
    /// Budget for all sensor reads of one tick, in milliseconds.
    pub sensor_deadline_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Simulated sensors and hydraulics.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Move simulated levels in response to door states.
    pub hydraulics: bool,
    /// Raw reading every configured level sensor starts from.
    pub initial_level: f64,
    #[serde(flatten)]
    pub steps: HydraulicsConfig,
}

impl Config {
    /// Load configuration from `pwm.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, an
    /// override cannot be parsed, or the result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("PWM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("PWM_TOPOLOGY_PATH") {
            self.store.topology_path = PathBuf::from(val);
        }
        if let Some(val) = var("PWM_SETTINGS_PATH") {
            self.store.settings_path = PathBuf::from(val);
        }
        if let Some(val) = var("PWM_TICK_INTERVAL_SECS") {
            self.control.tick_interval_secs = parse_var("PWM_TICK_INTERVAL_SECS", &val)?;
        }
        if let Some(val) = var("PWM_SENSOR_DEADLINE_MS") {
            self.control.sensor_deadline_ms = parse_var("PWM_SENSOR_DEADLINE_MS", &val)?;
        }
        if let Some(val) = var("PWM_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.control.tick_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "tick_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.control.sensor_deadline_ms == 0 {
            return Err(ConfigError::Validation(
                "sensor_deadline_ms must be non-zero".to_string(),
            ));
        }
        if self.control_loop().sensor_deadline >= self.control_loop().tick_interval {
            return Err(ConfigError::Validation(
                "sensor_deadline_ms must be shorter than the tick interval".to_string(),
            ));
        }
        if !self.simulation.initial_level.is_finite() {
            return Err(ConfigError::Validation(
                "initial_level must be a finite number".to_string(),
            ));
        }
        Ok(())
    }

    /// Timing for the control loop.
    #[must_use]
    pub fn control_loop(&self) -> ControlLoopConfig {
        ControlLoopConfig {
            tick_interval: Duration::from_secs(self.control.tick_interval_secs),
            sensor_deadline: Duration::from_millis(self.control.sensor_deadline_ms),
        }
    }
}

fn parse_var(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name,
        value: value.to_string(),
    })
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            topology_path: PathBuf::from("topology.json"),
            settings_path: PathBuf::from("settings.json"),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            sensor_deadline_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "pwmd=info,pwm_app=info,pwm_adapter_json_store=info".to_string(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            hydraulics: true,
            initial_level: 0.0,
            steps: HydraulicsConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// An environment override holds an unusable value.
    #[error("invalid value {value:?} for {name}")]
    Env { name: &'static str, value: String },
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
