use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::{default_weights, WeightMap};
use crate::strategy::{AggregatorConfig, CalibrationConfig, OptimizerConfig};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    /// Overrides on top of the built-in default weights
    #[serde(default)]
    pub default_weights: WeightMap,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// Weight store directory (default: platform data dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Root of the per-period history directories
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
        }
    }
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("history")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Also write daily-rotated log files here
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `<data dir>/propcal`, or `./data` when the platform has none
pub fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("propcal"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("optimizer.n_samples", 100)?
            .set_default("optimizer.min_confidence", 55.0)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("PROPCAL_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (PROPCAL_OPTIMIZER__SEED, etc.)
            .add_source(
                Environment::with_prefix("PROPCAL")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Built-in configuration for CLI usage without a config directory
    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store.dir.clone().unwrap_or_else(default_store_dir)
    }

    /// Built-in defaults with configured overrides applied. Override keys
    /// match built-in agent names case-insensitively.
    pub fn seed_weights(&self) -> WeightMap {
        let mut weights = default_weights();
        for (name, weight) in &self.default_weights {
            let agent = weights
                .keys()
                .find(|a| a.eq_ignore_ascii_case(name))
                .cloned()
                .unwrap_or_else(|| name.clone());
            weights.insert(agent, *weight);
        }
        weights
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for section in [
            self.aggregator.validate(),
            self.calibration.validate(),
            self.optimizer.validate(),
        ] {
            if let Err(mut section_errors) = section {
                errors.append(&mut section_errors);
            }
        }

        let (floor, ceiling) = (self.calibration.weight_floor, self.calibration.weight_ceiling);
        let in_band = |w: f64| (floor..=ceiling).contains(&w);

        for (agent, weight) in &self.default_weights {
            if !weight.is_finite() || *weight <= 0.0 {
                errors.push(format!("default_weights.{agent} must be positive"));
            } else if !in_band(*weight) {
                errors.push(format!(
                    "default_weights.{agent} = {weight} is outside [{floor}, {ceiling}]"
                ));
            }
        }

        // Promoted optimizer weights must stay inside the calibration band
        let ranges = std::iter::once(("default_range", &self.optimizer.default_range))
            .chain(self.optimizer.ranges.iter().map(|(a, r)| (a.as_str(), r)));
        for (name, range) in ranges {
            if !in_band(range.min) || !in_band(range.max) {
                errors.push(format!(
                    "optimizer range {name} [{}, {}] is outside [{floor}, {ceiling}]",
                    range.min, range.max
                ));
            }
        }

        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_ascii_lowercase().as_str())
        {
            errors.push(format!("unknown logging.level: {}", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
