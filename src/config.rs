//! # Factory Configuration
//!
//! Layered configuration for the factory runtime: built-in defaults, an optional
//! file, then `COMPONENT_FACTORY__*` environment variables.
//!
//! ```rust,no_run
//! use component_factory::config::FactoryConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FactoryConfig::load(Some("config/component-factory.toml"))?;
//! assert!(config.backwards_compatible_fanout);
//! # Ok(())
//! # }
//! ```

use crate::error::{FactoryError, FactoryResult};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "COMPONENT_FACTORY";
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Runtime configuration for a configuration component factory
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Enable every registered instance when the factory itself is activated
    pub backwards_compatible_fanout: bool,

    pub logging: LoggingConfig,
}

/// Structured logging settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            backwards_compatible_fanout: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl FactoryConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> FactoryResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FactoryResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(FactoryError::Configuration(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }
}
