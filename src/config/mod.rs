//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `REQUIREMENT_CLARIFIER`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use requirement_clarifier::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Asking for at most {} questions", config.clarification.question_budget);
//! ```

mod ai;
mod clarification;
mod error;
mod logging;
mod presentation;
mod storage;

pub use ai::AiConfig;
pub use clarification::{ClarificationConfig, MAX_QUESTION_BUDGET};
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use presentation::PresentationConfig;
pub use storage::StorageConfig;

use serde::Deserialize;

const ENV_PREFIX: &str = "REQUIREMENT_CLARIFIER";

/// Root application configuration
///
/// Every section has defaults; only `ai.api_key` is required, and only by
/// [`AppConfig::validate()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Text generation service (OpenAI-compatible)
    #[serde(default)]
    pub ai: AiConfig,

    /// Question budget and follow-up behaviour
    #[serde(default)]
    pub clarification: ClarificationConfig,

    /// UX pacing
    #[serde(default)]
    pub presentation: PresentationConfig,

    /// Key/value store location
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `REQUIREMENT_CLARIFIER` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `REQUIREMENT_CLARIFIER__AI__API_KEY=sk-...` -> `ai.api_key`
    /// - `REQUIREMENT_CLARIFIER__CLARIFICATION__QUESTION_BUDGET=3` -> `clarification.question_budget = 3`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ai.validate()?;
        self.clarification.validate()?;
        self.presentation.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
