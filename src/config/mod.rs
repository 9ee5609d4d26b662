//! # Sign-off Configuration System
//!
//! Layered configuration: built-in defaults, then `config/signoff.toml`, then
//! `config/signoff.<environment>.toml`, then `SIGNOFF__SECTION__KEY` environment
//! variables. Every layer is optional; the defaults alone form a valid configuration.
//!
//! ```rust,no_run
//! use signoff_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_steps = manager.config().engine.max_steps_per_workflow;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/signoff.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignoffConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

/// PostgreSQL connection and pooling configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Apply embedded migrations when the pool is created
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/signoff_development".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    /// Connection URL with any password replaced, safe for logs
    pub fn url_for_logging(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let Some((credentials, host)) = rest.rsplit_once('@') else {
            return self.url.clone();
        };
        match credentials.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
            None => self.url.clone(),
        }
    }
}

/// Approval engine rules
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix of generated reference codes (`<prefix>-<YYYYMMDD>-<hex>`)
    pub reference_code_prefix: String,
    pub max_steps_per_workflow: usize,
    pub max_comment_length: usize,
    pub max_signature_bytes: usize,
    pub require_comment_on_rejection: bool,
    pub require_comment_on_return: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_code_prefix: "WF".to_string(),
            max_steps_per_workflow: 50,
            max_comment_length: 4000,
            max_signature_bytes: 1024 * 1024,
            require_comment_on_rejection: false,
            require_comment_on_return: true,
        }
    }
}

/// Event publishing configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Logging overrides; environment defaults apply when unset
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: bool,
}

impl SignoffConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "database configuration",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                0,
                "pool size must be greater than 0",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigurationError::invalid_value(
                "database.min_connections",
                self.database.min_connections,
                "must not exceed database.max_connections",
            ));
        }

        let prefix = &self.engine.reference_code_prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigurationError::invalid_value(
                "engine.reference_code_prefix",
                prefix,
                "must be a non-empty alphanumeric string",
            ));
        }

        if self.engine.max_steps_per_workflow == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.max_steps_per_workflow",
                0,
                "a workflow needs at least one step",
            ));
        }

        if self.engine.max_signature_bytes == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.max_signature_bytes",
                0,
                "signed decisions would always be refused",
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                0,
                "broadcast channels need a capacity greater than 0",
            ));
        }

        Ok(())
    }
}
