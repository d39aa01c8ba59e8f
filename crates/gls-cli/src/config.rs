//! GLS Shell Configuration
//!
//! Layered with figment, lowest priority first: built-in defaults,
//! `glsctl.toml` in the working directory, an explicit file from the
//! command line, then `GLS_` environment variables. Nested keys use a
//! double underscore, e.g. `GLS_PROFILE__MAX_DEVICES=4`.

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use gls_core::{GlsConfig, RetentionPolicy};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CliAppConfig {
    /// Profile core configuration handed to the session
    pub profile: GlsConfig,

    pub shell: ShellConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    pub prompt: String,
    /// Print every request handed to the GATT layer
    pub echo_requests: bool,
    /// Print device lists as pretty JSON rather than one line per device
    pub pretty_json: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "gls> ".to_string(),
            echo_requests: true,
            pretty_json: false,
        }
    }
}

impl CliAppConfig {
    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("glsctl.toml"))
    }

    /// Load defaults, `glsctl.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment().merge(Env::prefixed("GLS_").split("__")))
    }

    /// Like [`CliAppConfig::load`] with `path` layered above `glsctl.toml`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileSystem(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        Self::extract(
            Self::figment()
                .merge(Toml::file(path))
                .merge(Env::prefixed("GLS_").split("__")),
        )
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::string(document)),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: CliAppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides and re-validate
    pub fn with_retention(mut self, retention: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(policy) = retention {
            self.profile.retention_policy = policy
                .parse::<RetentionPolicy>()
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profile
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.shell.prompt.is_empty() {
            return Err(ConfigError::Validation("Shell prompt must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Example configuration file
    pub fn example_config() -> String {
        let mut example = CliAppConfig::default();
        example.profile.retention_policy = RetentionPolicy::KeepBonded;
        example.profile.max_devices = 8;
        example.shell.pretty_json = true;

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
