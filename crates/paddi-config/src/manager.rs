//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::types::{AiProvider, PaddiConfig};

/// Prefix of environment overrides, e.g. `PADDI__EXECUTION__COMPACT_MODE`
pub const ENV_PREFIX: &str = "PADDI";

/// Loads, validates and saves [`PaddiConfig`]
pub struct ConfigManager {
    config_path: PathBuf,
    env_prefix: String,
    env_source: Option<config::Map<String, String>>,
}

impl ConfigManager {
    /// Manager using the per-user config file
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Manager using a custom config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: ENV_PREFIX.to_string(),
            env_source: None,
        }
    }

    /// Read overrides from `vars` instead of the process environment
    pub fn with_env_source(mut self, vars: config::Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    /// Path of the config file
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// `<config_dir>/paddi/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("paddi")
            .join("config.toml")
    }

    fn environment(&self) -> Environment {
        let env = Environment::with_prefix(&self.env_prefix)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true);
        match &self.env_source {
            Some(vars) => env.source(Some(vars.clone())),
            None => env,
        }
    }

    /// Merge defaults, the config file (if present) and the environment,
    /// then validate the result.
    pub fn load(&self) -> Result<PaddiConfig> {
        debug!(path = %self.config_path.display(), "Loading configuration");

        let config = Config::builder()
            .add_source(
                File::from(self.config_path.clone())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(self.environment())
            .build()?;

        let paddi_config: PaddiConfig = config.try_deserialize()?;
        self.validate(&paddi_config)?;
        Ok(paddi_config)
    }

    /// Write `config` to the config file as TOML
    pub fn save(&self, config: &PaddiConfig) -> Result<()> {
        let toml = toml::to_string_pretty(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        debug!(path = %self.config_path.display(), "Saved configuration");
        Ok(())
    }

    /// Reject settings the audit pipeline cannot run with
    pub fn validate(&self, config: &PaddiConfig) -> Result<()> {
        if config.execution.max_history == 0 {
            return Err(ConfigError::Validation(
                "max_history must be greater than 0".to_string(),
            ));
        }
        if config.audit.output_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".to_string(),
            ));
        }
        if config.audit.ai_provider == AiProvider::Ollama
            && config.audit.ollama_endpoint.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "ollama_endpoint is required when ai_provider is ollama".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
