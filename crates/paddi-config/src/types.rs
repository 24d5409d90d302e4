//! Core configuration types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PaddiConfig {
    /// Audit target and collaborator settings
    pub audit: AuditConfig,
    /// Progressive execution settings
    pub execution: ExecutionConfig,
}

/// Backend used by the explain stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// Hosted Gemini models
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiProvider::Gemini => write!(f, "gemini"),
            AiProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for AiProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(AiProvider::Gemini),
            "ollama" => Ok(AiProvider::Ollama),
            other => Err(ConfigError::Validation(format!(
                "Unknown AI provider '{}', expected gemini or ollama",
                other
            ))),
        }
    }
}

/// Audit target and collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// GCP project to audit
    pub project_id: Option<String>,
    /// GCP organization to audit
    pub organization_id: Option<String>,
    /// Region used by the explain stage
    pub location: String,
    /// Use sample data instead of live collectors
    pub use_mock: bool,
    /// Collect from every supported collector
    pub collect_all: bool,
    /// Backend for the explain stage
    pub ai_provider: AiProvider,
    /// Model name when using Ollama
    pub ollama_model: String,
    /// Ollama server endpoint
    pub ollama_endpoint: String,
    /// Directory receiving collected data and reports
    pub output_dir: String,
    /// AWS account for multi-cloud collection
    pub aws_account_id: Option<String>,
    /// Azure subscription for multi-cloud collection
    pub azure_subscription_id: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            organization_id: None,
            location: "asia-northeast1".to_string(),
            use_mock: false,
            collect_all: false,
            ai_provider: AiProvider::Gemini,
            ollama_model: "gemma3:latest".to_string(),
            ollama_endpoint: "http://localhost:11434".to_string(),
            output_dir: "output".to_string(),
            aws_account_id: None,
            azure_subscription_id: None,
        }
    }
}

/// Progressive execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Allow interactive prompts when a terminal is attached
    pub interactive: bool,
    /// Answer prompts automatically
    pub auto_mode: bool,
    /// Render progress to the terminal
    pub visual: bool,
    /// Single-line step rendering
    pub compact_mode: bool,
    /// Show elapsed and estimated times
    pub show_time: bool,
    /// Feedback messages kept in memory
    pub max_history: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            auto_mode: true,
            visual: true,
            compact_mode: false,
            show_time: true,
            max_history: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PaddiConfig::default();
        assert_eq!(config.audit.location, "asia-northeast1");
        assert_eq!(config.audit.ai_provider, AiProvider::Gemini);
        assert_eq!(config.audit.ollama_model, "gemma3:latest");
        assert_eq!(config.audit.output_dir, "output");
        assert!(config.execution.interactive);
        assert!(config.execution.auto_mode);
        assert!(!config.execution.compact_mode);
        assert_eq!(config.execution.max_history, 100);
    }

    #[test]
    fn test_ai_provider_parsing() {
        assert_eq!("Ollama".parse::<AiProvider>().unwrap(), AiProvider::Ollama);
        assert_eq!("gemini".parse::<AiProvider>().unwrap(), AiProvider::Gemini);
        assert!(matches!(
            "openai".parse::<AiProvider>(),
            Err(ConfigError::Validation(_))
        ));
        assert_eq!(AiProvider::Ollama.to_string(), "ollama");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: PaddiConfig = toml::from_str(
            r#"
            [audit]
            project_id = "demo-project"
            ai_provider = "ollama"
            "#,
        )
        .unwrap();

        assert_eq!(config.audit.project_id.as_deref(), Some("demo-project"));
        assert_eq!(config.audit.ai_provider, AiProvider::Ollama);
        assert_eq!(config.audit.location, "asia-northeast1");
        assert_eq!(config.execution, ExecutionConfig::default());
    }
}
