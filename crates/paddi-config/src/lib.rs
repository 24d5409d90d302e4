//! Paddi Configuration
//!
//! Loads audit and execution settings from built-in defaults, an optional
//! TOML file and `PADDI__`-prefixed environment variables, in that order.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::{ConfigManager, ENV_PREFIX};
pub use types::{AiProvider, AuditConfig, ExecutionConfig, PaddiConfig};
