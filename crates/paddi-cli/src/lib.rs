// Paddi CLI Library

pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod router;
pub mod stages;

pub use error::{CliError, CliResult};
pub use logging::{init_logging, VerbosityLevel};
pub use router::{Cli, CommandRouter, Commands};
