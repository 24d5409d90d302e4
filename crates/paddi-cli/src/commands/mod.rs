// Command handlers for the paddi CLI

pub mod audit;
pub mod collect;
pub mod progressive;

pub use audit::AuditCommand;
pub use collect::CollectCommand;
pub use progressive::{ProgressiveRunner, RunSummary};

use paddi_execution::ExecutionPlan;

use crate::error::CliResult;

/// Trait for commands that run as a progressive execution plan
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Build the plan this command runs
    fn build_plan(&self) -> CliResult<ExecutionPlan>;

    /// Execute the command
    async fn execute(&self) -> CliResult<RunSummary>;
}
