// Multi-cloud collection: one step per configured source, then aggregation

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use paddi_config::PaddiConfig;
use paddi_execution::{ExecutionPlan, ExecutionStep};

use crate::commands::{Command, ProgressiveRunner, RunSummary};
use crate::error::{CliError, CliResult};
use crate::stages::{AuditStages, CloudSource, LiveAuditStages, MockAuditStages};

/// Collects configuration from every configured cloud source
pub struct CollectCommand {
    config: PaddiConfig,
    stages: Arc<dyn AuditStages>,
}

impl CollectCommand {
    pub fn new(config: PaddiConfig) -> Self {
        let stages: Arc<dyn AuditStages> = if config.audit.use_mock {
            Arc::new(MockAuditStages::new(&config.audit.output_dir))
        } else {
            Arc::new(LiveAuditStages)
        };
        Self { config, stages }
    }

    /// Replace the stage implementation
    pub fn with_stages(mut self, stages: Arc<dyn AuditStages>) -> Self {
        self.stages = stages;
        self
    }
}

#[async_trait]
impl Command for CollectCommand {
    fn build_plan(&self) -> CliResult<ExecutionPlan> {
        let sources = CloudSource::from_config(&self.config.audit);
        if sources.is_empty() {
            return Err(CliError::InvalidArgument {
                message: "at least one of --project-id, --aws-account-id or --azure-subscription-id is required"
                    .to_string(),
            });
        }

        // Sources collected by this plan; skipped or failed ones never land here
        let collected: Arc<Mutex<Vec<CloudSource>>> = Arc::default();

        let mut steps: Vec<ExecutionStep> = sources
            .into_iter()
            .map(|source| {
                let stages = Arc::clone(&self.stages);
                let collected = Arc::clone(&collected);
                let id = format!("collect_{}", source.kind.key());
                let description = format!("Collect {} configuration", source.kind.label());
                ExecutionStep::new_async(id, description, move || {
                    let stages = Arc::clone(&stages);
                    let collected = Arc::clone(&collected);
                    let source = source.clone();
                    async move {
                        let output = stages.collect_source(&source).await?;
                        let mut collected =
                            collected.lock().unwrap_or_else(PoisonError::into_inner);
                        if !collected.contains(&source) {
                            collected.push(source);
                        }
                        Ok::<_, anyhow::Error>(output)
                    }
                })
                .with_estimated_duration(Duration::from_secs(5))
            })
            .collect();

        let stages = Arc::clone(&self.stages);
        steps.push(
            ExecutionStep::new_async("aggregate", "Aggregate collected data", move || {
                let stages = Arc::clone(&stages);
                let sources = collected
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                async move { stages.aggregate(&sources).await }
            })
            .with_can_skip(false)
            .with_estimated_duration(Duration::from_secs(2)),
        );

        Ok(ExecutionPlan::new(
            "Multi-cloud Collection",
            "Collect configuration data from multiple cloud providers",
            steps,
        )?)
    }

    async fn execute(&self) -> CliResult<RunSummary> {
        let plan = self.build_plan()?;
        ProgressiveRunner::new(self.config.execution.clone())
            .run(plan)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_skippable_step_per_source() {
        let mut config = PaddiConfig::default();
        config.audit.project_id = Some("demo".to_string());
        config.audit.aws_account_id = Some("1234".to_string());

        let plan = CollectCommand::new(config).build_plan().unwrap();
        let ids: Vec<&str> = plan.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["collect_gcp", "collect_aws", "aggregate"]);
        assert!(plan.steps()[0].can_skip);
        assert!(plan.steps()[1].can_skip);
        assert!(!plan.steps()[2].can_skip);
        assert_eq!(plan.steps()[1].description, "Collect AWS configuration");
    }

    #[test]
    fn test_no_sources_is_rejected() {
        let err = CollectCommand::new(PaddiConfig::default())
            .build_plan()
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
    }
}
