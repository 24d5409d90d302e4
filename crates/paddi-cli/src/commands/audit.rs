// Full audit pipeline: collect, explain, report

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paddi_config::PaddiConfig;
use paddi_execution::{ExecutionPlan, ExecutionStep};

use crate::commands::{Command, ProgressiveRunner, RunSummary};
use crate::error::{CliError, CliResult};
use crate::stages::{AuditStages, CollectRequest, ExplainRequest, LiveAuditStages, MockAuditStages};

/// Runs the audit pipeline as a three-step progressive plan
pub struct AuditCommand {
    config: PaddiConfig,
    verbose: bool,
    stages: Arc<dyn AuditStages>,
}

impl AuditCommand {
    /// Create the command; mock stages are used when `use_mock` is set
    pub fn new(config: PaddiConfig, verbose: bool) -> Self {
        let stages: Arc<dyn AuditStages> = if config.audit.use_mock {
            Arc::new(MockAuditStages::new(&config.audit.output_dir))
        } else {
            Arc::new(LiveAuditStages)
        };
        Self {
            config,
            verbose,
            stages,
        }
    }

    /// Replace the stage implementation
    pub fn with_stages(mut self, stages: Arc<dyn AuditStages>) -> Self {
        self.stages = stages;
        self
    }
}

#[async_trait]
impl Command for AuditCommand {
    fn build_plan(&self) -> CliResult<ExecutionPlan> {
        let audit = &self.config.audit;
        if audit.project_id.is_none() && audit.organization_id.is_none() {
            return Err(CliError::InvalidArgument {
                message: "--project-id or --organization-id is required".to_string(),
            });
        }

        let collect = {
            let stages = Arc::clone(&self.stages);
            let request = CollectRequest::from_config(audit, self.verbose);
            ExecutionStep::new_async("collect", "Collect cloud configuration", move || {
                let stages = Arc::clone(&stages);
                let request = request.clone();
                async move { stages.collect(&request).await }
            })
            .with_can_skip(false)
            .with_estimated_duration(Duration::from_secs(10))
        };

        let explain = {
            let stages = Arc::clone(&self.stages);
            let request = ExplainRequest::from_config(audit);
            ExecutionStep::new_async("explain", "Analyse security risks", move || {
                let stages = Arc::clone(&stages);
                let request = request.clone();
                async move { stages.explain(&request).await }
            })
            .with_can_skip(false)
            .with_confirmation(self.verbose)
            .with_estimated_duration(Duration::from_secs(30))
        };

        let report = {
            let stages = Arc::clone(&self.stages);
            let output_dir = PathBuf::from(&audit.output_dir);
            ExecutionStep::new_async("report", "Generate audit report", move || {
                let stages = Arc::clone(&stages);
                let output_dir = output_dir.clone();
                async move { stages.report(&output_dir).await }
            })
            .with_can_skip(false)
            .with_estimated_duration(Duration::from_secs(5))
        };

        Ok(ExecutionPlan::new(
            "Security Audit",
            "Collect cloud configuration, analyse risks and generate a report",
            vec![collect, explain, report],
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

    fn config_for(project: Option<&str>) -> PaddiConfig {
        let mut config = PaddiConfig::default();
        config.audit.project_id = project.map(str::to_string);
        config.audit.use_mock = true;
        config
    }

    #[test]
    fn test_plan_shape() {
        let plan = AuditCommand::new(config_for(Some("demo")), false)
            .build_plan()
            .unwrap();

        let ids: Vec<&str> = plan.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["collect", "explain", "report"]);
        assert!(plan.steps().iter().all(|s| !s.can_skip));
        assert!(!plan.steps()[1].requires_confirmation);
        assert_eq!(plan.steps()[1].estimated_duration, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_verbose_requires_explain_confirmation() {
        let plan = AuditCommand::new(config_for(Some("demo")), true)
            .build_plan()
            .unwrap();
        assert!(plan.step("explain").unwrap().requires_confirmation);
        assert!(!plan.step("collect").unwrap().requires_confirmation);
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let err = AuditCommand::new(config_for(None), false)
            .build_plan()
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
    }
}
