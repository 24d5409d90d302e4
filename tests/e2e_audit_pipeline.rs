//! End-to-End Test Suite: audit pipeline from configuration file to report
//!
//! Drives the CLI router with a saved configuration, chains multi-cloud
//! collection into analysis and reporting, and checks the progress summary
//! gathered by the feedback manager over a full run.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use paddi_cli::commands::{AuditCommand, Command};
use paddi_cli::stages::{AuditStages, ExplainRequest, MockAuditStages, REPORT_FILE};
use paddi_cli::{Cli, CommandRouter};
use paddi_config::{AuditConfig, ConfigManager, PaddiConfig};
use paddi_execution::{
    ExecutionPlan, ExecutionStep, FeedbackManager, ProgressiveExecutor, StepStatus,
};
use tempfile::TempDir;

fn mock_config(output_dir: &Path) -> PaddiConfig {
    let mut config = PaddiConfig::default();
    config.audit.use_mock = true;
    config.audit.project_id = Some("demo".to_string());
    config.audit.output_dir = output_dir.display().to_string();
    config.execution.interactive = false;
    config.execution.visual = false;
    config
}

/// A saved configuration file is enough to run the audit without target flags
#[tokio::test]
async fn test_config_file_drives_mock_audit() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    let output_dir = temp_dir.path().join("reports");

    ConfigManager::with_path(&config_path)
        .save(&mock_config(&output_dir))
        .expect("Failed to save config");

    let config_arg = config_path.display().to_string();
    let cli = Cli::try_parse_from(["paddi", "--config", config_arg.as_str(), "audit"])
        .expect("Failed to parse arguments");
    let summary = CommandRouter::execute(&cli).await.expect("Audit failed");

    assert!(summary.is_success());
    assert_eq!(summary.plan_name, "Security Audit");
    let report = std::fs::read_to_string(output_dir.join(REPORT_FILE)).expect("Missing report");
    assert!(report.contains("Target: demo"));
    assert!(report.contains("| HIGH | 2 |"));
}

/// Collected data from several clouds feeds the analysis and report stages
#[tokio::test]
async fn test_collect_then_report_pipeline() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let output_arg = temp_dir.path().display().to_string();
    let missing_config = temp_dir.path().join("none.toml").display().to_string();

    let cli = Cli::try_parse_from([
        "paddi",
        "--config",
        missing_config.as_str(),
        "--no-interactive",
        "--no-visual",
        "collect",
        "--use-mock",
        "--project-id",
        "demo",
        "--aws-account-id",
        "1234",
        "--output-dir",
        output_arg.as_str(),
    ])
    .expect("Failed to parse arguments");
    let summary = CommandRouter::execute(&cli).await.expect("Collection failed");
    assert!(summary.is_success());
    assert_eq!(summary.completed, 3);

    let stages = Arc::new(MockAuditStages::new(temp_dir.path()));
    let explain = {
        let stages = Arc::clone(&stages);
        let request = ExplainRequest::from_config(&AuditConfig::default());
        ExecutionStep::new_async("explain", "Analyse security risks", move || {
            let stages = Arc::clone(&stages);
            let request = request.clone();
            async move { stages.explain(&request).await }
        })
    };
    let report = {
        let stages = Arc::clone(&stages);
        let output_dir = temp_dir.path().to_path_buf();
        ExecutionStep::new_async("report", "Generate audit report", move || {
            let stages = Arc::clone(&stages);
            let output_dir = output_dir.clone();
            async move { stages.report(&output_dir).await }
        })
    };
    let mut plan = ExecutionPlan::new("Report", "", vec![explain, report])
        .expect("Failed to build plan");

    let results = ProgressiveExecutor::new()
        .execute_with_feedback(&mut plan)
        .await
        .expect("Report run failed");
    assert!(results.values().all(|r| r.status == StepStatus::Completed));

    let report = std::fs::read_to_string(temp_dir.path().join(REPORT_FILE))
        .expect("Missing report");
    assert!(report.contains("Target: demo, 1234"));
}

/// Feedback manager reports a finished plan at one hundred percent
#[tokio::test]
async fn test_feedback_summary_after_audit() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let mut plan = AuditCommand::new(mock_config(temp_dir.path()), false)
        .build_plan()
        .expect("Failed to build plan");

    let feedback = Arc::new(FeedbackManager::default());
    let executor = ProgressiveExecutor::new().with_listener(feedback.clone());
    executor
        .execute_with_feedback(&mut plan)
        .await
        .expect("Audit run failed");

    let summary = feedback
        .get_progress_summary()
        .expect("Summary missing after run");
    assert_eq!(summary.plan_name, "Security Audit");
    assert_eq!(summary.completed_steps, 3);
    assert_eq!(summary.total_steps, 3);
    assert!((summary.percentage - 100.0).abs() < f64::EPSILON);
    assert!(plan.steps().iter().all(|s| s.status() == StepStatus::Completed));
}
