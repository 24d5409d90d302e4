// Shared driver for commands with progressive execution

use std::collections::HashMap;
use std::sync::Arc;

use paddi_config::ExecutionConfig;
use paddi_execution::{
    ExecutionPlan, ExecutionResult, FeedbackLevel, FeedbackManager, FeedbackMessage,
    InteractiveController, ProgressListener, ProgressiveExecutor, StepStatus, VisualFeedback,
};
use tracing::{debug, error, info, warn};

use crate::error::CliResult;
use crate::logging::VerbosityLevel;
use crate::output::OutputStyle;

/// Outcome of one progressive run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub plan_name: String,
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
    pub aborted: bool,
    pub results: HashMap<String, ExecutionResult>,
}

impl RunSummary {
    /// Summarise `results` for `plan`, listing failed steps in plan order
    pub fn new(plan: &ExecutionPlan, results: HashMap<String, ExecutionResult>, aborted: bool) -> Self {
        let count = |status: StepStatus| results.values().filter(|r| r.status == status).count();
        let failed = plan
            .steps()
            .iter()
            .filter(|step| results.get(&step.id).is_some_and(ExecutionResult::is_failed))
            .map(|step| step.id.clone())
            .collect();

        Self {
            plan_name: plan.name.clone(),
            total: plan.len(),
            completed: count(StepStatus::Completed),
            skipped: count(StepStatus::Skipped),
            failed,
            aborted,
            results,
        }
    }

    /// No step failed and the run was not aborted
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }

    /// Human-readable closing line
    pub fn render(&self, style: &OutputStyle) -> String {
        if !self.failed.is_empty() {
            style.failure_summary(&self.failed, self.total)
        } else if self.aborted {
            style.abort_notice(self.completed + self.skipped, self.total)
        } else {
            style.completion_notice(&self.plan_name, self.total)
        }
    }
}

/// Forward feedback messages into the tracing stream
fn log_feedback(message: &FeedbackMessage) {
    let step_id = message.step_id.as_deref().unwrap_or("-");
    match message.level {
        FeedbackLevel::Error => error!(step_id, "{}", message.message),
        FeedbackLevel::Warning => warn!(step_id, "{}", message.message),
        FeedbackLevel::Success | FeedbackLevel::Info => info!(step_id, "{}", message.message),
        FeedbackLevel::Debug => debug!(step_id, "{}", message.message),
    }
}

/// Builds an executor from execution settings and drives plans through it
pub struct ProgressiveRunner {
    settings: ExecutionConfig,
    extra_listeners: Vec<Arc<dyn ProgressListener>>,
}

impl ProgressiveRunner {
    pub fn new(settings: ExecutionConfig) -> Self {
        Self {
            settings,
            extra_listeners: Vec::new(),
        }
    }

    /// Register an additional listener after the built-in ones
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.extra_listeners.push(listener);
        self
    }

    async fn build_executor(&self) -> ProgressiveExecutor {
        let feedback =
            FeedbackManager::new(self.settings.max_history).with_callback(log_feedback);
        let mut executor = ProgressiveExecutor::new().with_listener(Arc::new(feedback));

        if self.settings.visual {
            let visual = VisualFeedback::new()
                .with_compact_mode(self.settings.compact_mode)
                .with_show_time(self.settings.show_time);
            executor.add_listener(Arc::new(visual));
        }
        for listener in &self.extra_listeners {
            executor.add_listener(Arc::clone(listener));
        }

        if self.settings.interactive {
            let controller = InteractiveController::new(self.settings.auto_mode);
            controller.show_controls().await;
            executor.set_input_provider(Some(Arc::new(controller)));
        }

        executor
    }

    /// Run `plan` to completion; Ctrl-C aborts before the next step
    pub async fn run(&self, mut plan: ExecutionPlan) -> CliResult<RunSummary> {
        let executor = self.build_executor().await;
        let handle = executor.handle();

        let interrupt = {
            let handle = handle.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current step");
                    handle.abort();
                }
            })
        };

        let outcome = executor.execute_with_feedback(&mut plan).await;
        interrupt.abort();

        let summary = RunSummary::new(&plan, outcome?, handle.is_aborted());
        debug!(
            plan = %summary.plan_name,
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            aborted = summary.aborted,
            "Run finished"
        );

        if VerbosityLevel::Normal.should_output() {
            println!("{}", summary.render(&OutputStyle::default()));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paddi_execution::{ExecutionStep, StepError};
    use serde_json::json;

    fn quiet_settings() -> ExecutionConfig {
        ExecutionConfig {
            interactive: false,
            visual: false,
            ..Default::default()
        }
    }

    fn plan() -> ExecutionPlan {
        ExecutionPlan::new(
            "Summary",
            "",
            vec![
                ExecutionStep::blocking("a", "A", || Ok(json!(1))),
                ExecutionStep::blocking("b", "B", || Err(anyhow::anyhow!("boom"))),
                ExecutionStep::blocking("c", "C", || Ok(json!(3))),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_summary_counts() {
        let plan = plan();
        let mut results = HashMap::new();
        results.insert("a".to_string(), ExecutionResult::completed("a", json!(1)));
        results.insert(
            "b".to_string(),
            ExecutionResult::failed("b", StepError::msg("boom")),
        );
        results.insert("c".to_string(), ExecutionResult::skipped("c"));

        let summary = RunSummary::new(&plan, results, false);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, vec!["b".to_string()]);
        assert!(!summary.is_success());

        let text = summary.render(&OutputStyle { use_colors: false });
        assert!(text.starts_with("✗ 1 of 3 steps failed"));
        assert!(text.contains("  • b"));
    }

    #[test]
    fn test_aborted_summary_is_not_success() {
        let summary = RunSummary::new(&plan(), HashMap::new(), true);
        assert!(!summary.is_success());
        assert_eq!(
            summary.render(&OutputStyle { use_colors: false }),
            "⚠ Aborted after 0 of 3 steps"
        );
    }

    /// In-memory sink for a test subscriber
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_feedback_failures_pass_default_log_level() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(VerbosityLevel::Normal.tracing_level())
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let feedback = FeedbackManager::new(10).with_callback(log_feedback);
            feedback.add_message(FeedbackLevel::Error, "collect failed", Some("collect"), None);
            feedback.add_message(FeedbackLevel::Warning, "explain skipped", Some("explain"), None);
            feedback.add_message(FeedbackLevel::Success, "report done", Some("report"), None);
        });

        let logged = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("ERROR"));
        assert!(logged.contains("collect failed"));
        assert!(logged.contains("WARN"));
        assert!(logged.contains("explain skipped"));
        assert!(!logged.contains("report done"));
    }

    #[tokio::test]
    async fn test_run_reports_partial_failure() {
        let runner = ProgressiveRunner::new(quiet_settings());
        let summary = runner.run(plan()).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, vec!["b".to_string()]);
        assert!(!summary.aborted);
    }
}
