//! Feedback manager: bounded message history and per-step timing metrics

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::StepError;
use crate::listener::ProgressListener;
use crate::models::{ExecutionPlan, ExecutionResult, ExecutionStep, StepStatus};

/// Default number of retained messages
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Number of messages included in a progress summary
const SUMMARY_MESSAGES: usize = 5;

/// Longest result preview stored in a completion message
const RESULT_PREVIEW_CHARS: usize = 100;

/// Feedback message level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackLevel {
    /// Informational
    Info,
    /// Something finished successfully
    Success,
    /// Something was skipped or degraded
    Warning,
    /// Something failed
    Error,
    /// Diagnostic detail
    Debug,
}

impl fmt::Display for FeedbackLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedbackLevel::Info => "info",
            FeedbackLevel::Success => "success",
            FeedbackLevel::Warning => "warning",
            FeedbackLevel::Error => "error",
            FeedbackLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// A leveled, timestamped feedback note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    /// Message level
    pub level: FeedbackLevel,
    /// Message text
    pub message: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Step the message refers to
    pub step_id: Option<String>,
    /// Structured details
    pub details: Option<Value>,
}

/// Timing and error counters for one step
#[derive(Debug, Clone)]
pub struct StepMetrics {
    /// Step id
    pub step_id: String,
    /// When the latest attempt started
    pub start_time: Option<DateTime<Utc>>,
    /// When the latest attempt finished
    pub end_time: Option<DateTime<Utc>>,
    /// Duration of the latest attempt
    pub duration: Option<Duration>,
    /// Failures and error notifications seen for this step
    pub error_count: u32,
    started: Option<Instant>,
}

impl StepMetrics {
    fn new(step_id: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            start_time: None,
            end_time: None,
            duration: None,
            error_count: 0,
            started: None,
        }
    }
}

/// Progress summary computed from listener events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Plan name
    pub plan_name: String,
    /// Steps that reported completion
    pub completed_steps: usize,
    /// Steps in the plan
    pub total_steps: usize,
    /// Completed share, 0-100
    pub percentage: f64,
    /// Seconds since the plan started
    pub elapsed_time: f64,
    /// Estimated seconds remaining
    pub estimated_remaining: f64,
    /// Description of the step in flight, if any
    pub current_step: Option<String>,
    /// Most recent messages, oldest first
    pub recent_messages: Vec<FeedbackMessage>,
}

/// Callback receiving every new message
pub type FeedbackCallback = Box<dyn Fn(&FeedbackMessage) + Send + Sync>;

#[derive(Default)]
struct FeedbackState {
    messages: VecDeque<FeedbackMessage>,
    metrics: HashMap<String, StepMetrics>,
    plan_name: Option<String>,
    started: Option<Instant>,
    finished_steps: HashSet<String>,
    total_steps: usize,
    current_step: Option<(String, String)>,
}

impl FeedbackState {
    fn avg_step_duration(&self) -> f64 {
        let durations: Vec<f64> = self
            .metrics
            .values()
            .filter_map(|m| m.duration.map(|d| d.as_secs_f64()))
            .collect();
        if durations.is_empty() {
            return 0.0;
        }
        durations.iter().sum::<f64>() / durations.len() as f64
    }

    fn remaining_time(&self, avg_duration: f64) -> f64 {
        if avg_duration <= 0.0 {
            return 0.0;
        }
        let remaining = self.total_steps.saturating_sub(self.finished_steps.len());
        remaining as f64 * avg_duration
    }
}

/// Listener that records feedback messages and step metrics.
///
/// Messages live in a ring buffer of `max_history` entries; the oldest entry
/// is evicted first.
pub struct FeedbackManager {
    max_history: usize,
    state: Mutex<FeedbackState>,
    callback: Option<FeedbackCallback>,
}

impl Default for FeedbackManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl FeedbackManager {
    /// Create a manager retaining at most `max_history` messages
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            state: Mutex::new(FeedbackState {
                messages: VecDeque::with_capacity(max_history),
                ..Default::default()
            }),
            callback: None,
        }
    }

    /// Forward every new message to `callback`
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FeedbackMessage) + Send + Sync + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Message capacity
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    fn state(&self) -> MutexGuard<'_, FeedbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a message and forward it to the callback
    pub fn add_message(
        &self,
        level: FeedbackLevel,
        message: impl Into<String>,
        step_id: Option<&str>,
        details: Option<Value>,
    ) {
        let feedback = FeedbackMessage {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            step_id: step_id.map(str::to_string),
            details,
        };

        if self.max_history > 0 {
            let mut state = self.state();
            if state.messages.len() == self.max_history {
                state.messages.pop_front();
            }
            state.messages.push_back(feedback.clone());
        }

        if let Some(callback) = &self.callback {
            callback(&feedback);
        }
    }

    /// All retained messages, oldest first
    pub fn messages(&self) -> Vec<FeedbackMessage> {
        self.state().messages.iter().cloned().collect()
    }

    /// The last `count` messages, optionally narrowed to one level.
    ///
    /// The level filter applies after the window is taken.
    pub fn get_recent_messages(
        &self,
        count: usize,
        level: Option<FeedbackLevel>,
    ) -> Vec<FeedbackMessage> {
        let state = self.state();
        let skip = state.messages.len().saturating_sub(count);
        state
            .messages
            .iter()
            .skip(skip)
            .filter(|m| level.map_or(true, |level| m.level == level))
            .cloned()
            .collect()
    }

    /// Metrics recorded for `step_id`
    pub fn get_step_metrics(&self, step_id: &str) -> Option<StepMetrics> {
        self.state().metrics.get(step_id).cloned()
    }

    /// Average duration in seconds over steps that recorded one; zero if none
    pub fn calculate_avg_step_duration(&self) -> f64 {
        self.state().avg_step_duration()
    }

    /// Remaining steps multiplied by `avg_duration`; zero without an average
    pub fn estimate_remaining_time(&self, avg_duration: f64) -> f64 {
        self.state().remaining_time(avg_duration)
    }

    /// Summary of the current plan, or `None` before any plan started
    pub fn get_progress_summary(&self) -> Option<ProgressSummary> {
        let state = self.state();
        let plan_name = state.plan_name.clone()?;

        let completed_steps = state.finished_steps.len();
        let percentage = if state.total_steps > 0 {
            completed_steps as f64 / state.total_steps as f64 * 100.0
        } else {
            0.0
        };
        let avg = state.avg_step_duration();
        let skip = state.messages.len().saturating_sub(SUMMARY_MESSAGES);

        Some(ProgressSummary {
            plan_name,
            completed_steps,
            total_steps: state.total_steps,
            percentage,
            elapsed_time: state
                .started
                .map(|s| s.elapsed().as_secs_f64())
                .unwrap_or(0.0),
            estimated_remaining: state.remaining_time(avg),
            current_step: state.current_step.as_ref().map(|(_, desc)| desc.clone()),
            recent_messages: state.messages.iter().skip(skip).cloned().collect(),
        })
    }

    /// Drop all messages and metrics
    pub fn clear_history(&self) {
        let mut state = self.state();
        state.messages.clear();
        state.metrics.clear();
    }
}

#[async_trait]
impl ProgressListener for FeedbackManager {
    async fn on_plan_start(&self, plan: &ExecutionPlan) {
        {
            let mut state = self.state();
            state.plan_name = Some(plan.name.clone());
            state.started = Some(Instant::now());
            state.finished_steps.clear();
            state.total_steps = plan.len();
            state.current_step = None;
        }

        self.add_message(
            FeedbackLevel::Info,
            format!("🚀 Starting {}", plan.name),
            None,
            Some(json!({
                "plan_name": plan.name,
                "description": plan.description,
                "total_steps": plan.len(),
            })),
        );
    }

    async fn on_step_start(&self, step: &ExecutionStep) {
        {
            let mut state = self.state();
            let metrics = state
                .metrics
                .entry(step.id.clone())
                .or_insert_with(|| StepMetrics::new(&step.id));
            metrics.start_time = Some(Utc::now());
            metrics.started = Some(Instant::now());
            metrics.end_time = None;
            metrics.duration = None;
            state.current_step = Some((step.id.clone(), step.description.clone()));
        }

        self.add_message(
            FeedbackLevel::Info,
            format!("🔄 Running {}...", step.description),
            Some(&step.id),
            Some(json!({
                "estimated_duration": step.estimated_duration.map(|d| d.as_secs_f64()),
            })),
        );
    }

    async fn on_step_complete(&self, step: &ExecutionStep, result: &ExecutionResult) {
        let duration = {
            let mut state = self.state();
            state.finished_steps.insert(step.id.clone());
            if state.current_step.as_ref().is_some_and(|(id, _)| *id == step.id) {
                state.current_step = None;
            }

            let metrics = state.metrics.get_mut(&step.id);
            match metrics {
                Some(metrics) => {
                    if let Some(started) = metrics.started {
                        metrics.end_time = Some(Utc::now());
                        metrics.duration = Some(started.elapsed());
                    }
                    if result.status == StepStatus::Failed {
                        metrics.error_count += 1;
                    }
                    metrics.duration.map(|d| d.as_secs_f64())
                }
                None => None,
            }
        };

        match result.status {
            StepStatus::Completed => {
                let preview = result.result.as_ref().filter(|v| !v.is_null()).map(|v| {
                    v.to_string()
                        .chars()
                        .take(RESULT_PREVIEW_CHARS)
                        .collect::<String>()
                });
                self.add_message(
                    FeedbackLevel::Success,
                    format!("✅ {} completed", step.description),
                    Some(&step.id),
                    Some(json!({ "duration": duration, "result": preview })),
                );
            }
            StepStatus::Failed => {
                self.add_message(
                    FeedbackLevel::Error,
                    format!("❌ {} failed", step.description),
                    Some(&step.id),
                    Some(json!({ "error": result.error.as_ref().map(|e| e.to_string()) })),
                );
            }
            StepStatus::Skipped => {
                self.add_message(
                    FeedbackLevel::Warning,
                    format!("⏭️ Skipped {}", step.description),
                    Some(&step.id),
                    None,
                );
            }
            _ => {}
        }
    }

    async fn on_plan_complete(&self, plan: &ExecutionPlan) {
        let (elapsed, total_steps) = {
            let state = self.state();
            (
                state
                    .started
                    .map(|s| s.elapsed().as_secs_f64())
                    .unwrap_or(0.0),
                state.total_steps,
            )
        };
        let successful = plan
            .steps()
            .iter()
            .filter(|s| s.status() == StepStatus::Completed)
            .count();
        let failed = plan
            .steps()
            .iter()
            .filter(|s| s.status() == StepStatus::Failed)
            .count();

        self.add_message(
            FeedbackLevel::Info,
            format!("🎉 {} finished", plan.name),
            None,
            Some(json!({
                "total_duration": elapsed,
                "successful_steps": successful,
                "failed_steps": failed,
                "total_steps": total_steps,
            })),
        );
    }

    async fn on_error(&self, step: &ExecutionStep, error: &StepError) {
        if let Some(metrics) = self.state().metrics.get_mut(&step.id) {
            metrics.error_count += 1;
        }

        self.add_message(
            FeedbackLevel::Error,
            format!("⚠️ Error: {}", error),
            Some(&step.id),
            Some(json!({ "error": error.to_string(), "detail": format!("{:?}", error.inner()) })),
        );
    }
}
