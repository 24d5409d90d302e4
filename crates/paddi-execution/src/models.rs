//! Data models for execution plans, steps and results

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, Result, StepError};

/// Value produced by a step's work
pub type StepOutput = serde_json::Value;

/// Boxed future returned by asynchronous step work
pub type StepFuture = BoxFuture<'static, anyhow::Result<StepOutput>>;

/// Status of an execution step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step is waiting to be executed
    #[default]
    Pending,
    /// Step is currently executing
    Running,
    /// Step completed successfully
    Completed,
    /// Step failed during execution
    Failed,
    /// Step was skipped
    Skipped,
    /// Step is held by a pause request before it started
    Paused,
}

impl StepStatus {
    /// Whether the step has reached an outcome (completed, failed or skipped)
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Lowercase name used in output
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control signal polled from the input provider before each step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionControl {
    /// Proceed normally
    #[default]
    Continue,
    /// Hold before the next step until resumed
    Pause,
    /// Skip the upcoming step if it allows skipping
    Skip,
    /// Stop the run before the upcoming step
    Abort,
    /// Retry request
    Retry,
    /// Details request
    Details,
}

impl ExecutionControl {
    /// Parse a typed control command.
    ///
    /// Accepts the full name or its first letter, case-insensitively. Anything
    /// unrecognised maps to [`ExecutionControl::Continue`].
    pub fn parse_command(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "p" | "pause" => ExecutionControl::Pause,
            "s" | "skip" => ExecutionControl::Skip,
            "a" | "abort" => ExecutionControl::Abort,
            "d" | "details" => ExecutionControl::Details,
            "r" | "retry" => ExecutionControl::Retry,
            _ => ExecutionControl::Continue,
        }
    }
}

/// The work performed by a step
#[derive(Clone)]
pub enum StepWork {
    /// Asynchronous work, awaited on the executor's task
    Async(Arc<dyn Fn() -> StepFuture + Send + Sync>),
    /// Blocking work, handed to the blocking thread pool
    Blocking(Arc<dyn Fn() -> anyhow::Result<StepOutput> + Send + Sync>),
}

impl fmt::Debug for StepWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepWork::Async(_) => f.write_str("StepWork::Async"),
            StepWork::Blocking(_) => f.write_str("StepWork::Blocking"),
        }
    }
}

/// A single unit of work in an execution plan
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    /// Identifier, unique within a plan
    pub id: String,
    /// Human-readable label
    pub description: String,
    /// Whether a SKIP control signal is honoured for this step
    pub can_skip: bool,
    /// Whether the step must be confirmed before it runs
    pub requires_confirmation: bool,
    /// Advisory duration estimate
    pub estimated_duration: Option<Duration>,
    work: StepWork,
    status: StepStatus,
    result: Option<StepOutput>,
    error: Option<StepError>,
}

impl ExecutionStep {
    /// Create a step from prepared work
    pub fn new(id: impl Into<String>, description: impl Into<String>, work: StepWork) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            can_skip: true,
            requires_confirmation: false,
            estimated_duration: None,
            work,
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Create a step whose work blocks the calling thread
    pub fn blocking<F>(id: impl Into<String>, description: impl Into<String>, work: F) -> Self
    where
        F: Fn() -> anyhow::Result<StepOutput> + Send + Sync + 'static,
    {
        Self::new(id, description, StepWork::Blocking(Arc::new(work)))
    }

    /// Create a step whose work is asynchronous
    pub fn new_async<F, Fut>(id: impl Into<String>, description: impl Into<String>, work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<StepOutput>> + Send + 'static,
    {
        let boxed = move || -> StepFuture { work().boxed() };
        Self::new(id, description, StepWork::Async(Arc::new(boxed)))
    }

    /// Set whether the step may be skipped by a control signal
    pub fn with_can_skip(mut self, can_skip: bool) -> Self {
        self.can_skip = can_skip;
        self
    }

    /// Set whether the step needs confirmation before it runs
    pub fn with_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = required;
        self
    }

    /// Set the advisory duration estimate
    pub fn with_estimated_duration(mut self, duration: Duration) -> Self {
        self.estimated_duration = Some(duration);
        self
    }

    /// Current lifecycle status
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Value produced by the last successful attempt
    pub fn result(&self) -> Option<&StepOutput> {
        self.result.as_ref()
    }

    /// Error produced by the last failed attempt
    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }

    pub(crate) fn work(&self) -> &StepWork {
        &self.work
    }

    pub(crate) fn set_status(&mut self, status: StepStatus) {
        self.status = status;
    }

    pub(crate) fn set_result(&mut self, result: StepOutput) {
        self.result = Some(result);
    }

    pub(crate) fn set_error(&mut self, error: StepError) {
        self.error = Some(error);
    }
}

/// Ordered collection of steps with display metadata
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Plan name
    pub name: String,
    /// Plan description
    pub description: String,
    steps: Vec<ExecutionStep>,
}

impl ExecutionPlan {
    /// Create a plan.
    ///
    /// # Errors
    /// Returns an error if `steps` is empty or contains duplicate step ids.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<ExecutionStep>,
    ) -> Result<Self> {
        let name = name.into();
        if steps.is_empty() {
            return Err(ExecutionError::EmptyPlan(name));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                return Err(ExecutionError::InvalidPlan(format!(
                    "duplicate step id '{}' in plan '{}'",
                    step.id, name
                )));
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            steps,
        })
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    /// Look up a step by id
    pub fn step(&self, id: &str) -> Option<&ExecutionStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Plans are never empty; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [ExecutionStep] {
        &mut self.steps
    }
}

/// Outcome of one step attempt
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// ID of the step
    pub step_id: String,
    /// Final status: completed, failed or skipped
    pub status: StepStatus,
    /// Value produced on success
    pub result: Option<StepOutput>,
    /// Error on failure
    pub error: Option<StepError>,
    /// Whether a caller decision is pending
    pub requires_decision: bool,
    /// Candidate options for that decision
    pub options: Option<Vec<String>>,
}

impl ExecutionResult {
    fn with_status(step_id: &str, status: StepStatus) -> Self {
        Self {
            step_id: step_id.to_string(),
            status,
            result: None,
            error: None,
            requires_decision: false,
            options: None,
        }
    }

    /// A completed result
    pub fn completed(step_id: &str, result: StepOutput) -> Self {
        Self {
            result: Some(result),
            ..Self::with_status(step_id, StepStatus::Completed)
        }
    }

    /// A failed result
    pub fn failed(step_id: &str, error: StepError) -> Self {
        Self {
            error: Some(error),
            ..Self::with_status(step_id, StepStatus::Failed)
        }
    }

    /// A skipped result
    pub fn skipped(step_id: &str) -> Self {
        Self::with_status(step_id, StepStatus::Skipped)
    }

    /// Whether the attempt failed
    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}
