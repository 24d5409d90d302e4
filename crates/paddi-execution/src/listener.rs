//! Progress listener protocol

use async_trait::async_trait;

use crate::error::StepError;
use crate::models::{ExecutionPlan, ExecutionResult, ExecutionStep};

/// Observer of plan and step lifecycle events.
///
/// The executor awaits each hook before notifying the next listener, and all
/// listeners before it advances. Hooks run in registration order.
#[async_trait]
pub trait ProgressListener: Send + Sync {
    /// Called once before any step runs
    async fn on_plan_start(&self, plan: &ExecutionPlan);

    /// Called right before a step's work is started
    async fn on_step_start(&self, step: &ExecutionStep);

    /// Called once for every attempt that was dispatched
    async fn on_step_complete(&self, step: &ExecutionStep, result: &ExecutionResult);

    /// Called once after the step loop ends, whether it completed or aborted
    async fn on_plan_complete(&self, plan: &ExecutionPlan);

    /// Called when a step's work fails, before the matching `on_step_complete`
    async fn on_error(&self, step: &ExecutionStep, error: &StepError);
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

#[async_trait]
impl ProgressListener for NoopListener {
    async fn on_plan_start(&self, _plan: &ExecutionPlan) {}

    async fn on_step_start(&self, _step: &ExecutionStep) {}

    async fn on_step_complete(&self, _step: &ExecutionStep, _result: &ExecutionResult) {}

    async fn on_plan_complete(&self, _plan: &ExecutionPlan) {}

    async fn on_error(&self, _step: &ExecutionStep, _error: &StepError) {}
}
