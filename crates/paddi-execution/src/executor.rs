//! Progressive executor
//!
//! Walks a plan's steps in order, gating each one on pause/abort state and
//! control signals, dispatching its work, and negotiating failures with the
//! input provider. Every status transition happens in this module.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{ExecutionError, Result, StepError};
use crate::input::UserInputProvider;
use crate::listener::ProgressListener;
use crate::models::{
    ExecutionControl, ExecutionPlan, ExecutionResult, ExecutionStep, StepOutput, StepStatus,
    StepWork,
};

/// Choices offered when a step fails
pub const FAILURE_OPTIONS: [&str; 3] = ["retry", "skip", "abort"];

/// Overall state reported by [`ProgressiveExecutor::get_progress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No plan has been started
    Idle,
    /// A plan is loaded and not paused
    Running,
    /// A plan is loaded and paused
    Paused,
}

/// Point-in-time view of the current plan's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Run status
    pub status: RunStatus,
    /// Steps that reached completed, failed or skipped
    pub completed: usize,
    /// Total steps in the plan
    pub total: usize,
    /// Completed share, 0-100
    pub percentage: f64,
    /// Description of the running step, if any
    pub current_step: Option<String>,
}

impl ProgressSnapshot {
    fn idle() -> Self {
        Self {
            status: RunStatus::Idle,
            completed: 0,
            total: 0,
            percentage: 0.0,
            current_step: None,
        }
    }
}

/// Mirror of the loaded plan's step statuses, readable from other tasks
#[derive(Debug)]
struct ProgressBoard {
    steps: Vec<(String, StepStatus)>,
}

/// State shared between the run loop and control handles
struct ControlState {
    paused: watch::Sender<bool>,
    aborted: AtomicBool,
    running: AtomicBool,
    board: Mutex<Option<ProgressBoard>>,
}

impl ControlState {
    fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            paused,
            aborted: AtomicBool::new(false),
            running: AtomicBool::new(false),
            board: Mutex::new(None),
        }
    }

    fn pause(&self) {
        self.paused.send_replace(true);
    }

    fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.resume();
    }

    fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    async fn wait_until_resumed(&self) {
        let mut rx = self.paused.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    fn load_board(&self, plan: &ExecutionPlan) {
        let steps = plan
            .steps()
            .iter()
            .map(|step| (step.description.clone(), step.status()))
            .collect();
        if let Ok(mut board) = self.board.lock() {
            *board = Some(ProgressBoard { steps });
        }
    }

    fn record(&self, index: usize, status: StepStatus) {
        if let Ok(mut board) = self.board.lock() {
            if let Some(entry) = board.as_mut().and_then(|b| b.steps.get_mut(index)) {
                entry.1 = status;
            }
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        let board = match self.board.lock() {
            Ok(board) => board,
            Err(_) => return ProgressSnapshot::idle(),
        };
        let Some(board) = board.as_ref() else {
            return ProgressSnapshot::idle();
        };

        let total = board.steps.len();
        let completed = board
            .steps
            .iter()
            .filter(|(_, status)| status.is_finished())
            .count();
        let percentage = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let current_step = board
            .steps
            .iter()
            .find(|(_, status)| *status == StepStatus::Running)
            .map(|(description, _)| description.clone());

        ProgressSnapshot {
            status: if self.is_paused() {
                RunStatus::Paused
            } else {
                RunStatus::Running
            },
            completed,
            total,
            percentage,
            current_step,
        }
    }
}

/// Clears the running flag when a run ends or its future is dropped
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cloneable handle for controlling a run from another task
#[derive(Clone)]
pub struct ExecutionHandle {
    state: Arc<ControlState>,
}

impl ExecutionHandle {
    /// Hold the run before its next step
    pub fn pause(&self) {
        self.state.pause();
    }

    /// Release a paused run
    pub fn resume(&self) {
        self.state.resume();
    }

    /// Stop the run before its next step
    pub fn abort(&self) {
        self.state.abort();
    }

    /// Whether the run is paused
    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Whether an abort was requested
    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    /// Progress snapshot of the current plan
    pub fn get_progress(&self) -> ProgressSnapshot {
        self.state.snapshot()
    }
}

/// Executes plans step by step with listener feedback and interactive control
pub struct ProgressiveExecutor {
    listeners: Vec<Arc<dyn ProgressListener>>,
    input_provider: Option<Arc<dyn UserInputProvider>>,
    state: Arc<ControlState>,
}

impl Default for ProgressiveExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressiveExecutor {
    /// Create an executor with no listeners and no input provider
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            input_provider: None,
            state: Arc::new(ControlState::new()),
        }
    }

    /// Add a listener (builder form)
    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.add_listener(listener);
        self
    }

    /// Set the input provider (builder form)
    pub fn with_input_provider(mut self, provider: Arc<dyn UserInputProvider>) -> Self {
        self.input_provider = Some(provider);
        self
    }

    /// Register a listener; listeners are notified in registration order
    pub fn add_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    /// Remove a previously registered listener.
    ///
    /// Returns true if the listener was registered.
    pub fn remove_listener(&mut self, listener: &Arc<dyn ProgressListener>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let before = self.listeners.len();
        self.listeners
            .retain(|l| Arc::as_ptr(l) as *const () != target);
        self.listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Replace the input provider
    pub fn set_input_provider(&mut self, provider: Option<Arc<dyn UserInputProvider>>) {
        self.input_provider = provider;
    }

    /// Handle for pausing, resuming or aborting from another task
    pub fn handle(&self) -> ExecutionHandle {
        ExecutionHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Hold the run before its next step. Idempotent.
    pub fn pause(&self) {
        self.state.pause();
    }

    /// Release a paused run. Idempotent.
    pub fn resume(&self) {
        self.state.resume();
    }

    /// Stop the run before its next step; also releases a pause so the
    /// loop can observe the abort.
    pub fn abort(&self) {
        self.state.abort();
    }

    /// Snapshot of the current plan's progress
    pub fn get_progress(&self) -> ProgressSnapshot {
        self.state.snapshot()
    }

    /// Run `plan` to completion or abort.
    ///
    /// Returns the final result of every step that was reached, keyed by
    /// step id. Step failures are captured in the results and never returned
    /// as errors.
    ///
    /// # Errors
    /// Returns [`ExecutionError::AlreadyRunning`] if this executor is already
    /// driving a plan.
    pub async fn execute_with_feedback(
        &self,
        plan: &mut ExecutionPlan,
    ) -> Result<HashMap<String, ExecutionResult>> {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ExecutionError::AlreadyRunning(plan.name.clone()));
        }
        let _guard = RunGuard(&self.state.running);

        self.state.aborted.store(false, Ordering::SeqCst);
        self.state.load_board(plan);
        debug!(plan = %plan.name, steps = plan.len(), "Starting plan");

        let mut results = HashMap::new();
        self.notify_plan_start(plan).await;

        for index in 0..plan.len() {
            if self.state.is_aborted() {
                break;
            }

            self.state.wait_until_resumed().await;
            if self.state.is_aborted() {
                break;
            }

            if let Some(provider) = &self.input_provider {
                let control = provider.get_control_input().await;
                trace!(step_id = %plan.steps()[index].id, ?control, "Control input");

                match control {
                    ExecutionControl::Pause => {
                        self.state.pause();
                        self.transition(plan, index, StepStatus::Paused);
                        self.state.wait_until_resumed().await;
                        self.transition(plan, index, StepStatus::Pending);
                        if self.state.is_aborted() {
                            break;
                        }
                    }
                    ExecutionControl::Skip if plan.steps()[index].can_skip => {
                        self.transition(plan, index, StepStatus::Skipped);
                        let id = plan.steps()[index].id.clone();
                        debug!(step_id = %id, "Step skipped by control signal");
                        results.insert(id.clone(), ExecutionResult::skipped(&id));
                        continue;
                    }
                    ExecutionControl::Abort => {
                        debug!(step_id = %plan.steps()[index].id, "Run aborted by control signal");
                        self.state.abort();
                        break;
                    }
                    _ => {}
                }
            }

            let mut result = self.attempt(plan, index).await;

            if result.is_failed() {
                if let Some(provider) = &self.input_provider {
                    let options: Vec<String> =
                        FAILURE_OPTIONS.iter().map(|o| o.to_string()).collect();
                    let message = format!(
                        "Step '{}' failed. What would you like to do?",
                        plan.steps()[index].description
                    );

                    match provider.get_choice(&message, &options).await.as_deref() {
                        Some("retry") => {
                            debug!(step_id = %plan.steps()[index].id, "Retrying failed step");
                            result = self.attempt(plan, index).await;
                        }
                        Some("skip") => {
                            self.transition(plan, index, StepStatus::Skipped);
                            let mut skipped = ExecutionResult::skipped(&result.step_id);
                            skipped.error = result.error.take();
                            result = skipped;
                        }
                        Some("abort") => {
                            self.state.abort();
                            results.insert(result.step_id.clone(), result);
                            break;
                        }
                        _ => {}
                    }
                }
            }

            results.insert(result.step_id.clone(), result);
        }

        self.notify_plan_complete(plan).await;
        debug!(
            plan = %plan.name,
            reached = results.len(),
            aborted = self.state.is_aborted(),
            "Plan finished"
        );

        Ok(results)
    }

    /// Dispatch one attempt and report its outcome to listeners
    async fn attempt(&self, plan: &mut ExecutionPlan, index: usize) -> ExecutionResult {
        let result = self.dispatch(plan, index).await;
        self.notify_step_complete(&plan.steps()[index], &result).await;
        result
    }

    /// Confirm, start, run and finalize a single attempt
    async fn dispatch(&self, plan: &mut ExecutionPlan, index: usize) -> ExecutionResult {
        let step = &plan.steps()[index];
        let step_id = step.id.clone();

        if step.requires_confirmation {
            if let Some(provider) = &self.input_provider {
                let message = format!("Execute step: {}?", step.description);
                if !provider.get_confirmation(&message).await {
                    debug!(step_id = %step_id, "Confirmation declined");
                    self.transition(plan, index, StepStatus::Skipped);
                    return ExecutionResult::skipped(&step_id);
                }
            }
        }

        self.transition(plan, index, StepStatus::Running);
        self.notify_step_start(&plan.steps()[index]).await;

        let work = plan.steps()[index].work().clone();
        match run_work(work).await {
            Ok(output) => {
                let step = &mut plan.steps_mut()[index];
                step.set_result(output.clone());
                self.transition(plan, index, StepStatus::Completed);
                ExecutionResult::completed(&step_id, output)
            }
            Err(error) => {
                debug!(step_id = %step_id, error = %error, "Step failed");
                plan.steps_mut()[index].set_error(error.clone());
                self.transition(plan, index, StepStatus::Failed);
                self.notify_error(&plan.steps()[index], &error).await;
                ExecutionResult::failed(&step_id, error)
            }
        }
    }

    fn transition(&self, plan: &mut ExecutionPlan, index: usize, status: StepStatus) {
        plan.steps_mut()[index].set_status(status);
        self.state.record(index, status);
    }

    async fn notify_plan_start(&self, plan: &ExecutionPlan) {
        for listener in &self.listeners {
            listener.on_plan_start(plan).await;
        }
    }

    async fn notify_step_start(&self, step: &ExecutionStep) {
        for listener in &self.listeners {
            listener.on_step_start(step).await;
        }
    }

    async fn notify_step_complete(&self, step: &ExecutionStep, result: &ExecutionResult) {
        for listener in &self.listeners {
            listener.on_step_complete(step, result).await;
        }
    }

    async fn notify_plan_complete(&self, plan: &ExecutionPlan) {
        for listener in &self.listeners {
            listener.on_plan_complete(plan).await;
        }
    }

    async fn notify_error(&self, step: &ExecutionStep, error: &StepError) {
        for listener in &self.listeners {
            listener.on_error(step, error).await;
        }
    }
}

/// Run step work; async work is awaited in place, blocking work goes to the
/// blocking pool. Panics become step errors.
async fn run_work(work: StepWork) -> std::result::Result<StepOutput, StepError> {
    match work {
        StepWork::Async(work) => {
            let outcome = AssertUnwindSafe(async move { work().await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(result) => result.map_err(StepError::new),
                Err(panic) => Err(StepError::msg(format!(
                    "step work panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            }
        }
        StepWork::Blocking(work) => match tokio::task::spawn_blocking(move || work()).await {
            Ok(result) => result.map_err(StepError::new),
            Err(join_error) => Err(StepError::msg(format!(
                "step work panicked: {}",
                join_error
            ))),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
