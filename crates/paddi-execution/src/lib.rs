#![warn(missing_docs)]

//! Paddi Progressive Execution
//!
//! Runs ordered plans of steps with live progress events, pause/resume/abort
//! control from other tasks, and interactive recovery when a step fails.

pub mod controller;
pub mod dialog;
pub mod error;
pub mod executor;
pub mod feedback;
pub mod input;
pub mod listener;
pub mod models;
pub mod visual;

#[cfg(test)]
mod feedback_properties;

pub use controller::InteractiveController;
pub use dialog::{DialogController, Settings, DETAIL_OPTIONS, ERROR_OPTIONS};
pub use error::{ExecutionError, Result, StepError};
pub use executor::{
    ExecutionHandle, ProgressSnapshot, ProgressiveExecutor, RunStatus, FAILURE_OPTIONS,
};
pub use feedback::{
    FeedbackCallback, FeedbackLevel, FeedbackManager, FeedbackMessage, ProgressSummary,
    StepMetrics, DEFAULT_MAX_HISTORY,
};
pub use input::{AutoController, UserInputProvider};
pub use listener::{NoopListener, ProgressListener};
pub use models::{
    ExecutionControl, ExecutionPlan, ExecutionResult, ExecutionStep, StepFuture, StepOutput,
    StepStatus, StepWork,
};
pub use visual::{Theme, VisualFeedback};
