//! Error types for the execution engine

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by the executor's own control logic.
///
/// Failures inside step work never surface here; they are captured into the
/// step's [`ExecutionResult`](crate::models::ExecutionResult) instead.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A plan must contain at least one step
    #[error("Execution plan '{0}' has no steps")]
    EmptyPlan(String),

    /// Plan definition is inconsistent
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// The executor is already driving a plan
    #[error("Executor is already running plan '{0}'")]
    AlreadyRunning(String),
}

/// Result type for execution engine operations
pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Failure produced by a step's work.
///
/// Cheap to clone: the step, its result and every `on_error` notification all
/// share the same underlying error value.
#[derive(Clone)]
pub struct StepError {
    inner: Arc<anyhow::Error>,
}

impl StepError {
    /// Wrap an error returned by step work
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Build an error from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(anyhow::anyhow!(message.into()))
    }

    /// Underlying error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Attempt to view the root error as a concrete type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Returns true if both handles point at the same error value
    pub fn same_as(&self, other: &StepError) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl fmt::Debug for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepError({:?})", self.inner)
    }
}

impl From<anyhow::Error> for StepError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(error)
    }
}
