//! User input provider protocol

use async_trait::async_trait;

use crate::models::ExecutionControl;

/// Source of user decisions and mid-run control signals.
#[async_trait]
pub trait UserInputProvider: Send + Sync {
    /// Ask a yes/no question
    async fn get_confirmation(&self, message: &str) -> bool;

    /// Ask the user to pick one of `options`.
    ///
    /// Returns `None` when there are no options or the input source is closed.
    async fn get_choice(&self, message: &str, options: &[String]) -> Option<String>;

    /// Poll for a control signal without blocking
    async fn get_control_input(&self) -> ExecutionControl;
}

/// Provider that answers every query immediately without user interaction.
///
/// Confirms everything, picks the first option and never interrupts the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoController;

impl AutoController {
    /// Create an automatic controller
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UserInputProvider for AutoController {
    async fn get_confirmation(&self, _message: &str) -> bool {
        true
    }

    async fn get_choice(&self, _message: &str, options: &[String]) -> Option<String> {
        options.first().cloned()
    }

    async fn get_control_input(&self) -> ExecutionControl {
        ExecutionControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_controller_answers() {
        let controller = AutoController::new();
        assert!(controller.get_confirmation("Run collector?").await);
        assert_eq!(
            controller.get_control_input().await,
            ExecutionControl::Continue
        );

        let options = vec!["retry".to_string(), "skip".to_string()];
        assert_eq!(
            controller.get_choice("Step failed", &options).await,
            Some("retry".to_string())
        );
        assert_eq!(controller.get_choice("Step failed", &[]).await, None);
    }
}
