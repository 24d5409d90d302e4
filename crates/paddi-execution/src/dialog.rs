//! Detail, settings and error dialogs built on the interactive controller

use std::collections::BTreeMap;

use crate::controller::InteractiveController;
use crate::error::StepError;
use crate::input::UserInputProvider;
use crate::models::ExecutionStep;

/// Actions offered after showing step details
pub const DETAIL_OPTIONS: [&str; 4] = ["continue", "skip", "abort", "settings"];

/// Actions offered by the error dialog
pub const ERROR_OPTIONS: [&str; 4] = ["retry", "skip", "abort", "details"];

/// Answer used by the error dialog when nobody can be asked
const AUTO_ERROR_ACTION: &str = "retry";

/// Settings edited through [`DialogController::get_settings_update`]
pub type Settings = BTreeMap<String, String>;

/// Richer prompts layered over an [`InteractiveController`].
///
/// Every dialog answers without reading input when the controller is
/// automatic: no detail action, unchanged settings and `retry`.
pub struct DialogController {
    controller: InteractiveController,
}

impl DialogController {
    /// Wrap `controller`
    pub fn new(controller: InteractiveController) -> Self {
        Self { controller }
    }

    /// The wrapped controller
    pub fn controller(&self) -> &InteractiveController {
        &self.controller
    }

    /// Print a step's attributes and ask what to do next.
    ///
    /// Returns one of [`DETAIL_OPTIONS`], or `None` in auto mode or once
    /// input is closed.
    pub async fn show_step_details(&self, step: &ExecutionStep) -> Option<String> {
        if self.controller.is_auto() {
            return None;
        }

        let rule = "=".repeat(50);
        let mut text = format!("\n{}\nStep details: {}\n{}\n", rule, step.description, rule);
        text.push_str(&format!("id: {}\n", step.id));
        text.push_str(&format!("status: {}\n", step.status()));
        text.push_str(&format!("can_skip: {}\n", step.can_skip));
        text.push_str(&format!(
            "requires_confirmation: {}\n",
            step.requires_confirmation
        ));
        if let Some(estimate) = step.estimated_duration {
            text.push_str(&format!("estimated_duration: {:.1}s\n", estimate.as_secs_f64()));
        }
        if let Some(error) = step.error() {
            text.push_str(&format!("error: {}\n", error));
        }
        text.push_str(&format!("{}\n", rule));
        self.controller.write(&text).await;

        let options: Vec<String> = DETAIL_OPTIONS.iter().map(|o| o.to_string()).collect();
        self.controller
            .get_choice("Choose the next action:", &options)
            .await
    }

    /// Let the user edit existing settings one key at a time.
    ///
    /// An empty key or closed input ends editing. Unknown keys are reported
    /// and ignored.
    pub async fn get_settings_update(&self, current: &Settings) -> Settings {
        if self.controller.is_auto() {
            return current.clone();
        }

        let mut listing = String::from("\nCurrent settings:\n");
        for (key, value) in current {
            listing.push_str(&format!("  {}: {}\n", key, value));
        }
        self.controller.write(&listing).await;

        let mut updated = current.clone();
        loop {
            let Some(key) = self
                .controller
                .read_line("\nSetting to change (empty to finish): ")
                .await
            else {
                break;
            };
            if key.is_empty() {
                break;
            }

            if !current.contains_key(&key) {
                self.controller
                    .write(&format!("Unknown setting '{}'\n", key))
                    .await;
                continue;
            }

            let Some(value) = self
                .controller
                .read_line(&format!("New value for {}: ", key))
                .await
            else {
                break;
            };
            self.controller
                .write(&format!("✓ {} set to {}\n", key, value))
                .await;
            updated.insert(key, value);
        }

        updated
    }

    /// Show an error with its context and ask how to handle it.
    ///
    /// Returns one of [`ERROR_OPTIONS`]; `retry` in auto mode or once input
    /// is closed.
    pub async fn show_error_dialog(&self, error: &StepError, context: &Settings) -> String {
        if self.controller.is_auto() {
            return AUTO_ERROR_ACTION.to_string();
        }

        let rule = "!".repeat(50);
        let mut text = format!("\n{}\nAn error occurred\n{}\n", rule, rule);
        text.push_str(&format!("Error: {}\n", error));
        for cause in error.inner().chain().skip(1) {
            text.push_str(&format!("Caused by: {}\n", cause));
        }
        if !context.is_empty() {
            text.push_str("\nContext:\n");
            for (key, value) in context {
                text.push_str(&format!("  {}: {}\n", key, value));
            }
        }
        text.push_str(&format!("{}\n", rule));
        self.controller.write(&text).await;

        let options: Vec<String> = ERROR_OPTIONS.iter().map(|o| o.to_string()).collect();
        self.controller
            .get_choice("How should this be handled?", &options)
            .await
            .unwrap_or_else(|| AUTO_ERROR_ACTION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tokio::io::BufReader;

    use super::*;

    fn dialog(auto: bool, input: &str) -> DialogController {
        DialogController::new(InteractiveController::with_io(
            auto,
            BufReader::new(Cursor::new(input.as_bytes().to_vec())),
            tokio::io::sink(),
        ))
    }

    fn settings() -> Settings {
        [("timeout", "30"), ("retries", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn step() -> ExecutionStep {
        ExecutionStep::blocking("collect", "Collect config", || Ok(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_auto_mode_answers_without_reading() {
        let dialog = dialog(true, "2\ntimeout\n60\n\n3\n");

        assert_eq!(dialog.show_step_details(&step()).await, None);
        assert_eq!(dialog.get_settings_update(&settings()).await, settings());
        assert_eq!(
            dialog
                .show_error_dialog(&StepError::msg("quota exceeded"), &Settings::new())
                .await,
            "retry"
        );
    }

    #[tokio::test]
    async fn test_step_details_returns_choice() {
        let dialog = dialog(false, "1\n");
        assert_eq!(
            dialog.show_step_details(&step()).await,
            Some("continue".to_string())
        );
    }

    #[tokio::test]
    async fn test_step_details_closed_input() {
        let dialog = dialog(false, "");
        assert_eq!(dialog.show_step_details(&step()).await, None);
    }

    #[tokio::test]
    async fn test_settings_update_changes_known_keys() {
        let dialog = dialog(false, "timeout\n60\nverbosity\n\n");
        let updated = dialog.get_settings_update(&settings()).await;

        assert_eq!(updated["timeout"], "60");
        assert_eq!(updated["retries"], "3");
        assert!(!updated.contains_key("verbosity"));
    }

    #[tokio::test]
    async fn test_settings_update_stops_on_closed_input() {
        let dialog = dialog(false, "retries\n");
        assert_eq!(dialog.get_settings_update(&settings()).await, settings());
    }

    #[tokio::test]
    async fn test_error_dialog_choice() {
        let dialog = dialog(false, "abort\n");
        let context: Settings = [("step".to_string(), "collect".to_string())].into();
        assert_eq!(
            dialog
                .show_error_dialog(&StepError::msg("permission denied"), &context)
                .await,
            "abort"
        );
    }

    #[tokio::test]
    async fn test_error_dialog_closed_input_retries() {
        let dialog = dialog(false, "");
        assert_eq!(
            dialog
                .show_error_dialog(&StepError::msg("timeout"), &Settings::new())
                .await,
            "retry"
        );
    }
}
