//! Interactive controller reading decisions from a terminal
//!
//! Falls back to automatic answers when running in auto mode or when no
//! terminal is attached, so callers never need to branch on the environment.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::warn;

use crate::input::UserInputProvider;
use crate::models::ExecutionControl;

type Reader = Box<dyn AsyncBufRead + Unpin + Send>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

/// Handles interactive user input during execution
pub struct InteractiveController {
    auto_mode: bool,
    interactive: bool,
    reader: AsyncMutex<Reader>,
    writer: AsyncMutex<Writer>,
    control_tx: mpsc::UnboundedSender<String>,
    control_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl InteractiveController {
    /// Create a controller bound to stdin/stdout.
    ///
    /// Interactive prompting is only used when stdin is a terminal.
    pub fn new(auto_mode: bool) -> Self {
        Self::build(
            auto_mode,
            atty::is(atty::Stream::Stdin),
            Box::new(BufReader::new(tokio::io::stdin())),
            Box::new(tokio::io::stdout()),
        )
    }

    /// Create a controller over explicit input and output streams.
    ///
    /// The streams are always treated as interactive.
    pub fn with_io<R, W>(auto_mode: bool, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::build(auto_mode, true, Box::new(reader), Box::new(writer))
    }

    fn build(auto_mode: bool, interactive: bool, reader: Reader, writer: Writer) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            auto_mode,
            interactive,
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
            control_tx,
            control_rx: Mutex::new(control_rx),
        }
    }

    /// Whether every query is answered automatically
    pub fn is_auto(&self) -> bool {
        self.auto_mode || !self.interactive
    }

    /// Sender for raw control commands (`p`, `skip`, `a`, ...).
    ///
    /// Commands queue up and are drained one per `get_control_input` poll.
    pub fn control_sender(&self) -> mpsc::UnboundedSender<String> {
        self.control_tx.clone()
    }

    /// Print the available control commands
    pub async fn show_controls(&self) {
        if self.is_auto() {
            return;
        }

        self.write(
            "\nExecution controls:\n  [p] pause\n  [s] skip current step\n  [a] abort run\n  [d] show details\n  [Enter] continue\n\n",
        )
        .await;
    }

    pub(crate) async fn write(&self, text: &str) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            warn!(error = %e, "Failed to write prompt");
            return;
        }
        let _ = writer.flush().await;
    }

    /// Prompt and read one line; `None` once the input is closed or unreadable
    pub(crate) async fn read_line(&self, prompt: &str) -> Option<String> {
        self.write(prompt).await;

        let mut line = String::new();
        let mut reader = self.reader.lock().await;
        match reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to read user input");
                None
            }
        }
    }
}

#[async_trait]
impl UserInputProvider for InteractiveController {
    async fn get_confirmation(&self, message: &str) -> bool {
        if self.is_auto() {
            return true;
        }

        loop {
            let Some(response) = self.read_line(&format!("{} [Y/n]: ", message)).await else {
                return true;
            };

            match response.to_lowercase().as_str() {
                "" | "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => self.write("Invalid input. Please enter 'y' or 'n'.\n").await,
            }
        }
    }

    async fn get_choice(&self, message: &str, options: &[String]) -> Option<String> {
        if options.is_empty() {
            return None;
        }
        if self.is_auto() {
            return options.first().cloned();
        }

        let mut menu = format!("\n{}\n", message);
        for (i, option) in options.iter().enumerate() {
            menu.push_str(&format!("  {}. {}\n", i + 1, option));
        }
        self.write(&menu).await;

        loop {
            let response = self.read_line("Select an option (number): ").await?;

            if let Ok(index) = response.parse::<usize>() {
                if (1..=options.len()).contains(&index) {
                    return Some(options[index - 1].clone());
                }
                self.write(&format!(
                    "Please enter a number between 1 and {}.\n",
                    options.len()
                ))
                .await;
                continue;
            }

            let wanted = response.to_lowercase();
            if let Some(option) = options.iter().find(|o| o.to_lowercase() == wanted) {
                return Some(option.clone());
            }
            self.write("Invalid input. Enter a number or one of the options.\n")
                .await;
        }
    }

    async fn get_control_input(&self) -> ExecutionControl {
        if self.is_auto() {
            return ExecutionControl::Continue;
        }

        let pending = match self.control_rx.lock() {
            Ok(mut rx) => rx.try_recv().ok(),
            Err(_) => None,
        };

        pending
            .map(|command| ExecutionControl::parse_command(&command))
            .unwrap_or(ExecutionControl::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(input: &str) -> InteractiveController {
        InteractiveController::with_io(
            false,
            BufReader::new(std::io::Cursor::new(input.as_bytes().to_vec())),
            tokio::io::sink(),
        )
    }

    fn options() -> Vec<String> {
        vec!["retry".to_string(), "skip".to_string(), "abort".to_string()]
    }

    #[tokio::test]
    async fn test_confirmation_accepts_default() {
        let controller = scripted("\n");
        assert!(controller.get_confirmation("Run?").await);
    }

    #[tokio::test]
    async fn test_confirmation_reprompts_until_valid() {
        let controller = scripted("maybe\nNO\n");
        assert!(!controller.get_confirmation("Run?").await);
    }

    #[tokio::test]
    async fn test_confirmation_closed_input_confirms() {
        let controller = scripted("");
        assert!(controller.get_confirmation("Run?").await);
    }

    #[tokio::test]
    async fn test_choice_by_index() {
        let controller = scripted("2\n");
        assert_eq!(
            controller.get_choice("Failed", &options()).await,
            Some("skip".to_string())
        );
    }

    #[tokio::test]
    async fn test_choice_by_text_case_insensitive() {
        let controller = scripted("ABORT\n");
        assert_eq!(
            controller.get_choice("Failed", &options()).await,
            Some("abort".to_string())
        );
    }

    #[tokio::test]
    async fn test_choice_reprompts_on_invalid_input() {
        let controller = scripted("7\nnope\n1\n");
        assert_eq!(
            controller.get_choice("Failed", &options()).await,
            Some("retry".to_string())
        );
    }

    #[tokio::test]
    async fn test_choice_closed_input_returns_none() {
        let controller = scripted("bogus\n");
        assert_eq!(controller.get_choice("Failed", &options()).await, None);
    }

    #[tokio::test]
    async fn test_auto_mode_never_reads() {
        let controller = InteractiveController::with_io(
            true,
            BufReader::new(std::io::Cursor::new(b"n\n3\n".to_vec())),
            tokio::io::sink(),
        );
        assert!(controller.is_auto());
        assert!(controller.get_confirmation("Run?").await);
        assert_eq!(
            controller.get_choice("Failed", &options()).await,
            Some("retry".to_string())
        );

        controller.control_sender().send("abort".to_string()).unwrap();
        assert_eq!(
            controller.get_control_input().await,
            ExecutionControl::Continue
        );
    }

    #[tokio::test]
    async fn test_control_queue_drains_one_per_poll() {
        let controller = scripted("");
        let sender = controller.control_sender();
        sender.send("p".to_string()).unwrap();
        sender.send("skip".to_string()).unwrap();

        assert_eq!(controller.get_control_input().await, ExecutionControl::Pause);
        assert_eq!(controller.get_control_input().await, ExecutionControl::Skip);
        assert_eq!(
            controller.get_control_input().await,
            ExecutionControl::Continue
        );
    }
}
