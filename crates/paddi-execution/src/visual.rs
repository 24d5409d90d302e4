//! Terminal rendering of execution progress

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use colored::{Color, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::StepError;
use crate::feedback::ProgressSummary;
use crate::listener::ProgressListener;
use crate::models::{ExecutionPlan, ExecutionResult, ExecutionStep, StepStatus};

const DEFAULT_TERMINAL_WIDTH: usize = 80;

/// Glyphs used by the renderer
#[derive(Debug, Clone)]
pub struct Theme {
    /// Filled progress cell
    pub progress_fill: &'static str,
    /// Empty progress cell
    pub progress_empty: &'static str,
    /// Completed marker
    pub success: &'static str,
    /// Failed marker
    pub error: &'static str,
    /// Warning marker
    pub warning: &'static str,
    /// Info marker
    pub info: &'static str,
    /// Running marker
    pub running: &'static str,
    /// Pending marker
    pub pending: &'static str,
    /// Skipped marker
    pub skipped: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            progress_fill: "█",
            progress_empty: "░",
            success: "✅",
            error: "❌",
            warning: "⚠️",
            info: "ℹ️",
            running: "🔄",
            pending: "⏳",
            skipped: "⏭️",
        }
    }
}

#[derive(Default)]
struct RenderState {
    plan_started: Option<Instant>,
    step_started: HashMap<String, Instant>,
    spinner: Option<ProgressBar>,
}

/// Listener that prints lifecycle events as styled terminal text
pub struct VisualFeedback {
    theme: Theme,
    show_time: bool,
    compact_mode: bool,
    use_colors: bool,
    show_spinner: bool,
    terminal_width: usize,
    out: Mutex<Box<dyn Write + Send>>,
    state: Mutex<RenderState>,
}

impl Default for VisualFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualFeedback {
    /// Renderer writing to stdout; colors and spinner only on a terminal
    pub fn new() -> Self {
        let is_tty = atty::is(atty::Stream::Stdout);
        let width = term_size::dimensions()
            .map(|(w, _)| w)
            .unwrap_or(DEFAULT_TERMINAL_WIDTH);

        let mut visual = Self::with_writer(std::io::stdout());
        visual.use_colors = is_tty;
        visual.show_spinner = is_tty;
        visual.terminal_width = width;
        visual
    }

    /// Renderer writing plain text to `writer`
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            theme: Theme::default(),
            show_time: true,
            compact_mode: false,
            use_colors: false,
            show_spinner: false,
            terminal_width: DEFAULT_TERMINAL_WIDTH,
            out: Mutex::new(Box::new(writer)),
            state: Mutex::new(RenderState::default()),
        }
    }

    /// Use a custom theme
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Show timing information
    pub fn with_show_time(mut self, show_time: bool) -> Self {
        self.show_time = show_time;
        self
    }

    /// Render each step on a single rewritten line
    pub fn with_compact_mode(mut self, compact: bool) -> Self {
        self.compact_mode = compact;
        self
    }

    /// Override the detected terminal width
    pub fn with_terminal_width(mut self, width: usize) -> Self {
        self.terminal_width = width.max(10);
        self
    }

    fn state(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, text: &str, newline: bool) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = if newline {
            writeln!(out, "{}", text)
        } else {
            write!(out, "{}", text)
        };
        let _ = out.flush();
    }

    fn colorize(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.use_colors {
            return text.to_string();
        }
        let styled = text.color(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }

    fn clear_line(&self) {
        if self.compact_mode {
            self.emit(&format!("\r{}\r", " ".repeat(self.terminal_width)), false);
        }
    }

    fn stop_spinner(&self) {
        if let Some(spinner) = self.state().spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn status_icon(&self, status: StepStatus) -> String {
        let (icon, color) = match status {
            StepStatus::Pending | StepStatus::Paused => (self.theme.pending, Color::BrightBlack),
            StepStatus::Running => (self.theme.running, Color::Blue),
            StepStatus::Completed => (self.theme.success, Color::Green),
            StepStatus::Failed => (self.theme.error, Color::Red),
            StepStatus::Skipped => (self.theme.skipped, Color::Yellow),
        };
        self.colorize(icon, color, false)
    }

    /// Shorten `text` to `max_width` characters, ending in "..." when cut
    pub fn truncate_text(text: &str, max_width: usize) -> String {
        if text.chars().count() <= max_width {
            return text.to_string();
        }
        let keep = max_width.saturating_sub(3);
        let mut truncated: String = text.chars().take(keep).collect();
        truncated.push_str("...");
        truncated
    }

    /// Render a `width`-cell progress bar followed by the percentage
    pub fn render_progress_bar(&self, current: usize, total: usize, width: usize) -> String {
        let ratio = if total == 0 {
            0.0
        } else {
            (current as f64 / total as f64).min(1.0)
        };
        let filled = (width as f64 * ratio) as usize;
        let bar = format!(
            "{}{}",
            self.theme.progress_fill.repeat(filled),
            self.theme.progress_empty.repeat(width - filled)
        );
        format!("{} {}%", bar, (ratio * 100.0) as u32)
    }

    /// Human-readable duration: `12.3s`, `2m 5s`, `1h 4m`
    pub fn render_time_elapsed(seconds: f64) -> String {
        let seconds = seconds.max(0.0);
        if seconds < 60.0 {
            format!("{:.1}s", seconds)
        } else if seconds < 3600.0 {
            let whole = seconds as u64;
            format!("{}m {}s", whole / 60, whole % 60)
        } else {
            let whole = seconds as u64;
            format!("{}h {}m", whole / 3600, (whole % 3600) / 60)
        }
    }

    /// Render a feedback progress summary as a few lines of text
    pub fn render_progress_summary(&self, summary: &ProgressSummary) -> String {
        let mut lines = vec![self.colorize(&format!("📋 {}", summary.plan_name), Color::White, true)];

        if summary.total_steps > 0 {
            let bar = self.render_progress_bar(summary.completed_steps, summary.total_steps, 30);
            lines.push(format!(
                "{} [{}/{} steps]",
                bar, summary.completed_steps, summary.total_steps
            ));
        }

        if self.show_time {
            let mut time_info = format!(
                "Elapsed: {}",
                Self::render_time_elapsed(summary.elapsed_time)
            );
            if summary.estimated_remaining > 0.0 {
                time_info.push_str(&format!(
                    " | Remaining: {}",
                    Self::render_time_elapsed(summary.estimated_remaining)
                ));
            }
            lines.push(time_info);
        }

        if let Some(current) = &summary.current_step {
            lines.push(format!(
                "Current: {}",
                Self::truncate_text(current, self.terminal_width.saturating_sub(9))
            ));
        }

        lines.join("\n")
    }

    fn start_spinner(&self, step: &ExecutionStep) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("   {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(step.description.clone());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.state().spinner = Some(spinner);
    }
}

#[async_trait]
impl ProgressListener for VisualFeedback {
    async fn on_plan_start(&self, plan: &ExecutionPlan) {
        {
            let mut state = self.state();
            state.plan_started = Some(Instant::now());
            state.step_started.clear();
        }

        if self.compact_mode {
            return;
        }

        let rule = "=".repeat(self.terminal_width);
        self.emit(&format!("\n{}", rule), true);
        self.emit(&self.colorize(&format!("🚀 {}", plan.name), Color::White, true), true);
        if !plan.description.is_empty() {
            self.emit(&format!("   {}", plan.description), true);
        }
        self.emit(&format!("{}\n", rule), true);
    }

    async fn on_step_start(&self, step: &ExecutionStep) {
        self.state()
            .step_started
            .insert(step.id.clone(), Instant::now());

        let icon = self.status_icon(StepStatus::Running);
        if self.compact_mode {
            self.clear_line();
            let text = format!("{} {}", icon, step.description);
            self.emit(
                &Self::truncate_text(&text, self.terminal_width.saturating_sub(5)),
                false,
            );
            return;
        }

        self.emit(&format!("{} {}", icon, step.description), true);
        if self.show_time {
            if let Some(estimate) = step.estimated_duration {
                self.emit(
                    &format!(
                        "   Estimated: {}",
                        Self::render_time_elapsed(estimate.as_secs_f64())
                    ),
                    true,
                );
            }
        }
        if self.show_spinner {
            self.start_spinner(step);
        }
    }

    async fn on_step_complete(&self, step: &ExecutionStep, result: &ExecutionResult) {
        self.stop_spinner();
        self.clear_line();

        let duration_text = match self.state().step_started.remove(&step.id) {
            Some(started) if self.show_time => format!(
                " ({})",
                Self::render_time_elapsed(started.elapsed().as_secs_f64())
            ),
            _ => String::new(),
        };

        let icon = self.status_icon(result.status);
        let (message, color) = match result.status {
            StepStatus::Completed => (
                format!("{} {} done{}", icon, step.description, duration_text),
                Color::Green,
            ),
            StepStatus::Failed => {
                let mut message = format!("{} {} failed{}", icon, step.description, duration_text);
                if let Some(error) = &result.error {
                    message.push_str(&format!("\n   Error: {}", error));
                }
                (message, Color::Red)
            }
            StepStatus::Skipped => (
                format!("{} {} skipped", icon, step.description),
                Color::Yellow,
            ),
            _ => (format!("{} {}", icon, step.description), Color::White),
        };

        self.emit(&self.colorize(&message, color, false), true);
    }

    async fn on_plan_complete(&self, plan: &ExecutionPlan) {
        self.stop_spinner();
        let elapsed = self
            .state()
            .plan_started
            .map(|s| s.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let finished = plan
            .steps()
            .iter()
            .filter(|s| matches!(s.status(), StepStatus::Completed | StepStatus::Skipped))
            .count();
        let failed = plan
            .steps()
            .iter()
            .filter(|s| s.status() == StepStatus::Failed)
            .count();

        let rule = "=".repeat(self.terminal_width);
        if !self.compact_mode {
            self.emit(&format!("\n{}", rule), true);
        } else {
            self.clear_line();
        }

        let headline = if failed > 0 {
            self.colorize(
                &format!("{} Finished with errors", self.theme.error),
                Color::Red,
                true,
            )
        } else {
            self.colorize(&format!("{} Finished", self.theme.success), Color::Green, true)
        };
        self.emit(&headline, true);

        self.emit("\n📊 Summary:", true);
        self.emit(
            &format!("   Done: {}/{} steps", finished, plan.len()),
            true,
        );
        if failed > 0 {
            self.emit(
                &self.colorize(&format!("   Failed: {} steps", failed), Color::Red, false),
                true,
            );
        }
        self.emit(
            &format!("   Elapsed: {}", Self::render_time_elapsed(elapsed)),
            true,
        );

        if !self.compact_mode {
            self.emit(&format!("{}\n", rule), true);
        }
    }

    async fn on_error(&self, step: &ExecutionStep, error: &StepError) {
        self.stop_spinner();
        self.clear_line();

        self.emit(
            &self.colorize(
                &format!("{} Error: {}", self.theme.error, step.description),
                Color::Red,
                true,
            ),
            true,
        );
        self.emit(
            &self.colorize(&format!("   {}", error), Color::Red, false),
            true,
        );
    }
}
