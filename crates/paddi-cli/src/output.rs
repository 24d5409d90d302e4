// Closing lines printed after a progressive run

use colored::{Color, Colorize};

const OK_GLYPH: &str = "✓";
const FAIL_GLYPH: &str = "✗";
const ABORT_GLYPH: &str = "⚠";

/// Styling for run summaries and error reports on the console
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    fn marked(&self, glyph: &str, color: Color, text: &str) -> String {
        if self.use_colors {
            format!("{} {}", glyph.color(color).bold(), text)
        } else {
            format!("{} {}", glyph, text)
        }
    }

    /// Every step of the plan finished
    pub fn completion_notice(&self, plan_name: &str, total: usize) -> String {
        self.marked(
            OK_GLYPH,
            Color::Green,
            &format!("{}: all {} steps finished", plan_name, total),
        )
    }

    /// Headline plus one indented line per failed step id
    pub fn failure_summary(&self, failed: &[String], total: usize) -> String {
        let mut text = self.marked(
            FAIL_GLYPH,
            Color::Red,
            &format!("{} of {} steps failed", failed.len(), total),
        );
        for id in failed {
            text.push_str("\n  • ");
            text.push_str(id);
        }
        text
    }

    /// The run stopped early after `finished` steps
    pub fn abort_notice(&self, finished: usize, total: usize) -> String {
        self.marked(
            ABORT_GLYPH,
            Color::Yellow,
            &format!("Aborted after {} of {} steps", finished, total),
        )
    }

    /// A command error as shown to the user
    pub fn command_error(&self, message: &str) -> String {
        self.marked(FAIL_GLYPH, Color::Red, message)
    }
}

/// Print a command error to stderr
pub fn print_error(message: &str) {
    let style = OutputStyle {
        use_colors: atty::is(atty::Stream::Stderr),
    };
    eprintln!("{}", style.command_error(message));
}
