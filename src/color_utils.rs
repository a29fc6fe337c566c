//! Color and styling utilities with support for NO_COLOR and TERM environment variables.
//!
//! This module provides utilities for conditional colored output based on:
//! - `--no-color` CLI flag
//! - `NO_COLOR` environment variable (https://no-color.org/)
//! - `PLUME_NO_COLOR` environment variable (application-specific)
//! - `TERM=dumb` environment variable
//! - TTY detection for stderr

use colored::ColoredString;
use std::io::{stderr, IsTerminal};
use std::sync::OnceLock;

/// Global color configuration state
static COLOR_CONFIG: OnceLock<ColorConfig> = OnceLock::new();

/// Check environment variables and TTY state for color support
fn should_disable_colors_from_env() -> bool {
    // Check NO_COLOR standard (https://no-color.org/)
    !std::env::var("NO_COLOR").unwrap_or_default().is_empty()
        // Check application-specific override
        || !std::env::var("PLUME_NO_COLOR").unwrap_or_default().is_empty()
        // Check for dumb terminal
        || std::env::var("TERM").unwrap_or_default() == "dumb"
        // Check if stderr is not a TTY (log messages go to stderr)
        || !stderr().is_terminal()
}

#[derive(Debug, Clone)]
struct ColorConfig {
    colors_enabled: bool,
}

impl ColorConfig {
    fn new(no_color_flag: bool) -> Self {
        let colors_enabled = !no_color_flag && !should_disable_colors_from_env();
        Self { colors_enabled }
    }

    fn is_enabled(&self) -> bool {
        self.colors_enabled
    }
}

/// Initialize the color configuration with the CLI flag state.
/// This should be called once at application startup after parsing CLI arguments.
pub fn init_color_config(no_color_flag: bool) {
    let config = ColorConfig::new(no_color_flag);
    COLOR_CONFIG.set(config).unwrap_or_else(|_| {
        eprintln!("Warning: Color configuration already initialized");
    });
}

/// Check if colors are enabled based on configuration
fn colors_enabled() -> bool {
    COLOR_CONFIG
        .get()
        .map(|config| config.is_enabled())
        .unwrap_or_else(|| {
            // Fallback if not initialized - check env vars and TTY only
            !should_disable_colors_from_env()
        })
}

/// Apply color to a string only if colors are enabled for stderr output
pub fn maybe_color_stderr<F>(text: &str, color_fn: F) -> String
where
    F: FnOnce(&str) -> ColoredString,
{
    if colors_enabled() {
        color_fn(text).to_string()
    } else {
        text.to_string()
    }
}

/// Semantic color functions for different message types
pub mod colors {
    use super::maybe_color_stderr;
    use colored::Colorize;

    /// Color for error-level messages (critical failures)
    pub fn error_level(text: &str) -> String {
        maybe_color_stderr(text, |s| s.red().bold())
    }

    /// Color for warning-level messages
    pub fn warning_level(text: &str) -> String {
        maybe_color_stderr(text, |s| s.yellow())
    }

    /// Color for metric values in summary lines
    pub fn metric_value(text: &str) -> String {
        maybe_color_stderr(text, |s| s.green().bold())
    }
}

/// Semantic symbols for different operation types and states
pub mod symbols {
    use super::colors_enabled;

    /// Symbol for starting an evaluation run
    pub fn evaluation_start() -> &'static str {
        if colors_enabled() {
            "📐"
        } else {
            "[EVAL]"
        }
    }

    /// Symbol for starting a batch inference run
    pub fn inference_start() -> &'static str {
        if colors_enabled() {
            "🔮"
        } else {
            "[INFER]"
        }
    }

    /// Symbol for starting an overlay rendering run
    pub fn visualization_start() -> &'static str {
        if colors_enabled() {
            "🎨"
        } else {
            "[VIZ]"
        }
    }

    /// Symbol for operation failures
    pub fn operation_failed() -> &'static str {
        if colors_enabled() {
            "❌"
        } else {
            "[FAILED]"
        }
    }

    /// Symbol for successful completion
    pub fn completed_successfully() -> &'static str {
        if colors_enabled() {
            "✅"
        } else {
            "[SUCCESS]"
        }
    }

    /// Symbol for finding/targeting resources
    pub fn resources_found() -> &'static str {
        if colors_enabled() {
            "🎯"
        } else {
            ""
        }
    }

    /// Symbol for warnings
    pub fn warning() -> &'static str {
        if colors_enabled() {
            "⚠️ "
        } else {
            ""
        }
    }
}

/// Batch progress bars, TTY-gated and styled to match the color config.
///
/// All bars attach to one shared `MultiProgress` so overlapping batch loops
/// never interleave their redraws on stderr.
pub mod progress {
    use super::colors_enabled;
    use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
    use once_cell::sync::Lazy;
    use std::io::{stderr, IsTerminal};

    static BATCH_BARS: Lazy<MultiProgress> = Lazy::new(MultiProgress::new);

    /// Create a progress bar for a batch loop.
    ///
    /// Returns `None` for single-batch runs and whenever stderr is not a
    /// terminal, so piped output stays clean.
    pub fn create_batch_progress_bar(total: usize) -> Option<ProgressBar> {
        if total <= 1 || !stderr().is_terminal() {
            return None;
        }

        let pb = BATCH_BARS.add(ProgressBar::new(total as u64));
        let style = if colors_enabled() {
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:30.green/black}] ({percent}%) {msg}")
                .unwrap()
                .progress_chars("█▓▒░")
        } else {
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:30}] ({percent}%) {msg}")
                .unwrap()
                .progress_chars("#> ")
        };
        pb.set_style(style);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Some(pb)
    }

    /// Clear a finished batch progress bar and detach it from the shared set.
    pub fn finish_batch_progress_bar(pb: ProgressBar) {
        pb.finish_and_clear();
        BATCH_BARS.remove(&pb);
    }
}
