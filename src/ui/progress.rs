//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            eprintln!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            eprintln!("{} {}", style("✓").green(), message);
        } else {
            eprintln!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else if self.interactive {
            eprintln!("{} {}", style("✗").red(), message);
        } else {
            eprintln!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

const BAR_TEMPLATE: &str =
    "  {spinner:.cyan} Validating  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}";

/// Progress bar over the steps of a validation.
///
/// Draws an indicatif bar in interactive mode and one plain line per step
/// otherwise.
pub struct StepProgress {
    bar: Option<ProgressBar>,
    total: u64,
    position: u64,
}

impl StepProgress {
    pub fn new(ctx: &UiContext, total: usize) -> Self {
        let total = total as u64;
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(total);
            let template = ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .map(|s| s.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ").progress_chars("━╸─"));
            // An unusable template just means no bar
            match template {
                Ok(style) => {
                    bar.set_style(style);
                    bar.enable_steady_tick(std::time::Duration::from_millis(120));
                    Some(bar)
                }
                Err(_) => None,
            }
        } else {
            None
        };
        Self {
            bar,
            total,
            position: 0,
        }
    }

    /// Announce the next step
    pub fn start_step(&mut self, name: &str) {
        self.position += 1;
        match &self.bar {
            Some(bar) => {
                bar.set_position(self.position - 1);
                bar.set_message(name.to_string());
            }
            None => eprintln!("  STEP {}/{}: {}", self.position, self.total, name),
        }
    }

    /// Print a line above the bar
    pub fn println(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}
