//! Terminal output helpers
//!
//! Uses `cliclack` for prompts and status lines with automatic fallback to
//! plain tagged lines in CI or when stderr is not a terminal. Nothing here
//! writes to stdout.
//!
//! # Example
//!
//! ```rust,ignore
//! use vibe_validate::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect().with_auto_yes(args.yes);
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Clearing run cache...");
//! // ... do work ...
//! spinner.stop("Removed 12 cached runs");
//!
//! ui::step_warn_hint(&ctx, "History is stale", "Run: vibe-validate history prune");
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    key_value_status, remark, section, step_error_detail, step_info, step_ok, step_ok_detail,
    step_warn, step_warn_hint,
};
pub use progress::{StepProgress, TaskSpinner};
pub use prompts::confirm;
