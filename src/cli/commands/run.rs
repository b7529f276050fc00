//! Run command - execute a command through the run cache

use crate::cli::args::RunArgs;
use crate::cli::commands::current_dir;
use crate::config::Config;
use crate::error::VibeResult;
use crate::extract::LineExtractor;
use crate::fingerprint::{SystemLiveness, TreeFingerprinter};
use crate::runner::{RunMode, RunOutcome, RunRequest, Runner, ShellRunner};
use crate::ui::{self, UiContext};
use crate::vcs::GitCli;
use std::io::Write;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> VibeResult<i32> {
    let ctx = UiContext::detect();
    let vcs = GitCli::new();
    let liveness = SystemLiveness;
    let fingerprinter = TreeFingerprinter::new(&vcs, &liveness)
        .with_grace_period(config.cache.shadow_grace_period());
    let extractor = LineExtractor::new()?;
    let runner = Runner::new(&fingerprinter, &vcs, &ShellRunner, &extractor)
        .with_cache_enabled(config.cache.enabled);

    let mode = if args.check {
        RunMode::Check
    } else if args.force {
        RunMode::Force
    } else {
        RunMode::Default
    };
    let request = RunRequest::new(args.command_line(), current_dir()?)
        .with_cwd(args.cwd.clone())
        .with_mode(mode);

    let outcome = runner.run(&request).await?;
    report(&ctx, &outcome)?;
    Ok(outcome.exit_code())
}

/// Replay output on stderr, print the record on stdout, then any cache warning
pub(crate) fn report(ctx: &UiContext, outcome: &RunOutcome) -> VibeResult<()> {
    if let Some(execution) = outcome.execution() {
        let mut stderr = std::io::stderr().lock();
        if !execution.nested {
            stderr.write_all(execution.output.stdout.as_bytes()).ok();
        }
        stderr.write_all(execution.output.stderr.as_bytes()).ok();
    }

    if let Some(record) = outcome.record() {
        print!("{}", record.to_document()?);
        std::io::stdout().flush().ok();
    }

    match outcome {
        RunOutcome::CheckHit => ui::step_ok(ctx, "Cached result available"),
        RunOutcome::CheckMiss => ui::step_info(ctx, "No cached result for this tree"),
        RunOutcome::Executed {
            cache_error: Some(reason),
            ..
        } => ui::step_warn_hint(ctx, "Result was not cached", reason),
        _ => {}
    }
    Ok(())
}
