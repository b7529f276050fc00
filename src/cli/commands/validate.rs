//! Validate command - run the configured steps once per tree state

use crate::cli::args::ValidateArgs;
use crate::cli::commands::{current_dir, run_migration, short_hash};
use crate::config::Config;
use crate::error::{VibeError, VibeResult};
use crate::extract::LineExtractor;
use crate::fingerprint::{FingerprintSource, SystemLiveness, TreeFingerprinter};
use crate::history::{HealthChecker, HistoryStore, ValidationRun};
use crate::runner::{RunMode, RunOutcome, RunRequest, Runner, ShellRunner};
use crate::ui::{self, StepProgress, UiContext};
use crate::vcs::GitCli;
use chrono::Utc;
use std::time::Instant;
use tracing::warn;

/// Execute the validate command
pub async fn execute(args: ValidateArgs, config: &Config) -> VibeResult<i32> {
    let ctx = UiContext::detect();
    let vcs = GitCli::new();
    let liveness = SystemLiveness;
    let fingerprinter = TreeFingerprinter::new(&vcs, &liveness)
        .with_grace_period(config.cache.shadow_grace_period());

    let fingerprint = fingerprinter.compute(&current_dir()?).await?;
    let tree = fingerprint.root_hash.clone();
    // Submodule working trees are not in the root hash
    let identity = fingerprint.cache_identity();
    run_migration(&ctx, &vcs, &fingerprint.repo_root).await;

    let history = HistoryStore::new(&vcs, &fingerprint.repo_root)
        .with_max_runs_per_tree(config.history.max_runs_per_tree);
    let already_passed = if config.history.enabled {
        history
            .read(&tree)
            .await?
            .map(|note| note.has_passing_run_for(&identity))
            .unwrap_or(false)
    } else {
        false
    };

    if args.check {
        return Ok(if already_passed {
            ui::step_ok_detail(&ctx, "Validation already passed", short_hash(&tree));
            0
        } else {
            ui::step_info(&ctx, "No passing validation recorded for this tree");
            1
        });
    }

    if already_passed && !args.force {
        ui::step_ok_detail(
            &ctx,
            "Validation already passed for this tree",
            short_hash(&tree),
        );
        return Ok(0);
    }

    let steps = &config.validation.steps;
    if steps.is_empty() {
        return Err(VibeError::NoValidationSteps);
    }

    ui::section(&ctx, &format!("Validating tree {}", short_hash(&tree)));
    let extractor = LineExtractor::new()?;
    let runner = Runner::new(&fingerprinter, &vcs, &ShellRunner, &extractor)
        .with_cache_enabled(config.cache.enabled);
    let mode = if args.force {
        RunMode::Force
    } else {
        RunMode::Default
    };

    let started = Instant::now();
    let mut progress = StepProgress::new(&ctx, steps.len());
    let mut failed_step: Option<String> = None;

    for step in steps {
        if failed_step.is_some() && config.validation.fail_fast {
            progress.println(&format!("  [-] {} (skipped after failure)", step.name));
            continue;
        }

        progress.start_step(&step.name);
        let request = RunRequest::new(&step.command, &fingerprint.repo_root)
            .with_cwd(step.cwd.clone())
            .with_mode(mode);
        let outcome = runner.run_with(&fingerprint, &request).await?;

        let cached = matches!(outcome, RunOutcome::Hit(_));
        if outcome.exit_code() == 0 {
            let suffix = if cached { " (cached)" } else { "" };
            progress.println(&format!("  [OK] {}{}", step.name, suffix));
        } else {
            progress.println(&format!(
                "  [FAIL] {} (exit code {})",
                step.name,
                outcome.exit_code()
            ));
            if let Some(record) = outcome.record() {
                print!("{}", record.to_document()?);
            }
            failed_step.get_or_insert_with(|| step.name.clone());
        }

        if let RunOutcome::Executed {
            cache_error: Some(reason),
            ..
        } = &outcome
        {
            progress.println(&format!("  [WARN] {} not cached: {}", step.name, reason));
        }
    }
    progress.finish();

    let passed = failed_step.is_none();
    let elapsed = started.elapsed().as_millis() as u64;

    if config.history.enabled {
        let run = ValidationRun::new(identity.as_str(), passed, elapsed, failed_step.clone());
        if let Err(e) = history.record(&tree, run).await {
            warn!("Validation result not recorded in history: {}", e);
        }

        let health = HealthChecker::new(&history)
            .with_limits(config.history.stale_after_days, config.history.max_entries)
            .check(Utc::now())
            .await;
        if let Some(suggestion) = health.suggestion(config.history.stale_after_days) {
            ui::remark(&ctx, &suggestion);
        }
    }

    match failed_step {
        None => {
            ui::step_ok_detail(&ctx, "Validation passed", short_hash(&tree));
            Ok(0)
        }
        Some(name) => {
            ui::step_error_detail(&ctx, "Validation failed", &name);
            Ok(1)
        }
    }
}
