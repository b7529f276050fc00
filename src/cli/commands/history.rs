//! History command - inspect and prune validation history

use crate::cli::args::{HistoryAction, HistoryArgs, OutputFormat};
use crate::cli::commands::{current_dir, repo_root, run_migration, short_hash};
use crate::config::Config;
use crate::error::{VibeError, VibeResult};
use crate::fingerprint::{FingerprintSource, SystemLiveness, TreeFingerprinter};
use crate::history::{HealthChecker, HistoryNote, HistoryStore};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::vcs::GitCli;
use chrono::{Duration, Utc};
use console::style;

/// Execute the history command
pub async fn execute(args: HistoryArgs, config: &Config) -> VibeResult<i32> {
    let ctx = UiContext::detect();
    let vcs = GitCli::new();
    let cwd = current_dir()?;
    let root = repo_root(&vcs, &cwd).await?;
    run_migration(&ctx, &vcs, &root).await;

    let store = HistoryStore::new(&vcs, &root)
        .with_max_runs_per_tree(config.history.max_runs_per_tree);

    match args.action {
        HistoryAction::List { format } => {
            let notes = store.list().await?;
            list_notes(&ctx, &notes, format)?;
            Ok(0)
        }
        HistoryAction::Show { tree } => {
            let tree = match tree {
                Some(tree) => tree,
                None => {
                    let liveness = SystemLiveness;
                    TreeFingerprinter::new(&vcs, &liveness)
                        .with_grace_period(config.cache.shadow_grace_period())
                        .compute(&cwd)
                        .await?
                        .root_hash
                }
            };
            match store.read(&tree).await? {
                Some(note) => {
                    print!("{}", serde_yaml_ng::to_string(&note)?);
                    Ok(0)
                }
                None => {
                    ui::step_info(&ctx, &format!("No history for tree {}", short_hash(&tree)));
                    Ok(1)
                }
            }
        }
        HistoryAction::Prune {
            older_than,
            all,
            dry_run,
            yes,
        } => {
            let ctx = ctx.with_auto_yes(yes);
            prune(&ctx, &store, config, older_than, all, dry_run).await?;
            Ok(0)
        }
        HistoryAction::Health => {
            let health = HealthChecker::new(&store)
                .with_limits(config.history.stale_after_days, config.history.max_entries)
                .check(Utc::now())
                .await;

            ui::key_value_status(
                &ctx,
                "Entries",
                &health.total_entries.to_string(),
                health.total_entries <= config.history.max_entries,
            );
            ui::key_value_status(
                &ctx,
                "Stale entries",
                &health.stale_entries.to_string(),
                health.stale_entries == 0,
            );
            if let Some(suggestion) = health.suggestion(config.history.stale_after_days) {
                ui::step_warn(&ctx, &suggestion);
            }
            // Advisory only
            Ok(0)
        }
    }
}

async fn prune(
    ctx: &UiContext,
    store: &HistoryStore<'_>,
    config: &Config,
    older_than: Option<u32>,
    all: bool,
    dry_run: bool,
) -> VibeResult<()> {
    if all {
        if !dry_run
            && !ui::confirm(ctx, "Delete all validation history?", false).await?
        {
            return Err(VibeError::User(
                "Aborted. Pass --yes to delete without a prompt".to_string(),
            ));
        }

        let count = store.prune_all(dry_run).await?;
        let verb = if dry_run { "Would remove" } else { "Removed" };
        ui::step_ok(ctx, &format!("{} history for {} tree(s)", verb, count));
        return Ok(());
    }

    let days = older_than.unwrap_or(config.history.stale_after_days);
    let threshold = Utc::now() - Duration::days(i64::from(days));

    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!("Pruning history older than {} days...", days));
    let report = match store.prune(threshold, dry_run).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Prune failed");
            return Err(e);
        }
    };

    let verb = if dry_run { "Would remove" } else { "Removed" };
    spinner.stop(&format!(
        "{} {} entr{}, kept {}",
        verb,
        report.removed.len(),
        if report.removed.len() == 1 { "y" } else { "ies" },
        report.kept
    ));
    if report.trimmed_runs > 0 {
        let verb = if dry_run { "Would trim" } else { "Trimmed" };
        ui::remark(
            ctx,
            &format!(
                "{} {} old run(s) beyond {} per tree",
                verb, report.trimmed_runs, config.history.max_runs_per_tree
            ),
        );
    }
    if dry_run {
        for tree in &report.removed {
            ui::remark(ctx, tree);
        }
    }
    Ok(())
}

fn list_notes(ctx: &UiContext, notes: &[HistoryNote], format: OutputFormat) -> VibeResult<()> {
    if notes.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(ctx, "No validation history"),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(notes),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(notes)?),
        OutputFormat::Plain => {
            for note in notes {
                println!("{}", note.tree_hash);
            }
        }
    }
    Ok(())
}

fn print_table(notes: &[HistoryNote]) {
    println!(
        "{:<14} {:<6} {:<18} {:<10}",
        style("TREE").bold(),
        style("RUNS").bold(),
        style("LAST RUN").bold(),
        style("STATUS").bold()
    );
    println!("{}", "-".repeat(50));

    for note in notes {
        let (last_run, status) = match note.latest() {
            Some(run) if run.passed => (
                run.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                style("passed").green(),
            ),
            Some(run) => (
                run.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                style("failed").red(),
            ),
            None => ("-".to_string(), style("empty").dim()),
        };

        println!(
            "{:<14} {:<6} {:<18} {:<10}",
            short_hash(&note.tree_hash),
            note.runs.len(),
            last_run,
            status
        );
    }

    println!();
    println!("{} tree(s)", notes.len());
}
