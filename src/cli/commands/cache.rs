//! Cache command - inspect or clear cached runs

use crate::cache::{CacheEntryRef, RunCacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::commands::{current_dir, repo_root, short_hash};
use crate::config::Config;
use crate::error::{VibeError, VibeResult};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::vcs::GitCli;
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, _config: &Config) -> VibeResult<i32> {
    let ctx = UiContext::detect();
    let vcs = GitCli::new();
    let root = repo_root(&vcs, &current_dir()?).await?;
    let store = RunCacheStore::new(&vcs, &root);

    match args.action {
        CacheAction::List { format } => {
            let entries = store.list().await?;
            list_entries(&ctx, &entries, format)?;
        }
        CacheAction::Clear { yes } => {
            let ctx = ctx.with_auto_yes(yes);
            clear(&ctx, &store).await?;
        }
    }
    Ok(0)
}

async fn clear(ctx: &UiContext, store: &RunCacheStore<'_>) -> VibeResult<()> {
    let entries = store.list().await?;
    if entries.is_empty() {
        ui::step_info(ctx, "Run cache is already empty");
        return Ok(());
    }

    let prompt = format!("Delete {} cached run(s)?", entries.len());
    if !ui::confirm(ctx, &prompt, false).await? {
        return Err(VibeError::User(
            "Aborted. Pass --yes to clear without a prompt".to_string(),
        ));
    }

    let mut spinner = TaskSpinner::new(ctx);
    spinner.start("Clearing run cache...");
    match store.clear().await {
        Ok(count) => {
            spinner.stop(&format!("Removed {} cached run(s)", count));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Failed to clear run cache");
            Err(e)
        }
    }
}

fn list_entries(
    ctx: &UiContext,
    entries: &[CacheEntryRef],
    format: OutputFormat,
) -> VibeResult<()> {
    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(ctx, "No cached runs"),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            println!("{:<14} {:<34}", style("TREE").bold(), style("KEY").bold());
            println!("{}", "-".repeat(48));
            for entry in entries {
                println!("{:<14} {:<34}", short_hash(&entry.identity), entry.key);
            }
            println!();
            println!("Total: {} cached run(s)", entries.len());
        }
        OutputFormat::Json => print_json(entries)?,
        OutputFormat::Plain => {
            for entry in entries {
                println!("{}", entry.refname);
            }
        }
    }
    Ok(())
}

fn print_json(entries: &[CacheEntryRef]) -> VibeResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        tree: &'a str,
        key: &'a str,
        r#ref: &'a str,
    }

    let json: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            tree: &e.identity,
            key: &e.key,
            r#ref: &e.refname,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
