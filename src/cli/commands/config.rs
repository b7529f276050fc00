//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::cli::commands::current_dir;
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{VibeError, VibeResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;
use tokio::fs;

/// Keys accepted by `config set`
const VALID_KEYS: [&str; 8] = [
    "general.log_format",
    "cache.enabled",
    "cache.shadow_grace_secs",
    "history.enabled",
    "history.stale_after_days",
    "history.max_entries",
    "history.max_runs_per_tree",
    "validation.fail_fast",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    config_path: Option<PathBuf>,
) -> VibeResult<i32> {
    let manager = match config_path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };

    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(&manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            if local {
                set_local_value(&key, &value).await?
            } else {
                set_value(&manager, &key, &value).await?
            }
        }
    }

    Ok(0)
}

fn show_config(config: &Config) -> VibeResult<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> VibeResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Set a key in the global file, keeping everything else it contains
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> VibeResult<()> {
    let ctx = UiContext::detect();
    let mut config = manager.load().await?;

    match key.split('.').collect::<Vec<_>>().as_slice() {
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,
        ["cache", "enabled"] => config.cache.enabled = parse_bool(value)?,
        ["cache", "shadow_grace_secs"] => config.cache.shadow_grace_secs = parse_number(value)?,
        ["history", "enabled"] => config.history.enabled = parse_bool(value)?,
        ["history", "stale_after_days"] => config.history.stale_after_days = parse_number(value)?,
        ["history", "max_entries"] => config.history.max_entries = parse_number(value)?,
        ["history", "max_runs_per_tree"] => {
            config.history.max_runs_per_tree = parse_number(value)?
        }
        ["validation", "fail_fast"] => config.validation.fail_fast = parse_bool(value)?,
        _ => return Err(unknown_key(&ctx, key)),
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

/// Set a key in the project file, writing only keys the user set
async fn set_local_value(key: &str, value: &str) -> VibeResult<()> {
    let ctx = UiContext::detect();
    if !VALID_KEYS.contains(&key) {
        return Err(unknown_key(&ctx, key));
    }

    let local_path = current_dir()?.join(LOCAL_CONFIG_FILE);
    let mut doc: toml::Value = if local_path.exists() {
        let content = fs::read_to_string(&local_path)
            .await
            .map_err(|e| VibeError::io(format!("reading {}", local_path.display()), e))?;
        toml::from_str(&content).map_err(|e| VibeError::ConfigInvalid {
            path: local_path.clone(),
            reason: e.to_string(),
        })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, value)?;

    // The merged result must still be a valid configuration
    let _: Config = doc.clone().try_into().map_err(|e: toml::de::Error| {
        VibeError::ConfigInvalid {
            path: local_path.clone(),
            reason: e.to_string(),
        }
    })?;

    fs::write(&local_path, toml::to_string_pretty(&doc)?)
        .await
        .map_err(|e| VibeError::io(format!("writing {}", local_path.display()), e))?;

    ui::step_ok(
        &ctx,
        &format!("Set {} = {} in {}", key, value, local_path.display()),
    );
    Ok(())
}

fn unknown_key(ctx: &UiContext, key: &str) -> VibeError {
    ui::remark(ctx, &format!("Valid keys: {}", VALID_KEYS.join(", ")));
    VibeError::User(format!("Unknown config key: {}", key))
}

/// Set a dot-separated key in a TOML value tree, creating intermediate tables as needed
fn set_toml_value(doc: &mut toml::Value, key: &str, value: &str) -> VibeResult<()> {
    let Some((path, leaf)) = key.rsplit_once('.') else {
        return Err(VibeError::User(format!("Expected section.key, got: {}", key)));
    };

    let mut current = doc;
    for part in path.split('.') {
        current = current
            .as_table_mut()
            .ok_or_else(|| VibeError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    let table = current
        .as_table_mut()
        .ok_or_else(|| VibeError::User(format!("Expected table for key: {}", key)))?;

    let toml_value = if let Ok(flag) = value.parse::<bool>() {
        toml::Value::Boolean(flag)
    } else if let Ok(n) = value.parse::<i64>() {
        toml::Value::Integer(n)
    } else {
        toml::Value::String(value.to_string())
    };

    table.insert(leaf.to_string(), toml_value);
    Ok(())
}

fn parse_bool(value: &str) -> VibeResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(VibeError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> VibeResult<T> {
    value
        .parse()
        .map_err(|_| VibeError::User(format!("Invalid number: {}", value)))
}

fn parse_log_format(value: &str) -> VibeResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(VibeError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}
