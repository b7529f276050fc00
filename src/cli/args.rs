//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// vibe-validate - Content-addressed command cache for git repositories
///
/// Runs a command once per working tree state and replays the recorded
/// result until a file changes.
#[derive(Parser, Debug)]
#[command(name = "vibe-validate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "VIBE_VALIDATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip project vibe-validate.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command, replaying a cached result when the tree is unchanged
    Run(RunArgs),

    /// Run the configured validation steps and record the result
    Validate(ValidateArgs),

    /// Inspect and prune validation history
    History(HistoryArgs),

    /// Inspect or clear the run cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory to run in, relative to the current directory
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Always run and refresh the cached result
    #[arg(long, conflicts_with = "check")]
    pub force: bool,

    /// Only report whether a cached result exists (exit 0 hit, 1 miss)
    #[arg(long)]
    pub check: bool,

    /// Command to run
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

impl RunArgs {
    /// The command as one shell string
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Re-run even if this tree already passed
    #[arg(long, conflicts_with = "check")]
    pub force: bool,

    /// Only report whether this tree already passed (exit 0 yes, 1 no)
    #[arg(long)]
    pub check: bool,
}

/// Arguments for the history command
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub action: HistoryAction,
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List trees with recorded validations
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the recorded runs for a tree (defaults to the current tree)
    Show {
        /// Tree hash
        tree: Option<String>,
    },

    /// Remove old history entries
    Prune {
        /// Remove entries whose newest run is older than N days (default: from config)
        #[arg(long)]
        older_than: Option<u32>,

        /// Remove all history
        #[arg(long, conflicts_with = "older_than")]
        all: bool,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check history size and staleness
    Health,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached runs
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete every cached run
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.enabled)
        key: String,
        /// Value to set
        value: String,
        /// Write to vibe-validate.toml in the current directory instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
