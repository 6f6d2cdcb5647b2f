//! Clap derive structures for the `nightsync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// nightsync -- drive a NightDriver LED controller from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "nightsync",
    version,
    about = "Control NightDriver LED devices from the command line",
    long_about = "Browse and switch effects, edit device settings, and watch live\n\
        statistics on a NightDriver LED controller over its HTTP API.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'd', env = "NIGHTSYNC_DEVICE", global = true)]
    pub device: Option<String>,

    /// Device base URL or "current" (overrides profile)
    #[arg(long, short = 'a', env = "NIGHTSYNC_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Request timeout in milliseconds (overrides profile)
    #[arg(long, env = "NIGHTSYNC_TIMEOUT_MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NIGHTSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Colorize tables and watch output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print errors only
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Bordered table
    Table,
    /// Pretty-printed JSON
    Json,
    /// JSON on one line
    JsonCompact,
    /// One line per item
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List effects with the running one and its progress
    #[command(alias = "ls")]
    Effects,

    /// Switch to the next effect
    Next,

    /// Switch to the previous effect
    Prev,

    /// Switch to the effect at INDEX
    Goto {
        /// Zero-based effect index
        index: usize,
    },

    /// Enable the effect at INDEX
    Enable {
        /// Zero-based effect index
        index: usize,
    },

    /// Disable the effect at INDEX
    Disable {
        /// Zero-based effect index
        index: usize,
    },

    /// Flip the enabled state of the effect at INDEX
    Toggle {
        /// Zero-based effect index
        index: usize,
    },

    /// Show device settings with their descriptions
    Settings,

    /// Change one device setting
    Set {
        /// Setting key as reported by the device
        key: String,
        /// New value, converted using the setting's declared type
        value: String,
    },

    /// Show a device statistics snapshot
    Stats,

    /// Stream effect progress, statistics, and errors until Ctrl-C
    Watch(WatchArgs),

    /// Show or change local site options
    Site(SiteArgs),

    /// List configured device profiles
    Devices,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Track progress of one effect slot instead of the running effect
    #[arg(long)]
    pub slot: Option<usize>,

    /// Statistic keys to chart (default: every numeric statistic)
    #[arg(long, short = 'k', value_delimiter = ',')]
    pub keys: Vec<String>,
}

// ── Site ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SiteArgs {
    #[command(subcommand)]
    pub command: Option<SiteCommand>,
}

#[derive(Debug, Subcommand)]
pub enum SiteCommand {
    /// Show site options (default)
    Show,

    /// Change a site option
    Set {
        /// Option key (statsRefreshRate, statsAnimateChange, maxSamples, UIMode)
        key: String,
        value: String,
    },
}
