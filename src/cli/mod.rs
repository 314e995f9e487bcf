//! CLI argument definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ambiance deck - render declarative ambiance environments onto Stream Deck keys.
///
/// Robot Mode: Use --robot or --format=json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "ambiance", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "AMBIANCE_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json, with JSON logs
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List connected Stream Deck devices
    Devices,

    /// Render every environment of a configuration onto a deck
    Run(RunArgs),

    /// Check a configuration and report every problem found
    Validate(ValidateArgs),

    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Target device id (serial number); defaults to the first deck found
    #[arg(long, short = 'd', env = "AMBIANCE_DECK")]
    pub deck: Option<String>,

    /// Display brightness applied after reset (0-100)
    #[arg(long, short = 'b', default_value = "100", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: u8,

    /// Label font (6x10, 6x13, 7x13-bold, 8x13, 9x15, 10x20)
    #[arg(long, env = "AMBIANCE_FONT")]
    pub font: Option<String>,

    /// Skip keys whose image cannot be prepared instead of aborting
    #[arg(long, short = 'c')]
    pub continue_on_error: bool,

    /// Show only the environments that fit instead of failing
    #[arg(long)]
    pub truncate: bool,

    /// Keep the session open for SECS seconds, logging key presses
    #[arg(long, value_name = "SECS")]
    pub hold: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
