//! Clap derive structures for the `unibouncer` daemon.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unibouncer -- enforce CrowdSec decisions on a UniFi gateway
#[derive(Debug, Parser)]
#[command(
    name = "unibouncer",
    version,
    about = "Enforce CrowdSec decisions through UniFi firewall groups",
    long_about = "Pulls ban decisions from a CrowdSec Local API and mirrors them into\n\
        address groups on a UniFi controller, wired into drop rules (legacy\n\
        firewall) or block policies (zone-based firewall).",
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
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, short = 'c', env = "UNIBOUNCER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(
        long,
        env = "UNIBOUNCER_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bouncer until interrupted
    Run,

    /// Validate the config, connect, and report the managed groups
    Check,

    /// Write a starter config file
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing file
    #[arg(long, short = 'f')]
    pub force: bool,
}
