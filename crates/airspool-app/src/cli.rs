// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use airspool_core::config::CONFIG_ENV_VAR;
use airspool_core::types::{JobId, LogVerbosity, ManagedService};

#[derive(Parser, Debug)]
#[command(
    name = "airspool",
    version,
    about = "Reconcile USB printers into CUPS queues and AirPrint advertisements",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Fleet configuration file (default: /etc/airspool/fleet.toml).
    #[arg(long, global = true, value_name = "PATH", env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Machine-readable JSON output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Answer yes to confirmation prompts.
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Debug logging (repeat for trace).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan devices, bring queues in line with the config, and sync AirPrint.
    Reconcile {
        /// Print the plan without changing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Services, queues, and advertisement state.
    Status,

    /// List print jobs.
    #[command(alias = "jobs")]
    Queues {
        /// Show finished jobs instead of active ones.
        #[arg(long)]
        completed: bool,
    },

    /// Cancel every active job on a queue (all queues when omitted).
    Clear { queue: Option<String> },

    /// Cancel one job by number or `queue-number`.
    Cancel { job: JobId },

    /// Restart the print or advertisement daemon.
    Restart { service: ServiceArg },

    /// Attached printers and the queues they map to.
    Devices,

    /// Tail the CUPS error log.
    Logs {
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },

    /// Temperature, memory, disk, and uptime with severity bands.
    Health,

    /// Print the CUPS test page on a queue.
    TestPage { queue: String },

    /// Show or change CUPS log verbosity.
    Verbosity { level: Option<VerbosityArg> },

    /// Delete finished job files older than the retention period.
    Cleanup(CleanupArgs),

    /// Remove a queue and withdraw its AirPrint advertisement.
    Remove { queue: String },

    /// Search the driver catalog.
    Drivers { filter: Option<String> },

    /// AirPrint advertisement checks.
    Advertise {
        #[command(subcommand)]
        command: AdvertiseCommand,
    },

    /// Recent operations journal entries.
    Journal {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Retention in days (default from config).
    #[arg(long)]
    pub days: Option<u32>,

    /// Cancel active jobs first so their files are cleaned too.
    #[arg(long)]
    pub cancel_pending: bool,
}

#[derive(Subcommand, Debug)]
pub enum AdvertiseCommand {
    /// Browse mDNS and report which published queues are visible.
    Verify {
        /// Browse time in seconds.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ServiceArg {
    Cups,
    Avahi,
}

impl From<ServiceArg> for ManagedService {
    fn from(value: ServiceArg) -> Self {
        match value {
            ServiceArg::Cups => ManagedService::Cups,
            ServiceArg::Avahi => ManagedService::Avahi,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum VerbosityArg {
    Normal,
    Verbose,
    Toggle,
}

impl VerbosityArg {
    pub fn level(self) -> Option<LogVerbosity> {
        match self {
            Self::Normal => Some(LogVerbosity::Normal),
            Self::Verbose => Some(LogVerbosity::Verbose),
            Self::Toggle => None,
        }
    }
}
