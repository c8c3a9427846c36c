// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Airspool: USB printer fleet reconciler for CUPS and Avahi
//
// Entry point. Initialises logging, loads the fleet config, wires the host
// backends, and dispatches one command.

mod cli;
mod render;

use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use airspool_bridge::SystemBridge;
use airspool_core::config::FleetConfig;
use airspool_core::error::{AirspoolError, Result};
use airspool_core::hints::operator_hint;
use airspool_core::types::{JobFilter, ManagedService};
use airspool_fleet::console::VerbosityRequest;
use airspool_fleet::journal::Journal;
use airspool_fleet::{Console, pipeline};

use cli::{AdvertiseCommand, Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("hint: {}", operator_hint(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let path = FleetConfig::resolve_path(cli.config.as_deref());
    let config = FleetConfig::load(&path)?;
    tracing::debug!(path = %path.display(), printers = config.printers.len(), "config loaded");

    let journal = match Journal::open(&config.paths.journal) {
        Ok(j) => Some(j),
        Err(e) => {
            tracing::warn!(error = %e, "journal unavailable; continuing without it");
            None
        }
    };

    let bridge = SystemBridge::from_config(&config);
    let backends = bridge.backends();

    let console = Console::new(backends, &config, journal.as_ref());

    match &cli.command {
        Command::Reconcile { dry_run } => {
            let report = pipeline::run(&config, &backends, journal.as_ref(), *dry_run);
            emit(cli, &report, render::pipeline)?;
            return Ok(ExitCode::from(report.outcome.exit_code() as u8));
        }
        Command::Status => emit(cli, &console.status()?, render::status)?,
        Command::Queues { completed } => {
            let filter = if *completed { JobFilter::Completed } else { JobFilter::Active };
            emit(cli, &console.jobs(filter)?, |jobs| render::jobs(jobs))?;
        }
        Command::Clear { queue } => {
            let target = queue.as_deref().unwrap_or("all queues");
            if !confirm(cli, &format!("Cancel every active job on {target}?"))? {
                return Ok(declined());
            }
            emit(cli, &console.clear(queue.as_deref(), true)?, |c| render::cleared(c))?;
        }
        Command::Cancel { job } => {
            console.cancel(*job)?;
            emit(cli, &job.0, |id| format!("Job {id} cancelled."))?;
        }
        Command::Restart { service } => {
            let service: ManagedService = (*service).into();
            console.restart(service)?;
            emit(cli, &service, |s| format!("{s} restarted."))?;
        }
        Command::Devices => emit(cli, &console.devices()?, |rows| render::devices(rows))?,
        Command::Logs { lines } => emit(cli, &console.logs(*lines)?, |lines| lines.join("\n"))?,
        Command::Health => emit(cli, &console.health()?, render::health)?,
        Command::TestPage { queue } => {
            let job = console.test_page(queue)?;
            emit(cli, &job.0, |id| format!("Test page submitted to {queue} as job {id}."))?;
        }
        Command::Verbosity { level } => {
            let request = match level {
                None => VerbosityRequest::Show,
                Some(arg) => arg.level().map_or(VerbosityRequest::Toggle, VerbosityRequest::Set),
            };
            emit(cli, &console.verbosity(request)?, |l| render::verbosity(*l))?;
        }
        Command::Cleanup(args) => {
            let plan = console.cleanup_preview(args.days)?;
            if plan.delete.is_empty() && !args.cancel_pending {
                emit(cli, &plan, render::cleanup_plan)?;
                return Ok(ExitCode::SUCCESS);
            }
            if !cli.json {
                println!("{}", render::cleanup_plan(&plan));
            }
            let question = if args.cancel_pending {
                "Cancel active jobs and delete these files?"
            } else {
                "Delete these files?"
            };
            if !confirm(cli, question)? {
                return Ok(declined());
            }
            let report = console.cleanup(args.days, args.cancel_pending, true)?;
            emit(cli, &report, render::cleanup_report)?;
        }
        Command::Remove { queue } => {
            if !confirm(cli, &format!("Remove queue {queue} and its AirPrint advertisement?"))? {
                return Ok(declined());
            }
            let withdrawn = console.remove(queue, true)?;
            emit(cli, &withdrawn, |w| {
                if w.is_empty() {
                    format!("Queue {queue} removed.")
                } else {
                    format!("Queue {queue} removed; withdrew {}.", w.join(", "))
                }
            })?;
        }
        Command::Drivers { filter } => {
            emit(cli, &console.drivers(filter.as_deref())?, |d| render::drivers(d))?
        }
        Command::Advertise {
            command: AdvertiseCommand::Verify { timeout },
        } => {
            let report = console.verify_advertisements(Duration::from_secs(*timeout))?;
            emit(cli, &report, render::visibility)?;
            if !report.missing.is_empty() {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Journal { limit } => emit(cli, &console.journal(*limit)?, |e| render::journal(e))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Print a result as JSON or through its text renderer.
fn emit<T, F>(cli: &Cli, value: &T, text: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    if cli.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

/// Ask on the terminal unless `--yes` was given. EOF counts as no.
fn confirm(cli: &Cli, question: &str) -> Result<bool> {
    if cli.yes {
        return Ok(true);
    }
    if cli.json {
        return Err(AirspoolError::ConfirmationRequired);
    }
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn declined() -> ExitCode {
    println!("Nothing changed.");
    ExitCode::FAILURE
}
