// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text rendering of command results. `--json` bypasses this module.

use airspool_core::types::{Diagnostic, DriverEntry, JobState, LogVerbosity, PrintJob};
use airspool_fleet::console::{ClearedQueue, DeviceRow, StatusReport};
use airspool_fleet::discovery::VisibilityReport;
use airspool_fleet::health::HealthSnapshot;
use airspool_fleet::journal::JournalEntry;
use airspool_fleet::reconciler::{QueueChange, StepStatus};
use airspool_fleet::spool::{CleanupPlan, CleanupReport};
use airspool_fleet::{PipelineReport, PlanStep, RunOutcome};

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn change_text(change: &QueueChange) -> String {
    match change {
        QueueChange::Create => "create".into(),
        QueueChange::DeviceUri { from, to } => format!("device {from} -> {to}"),
        QueueChange::Driver { from, to } => {
            format!("driver {} -> {to}", from.as_deref().unwrap_or("(none)"))
        }
        QueueChange::Options(keys) => format!("options {}", keys.join(",")),
        QueueChange::Location => "location".into(),
        QueueChange::Enabled => "enable".into(),
        QueueChange::Accepting => "accept jobs".into(),
        QueueChange::Shared => "share".into(),
    }
}

fn diagnostics(lines: &mut Vec<String>, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    lines.push("Diagnostics:".into());
    for d in diagnostics {
        lines.push(format!("  [{:?}] {}: {}", d.kind, d.subject, d.message));
    }
}

pub fn pipeline(report: &PipelineReport) -> String {
    let mut lines = Vec::new();
    let heading = if report.dry_run { "Plan (dry run)" } else { "Reconcile" };
    lines.push(format!("{heading} {} : {} device(s) attached", report.run_id, report.devices.len()));

    for (index, step) in report.plan.steps.iter().enumerate() {
        let status = report
            .apply
            .as_ref()
            .and_then(|a| a.steps.get(index))
            .map(|s| s.status);
        let line = match step {
            PlanStep::Upsert {
                desired,
                replace,
                changes,
                resolution,
            } => {
                let verb = if *replace { "replace" } else { "update" };
                let changes: Vec<String> = changes.iter().map(change_text).collect();
                format!(
                    "  {:<16} {verb} [{}] driver {}{}",
                    desired.name,
                    changes.join("; "),
                    resolution.driver,
                    if resolution.verified { "" } else { " (unverified)" }
                )
            }
            PlanStep::NoOp { queue } => format!("  {queue:<16} up to date"),
            PlanStep::Absent { profile } => format!("  {profile:<16} no device attached"),
        };
        match status {
            Some(StepStatus::Failed) => lines.push(format!("{line}  FAILED")),
            Some(StepStatus::Skipped) => lines.push(format!("{line}  skipped")),
            _ => lines.push(line),
        }
    }

    if let Some(sync) = &report.advertisements {
        lines.push(format!(
            "AirPrint: {} advertised, {} written, {} removed{}",
            sync.advertised.len(),
            sync.written.len(),
            sync.removed.len(),
            if sync.reloaded { ", avahi reloaded" } else { "" }
        ));
    }

    diagnostics(&mut lines, &report.diagnostics);

    lines.push(match report.outcome {
        RunOutcome::NothingToDo => "Everything already matches.".to_owned(),
        RunOutcome::Applied if report.dry_run => format!("{} queue(s) would change.", report.plan.upserts()),
        RunOutcome::Applied => "Changes applied.".to_owned(),
        RunOutcome::Degraded => "Completed with warnings.".to_owned(),
        RunOutcome::Aborted => format!(
            "Aborted: {}",
            report.abort_reason.as_deref().unwrap_or("unknown error")
        ),
    });
    lines.join("\n")
}

pub fn status(report: &StatusReport) -> String {
    let mut lines = Vec::new();
    for s in &report.services {
        lines.push(format!("{:<14} {}", s.service.to_string(), if s.active { "active" } else { "INACTIVE" }));
    }
    lines.push(String::new());
    lines.push(format!(
        "{:<16} {:<8} {:<9} {:<7} {:<10} {:<8} {}",
        "QUEUE", "ENABLED", "ACCEPTING", "SHARED", "AIRPRINT", "MANAGED", "JOBS"
    ));
    for q in &report.queues {
        lines.push(format!(
            "{:<16} {:<8} {:<9} {:<7} {:<10} {:<8} {}",
            q.name,
            yes_no(q.enabled),
            yes_no(q.accepting),
            yes_no(q.shared),
            yes_no(q.advertised),
            yes_no(q.managed),
            q.active_jobs
        ));
    }
    lines.join("\n")
}

fn job_state(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "pending",
        JobState::Held => "held",
        JobState::Processing => "processing",
        JobState::Completed => "completed",
        JobState::Cancelled => "cancelled",
        JobState::Aborted => "aborted",
    }
}

pub fn jobs(jobs: &[PrintJob]) -> String {
    if jobs.is_empty() {
        return "No jobs.".into();
    }
    let mut lines = vec![format!("{:<8} {:<16} {:<12} {:<11} {}", "JOB", "QUEUE", "OWNER", "STATE", "SIZE")];
    for j in jobs {
        lines.push(format!(
            "{:<8} {:<16} {:<12} {:<11} {}",
            j.id.to_string(),
            j.queue,
            j.owner,
            job_state(j.state),
            human_bytes(j.size_bytes)
        ));
    }
    lines.join("\n")
}

pub fn cleared(cleared: &[ClearedQueue]) -> String {
    if cleared.is_empty() {
        return "No queues to clear.".into();
    }
    cleared
        .iter()
        .map(|c| match &c.error {
            Some(e) => format!("{}: not cleared ({e})", c.queue),
            None => format!("{}: {} job(s) cancelled", c.queue, c.cancelled),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn devices(rows: &[DeviceRow]) -> String {
    if rows.is_empty() {
        return "No USB printers attached.".into();
    }
    let mut lines = Vec::new();
    for row in rows {
        let d = &row.device;
        let mapping = match (&row.profile, row.queue_present) {
            (Some(p), true) => format!("-> {p}"),
            (Some(p), false) => format!("-> {p} (no queue yet)"),
            (None, _) => "(no matching profile)".into(),
        };
        lines.push(format!("{} {} [{}] {mapping}", d.usb_id(), d.raw_description, d.serial_or_port));
        lines.push(format!("    {}", d.device_uri));
    }
    lines.join("\n")
}

pub fn health(snapshot: &HealthSnapshot) -> String {
    let mut lines = Vec::new();
    for m in &snapshot.metrics {
        let value = m
            .value
            .map_or_else(|| "n/a".to_owned(), |v| format!("{v:.1} {}", m.unit));
        let severity = m.severity.map_or_else(String::new, |s| s.to_string());
        lines.push(format!("{:<12} {value:>14}  {severity}", m.name));
    }
    lines.push(format!("overall: {}", snapshot.overall));
    lines.join("\n")
}

pub fn verbosity(level: LogVerbosity) -> String {
    match level {
        LogVerbosity::Normal => "CUPS log level: normal".into(),
        LogVerbosity::Verbose => "CUPS log level: verbose (debug)".into(),
    }
}

pub fn cleanup_plan(plan: &CleanupPlan) -> String {
    format!(
        "{} file(s), {} to delete; {} kept for active jobs, {} too recent",
        plan.delete.len(),
        human_bytes(plan.bytes()),
        plan.kept_active,
        plan.kept_recent
    )
}

pub fn cleanup_report(report: &CleanupReport) -> String {
    let mut lines = Vec::new();
    if !report.cancelled_jobs.is_empty() {
        lines.push(format!("Cancelled {} active job(s).", report.cancelled_jobs.len()));
    }
    lines.push(format!(
        "Deleted {} file(s), freed {}.",
        report.deleted,
        human_bytes(report.freed_bytes)
    ));
    if report.failed > 0 {
        lines.push(format!("{} file(s) could not be deleted.", report.failed));
    }
    lines.join("\n")
}

pub fn drivers(entries: &[DriverEntry]) -> String {
    if entries.is_empty() {
        return "No matching drivers.".into();
    }
    entries
        .iter()
        .map(|e| format!("{}  {}", e.reference, e.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn journal(entries: &[JournalEntry]) -> String {
    if entries.is_empty() {
        return "Journal is empty.".into();
    }
    entries
        .iter()
        .map(|e| {
            format!(
                "{} {:<4} {:<12} {:<16} {}",
                e.timestamp,
                if e.success { "ok" } else { "FAIL" },
                e.action,
                e.subject,
                e.details.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn visibility(report: &VisibilityReport) -> String {
    let mut lines = Vec::new();
    for q in &report.visible {
        lines.push(format!("visible  {q}"));
    }
    for q in &report.missing {
        lines.push(format!("MISSING  {q}"));
    }
    lines.push(format!("{} IPP service(s) seen on the network.", report.seen.len()));
    lines.join("\n")
}
