// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One reconcile run: scan, plan, apply, then sync advertisements.
//
// The queue backend is read once. Advertisements are synced from that
// snapshot plus the steps that succeeded, and are skipped entirely when the
// run aborts, so an unreachable backend leaves descriptors as they were.

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use airspool_bridge::Backends;
use airspool_core::config::FleetConfig;
use airspool_core::error::AirspoolError;
use airspool_core::types::{DeviceDescriptor, Diagnostic, DiagnosticKind, RunId};

use crate::advertise::{self, SyncReport};
use crate::journal::Journal;
use crate::reconciler::{self, ApplyReport, PlanStep, ReconcilePlan, StepStatus};
use crate::scanner;

/// How a run ended, as a caller needs to distinguish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Everything already matched.
    NothingToDo,
    /// Changes were made (or, for a dry run, are pending) without trouble.
    Applied,
    /// The run completed but something was skipped, guessed, or rejected.
    Degraded,
    /// A backend was unreachable; the run stopped.
    Aborted,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::NothingToDo | Self::Applied => 0,
            Self::Degraded => 2,
            Self::Aborted => 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub dry_run: bool,
    pub devices: Vec<DeviceDescriptor>,
    pub plan: ReconcilePlan,
    pub apply: Option<ApplyReport>,
    pub advertisements: Option<SyncReport>,
    /// Scan, plan, apply, and sync diagnostics in that order.
    pub diagnostics: Vec<Diagnostic>,
    pub abort_reason: Option<String>,
    #[serde(skip)]
    pub fatal: Option<AirspoolError>,
}

impl PipelineReport {
    fn new(run_id: RunId, dry_run: bool) -> Self {
        Self {
            run_id,
            outcome: RunOutcome::NothingToDo,
            dry_run,
            devices: Vec::new(),
            plan: ReconcilePlan::default(),
            apply: None,
            advertisements: None,
            diagnostics: Vec::new(),
            abort_reason: None,
            fatal: None,
        }
    }

    fn abort(mut self, err: AirspoolError) -> Self {
        error!(run_id = %self.run_id, error = %err, "reconcile run aborted");
        self.outcome = RunOutcome::Aborted;
        self.abort_reason = Some(err.to_string());
        self.fatal = Some(err);
        self
    }
}

/// Execute the pipeline. With `dry_run` nothing is mutated and the plan is
/// the result.
#[instrument(skip_all, fields(dry_run = dry_run))]
pub fn run(config: &FleetConfig, backends: &Backends<'_>, journal: Option<&Journal>, dry_run: bool) -> PipelineReport {
    let mut report = PipelineReport::new(RunId::new(), dry_run);
    info!(run_id = %report.run_id, profiles = config.printers.len(), "reconcile run started");

    let scan = scanner::scan(backends.devices);
    report.devices = scan.devices;
    report.diagnostics.extend(scan.diagnostics);

    let snapshot = match backends.queues.list_queues() {
        Ok(queues) => queues,
        Err(e) => return finish(report.abort(e), journal),
    };

    let plan = match reconciler::reconcile(&config.printers, &report.devices, &snapshot, backends.drivers) {
        Ok(plan) => plan,
        Err(e) => return finish(report.abort(e), journal),
    };
    report.diagnostics.extend(plan.diagnostics.iter().cloned());
    report.plan = plan;

    if dry_run {
        report.outcome = outcome(&report.diagnostics, !report.plan.is_noop());
        return finish(report, journal);
    }

    let mut applied = reconciler::apply(&report.plan, backends.queues);
    report.diagnostics.extend(applied.diagnostics.iter().cloned());
    if let Some(fatal) = applied.fatal.take() {
        report.apply = Some(applied);
        return finish(report.abort(fatal), journal);
    }

    let view = reconciler::post_apply_view(&snapshot, &report.plan, &applied);
    let changed_queues = applied.count(StepStatus::Applied) > 0;
    report.apply = Some(applied);

    match advertise::sync(&view, &config.printers, &config.avahi, backends.adverts) {
        Ok(sync) => {
            let changed = changed_queues || sync.changed();
            report.advertisements = Some(sync);
            report.outcome = outcome(&report.diagnostics, changed);
        }
        Err(e) if e.is_fatal() => return finish(report.abort(e), journal),
        Err(e) => {
            warn!(error = %e, "advertisement sync failed");
            report
                .diagnostics
                .push(Diagnostic::new(DiagnosticKind::BackendWarning, "advertisements", e.to_string()));
            report.outcome = RunOutcome::Degraded;
        }
    }

    finish(report, journal)
}

fn outcome(diagnostics: &[Diagnostic], changed: bool) -> RunOutcome {
    if diagnostics.iter().any(|d| d.kind.is_degrading()) {
        RunOutcome::Degraded
    } else if changed {
        RunOutcome::Applied
    } else {
        RunOutcome::NothingToDo
    }
}

fn finish(report: PipelineReport, journal: Option<&Journal>) -> PipelineReport {
    info!(run_id = %report.run_id, outcome = ?report.outcome, dry_run = report.dry_run, "reconcile run finished");
    if let Some(journal) = journal {
        if let Err(e) = write_journal(&report, journal) {
            warn!(error = %e, "journal write failed");
        }
    }
    report
}

fn write_journal(report: &PipelineReport, journal: &Journal) -> airspool_core::error::Result<()> {
    let run = Some(report.run_id);
    if let Some(applied) = &report.apply {
        for step in &applied.steps {
            let success = match step.status {
                StepStatus::Applied => true,
                StepStatus::Failed => false,
                _ => continue,
            };
            let detail = report
                .diagnostics
                .iter()
                .find(|d| d.subject == step.queue && d.kind == DiagnosticKind::QueueApplyFailed)
                .map(|d| d.message.as_str())
                .or_else(|| replace_note(&report.plan, &step.queue));
            journal.record(run, "upsert", &step.queue, success, detail)?;
        }
    }
    if let Some(sync) = &report.advertisements {
        for queue in &sync.written {
            journal.record(run, "advertise", queue, true, None)?;
        }
        for queue in &sync.removed {
            journal.record(run, "unadvertise", queue, true, None)?;
        }
    }
    let summary = format!("{:?}", report.outcome);
    journal.record(
        run,
        if report.dry_run { "plan" } else { "reconcile" },
        "fleet",
        report.outcome != RunOutcome::Aborted,
        Some(report.abort_reason.as_deref().unwrap_or(&summary)),
    )
}

fn replace_note<'a>(plan: &'a ReconcilePlan, queue: &str) -> Option<&'a str> {
    plan.steps.iter().find_map(|s| match s {
        PlanStep::Upsert { desired, replace: true, .. } if desired.name == queue => Some("replaced"),
        _ => None,
    })
}
