// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue reconciliation: plan, then apply.
//
// `reconcile` compares declared profiles against one snapshot of the queue
// backend and the scanned devices and produces a plan without touching
// anything. `apply` executes that plan step by step, in plan order, without
// re-reading queue state. Per-profile rejections are isolated; an unreachable
// backend stops the run at the failing step.
//
// Queues that no profile declares are never touched here. Removal is the
// console's `remove` operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use airspool_bridge::traits::{DriverCatalog, QueueManager};
use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::{DeviceDescriptor, Diagnostic, DiagnosticKind, PrinterProfile, QueueState};

use crate::resolver::{self, DriverResolution};

/// What differs between the desired and the current queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueChange {
    Create,
    DeviceUri { from: String, to: String },
    Driver { from: Option<String>, to: String },
    /// Declared option keys whose current value differs.
    Options(Vec<String>),
    Location,
    Enabled,
    Accepting,
    Shared,
}

/// One profile's step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStep {
    /// Bring the queue to `desired`. `replace` removes the existing queue
    /// first because its device or driver changed.
    Upsert {
        desired: QueueState,
        replace: bool,
        changes: Vec<QueueChange>,
        resolution: DriverResolution,
    },
    /// The queue already matches.
    NoOp { queue: String },
    /// No attached device matches the profile.
    Absent { profile: String },
}

impl PlanStep {
    pub fn logical_name(&self) -> &str {
        match self {
            Self::Upsert { desired, .. } => &desired.name,
            Self::NoOp { queue } => queue,
            Self::Absent { profile } => profile,
        }
    }

    pub fn is_upsert(&self) -> bool {
        matches!(self, Self::Upsert { .. })
    }
}

/// Ordered plan, one step per profile in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub steps: Vec<PlanStep>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconcilePlan {
    pub fn upserts(&self) -> usize {
        self.steps.iter().filter(|s| s.is_upsert()).count()
    }

    pub fn is_noop(&self) -> bool {
        self.upserts() == 0
    }
}

/// Compute the plan.
///
/// The driver catalog is only queried; an unreachable catalog aborts planning.
#[instrument(skip_all, fields(profiles = profiles.len(), devices = devices.len(), queues = current.len()))]
pub fn reconcile(
    profiles: &[PrinterProfile],
    devices: &[DeviceDescriptor],
    current: &[QueueState],
    drivers: &dyn DriverCatalog,
) -> Result<ReconcilePlan> {
    let current: BTreeMap<&str, &QueueState> = current.iter().map(|q| (q.name.as_str(), q)).collect();
    let mut plan = ReconcilePlan::default();

    for profile in profiles {
        let name = profile.logical_name.as_str();
        let pattern = profile.match_pattern.to_lowercase();
        let mut matches = devices
            .iter()
            .filter(|d| d.raw_description.to_lowercase().contains(&pattern));

        let Some(device) = matches.next() else {
            info!(profile = %name, "no matching device; profile absent");
            plan.diagnostics.push(Diagnostic::new(
                DiagnosticKind::DeviceNotFound,
                name,
                format!("no attached device matches {:?}", profile.match_pattern),
            ));
            plan.steps.push(PlanStep::Absent {
                profile: name.to_owned(),
            });
            continue;
        };

        let others: Vec<&str> = matches.map(|d| d.serial_or_port.as_str()).collect();
        if !others.is_empty() {
            warn!(profile = %name, chosen = %device.serial_or_port, ignored = ?others, "several devices match");
            plan.diagnostics.push(Diagnostic::new(
                DiagnosticKind::AmbiguousMatch,
                name,
                format!(
                    "{} devices match; using {} (first in scan order), ignoring {}",
                    others.len() + 1,
                    device.serial_or_port,
                    others.join(", ")
                ),
            ));
        }

        let resolution = match resolver::resolve(drivers, device, profile) {
            Ok(r) => r,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(profile = %name, error = %e, "driver resolution failed");
                plan.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DriverUnresolved,
                    name,
                    e.to_string(),
                ));
                continue;
            }
        };
        if let Some(d) = resolution.diagnostic(name) {
            plan.diagnostics.push(d);
        }

        let desired = desired_queue(profile, device, &resolution);
        let existing = current.get(name).copied();
        let changes = diff(&desired, existing);
        if changes.is_empty() {
            plan.steps.push(PlanStep::NoOp {
                queue: name.to_owned(),
            });
        } else {
            let replace = changes
                .iter()
                .any(|c| matches!(c, QueueChange::DeviceUri { .. } | QueueChange::Driver { .. }));
            info!(queue = %name, replace, changes = changes.len(), "queue needs update");
            plan.steps.push(PlanStep::Upsert {
                desired,
                replace,
                changes,
                resolution,
            });
        }
    }

    Ok(plan)
}

fn desired_queue(profile: &PrinterProfile, device: &DeviceDescriptor, resolution: &DriverResolution) -> QueueState {
    QueueState {
        name: profile.logical_name.clone(),
        device_uri: device.device_uri.clone(),
        driver_ref: Some(resolution.driver.clone()),
        options: profile.default_options.clone(),
        location: profile.location.clone(),
        enabled: true,
        accepting: true,
        shared: profile.shared,
    }
}

/// Differences between a desired queue and the current one. Only option keys
/// the profile declares are compared.
pub fn diff(desired: &QueueState, current: Option<&QueueState>) -> Vec<QueueChange> {
    let Some(current) = current else {
        return vec![QueueChange::Create];
    };

    let mut changes = Vec::new();
    if current.device_uri != desired.device_uri {
        changes.push(QueueChange::DeviceUri {
            from: current.device_uri.clone(),
            to: desired.device_uri.clone(),
        });
    }
    if current.driver_ref != desired.driver_ref {
        changes.push(QueueChange::Driver {
            from: current.driver_ref.as_ref().map(|d| d.to_string()),
            to: desired.driver_ref.as_ref().map(|d| d.to_string()).unwrap_or_default(),
        });
    }
    let options: Vec<String> = desired
        .options
        .iter()
        .filter(|(k, v)| current.options.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect();
    if !options.is_empty() {
        changes.push(QueueChange::Options(options));
    }
    if current.location != desired.location {
        changes.push(QueueChange::Location);
    }
    if current.enabled != desired.enabled {
        changes.push(QueueChange::Enabled);
    }
    if current.accepting != desired.accepting {
        changes.push(QueueChange::Accepting);
    }
    if current.shared != desired.shared {
        changes.push(QueueChange::Shared);
    }
    changes
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// How one plan step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Applied,
    Unchanged,
    Absent,
    /// Rejected by the queue backend; other steps continued.
    Failed,
    /// Not attempted because the run was aborted earlier.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub queue: String,
    pub status: StepStatus,
}

/// Result of applying a plan.
#[derive(Debug, Default, Serialize)]
pub struct ApplyReport {
    pub steps: Vec<StepResult>,
    pub diagnostics: Vec<Diagnostic>,
    /// The infrastructure error that stopped the run, if any.
    #[serde(skip)]
    pub fatal: Option<AirspoolError>,
}

impl ApplyReport {
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn is_aborted(&self) -> bool {
        self.fatal.is_some()
    }
}

/// Execute a plan against the queue backend.
#[instrument(skip_all, fields(steps = plan.steps.len()))]
pub fn apply(plan: &ReconcilePlan, queues: &dyn QueueManager) -> ApplyReport {
    let mut report = ApplyReport::default();

    for step in &plan.steps {
        let queue = step.logical_name().to_owned();
        if report.fatal.is_some() {
            report.steps.push(StepResult {
                queue,
                status: StepStatus::Skipped,
            });
            continue;
        }

        let status = match step {
            PlanStep::NoOp { .. } => StepStatus::Unchanged,
            PlanStep::Absent { .. } => StepStatus::Absent,
            PlanStep::Upsert { desired, replace, .. } => match apply_upsert(queues, desired, *replace) {
                Ok(()) => {
                    info!(queue = %queue, replace, "queue applied");
                    StepStatus::Applied
                }
                Err(e) if e.is_fatal() => {
                    error!(queue = %queue, error = %e, "backend unavailable; aborting run");
                    report.fatal = Some(e);
                    StepStatus::Skipped
                }
                Err(e) => {
                    warn!(queue = %queue, error = %e, "queue apply failed");
                    report
                        .diagnostics
                        .push(Diagnostic::new(DiagnosticKind::QueueApplyFailed, &queue, e.to_string()));
                    StepStatus::Failed
                }
            },
        };
        report.steps.push(StepResult { queue, status });
    }

    report
}

fn apply_upsert(queues: &dyn QueueManager, desired: &QueueState, replace: bool) -> Result<()> {
    if replace {
        match queues.remove_queue(&desired.name) {
            Ok(()) | Err(AirspoolError::QueueNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    queues.upsert_queue(desired)?;
    if !desired.options.is_empty() {
        queues.set_default_options(&desired.name, &desired.options)?;
    }
    queues.set_enabled(&desired.name, desired.enabled)?;
    queues.set_accepting(&desired.name, desired.accepting)?;
    Ok(())
}

/// Queue set as it stands after `apply`, derived without re-reading the
/// backend. Queues whose step failed are left out, since their state is
/// unknown. Skipped steps were never attempted, so those queues keep their
/// snapshot state.
pub fn post_apply_view(snapshot: &[QueueState], plan: &ReconcilePlan, report: &ApplyReport) -> Vec<QueueState> {
    let mut view: BTreeMap<String, QueueState> =
        snapshot.iter().map(|q| (q.name.clone(), q.clone())).collect();
    let statuses: BTreeMap<&str, StepStatus> =
        report.steps.iter().map(|s| (s.queue.as_str(), s.status)).collect();

    for step in &plan.steps {
        let PlanStep::Upsert { desired, replace, .. } = step else {
            continue;
        };
        match statuses.get(desired.name.as_str()) {
            Some(StepStatus::Applied) => {
                let mut after = desired.clone();
                if !replace {
                    if let Some(before) = view.get(&desired.name) {
                        let mut options = before.options.clone();
                        options.extend(desired.options.clone());
                        after.options = options;
                    }
                }
                view.insert(desired.name.clone(), after);
            }
            Some(StepStatus::Failed) => {
                view.remove(&desired.name);
            }
            // Skipped, Unchanged, Absent: untouched by apply.
            _ => {}
        }
    }
    view.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use airspool_bridge::memory::MemoryPrintSystem;
    use airspool_bridge::traits::QueueManager;

    #[test]
    fn hp_and_4xl_attached_450_absent() {
        let sys = fleet_catalog();
        let plan = reconcile(&fleet_profiles(), &[hp_device(), dymo_4xl_device()], &[], &sys).expect("plan");

        assert_eq!(plan.steps.len(), 3);
        match &plan.steps[0] {
            PlanStep::Upsert { desired, replace, .. } => {
                assert_eq!(desired.name, "HP_LaserJet_1320");
                assert_eq!(desired.driver_ref.as_ref().map(|d| d.as_str()), Some(HP_EXACT));
                assert!(!replace);
            }
            other => panic!("expected upsert, got {other:?}"),
        }
        assert!(matches!(&plan.steps[1], PlanStep::Upsert { desired, .. } if desired.name == "Dymo_4XL"));
        assert_eq!(
            plan.steps[2],
            PlanStep::Absent {
                profile: "Dymo_450".into()
            }
        );
        assert!(plan.diagnostics.iter().all(|d| !d.kind.is_degrading()));
    }

    #[test]
    fn missing_exact_ppd_falls_back_to_generic() {
        let sys = MemoryPrintSystem::new()
            .with_driver(HP_GENERIC, "Generic PCL Laser Printer")
            .with_driver(DYMO_4XL_PPD, "DYMO LabelWriter 4XL")
            .with_driver(DYMO_450_PPD, "DYMO LabelWriter 450");
        let plan = reconcile(&fleet_profiles(), &[hp_device(), dymo_4xl_device()], &[], &sys).expect("plan");

        let PlanStep::Upsert { desired, .. } = &plan.steps[0] else {
            panic!("expected upsert for HP");
        };
        assert_eq!(desired.driver_ref.as_ref().map(|d| d.as_str()), Some(HP_GENERIC));
        let warning = plan
            .diagnostics
            .iter()
            .find(|d| d.subject == "HP_LaserJet_1320")
            .expect("fallback warning");
        assert_eq!(warning.kind, DiagnosticKind::DriverFallback);
    }

    #[test]
    fn no_devices_means_all_absent() {
        let sys = fleet_catalog();
        let plan = reconcile(&fleet_profiles(), &[], &[], &sys).expect("plan");
        assert_eq!(plan.upserts(), 0);
        assert!(plan.steps.iter().all(|s| matches!(s, PlanStep::Absent { .. })));
        assert!(plan.diagnostics.iter().all(|d| d.kind == DiagnosticKind::DeviceNotFound));
    }

    #[test]
    fn first_of_two_matching_devices_wins_with_one_warning() {
        let sys = fleet_catalog();
        let mut second = dymo_450_device();
        second.serial_or_port = "1-1.4".into();
        second.device_uri = "usb://DYMO/LabelWriter%20450?serial=SECOND".into();
        let devices = [dymo_450_device(), second];

        let plan = reconcile(&fleet_profiles(), &devices, &[], &sys).expect("plan");
        let PlanStep::Upsert { desired, .. } = &plan.steps[2] else {
            panic!("expected upsert for Dymo_450");
        };
        assert_eq!(desired.device_uri, dymo_450_device().device_uri);
        let ambiguous = plan
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::AmbiguousMatch)
            .count();
        assert_eq!(ambiguous, 1);
    }

    #[test]
    fn planning_is_deterministic() {
        let sys = fleet_catalog();
        let devices = [hp_device(), dymo_4xl_device(), dymo_450_device()];
        let a = reconcile(&fleet_profiles(), &devices, &[], &sys).expect("plan");
        let b = reconcile(&fleet_profiles(), &devices, &[], &sys).expect("plan");
        assert_eq!(
            serde_json::to_string(&a).expect("json"),
            serde_json::to_string(&b).expect("json")
        );
    }

    #[test]
    fn second_run_is_all_noop() {
        let sys = fleet_catalog();
        let devices = [hp_device(), dymo_4xl_device(), dymo_450_device()];
        let profiles = fleet_profiles();

        let first = reconcile(&profiles, &devices, &sys.list_queues().expect("queues"), &sys).expect("plan");
        assert_eq!(first.upserts(), 3);
        let report = apply(&first, &sys);
        assert_eq!(report.count(StepStatus::Applied), 3);

        let second = reconcile(&profiles, &devices, &sys.list_queues().expect("queues"), &sys).expect("plan");
        assert!(second.is_noop(), "second plan: {second:?}");
        assert!(second.steps.iter().all(|s| matches!(s, PlanStep::NoOp { .. })));
    }

    #[test]
    fn option_change_updates_in_place_uri_change_replaces() {
        let sys = fleet_catalog();
        let profiles = fleet_profiles();
        let devices = [hp_device()];
        apply(&reconcile(&profiles, &devices, &[], &sys).expect("plan"), &sys);

        sys.state_mut()
            .queues
            .get_mut("HP_LaserJet_1320")
            .expect("queue")
            .options
            .insert("sides".into(), "two-sided-long-edge".into());
        let plan = reconcile(&profiles, &devices, &sys.list_queues().expect("queues"), &sys).expect("plan");
        let PlanStep::Upsert { replace, changes, .. } = &plan.steps[0] else {
            panic!("expected upsert");
        };
        assert!(!replace);
        assert_eq!(changes, &vec![QueueChange::Options(vec!["sides".into()])]);

        let mut moved = hp_device();
        moved.device_uri = "usb://HP/LaserJet%201320%20series?serial=OTHER".into();
        let plan = reconcile(&profiles, &[moved], &sys.list_queues().expect("queues"), &sys).expect("plan");
        assert!(matches!(&plan.steps[0], PlanStep::Upsert { replace: true, .. }));
        apply(&plan, &sys);
        assert_eq!(sys.state().removed, vec!["HP_LaserJet_1320".to_owned()]);
    }

    #[test]
    fn undeclared_options_and_queues_are_ignored() {
        let sys = fleet_catalog();
        let profiles = fleet_profiles();
        let devices = [dymo_4xl_device()];
        apply(&reconcile(&profiles, &devices, &[], &sys).expect("plan"), &sys);

        {
            let mut s = sys.state_mut();
            s.queues
                .get_mut("Dymo_4XL")
                .expect("queue")
                .options
                .insert("print-quality".into(), "high".into());
            s.queues.insert("Office_Manual".into(), manual_queue("Office_Manual"));
        }
        let plan = reconcile(&profiles, &devices, &sys.list_queues().expect("queues"), &sys).expect("plan");
        assert!(plan.is_noop());
        apply(&plan, &sys);
        assert!(sys.state().queues.contains_key("Office_Manual"));
    }

    #[test]
    fn rejected_profile_does_not_block_the_next() {
        let sys = fleet_catalog();
        sys.state_mut().reject_queues.insert("HP_LaserJet_1320".into());
        let plan = reconcile(&fleet_profiles(), &[hp_device(), dymo_4xl_device()], &[], &sys).expect("plan");
        let report = apply(&plan, &sys);

        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert_eq!(report.steps[1].status, StepStatus::Applied);
        assert!(!report.is_aborted());
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::QueueApplyFailed);
        assert_eq!(report.diagnostics[0].subject, "HP_LaserJet_1320");
        let dymo = sys.state().queues.get("Dymo_4XL").cloned().expect("dymo queue");
        assert!(dymo.is_advertisable());
    }

    #[test]
    fn unreachable_backend_stops_at_failing_step() {
        let sys = fleet_catalog();
        let plan = reconcile(&fleet_profiles(), &[hp_device(), dymo_4xl_device()], &[], &sys).expect("plan");
        sys.state_mut().queues_unavailable = true;
        let report = apply(&plan, &sys);

        assert!(report.is_aborted());
        assert!(report.steps.iter().all(|s| s.status != StepStatus::Applied));
        assert!(sys.state().upserted.is_empty());
    }

    #[test]
    fn view_reflects_applied_and_drops_failed() {
        let sys = fleet_catalog();
        sys.state_mut().reject_queues.insert("HP_LaserJet_1320".into());
        let snapshot = vec![manual_queue("HP_LaserJet_1320")];
        let plan = reconcile(&fleet_profiles(), &[hp_device(), dymo_4xl_device()], &snapshot, &sys).expect("plan");
        let report = apply(&plan, &sys);

        let view = post_apply_view(&snapshot, &plan, &report);
        let names: Vec<&str> = view.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["Dymo_4XL"]);
        assert!(view[0].is_advertisable());
    }

    #[test]
    fn skipped_steps_keep_snapshot_state() {
        let sys = fleet_catalog();
        let mut before = manual_queue("HP_LaserJet_1320");
        before.enabled = false;
        let snapshot = vec![before.clone()];
        let plan = reconcile(&fleet_profiles(), &[hp_device()], &snapshot, &sys).expect("plan");
        let report = ApplyReport {
            steps: plan
                .steps
                .iter()
                .map(|s| StepResult {
                    queue: s.logical_name().to_owned(),
                    status: StepStatus::Skipped,
                })
                .collect(),
            ..ApplyReport::default()
        };

        let view = post_apply_view(&snapshot, &plan, &report);
        assert_eq!(view, vec![before]);
    }
}
