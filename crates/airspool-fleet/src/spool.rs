// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spool cleanup: remove finished job files older than the retention period.
// Files of active jobs are never selected.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use airspool_bridge::traits::JobControl;
use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::{JobFilter, JobId, SpoolArtifact};

/// Which artifacts a cleanup would delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPlan {
    pub delete: Vec<SpoolArtifact>,
    /// Artifacts skipped because their job is still active.
    pub kept_active: usize,
    /// Artifacts skipped because they are within the retention period.
    pub kept_recent: usize,
}

impl CleanupPlan {
    pub fn bytes(&self) -> u64 {
        self.delete.iter().map(|a| a.size_bytes).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub cancelled_jobs: Vec<JobId>,
    pub deleted: usize,
    pub freed_bytes: u64,
    pub failed: usize,
    pub kept_active: usize,
    pub kept_recent: usize,
}

/// Select artifacts older than `retention` whose job is not active. A
/// retention reaching past the earliest representable time keeps everything.
pub fn plan_cleanup(
    artifacts: &[SpoolArtifact],
    active: &BTreeSet<JobId>,
    now: DateTime<Utc>,
    retention: Duration,
) -> CleanupPlan {
    let cutoff = now
        .checked_sub_signed(retention)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut plan = CleanupPlan::default();
    for artifact in artifacts {
        if active.contains(&artifact.job_id) {
            plan.kept_active += 1;
        } else if artifact.modified < cutoff {
            plan.delete.push(artifact.clone());
        } else {
            plan.kept_recent += 1;
        }
    }
    plan
}

/// Read the spool and active jobs, then plan. Read-only.
pub fn preview(jobs: &dyn JobControl, now: DateTime<Utc>, retention_days: u32) -> Result<CleanupPlan> {
    let active: BTreeSet<JobId> = jobs.list_jobs(JobFilter::Active)?.iter().map(|j| j.id).collect();
    let artifacts = jobs.list_spool_artifacts()?;
    let retention = Duration::try_days(i64::from(retention_days)).unwrap_or(Duration::MAX);
    Ok(plan_cleanup(&artifacts, &active, now, retention))
}

/// Run a cleanup. With `cancel_pending` every active job is cancelled first,
/// so its files fall under the same age rule. A job that finishes between
/// listing and cancelling is already gone and is not counted.
pub fn run_cleanup(
    jobs: &dyn JobControl,
    now: DateTime<Utc>,
    retention_days: u32,
    cancel_pending: bool,
) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();
    if cancel_pending {
        for job in jobs.list_jobs(JobFilter::Active)? {
            match jobs.cancel_job(job.id) {
                Ok(()) => {}
                Err(AirspoolError::JobNotFound(id)) => {
                    debug!(job = %id, "job finished before it could be cancelled");
                    continue;
                }
                Err(e) => return Err(e),
            }
            info!(job = %job.id, queue = %job.queue, "pending job cancelled for cleanup");
            report.cancelled_jobs.push(job.id);
        }
    }

    let plan = preview(jobs, now, retention_days)?;
    report.kept_active = plan.kept_active;
    report.kept_recent = plan.kept_recent;
    for artifact in &plan.delete {
        match jobs.delete_spool_artifact(artifact) {
            Ok(()) => {
                report.deleted += 1;
                report.freed_bytes += artifact.size_bytes;
            }
            Err(e) => {
                warn!(path = %artifact.path.display(), error = %e, "spool file not removed");
                report.failed += 1;
            }
        }
    }
    info!(
        deleted = report.deleted,
        freed_bytes = report.freed_bytes,
        kept_active = report.kept_active,
        "spool cleanup finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airspool_bridge::memory::MemoryPrintSystem;
    use airspool_core::types::{ArtifactKind, JobState};
    use std::path::PathBuf;

    fn artifact(job: u32, kind: ArtifactKind, age: Duration, now: DateTime<Utc>) -> SpoolArtifact {
        let name = match kind {
            ArtifactKind::Control => format!("c{job:05}"),
            ArtifactKind::Data => format!("d{job:05}-001"),
        };
        SpoolArtifact {
            job_id: JobId(job),
            kind,
            path: PathBuf::from("/var/spool/cups").join(name),
            size_bytes: 1000,
            modified: now - age,
        }
    }

    /// Job 1 finished two days ago, job 2 today, job 3 is still pending from last week.
    fn spool(now: DateTime<Utc>) -> MemoryPrintSystem {
        let sys = MemoryPrintSystem::new()
            .with_job("Dymo_450", JobState::Completed)
            .with_job("Dymo_450", JobState::Completed)
            .with_job("Dymo_450", JobState::Pending);
        sys.state_mut().artifacts = vec![
            artifact(1, ArtifactKind::Control, Duration::days(2), now),
            artifact(1, ArtifactKind::Data, Duration::days(2), now),
            artifact(2, ArtifactKind::Data, Duration::hours(3), now),
            artifact(3, ArtifactKind::Data, Duration::days(7), now),
        ];
        sys
    }

    #[test]
    fn only_old_finished_artifacts_are_deleted() {
        let now = Utc::now();
        let sys = spool(now);
        let report = run_cleanup(&sys, now, 1, false).expect("cleanup");

        assert_eq!(report.deleted, 2);
        assert_eq!(report.freed_bytes, 2000);
        assert_eq!(report.kept_active, 1);
        assert_eq!(report.kept_recent, 1);
        let left: Vec<JobId> = sys.state().artifacts.iter().map(|a| a.job_id).collect();
        assert_eq!(left, vec![JobId(2), JobId(3)]);
    }

    #[test]
    fn cancel_pending_releases_old_pending_files() {
        let now = Utc::now();
        let sys = spool(now);
        let report = run_cleanup(&sys, now, 1, true).expect("cleanup");

        assert_eq!(report.cancelled_jobs, vec![JobId(3)]);
        assert_eq!(report.deleted, 3);
        let left: Vec<JobId> = sys.state().artifacts.iter().map(|a| a.job_id).collect();
        assert_eq!(left, vec![JobId(2)]);
    }

    #[test]
    fn preview_touches_nothing() {
        let now = Utc::now();
        let sys = spool(now);
        let plan = preview(&sys, now, 1).expect("preview");
        assert_eq!(plan.delete.len(), 2);
        assert_eq!(plan.bytes(), 2000);
        assert_eq!(sys.state().artifacts.len(), 4);
    }

    #[test]
    fn huge_retention_keeps_every_file() {
        let now = Utc::now();
        let sys = spool(now);
        let plan = preview(&sys, now, u32::MAX).expect("preview");
        assert!(plan.delete.is_empty());
        assert_eq!(plan.kept_recent, 3);

        let report = run_cleanup(&sys, now, u32::MAX, false).expect("cleanup");
        assert_eq!(report.deleted, 0);
        assert_eq!(sys.state().artifacts.len(), 4);

        let far = plan_cleanup(&sys.state().artifacts, &BTreeSet::new(), now, Duration::MAX);
        assert_eq!(far.kept_recent, 4);
    }

    /// Lets every listed job complete on its own just before the cancel lands.
    struct FinishesFirst<'a>(&'a MemoryPrintSystem);

    impl JobControl for FinishesFirst<'_> {
        fn list_jobs(&self, filter: JobFilter) -> Result<Vec<airspool_core::types::PrintJob>> {
            self.0.list_jobs(filter)
        }
        fn cancel_job(&self, id: JobId) -> Result<()> {
            for job in self.0.state_mut().jobs.iter_mut().filter(|j| j.id == id) {
                job.state = JobState::Completed;
            }
            self.0.cancel_job(id)
        }
        fn cancel_all_jobs(&self, queue: &str) -> Result<()> {
            self.0.cancel_all_jobs(queue)
        }
        fn submit_test_page(&self, queue: &str) -> Result<JobId> {
            self.0.submit_test_page(queue)
        }
        fn list_spool_artifacts(&self) -> Result<Vec<SpoolArtifact>> {
            self.0.list_spool_artifacts()
        }
        fn delete_spool_artifact(&self, artifact: &SpoolArtifact) -> Result<()> {
            self.0.delete_spool_artifact(artifact)
        }
    }

    #[test]
    fn job_finishing_during_cancel_does_not_stop_cleanup() {
        let now = Utc::now();
        let sys = spool(now);
        let report = run_cleanup(&FinishesFirst(&sys), now, 1, true).expect("cleanup");

        assert!(report.cancelled_jobs.is_empty());
        assert_eq!(report.deleted, 3);
        let left: Vec<JobId> = sys.state().artifacts.iter().map(|a| a.job_id).collect();
        assert_eq!(left, vec![JobId(2)]);
    }
}
