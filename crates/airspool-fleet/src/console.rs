// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Maintenance console operations.
//
// Each operation reads what it needs fresh from the backends and assumes no
// other operation ran before it. Destructive operations take `confirmed` and
// return `ConfirmationRequired` without it; prompting is the caller's job.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use airspool_bridge::Backends;
use airspool_core::config::FleetConfig;
use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::{
    DeviceDescriptor, DriverEntry, JobFilter, JobId, LogVerbosity, ManagedService, PrintJob,
};

use crate::advertise;
use crate::discovery::{self, VisibilityReport};
use crate::health::{self, HealthSnapshot};
use crate::journal::{Journal, JournalEntry};
use crate::scanner;
use crate::spool::{self, CleanupPlan, CleanupReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: ManagedService,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub name: String,
    pub enabled: bool,
    pub accepting: bool,
    pub shared: bool,
    /// A descriptor for this queue is published.
    pub advertised: bool,
    /// Declared in the fleet configuration.
    pub managed: bool,
    pub active_jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub services: Vec<ServiceStatus>,
    pub queues: Vec<QueueStatus>,
}

/// One attached device and what the fleet makes of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRow {
    pub device: DeviceDescriptor,
    /// First profile whose pattern matches.
    pub profile: Option<String>,
    pub queue_present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedQueue {
    pub queue: String,
    pub cancelled: usize,
    /// Why this queue could not be cleared, when clearing every queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What `verbosity` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityRequest {
    Show,
    Set(LogVerbosity),
    Toggle,
}

pub struct Console<'a> {
    backends: Backends<'a>,
    config: &'a FleetConfig,
    journal: Option<&'a Journal>,
}

impl<'a> Console<'a> {
    pub fn new(backends: Backends<'a>, config: &'a FleetConfig, journal: Option<&'a Journal>) -> Self {
        Self {
            backends,
            config,
            journal,
        }
    }

    /// Journal a mutation. Failures carry the error text as details.
    fn record<T>(&self, action: &str, subject: &str, outcome: &Result<T>, details: Option<&str>) {
        let Some(journal) = self.journal else {
            return;
        };
        let error = outcome.as_ref().err().map(|e| e.to_string());
        let details = error.as_deref().or(details);
        if let Err(e) = journal.record(None, action, subject, outcome.is_ok(), details) {
            warn!(error = %e, "journal write failed");
        }
    }

    /// Services, queues with their flags, advertisement presence, and job counts.
    pub fn status(&self) -> Result<StatusReport> {
        let mut services = Vec::new();
        for service in ManagedService::ALL {
            services.push(ServiceStatus {
                service,
                active: self.backends.services.is_active(service)?,
            });
        }

        let advertised: BTreeSet<String> = self.backends.adverts.list_descriptors()?.into_iter().collect();
        let jobs = self.backends.jobs.list_jobs(JobFilter::Active)?;
        let queues = self
            .backends
            .queues
            .list_queues()?
            .into_iter()
            .map(|q| QueueStatus {
                advertised: advertised.contains(&q.name),
                managed: self.config.profile(&q.name).is_some(),
                active_jobs: jobs.iter().filter(|j| j.queue == q.name).count(),
                name: q.name,
                enabled: q.enabled,
                accepting: q.accepting,
                shared: q.shared,
            })
            .collect();
        Ok(StatusReport { services, queues })
    }

    pub fn jobs(&self, filter: JobFilter) -> Result<Vec<PrintJob>> {
        self.backends.jobs.list_jobs(filter)
    }

    /// Cancel every active job on one queue, or on all queues. When clearing
    /// all queues a queue that refuses is reported and the rest still run;
    /// only an unreachable scheduler stops the sweep.
    #[instrument(skip(self))]
    pub fn clear(&self, queue: Option<&str>, confirmed: bool) -> Result<Vec<ClearedQueue>> {
        if !confirmed {
            return Err(AirspoolError::ConfirmationRequired);
        }
        let sweep = queue.is_none();
        let names: Vec<String> = match queue {
            Some(name) => vec![name.to_owned()],
            None => self.backends.queues.list_queues()?.into_iter().map(|q| q.name).collect(),
        };
        let active = self.backends.jobs.list_jobs(JobFilter::Active)?;

        let mut cleared = Vec::new();
        for name in names {
            let count = active.iter().filter(|j| j.queue == name).count();
            let outcome = self.backends.jobs.cancel_all_jobs(&name);
            let details = format!("{count} jobs");
            self.record("clear", &name, &outcome, Some(&details));
            match outcome {
                Ok(()) => {
                    info!(queue = %name, cancelled = count, "queue cleared");
                    cleared.push(ClearedQueue {
                        queue: name,
                        cancelled: count,
                        error: None,
                    });
                }
                Err(e) if sweep && !e.is_fatal() => {
                    warn!(queue = %name, error = %e, "queue not cleared");
                    cleared.push(ClearedQueue {
                        queue: name,
                        cancelled: 0,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(cleared)
    }

    #[instrument(skip(self))]
    pub fn cancel(&self, job: JobId) -> Result<()> {
        let outcome = self.backends.jobs.cancel_job(job);
        self.record("cancel", &job.to_string(), &outcome, None);
        outcome
    }

    #[instrument(skip(self))]
    pub fn restart(&self, service: ManagedService) -> Result<()> {
        let outcome = self.backends.services.restart(service);
        self.record("restart", service.unit_name(), &outcome, None);
        outcome
    }

    /// Attached devices cross-referenced with profiles and queues. A device
    /// scan failure yields an empty list, as in a reconcile run.
    pub fn devices(&self) -> Result<Vec<DeviceRow>> {
        let scan = scanner::scan(self.backends.devices);
        let queues: BTreeSet<String> = self
            .backends
            .queues
            .list_queues()?
            .into_iter()
            .map(|q| q.name)
            .collect();
        Ok(scan
            .devices
            .into_iter()
            .map(|device| {
                let description = device.raw_description.to_lowercase();
                let profile = self
                    .config
                    .printers
                    .iter()
                    .find(|p| description.contains(&p.match_pattern.to_lowercase()))
                    .map(|p| p.logical_name.clone());
                let queue_present = profile.as_ref().is_some_and(|p| queues.contains(p));
                DeviceRow {
                    device,
                    profile,
                    queue_present,
                }
            })
            .collect())
    }

    pub fn logs(&self, lines: usize) -> Result<Vec<String>> {
        self.backends.services.tail_log(lines)
    }

    pub fn health(&self) -> Result<HealthSnapshot> {
        let readings = self.backends.telemetry.read_telemetry()?;
        Ok(health::snapshot(&readings, &self.config.health))
    }

    #[instrument(skip(self))]
    pub fn test_page(&self, queue: &str) -> Result<JobId> {
        let outcome = self.backends.jobs.submit_test_page(queue);
        let details = outcome.as_ref().ok().map(|id| format!("job {id}"));
        self.record("test-page", queue, &outcome, details.as_deref());
        outcome
    }

    /// Show, set, or toggle the print subsystem log verbosity. Returns the
    /// verbosity in effect afterwards.
    pub fn verbosity(&self, request: VerbosityRequest) -> Result<LogVerbosity> {
        let target = match request {
            VerbosityRequest::Show => return self.backends.services.log_verbosity(),
            VerbosityRequest::Set(v) => v,
            VerbosityRequest::Toggle => self.backends.services.log_verbosity()?.toggled(),
        };
        let outcome = self.backends.services.set_log_verbosity(target);
        self.record("verbosity", &format!("{target:?}").to_lowercase(), &outcome, None);
        outcome.map(|()| target)
    }

    fn retention(&self, days: Option<u32>) -> u32 {
        days.unwrap_or(self.config.spool.retention_days)
    }

    /// What `cleanup` would delete right now.
    pub fn cleanup_preview(&self, retention_days: Option<u32>) -> Result<CleanupPlan> {
        spool::preview(self.backends.jobs, Utc::now(), self.retention(retention_days))
    }

    #[instrument(skip(self))]
    pub fn cleanup(&self, retention_days: Option<u32>, cancel_pending: bool, confirmed: bool) -> Result<CleanupReport> {
        if !confirmed {
            return Err(AirspoolError::ConfirmationRequired);
        }
        let result = spool::run_cleanup(
            self.backends.jobs,
            Utc::now(),
            self.retention(retention_days),
            cancel_pending,
        );
        let details = result
            .as_ref()
            .ok()
            .map(|r| format!("{} files, {} bytes, {} jobs cancelled", r.deleted, r.freed_bytes, r.cancelled_jobs.len()));
        self.record("cleanup", "spool", &result, details.as_deref());
        result
    }

    /// Remove a queue and withdraw its advertisement.
    #[instrument(skip(self))]
    pub fn remove(&self, queue: &str, confirmed: bool) -> Result<Vec<String>> {
        if !confirmed {
            return Err(AirspoolError::ConfirmationRequired);
        }
        let outcome = self.backends.queues.remove_queue(queue);
        self.record("remove", queue, &outcome, None);
        outcome?;
        info!(queue = %queue, "queue removed");
        if self.config.profile(queue).is_some() {
            warn!(queue = %queue, "queue is still declared; the next reconcile run recreates it");
        }
        let remaining = self.backends.queues.list_queues()?;
        advertise::remove_orphans(&remaining, self.backends.adverts)
    }

    /// Driver catalog entries whose reference or description contains `filter`.
    pub fn drivers(&self, filter: Option<&str>) -> Result<Vec<DriverEntry>> {
        let needle = filter.map(str::to_lowercase);
        Ok(self
            .backends
            .drivers
            .list_available_drivers()?
            .into_iter()
            .filter(|d| match &needle {
                Some(n) => {
                    d.reference.as_str().to_lowercase().contains(n) || d.description.to_lowercase().contains(n)
                }
                None => true,
            })
            .collect())
    }

    pub fn journal(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        match self.journal {
            Some(journal) => journal.recent(limit),
            None => Ok(Vec::new()),
        }
    }

    /// Browse mDNS and report which published descriptors are visible.
    pub fn verify_advertisements(&self, timeout: Duration) -> Result<VisibilityReport> {
        let expected = self.backends.adverts.list_descriptors()?;
        let seen = discovery::browse_ipp(timeout)?;
        Ok(discovery::match_visibility(&expected, &seen))
    }
}
