// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory print system implementing every collaborator trait.
//
// Used by tests and benchmarks. Supports fault injection (unreachable
// backends, per-queue rejections) and counts the calls that matter for
// idempotence checks.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};

use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::{
    DriverEntry, DriverRef, JobFilter, JobId, JobState, LogVerbosity, ManagedService, OptionMap,
    PrintJob, QueueState, RawDevice, SpoolArtifact, TelemetryReadings,
};

use crate::traits::{
    AdvertisementHost, DeviceCatalog, DriverCatalog, HealthTelemetry, JobControl, QueueManager,
    ServiceControl,
};

/// Everything the fake print system holds. Public so tests can arrange and
/// inspect state directly.
#[derive(Debug, Clone)]
pub struct MemoryState {
    pub devices: Vec<RawDevice>,
    pub drivers: Vec<DriverEntry>,
    pub queues: BTreeMap<String, QueueState>,
    pub jobs: Vec<PrintJob>,
    pub artifacts: Vec<SpoolArtifact>,
    pub descriptors: BTreeMap<String, String>,
    pub inactive_services: BTreeSet<ManagedService>,
    pub log_lines: Vec<String>,
    pub verbosity: LogVerbosity,
    pub telemetry: TelemetryReadings,

    // -- fault injection --
    pub devices_unavailable: bool,
    pub drivers_unavailable: bool,
    pub queues_unavailable: bool,
    /// Queue mutations on these names are rejected.
    pub reject_queues: BTreeSet<String>,
    pub adverts_unavailable: bool,

    // -- call records --
    pub upserted: Vec<String>,
    pub removed: Vec<String>,
    pub descriptor_writes: usize,
    pub descriptor_deletes: usize,
    pub reloads: usize,
    pub restarts: Vec<ManagedService>,
    pub next_job: u32,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            drivers: Vec::new(),
            queues: BTreeMap::new(),
            jobs: Vec::new(),
            artifacts: Vec::new(),
            descriptors: BTreeMap::new(),
            inactive_services: BTreeSet::new(),
            log_lines: Vec::new(),
            verbosity: LogVerbosity::Normal,
            telemetry: TelemetryReadings::default(),
            devices_unavailable: false,
            drivers_unavailable: false,
            queues_unavailable: false,
            reject_queues: BTreeSet::new(),
            adverts_unavailable: false,
            upserted: Vec::new(),
            removed: Vec::new(),
            descriptor_writes: 0,
            descriptor_deletes: 0,
            reloads: 0,
            restarts: Vec::new(),
            next_job: 1,
        }
    }
}

/// Single-threaded fake of CUPS, Avahi, systemd, and the host.
#[derive(Debug, Default)]
pub struct MemoryPrintSystem {
    state: RefCell<MemoryState>,
}

impl MemoryPrintSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, MemoryState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, MemoryState> {
        self.state.borrow_mut()
    }

    pub fn with_device(self, device: RawDevice) -> Self {
        self.state_mut().devices.push(device);
        self
    }

    pub fn with_driver(self, reference: &str, description: &str) -> Self {
        self.state_mut().drivers.push(DriverEntry {
            reference: DriverRef::from(reference),
            description: description.to_owned(),
        });
        self
    }

    pub fn with_queue(self, queue: QueueState) -> Self {
        self.state_mut().queues.insert(queue.name.clone(), queue);
        self
    }

    pub fn with_job(self, queue: &str, state: JobState) -> Self {
        {
            let mut s = self.state_mut();
            let id = JobId(s.next_job);
            s.next_job += 1;
            s.jobs.push(PrintJob {
                id,
                queue: queue.to_owned(),
                owner: "pi".into(),
                size_bytes: 1024,
                state,
            });
        }
        self
    }

    fn check_queue(&self, name: &str) -> Result<()> {
        let s = self.state();
        if s.queues_unavailable {
            return Err(AirspoolError::unavailable("cups", "scheduler not running"));
        }
        if s.reject_queues.contains(name) {
            return Err(AirspoolError::rejected(name, "rejected by test fixture"));
        }
        Ok(())
    }

    fn with_existing_queue(&self, name: &str, f: impl FnOnce(&mut QueueState)) -> Result<()> {
        self.check_queue(name)?;
        let mut s = self.state_mut();
        let queue = s
            .queues
            .get_mut(name)
            .ok_or_else(|| AirspoolError::QueueNotFound(name.to_owned()))?;
        f(queue);
        Ok(())
    }
}

impl DeviceCatalog for MemoryPrintSystem {
    fn list_attached_printer_devices(&self) -> Result<Vec<RawDevice>> {
        let s = self.state();
        if s.devices_unavailable {
            return Err(AirspoolError::unavailable("usb sysfs", "not mounted"));
        }
        Ok(s.devices.clone())
    }
}

impl DriverCatalog for MemoryPrintSystem {
    fn driver_exists(&self, driver: &DriverRef) -> Result<bool> {
        Ok(self
            .list_available_drivers()?
            .iter()
            .any(|d| &d.reference == driver))
    }

    fn list_available_drivers(&self) -> Result<Vec<DriverEntry>> {
        let s = self.state();
        if s.drivers_unavailable {
            return Err(AirspoolError::unavailable("lpinfo", "scheduler not running"));
        }
        Ok(s.drivers.clone())
    }
}

impl QueueManager for MemoryPrintSystem {
    fn list_queues(&self) -> Result<Vec<QueueState>> {
        let s = self.state();
        if s.queues_unavailable {
            return Err(AirspoolError::unavailable("cups", "scheduler not running"));
        }
        Ok(s.queues.values().cloned().collect())
    }

    fn upsert_queue(&self, desired: &QueueState) -> Result<()> {
        self.check_queue(&desired.name)?;
        let mut s = self.state_mut();
        s.upserted.push(desired.name.clone());
        match s.queues.get_mut(&desired.name) {
            Some(queue) => {
                queue.device_uri = desired.device_uri.clone();
                queue.driver_ref = desired.driver_ref.clone();
                queue.location = desired.location.clone();
                queue.shared = desired.shared;
            }
            None => {
                // New queues start disabled and rejecting, as with lpadmin.
                let queue = QueueState {
                    options: OptionMap::new(),
                    enabled: false,
                    accepting: false,
                    ..desired.clone()
                };
                s.queues.insert(desired.name.clone(), queue);
            }
        }
        Ok(())
    }

    fn remove_queue(&self, name: &str) -> Result<()> {
        self.check_queue(name)?;
        let mut s = self.state_mut();
        if s.queues.remove(name).is_none() {
            return Err(AirspoolError::QueueNotFound(name.to_owned()));
        }
        s.removed.push(name.to_owned());
        Ok(())
    }

    fn set_default_options(&self, name: &str, options: &OptionMap) -> Result<()> {
        self.with_existing_queue(name, |q| {
            q.options
                .extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        })
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.with_existing_queue(name, |q| q.enabled = enabled)
    }

    fn set_accepting(&self, name: &str, accepting: bool) -> Result<()> {
        self.with_existing_queue(name, |q| q.accepting = accepting)
    }
}

impl JobControl for MemoryPrintSystem {
    fn list_jobs(&self, filter: JobFilter) -> Result<Vec<PrintJob>> {
        let s = self.state();
        if s.queues_unavailable {
            return Err(AirspoolError::unavailable("cups", "scheduler not running"));
        }
        Ok(s.jobs
            .iter()
            .filter(|j| match filter {
                JobFilter::Active => j.state.is_active(),
                JobFilter::Completed => !j.state.is_active(),
            })
            .cloned()
            .collect())
    }

    fn cancel_job(&self, id: JobId) -> Result<()> {
        let mut s = self.state_mut();
        let job = s
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.state.is_active())
            .ok_or(AirspoolError::JobNotFound(id))?;
        job.state = JobState::Cancelled;
        Ok(())
    }

    fn cancel_all_jobs(&self, queue: &str) -> Result<()> {
        self.check_queue(queue)?;
        let mut s = self.state_mut();
        if !s.queues.contains_key(queue) {
            return Err(AirspoolError::QueueNotFound(queue.to_owned()));
        }
        for job in s.jobs.iter_mut().filter(|j| j.queue == queue && j.state.is_active()) {
            job.state = JobState::Cancelled;
        }
        Ok(())
    }

    fn submit_test_page(&self, queue: &str) -> Result<JobId> {
        self.check_queue(queue)?;
        let mut s = self.state_mut();
        let accepting = s
            .queues
            .get(queue)
            .ok_or_else(|| AirspoolError::QueueNotFound(queue.to_owned()))?
            .accepting;
        if !accepting {
            return Err(AirspoolError::rejected(queue, "not accepting jobs"));
        }
        let id = JobId(s.next_job);
        s.next_job += 1;
        s.jobs.push(PrintJob {
            id,
            queue: queue.to_owned(),
            owner: "root".into(),
            size_bytes: 0,
            state: JobState::Pending,
        });
        Ok(id)
    }

    fn list_spool_artifacts(&self) -> Result<Vec<SpoolArtifact>> {
        Ok(self.state().artifacts.clone())
    }

    fn delete_spool_artifact(&self, artifact: &SpoolArtifact) -> Result<()> {
        self.state_mut().artifacts.retain(|a| a.path != artifact.path);
        Ok(())
    }
}

impl MemoryPrintSystem {
    fn check_adverts(&self) -> Result<()> {
        if self.state().adverts_unavailable {
            return Err(AirspoolError::unavailable("avahi-daemon", "service directory unavailable"));
        }
        Ok(())
    }
}

impl AdvertisementHost for MemoryPrintSystem {
    fn list_descriptors(&self) -> Result<Vec<String>> {
        self.check_adverts()?;
        Ok(self.state().descriptors.keys().cloned().collect())
    }

    fn read_descriptor(&self, queue: &str) -> Result<Option<String>> {
        self.check_adverts()?;
        Ok(self.state().descriptors.get(queue).cloned())
    }

    fn write_descriptor(&self, queue: &str, content: &str) -> Result<()> {
        self.check_adverts()?;
        let mut s = self.state_mut();
        s.descriptors.insert(queue.to_owned(), content.to_owned());
        s.descriptor_writes += 1;
        Ok(())
    }

    fn delete_descriptor(&self, queue: &str) -> Result<()> {
        self.check_adverts()?;
        let mut s = self.state_mut();
        if s.descriptors.remove(queue).is_some() {
            s.descriptor_deletes += 1;
        }
        Ok(())
    }

    fn reload_advertisement_service(&self) -> Result<()> {
        self.check_adverts()?;
        self.state_mut().reloads += 1;
        Ok(())
    }
}

impl ServiceControl for MemoryPrintSystem {
    fn is_active(&self, service: ManagedService) -> Result<bool> {
        Ok(!self.state().inactive_services.contains(&service))
    }

    fn restart(&self, service: ManagedService) -> Result<()> {
        let mut s = self.state_mut();
        s.inactive_services.remove(&service);
        s.restarts.push(service);
        Ok(())
    }

    fn tail_log(&self, lines: usize) -> Result<Vec<String>> {
        let s = self.state();
        let start = s.log_lines.len().saturating_sub(lines);
        Ok(s.log_lines[start..].to_vec())
    }

    fn log_verbosity(&self) -> Result<LogVerbosity> {
        Ok(self.state().verbosity)
    }

    fn set_log_verbosity(&self, verbosity: LogVerbosity) -> Result<()> {
        self.state_mut().verbosity = verbosity;
        Ok(())
    }
}

impl HealthTelemetry for MemoryPrintSystem {
    fn read_telemetry(&self) -> Result<TelemetryReadings> {
        Ok(self.state().telemetry.clone())
    }
}
