// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator traits for the external print services.
//
// The fleet crate only ever talks to CUPS, Avahi, systemd, and the host
// through these traits. Every call is synchronous and blocking. Methods return
// `AirspoolError::ServiceUnavailable` when the backend cannot be reached at
// all, and `AirspoolError::QueueRejected` when it answered but refused.

use airspool_core::error::Result;
use airspool_core::types::{
    DriverEntry, DriverRef, JobFilter, JobId, LogVerbosity, ManagedService, OptionMap, PrintJob,
    QueueState, RawDevice, SpoolArtifact, TelemetryReadings,
};

/// Enumerates attached USB printers.
pub trait DeviceCatalog {
    /// Devices in a stable enumeration order.
    fn list_attached_printer_devices(&self) -> Result<Vec<RawDevice>>;
}

/// The system's catalog of installable drivers/PPDs.
pub trait DriverCatalog {
    /// Exact-match lookup of a driver reference.
    fn driver_exists(&self, driver: &DriverRef) -> Result<bool>;

    fn list_available_drivers(&self) -> Result<Vec<DriverEntry>>;
}

/// Printer queue administration.
pub trait QueueManager {
    fn list_queues(&self) -> Result<Vec<QueueState>>;

    /// Create the queue or update it in place with the desired device URI,
    /// driver, location, and sharing flag. Options and the enabled/accepting
    /// flags are set through the dedicated methods.
    fn upsert_queue(&self, desired: &QueueState) -> Result<()>;

    fn remove_queue(&self, name: &str) -> Result<()>;

    fn set_default_options(&self, name: &str, options: &OptionMap) -> Result<()>;

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()>;

    fn set_accepting(&self, name: &str, accepting: bool) -> Result<()>;
}

/// Job listing, cancellation, and spool file access.
pub trait JobControl {
    fn list_jobs(&self, filter: JobFilter) -> Result<Vec<PrintJob>>;

    fn cancel_job(&self, id: JobId) -> Result<()>;

    /// Cancel every active job on one queue.
    fn cancel_all_jobs(&self, queue: &str) -> Result<()>;

    fn submit_test_page(&self, queue: &str) -> Result<JobId>;

    fn list_spool_artifacts(&self) -> Result<Vec<SpoolArtifact>>;

    /// Deleting an artifact that is already gone is not an error.
    fn delete_spool_artifact(&self, artifact: &SpoolArtifact) -> Result<()>;
}

/// Publishes AirPrint service descriptors, one per queue.
pub trait AdvertisementHost {
    /// Queue names that currently have a descriptor.
    fn list_descriptors(&self) -> Result<Vec<String>>;

    fn read_descriptor(&self, queue: &str) -> Result<Option<String>>;

    fn write_descriptor(&self, queue: &str, content: &str) -> Result<()>;

    fn delete_descriptor(&self, queue: &str) -> Result<()>;

    fn reload_advertisement_service(&self) -> Result<()>;
}

/// Daemon lifecycle and print subsystem logging.
pub trait ServiceControl {
    fn is_active(&self, service: ManagedService) -> Result<bool>;

    fn restart(&self, service: ManagedService) -> Result<()>;

    /// Last `lines` lines of the print subsystem log, oldest first.
    fn tail_log(&self, lines: usize) -> Result<Vec<String>>;

    fn log_verbosity(&self) -> Result<LogVerbosity>;

    fn set_log_verbosity(&self, verbosity: LogVerbosity) -> Result<()>;
}

/// Read-only host readings.
pub trait HealthTelemetry {
    /// Readings that cannot be taken on this host are `None`.
    fn read_telemetry(&self) -> Result<TelemetryReadings>;
}
