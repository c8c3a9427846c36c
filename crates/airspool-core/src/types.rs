// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Airspool fleet reconciler.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue option name to value (e.g. `media` -> `w288h432`).
///
/// Ordered so that plans and rendered output are deterministic.
pub type OptionMap = BTreeMap<String, String>;

/// mDNS service type used for every AirPrint advertisement.
pub const IPP_SERVICE_TYPE: &str = "_ipp._tcp";

/// Identifier of one reconcile run, used to correlate journal rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Hardware and drivers
// ---------------------------------------------------------------------------

/// One printer as the device catalog reports it, before normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    /// USB serial number, when the device exposes one.
    pub serial: Option<String>,
    /// Bus port path (e.g. `1-1.3`), stable while the cable stays put.
    pub port: String,
    /// Manufacturer and product strings as enumerated.
    pub description: String,
    /// CUPS backend URI for the device.
    pub device_uri: String,
}

/// One physically attached printer, valid for a single scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Serial number, or the port path when no serial is available.
    pub serial_or_port: String,
    pub raw_description: String,
    pub device_uri: String,
}

impl DeviceDescriptor {
    /// `vvvv:pppp` as printed by `lsusb`.
    pub fn usb_id(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Reference to a driver/PPD as the driver catalog names it
/// (e.g. `drv:///hpcups.drv/hp-laserjet_1320_series.ppd`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverRef(pub String);

impl DriverRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DriverRef {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl std::fmt::Display for DriverRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the driver catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub reference: DriverRef,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Declared and actual configuration
// ---------------------------------------------------------------------------

/// Declared target configuration for one supported printer model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterProfile {
    /// Unique; doubles as the CUPS queue name.
    pub logical_name: String,
    /// Case-insensitive substring matched against a device description.
    pub match_pattern: String,
    /// Most specific first. The first one the catalog confirms wins.
    pub driver_candidates: Vec<DriverRef>,
    #[serde(default)]
    pub default_options: OptionMap,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_true")]
    pub shared: bool,
    /// Media keywords advertised to AirPrint clients.
    #[serde(default)]
    pub media_supported: Vec<String>,
    /// Human-readable model for the `ty` TXT record.
    #[serde(default)]
    pub make_and_model: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PrinterProfile {
    /// The declared default `media` option, if any.
    pub fn media_default(&self) -> Option<&str> {
        self.default_options.get("media").map(String::as_str)
    }
}

/// One CUPS-visible printer queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub name: String,
    pub device_uri: String,
    /// `None` for queues Airspool did not create.
    pub driver_ref: Option<DriverRef>,
    pub options: OptionMap,
    pub location: String,
    pub enabled: bool,
    pub accepting: bool,
    pub shared: bool,
}

impl QueueState {
    /// A queue is advertised over AirPrint iff it is enabled, accepting, and shared.
    pub fn is_advertisable(&self) -> bool {
        self.enabled && self.accepting && self.shared
    }
}

/// One AirPrint service descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAdvertisement {
    pub queue_name: String,
    pub service_type: String,
    /// Ordered; rendered in this order.
    pub txt_records: Vec<(String, String)>,
    pub media_default: Option<String>,
    pub media_supported: Vec<String>,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Per-profile conditions that never abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Profile has no matching hardware. Expected steady state.
    DeviceNotFound,
    /// No driver candidate was confirmed; the last one is used as a guess.
    DriverUnresolved,
    /// A more specific candidate was missing; a later, confirmed one is used.
    DriverFallback,
    /// Several devices matched one profile; the first in scan order won.
    AmbiguousMatch,
    /// The print subsystem rejected this profile's changes.
    QueueApplyFailed,
    /// A backend hiccup that was tolerated (e.g. device enumeration failed).
    BackendWarning,
}

impl DiagnosticKind {
    /// Whether this kind means the run proceeded in a degraded way.
    pub fn is_degrading(&self) -> bool {
        !matches!(self, Self::DeviceNotFound | Self::DriverFallback)
    }
}

/// A logged-and-returned note about one profile or queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Logical name or queue name the diagnostic concerns.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs and spool
// ---------------------------------------------------------------------------

/// CUPS job number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u32);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    /// Accepts `12` as well as the CUPS `queue-12` form.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let number = s.rsplit_once('-').map_or(s, |(_, n)| n);
        number.trim().parse().map(JobId)
    }
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Held,
    Processing,
    Completed,
    Cancelled,
    Aborted,
}

impl JobState {
    /// Active jobs still own their spool files.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Held | Self::Processing)
    }
}

/// A job known to the print subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub queue: String,
    pub owner: String,
    pub size_bytes: u64,
    pub state: JobState,
}

/// Which jobs to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobFilter {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// `cNNNNN` job control file.
    Control,
    /// `dNNNNN-NNN` document file.
    Data,
}

/// One file in the print spool belonging to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolArtifact {
    pub job_id: JobId,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Services and host health
// ---------------------------------------------------------------------------

/// System daemons the console can query and restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ManagedService {
    Cups,
    Avahi,
}

impl ManagedService {
    pub const ALL: [ManagedService; 2] = [ManagedService::Cups, ManagedService::Avahi];

    /// systemd unit name.
    pub fn unit_name(&self) -> &'static str {
        match self {
            Self::Cups => "cups",
            Self::Avahi => "avahi-daemon",
        }
    }
}

impl std::fmt::Display for ManagedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.unit_name())
    }
}

/// Print subsystem log verbosity. Two states only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogVerbosity {
    Normal,
    Verbose,
}

impl LogVerbosity {
    pub fn toggled(self) -> Self {
        match self {
            Self::Normal => Self::Verbose,
            Self::Verbose => Self::Normal,
        }
    }
}

/// Raw host readings. Any of them may be missing on a given board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReadings {
    pub temperature_c: Option<f64>,
    pub memory_used_percent: Option<f64>,
    pub disk_used_percent: Option<f64>,
    pub uptime_secs: Option<u64>,
}

/// Severity band of a health metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Warn,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Warn => "warn",
            Self::Critical => "critical",
        })
    }
}
