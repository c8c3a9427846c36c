// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host readings through sysinfo: memory and uptime from `System`, SoC
// temperature from `Components`, filesystem usage from `Disks`.

use std::path::{Path, PathBuf};

use sysinfo::{Components, Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

use airspool_core::error::Result;
use airspool_core::types::TelemetryReadings;

use crate::traits::HealthTelemetry;

/// Reads SoC temperature, memory, usage of the filesystem holding
/// `disk_path`, and uptime.
pub struct HostTelemetry {
    disk_path: PathBuf,
}

impl HostTelemetry {
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self {
            disk_path: disk_path.into(),
        }
    }
}

impl HealthTelemetry for HostTelemetry {
    fn read_telemetry(&self) -> Result<TelemetryReadings> {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        let components = Components::new_with_refreshed_list();
        let disks = Disks::new_with_refreshed_list();

        let temperature_c = hottest(components.iter().map(|c| c.temperature()));
        if temperature_c.is_none() {
            debug!(sensors = components.len(), "no temperature sensor readable");
        }

        let mounts: Vec<MountUsage> = disks
            .iter()
            .map(|d| MountUsage {
                mount_point: d.mount_point().to_path_buf(),
                total: d.total_space(),
                available: d.available_space(),
            })
            .collect();

        let uptime = System::uptime();
        Ok(TelemetryReadings {
            temperature_c,
            memory_used_percent: used_percent(sys.total_memory(), sys.available_memory()),
            disk_used_percent: usage_for_path(&mounts, &self.disk_path),
            uptime_secs: (uptime > 0).then_some(uptime),
        })
    }
}

/// One mounted filesystem as `Disks` reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct MountUsage {
    pub mount_point: PathBuf,
    pub total: u64,
    pub available: u64,
}

/// Highest sensor reading. Sensors that failed to read are ignored.
pub fn hottest(readings: impl IntoIterator<Item = Option<f32>>) -> Option<f64> {
    readings
        .into_iter()
        .flatten()
        .filter(|t| t.is_finite())
        .map(f64::from)
        .reduce(f64::max)
}

/// `(total - available) / total` as a percentage.
pub fn used_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some(used as f64 * 100.0 / total as f64)
}

/// Usage of the filesystem holding `path`: the longest mount point that
/// is a prefix of it.
pub fn usage_for_path(mounts: &[MountUsage], path: &Path) -> Option<f64> {
    let mount = mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count());
    match mount {
        Some(m) => used_percent(m.total, m.available),
        None => {
            debug!(path = %path.display(), "no mounted filesystem holds path");
            None
        }
    }
}
