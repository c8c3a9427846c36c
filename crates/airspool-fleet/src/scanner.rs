// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device inventory scan.
//
// A scan never fails: when the device catalog cannot be read the result is an
// empty inventory plus a warning, so profiles whose queues already exist are
// still reconciled (as absent) and advertisements stay consistent.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use airspool_bridge::traits::DeviceCatalog;
use airspool_core::types::{DeviceDescriptor, Diagnostic, DiagnosticKind, RawDevice};

/// Attached printers in scan order, plus anything worth reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub devices: Vec<DeviceDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Enumerate attached printers.
pub fn scan(catalog: &dyn DeviceCatalog) -> ScanReport {
    match catalog.list_attached_printer_devices() {
        Ok(raw) => {
            let devices: Vec<DeviceDescriptor> = raw.into_iter().map(describe).collect();
            for d in &devices {
                debug!(usb_id = %d.usb_id(), id = %d.serial_or_port, description = %d.raw_description, "device");
            }
            info!(count = devices.len(), "device scan complete");
            ScanReport {
                devices,
                diagnostics: Vec::new(),
            }
        }
        Err(e) => {
            warn!(error = %e, "device enumeration failed; continuing with no devices");
            ScanReport {
                devices: Vec::new(),
                diagnostics: vec![Diagnostic::new(
                    DiagnosticKind::BackendWarning,
                    "device-scan",
                    format!("device enumeration failed: {e}"),
                )],
            }
        }
    }
}

/// Normalise one raw device. The serial is the stable identity when present;
/// otherwise the bus port stands in for it.
pub fn describe(raw: RawDevice) -> DeviceDescriptor {
    let serial_or_port = raw
        .serial
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(raw.port);
    DeviceDescriptor {
        vendor_id: raw.vendor_id,
        product_id: raw.product_id,
        serial_or_port,
        raw_description: raw.description,
        device_uri: raw.device_uri,
    }
}
