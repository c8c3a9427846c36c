// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Driver resolution against the driver catalog.
//
// Candidates are tried strictly in declaration order; specificity is never
// inferred. When the catalog confirms none of them the last candidate is used
// unverified, so setup can proceed on catalogs that name drivers differently
// (the Dymo `dymo:0/ppd/...` paths are the usual case).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use airspool_bridge::traits::DriverCatalog;
use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::{DeviceDescriptor, Diagnostic, DiagnosticKind, DriverRef, PrinterProfile};

/// Outcome of resolving one profile's driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverResolution {
    pub driver: DriverRef,
    /// `false` when no candidate was confirmed and `driver` is the guess.
    pub verified: bool,
    /// Candidates the catalog did not know, in the order they were tried.
    pub skipped: Vec<DriverRef>,
}

impl DriverResolution {
    /// Warning to surface for this resolution, if any.
    pub fn diagnostic(&self, logical_name: &str) -> Option<Diagnostic> {
        if !self.verified {
            return Some(Diagnostic::new(
                DiagnosticKind::DriverUnresolved,
                logical_name,
                format!(
                    "no driver candidate found in the catalog; using unverified {}",
                    self.driver
                ),
            ));
        }
        if !self.skipped.is_empty() {
            let missing: Vec<&str> = self.skipped.iter().map(DriverRef::as_str).collect();
            return Some(Diagnostic::new(
                DiagnosticKind::DriverFallback,
                logical_name,
                format!("{} not in the catalog; using {}", missing.join(", "), self.driver),
            ));
        }
        None
    }
}

/// Pick the driver for a matched device.
///
/// Errors only when the catalog itself is unreachable or the profile declares
/// no candidates.
pub fn resolve(
    catalog: &dyn DriverCatalog,
    descriptor: &DeviceDescriptor,
    profile: &PrinterProfile,
) -> Result<DriverResolution> {
    let mut skipped = Vec::new();
    for candidate in &profile.driver_candidates {
        if catalog.driver_exists(candidate)? {
            debug!(
                profile = %profile.logical_name,
                device = %descriptor.usb_id(),
                driver = %candidate,
                "driver resolved"
            );
            return Ok(DriverResolution {
                driver: candidate.clone(),
                verified: true,
                skipped,
            });
        }
        skipped.push(candidate.clone());
    }

    let fallback = skipped.last().cloned().ok_or_else(|| {
        AirspoolError::Config(format!(
            "printer {} lists no driver_candidates",
            profile.logical_name
        ))
    })?;
    warn!(
        profile = %profile.logical_name,
        driver = %fallback,
        "no driver candidate confirmed; falling back to last candidate"
    );
    Ok(DriverResolution {
        driver: fallback,
        verified: false,
        skipped,
    })
}
