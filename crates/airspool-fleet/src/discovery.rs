// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Network-side check of the advertisements.
//
// Writing a descriptor only proves the file exists. Browsing `_ipp._tcp` from
// this host shows whether Avahi actually announced it.

use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use airspool_core::error::{AirspoolError, Result};

const IPP_SERVICE: &str = "_ipp._tcp.local.";

/// Which expected queues were seen on the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityReport {
    pub visible: Vec<String>,
    pub missing: Vec<String>,
    /// Every instance name seen during the browse.
    pub seen: Vec<String>,
}

/// Browse for `timeout` and collect the instance names announced.
pub fn browse_ipp(timeout: Duration) -> Result<Vec<String>> {
    let daemon = ServiceDaemon::new()
        .map_err(|e| AirspoolError::Discovery(format!("failed to start mDNS daemon: {e}")))?;
    let receiver = daemon
        .browse(IPP_SERVICE)
        .map_err(|e| AirspoolError::Discovery(format!("browse {IPP_SERVICE}: {e}")))?;

    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match receiver.recv_timeout(remaining) {
            Ok(ServiceEvent::ServiceFound(_, fullname)) => {
                debug!(name = %fullname, "ipp service found");
                if !seen.contains(&fullname) {
                    seen.push(fullname);
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    // Shutdown failures only matter to a long-lived daemon.
    let _ = daemon.shutdown();
    seen.sort();
    info!(count = seen.len(), "mDNS browse finished");
    Ok(seen)
}

/// Match expected queues against announced instance names. The descriptor
/// names each service `AirPrint <queue> @ <host>`.
pub fn match_visibility(expected: &[String], seen: &[String]) -> VisibilityReport {
    let mut report = VisibilityReport {
        seen: seen.to_vec(),
        ..VisibilityReport::default()
    };
    for queue in expected {
        let needle = format!("AirPrint {queue} @ ");
        if seen.iter().any(|name| name.starts_with(&needle)) {
            report.visible.push(queue.clone());
        } else {
            report.missing.push(queue.clone());
        }
    }
    report
}
