// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host health snapshot with three severity bands.

use serde::Serialize;

use airspool_core::config::{HealthThresholds, Threshold};
use airspool_core::types::{Severity, TelemetryReadings};

const SECS_PER_DAY: f64 = 86_400.0;

/// One classified reading. `value` is `None` when the host could not report it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: &'static str,
    pub unit: &'static str,
    pub value: Option<f64>,
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub metrics: Vec<Metric>,
    /// Worst band over the metrics that were available.
    pub overall: Severity,
}

/// Higher is worse; a reading equal to a boundary falls in the worse band.
pub fn classify(value: f64, threshold: Threshold) -> Severity {
    if value >= threshold.critical {
        Severity::Critical
    } else if value >= threshold.warn {
        Severity::Warn
    } else {
        Severity::Normal
    }
}

pub fn snapshot(readings: &TelemetryReadings, thresholds: &HealthThresholds) -> HealthSnapshot {
    let metric = |name: &'static str, unit: &'static str, value: Option<f64>, threshold: Threshold| Metric {
        name,
        unit,
        value,
        severity: value.map(|v| classify(v, threshold)),
    };
    let metrics = vec![
        metric("temperature", "°C", readings.temperature_c, thresholds.temperature_c),
        metric("memory", "%", readings.memory_used_percent, thresholds.memory_percent),
        metric("disk", "%", readings.disk_used_percent, thresholds.disk_percent),
        metric(
            "uptime",
            "days",
            readings.uptime_secs.map(|s| s as f64 / SECS_PER_DAY),
            thresholds.uptime_days,
        ),
    ];
    let overall = metrics
        .iter()
        .filter_map(|m| m.severity)
        .max()
        .unwrap_or(Severity::Normal);
    HealthSnapshot { metrics, overall }
}
