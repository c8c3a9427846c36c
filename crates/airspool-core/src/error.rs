// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Airspool.

use thiserror::Error;

use crate::types::JobId;

/// Top-level error type for all Airspool operations.
///
/// Per-profile problems found while planning (missing hardware, unverified
/// drivers, ambiguous matches) are not errors; they travel as
/// [`crate::types::Diagnostic`] values inside plans and results.
#[derive(Debug, Error)]
pub enum AirspoolError {
    // -- Backend errors --
    /// A backend (CUPS, sysfs, Avahi, systemd) could not be reached at all.
    /// Fatal for the current run.
    #[error("{service} is unavailable: {detail}")]
    ServiceUnavailable { service: String, detail: String },

    /// The print subsystem refused a mutation on one queue.
    #[error("queue {queue} rejected the change: {detail}")]
    QueueRejected { queue: String, detail: String },

    #[error("no queue named {0}")]
    QueueNotFound(String),

    #[error("no job with id {0}")]
    JobNotFound(JobId),

    #[error("this operation changes state and must be confirmed")]
    ConfirmationRequired,

    // -- Input errors --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not parse {what}: {detail}")]
    Parse { what: String, detail: String },

    // -- Host and persistence --
    #[error("telemetry unavailable: {0}")]
    Telemetry(String),

    #[error("journal error: {0}")]
    Journal(String),

    #[error("mDNS browse failed: {0}")]
    Discovery(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config syntax error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AirspoolError {
    pub fn unavailable(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
            detail: detail.into(),
        }
    }

    pub fn rejected(queue: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::QueueRejected {
            queue: queue.into(),
            detail: detail.into(),
        }
    }

    pub fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }

    /// Whether this error invalidates the whole run rather than one profile.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AirspoolError>;
