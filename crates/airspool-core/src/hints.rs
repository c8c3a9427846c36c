// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing remediation hints.
//
// Every error the CLI prints is followed by one line telling the operator what
// to try next. Hints are keyed on the error variant and, for backend errors,
// on well-known fragments of the tool output.

use std::fmt;

use crate::error::AirspoolError;

/// Whether retrying later could help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Likely transient (daemon restarting, USB settling).
    Retry,
    /// Operator must change something first.
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

impl Recovery {
    /// Trailer appended to the printed hint.
    pub fn note(self) -> &'static str {
        match self {
            Recovery::Retry => "retrying may help",
            Recovery::ActionRequired => "fix this before retrying",
            Recovery::Permanent => "retrying will not help",
        }
    }
}

/// A short next step for the operator.
#[derive(Debug, Clone)]
pub struct OperatorHint {
    pub suggestion: String,
    pub recovery: Recovery,
}

impl fmt::Display for OperatorHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.suggestion, self.recovery.note())
    }
}

/// Map an error to its remediation hint.
pub fn operator_hint(err: &AirspoolError) -> OperatorHint {
    match err {
        AirspoolError::ServiceUnavailable { service, detail } => unavailable_hint(service, detail),

        AirspoolError::QueueRejected { queue, detail } => {
            if detail.contains("PPD") || detail.contains("ppd") || detail.contains("model") {
                hint(
                    format!("Check the driver for {queue} with `airspool drivers`; the PPD may not be installed."),
                    Recovery::ActionRequired,
                )
            } else if detail.contains("Forbidden") || detail.contains("not authorized") {
                hint(
                    "Run as root or add the user to the lpadmin group.",
                    Recovery::ActionRequired,
                )
            } else {
                hint(
                    format!("Inspect {queue} with `lpstat -l -p {queue}` and the CUPS error log (`airspool logs`)."),
                    Recovery::Retry,
                )
            }
        }

        AirspoolError::QueueNotFound(name) => hint(
            format!("No queue named {name}; `airspool status` lists the configured queues."),
            Recovery::Permanent,
        ),

        AirspoolError::JobNotFound(_) => hint(
            "The job may already have finished; `airspool queues` lists active jobs.",
            Recovery::Permanent,
        ),

        AirspoolError::ConfirmationRequired => hint(
            "Re-run with --yes to confirm.",
            Recovery::ActionRequired,
        ),

        AirspoolError::Config(_) | AirspoolError::Toml(_) => hint(
            "Fix the fleet configuration file (see config/fleet.toml for a reference layout).",
            Recovery::ActionRequired,
        ),

        AirspoolError::Parse { what, .. } => hint(
            format!("Unexpected {what} output; the installed CUPS version may format it differently."),
            Recovery::Permanent,
        ),

        AirspoolError::Telemetry(_) => hint(
            "Some host readings are not available on this board.",
            Recovery::Permanent,
        ),

        AirspoolError::Journal(_) => hint(
            "Check that the journal directory exists and is writable.",
            Recovery::ActionRequired,
        ),

        AirspoolError::Discovery(_) => hint(
            "Multicast may be blocked; check that avahi-daemon is running and the network allows mDNS.",
            Recovery::Retry,
        ),

        AirspoolError::Io(io) => match io.kind() {
            std::io::ErrorKind::PermissionDenied => hint(
                "Permission denied; run with sudo.",
                Recovery::ActionRequired,
            ),
            std::io::ErrorKind::NotFound => hint(
                "A required file or directory is missing; check the [paths] section of the config.",
                Recovery::ActionRequired,
            ),
            _ => hint("A file operation failed; try again.", Recovery::Retry),
        },

        AirspoolError::Serialization(_) => hint(
            "Internal serialization failed; please report this.",
            Recovery::Permanent,
        ),
    }
}

fn unavailable_hint(service: &str, detail: &str) -> OperatorHint {
    if detail.contains("No such file") || detail.contains("not found") {
        hint(
            format!("The {service} tools are not installed; install the cups package."),
            Recovery::ActionRequired,
        )
    } else if service.contains("cups") || detail.contains("Unable to connect") {
        hint(
            "The CUPS scheduler is not answering; try `airspool restart cups`.",
            Recovery::Retry,
        )
    } else if service.contains("avahi") {
        hint(
            "Avahi is not answering; try `airspool restart avahi`.",
            Recovery::Retry,
        )
    } else {
        hint(format!("{service} is unreachable; try again shortly."), Recovery::Retry)
    }
}

fn hint(suggestion: impl Into<String>, recovery: Recovery) -> OperatorHint {
    OperatorHint {
        suggestion: suggestion.into(),
        recovery,
    }
}
