// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thin wrapper over `std::process::Command` for the CUPS and systemd tools.

use std::process::Command;

use tracing::{debug, instrument};

use airspool_core::error::{AirspoolError, Result};

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stderr, or stdout when stderr is empty.
    pub fn message(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_owned()
        } else {
            err.to_owned()
        }
    }

    /// Whether the tool failed because the scheduler could not be reached.
    pub fn is_connection_failure(&self) -> bool {
        let text = self.message();
        [
            "Unable to connect to server",
            "Connection refused",
            "scheduler is not running",
            "Bad file descriptor",
        ]
        .iter()
        .any(|needle| text.contains(needle))
    }
}

/// Run a tool to completion. Failing to spawn it at all (missing binary,
/// no permission to execute) is reported as the service being unavailable.
#[instrument(skip(args), fields(args = %args.join(" ")))]
pub fn run(program: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = Command::new(program)
        .args(args)
        .env("LC_ALL", "C")
        .output()
        .map_err(|e| AirspoolError::unavailable(program, e.to_string()))?;

    let out = CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(program, code = ?out.code, "command finished");
    Ok(out)
}

/// Run a tool and require success. Connection failures become
/// `ServiceUnavailable`; any other failure is a rejection of `queue`.
pub fn run_for_queue(program: &str, args: &[&str], queue: &str) -> Result<CommandOutput> {
    let out = run(program, args)?;
    if out.success {
        return Ok(out);
    }
    if out.is_connection_failure() {
        return Err(AirspoolError::unavailable("cups", out.message()));
    }
    Err(AirspoolError::rejected(queue, out.message()))
}

/// Run a read-only query and require success; any failure means the backend
/// could not answer.
pub fn run_query(program: &str, args: &[&str]) -> Result<CommandOutput> {
    let out = run(program, args)?;
    if out.success {
        Ok(out)
    } else {
        Err(AirspoolError::unavailable(program, out.message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stderr: &str) -> CommandOutput {
        CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn recognises_scheduler_down() {
        assert!(output("lpadmin: Unable to connect to server: Connection refused").is_connection_failure());
        assert!(!output("lpadmin: Unable to copy PPD file").is_connection_failure());
    }

    #[test]
    fn message_falls_back_to_stdout() {
        let out = CommandOutput {
            success: false,
            code: Some(3),
            stdout: "  inactive\n".into(),
            stderr: String::new(),
        };
        assert_eq!(out.message(), "inactive");
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let err = run("airspool-definitely-not-installed", &[]).expect_err("spawn fails");
        assert!(err.is_fatal());
    }
}
