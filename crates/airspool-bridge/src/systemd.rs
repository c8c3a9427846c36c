// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Daemon control through systemctl, CUPS log access, and the debug-logging
// switch through cupsctl.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{info, instrument};

use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::{LogVerbosity, ManagedService};

use crate::command::{run, run_query};
use crate::traits::ServiceControl;

/// systemd + cupsctl service control.
pub struct Systemd {
    cups_error_log: PathBuf,
}

impl Systemd {
    pub fn new(cups_error_log: impl Into<PathBuf>) -> Self {
        Self {
            cups_error_log: cups_error_log.into(),
        }
    }
}

impl ServiceControl for Systemd {
    fn is_active(&self, service: ManagedService) -> Result<bool> {
        // `is-active` exits non-zero for inactive units; only a spawn failure
        // is an error here.
        let out = run("systemctl", &["is-active", service.unit_name()])?;
        Ok(out.success && out.stdout.trim() == "active")
    }

    #[instrument(skip(self))]
    fn restart(&self, service: ManagedService) -> Result<()> {
        let out = run("systemctl", &["restart", service.unit_name()])?;
        if !out.success {
            return Err(AirspoolError::unavailable(service.unit_name(), out.message()));
        }
        info!(%service, "service restarted");
        Ok(())
    }

    fn tail_log(&self, lines: usize) -> Result<Vec<String>> {
        let file = std::fs::File::open(&self.cups_error_log)?;
        tail_lines(BufReader::new(file), lines)
    }

    fn log_verbosity(&self) -> Result<LogVerbosity> {
        let out = run_query("cupsctl", &[])?;
        parse_cupsctl_verbosity(&out.stdout)
            .ok_or_else(|| AirspoolError::parse("cupsctl settings", "no _debug_logging entry"))
    }

    #[instrument(skip(self))]
    fn set_log_verbosity(&self, verbosity: LogVerbosity) -> Result<()> {
        let flag = match verbosity {
            LogVerbosity::Normal => "--no-debug-logging",
            LogVerbosity::Verbose => "--debug-logging",
        };
        run_query("cupsctl", &[flag])?;
        info!(?verbosity, "cups log verbosity changed");
        Ok(())
    }
}

/// Keep only the last `n` lines of a reader. Bytes that are not UTF-8
/// (printer names in Latin-1, binary backend output) are replaced.
pub fn tail_lines(reader: impl BufRead, n: usize) -> Result<Vec<String>> {
    let mut window = VecDeque::with_capacity(n.min(4096));
    if n == 0 {
        return Ok(Vec::new());
    }
    for line in reader.split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if window.len() == n {
            window.pop_front();
        }
        window.push_back(String::from_utf8_lossy(&line).into_owned());
    }
    Ok(window.into())
}

/// `cupsctl` prints `_debug_logging=0|1` among its settings.
pub fn parse_cupsctl_verbosity(stdout: &str) -> Option<LogVerbosity> {
    stdout.lines().find_map(|line| {
        match line.trim().strip_prefix("_debug_logging=")? {
            "1" => Some(LogVerbosity::Verbose),
            "0" => Some(LogVerbosity::Normal),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines_in_order() {
        let text = "one\ntwo\nthree\nfour\n";
        assert_eq!(
            tail_lines(text.as_bytes(), 2).expect("tail"),
            vec!["three".to_owned(), "four".to_owned()]
        );
        assert_eq!(tail_lines(text.as_bytes(), 10).expect("tail").len(), 4);
        assert!(tail_lines(text.as_bytes(), 0).expect("tail").is_empty());
    }

    #[test]
    fn cupsctl_debug_flag() {
        let out = "_debug_logging=1\n_remote_admin=0\n_share_printers=1\n";
        assert_eq!(parse_cupsctl_verbosity(out), Some(LogVerbosity::Verbose));
        assert_eq!(parse_cupsctl_verbosity("_debug_logging=0\n"), Some(LogVerbosity::Normal));
        assert_eq!(parse_cupsctl_verbosity("_share_printers=1\n"), None);
    }

    #[test]
    fn tail_log_reads_configured_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("error_log");
        std::fs::write(&log, "E [18/Oct/2026] a\nI [18/Oct/2026] b\n").expect("write");
        let systemd = Systemd::new(&log);
        assert_eq!(systemd.tail_log(1).expect("tail"), vec!["I [18/Oct/2026] b".to_owned()]);
    }

    #[test]
    fn latin1_lines_do_not_break_the_tail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("error_log");
        std::fs::write(&log, b"E [x] printer Caf\xe9 failed\nI [x] last line\n").expect("write");
        let systemd = Systemd::new(&log);
        assert_eq!(systemd.tail_log(1).expect("tail"), vec!["I [x] last line".to_owned()]);

        let both = systemd.tail_log(2).expect("tail");
        assert_eq!(both[0], "E [x] printer Caf\u{fffd} failed");
    }
}
