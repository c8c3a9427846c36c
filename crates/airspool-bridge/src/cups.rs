// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS adapter built on the standard command-line tools.
//
// Reads go through `lpinfo`, `lpstat`, and `lpoptions`; writes through
// `lpadmin`, `cupsenable`/`cupsdisable`, `cupsaccept`/`cupsreject`, `cancel`,
// and `lp`. Tool output is parsed into typed records right here, so nothing
// above this module ever sees CUPS text.
//
// CUPS does not remember which catalog entry a queue was created from, so the
// chosen driver reference is stored on the queue as the `airspool-driver`
// option and read back from `lpoptions`.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::{
    ArtifactKind, DriverEntry, DriverRef, JobFilter, JobId, JobState, OptionMap, PrintJob,
    QueueState, SpoolArtifact,
};

use crate::command::{run, run_for_queue, run_query};
use crate::traits::{DriverCatalog, JobControl, QueueManager};

/// `usb://` URIs the CUPS backends currently report.
#[instrument]
pub fn usb_device_uris() -> Result<Vec<String>> {
    let out = run_query("lpinfo", &["-v"])?;
    Ok(parse_lpinfo_devices(&out.stdout))
}

/// Queue option used to remember the driver reference.
pub const DRIVER_OPTION: &str = "airspool-driver";

/// CUPS command-line adapter.
pub struct Cups {
    spool_dir: PathBuf,
    test_page: PathBuf,
    /// `lpinfo -m` is slow on large driver sets; read it once per process.
    drivers: OnceCell<Vec<DriverEntry>>,
}

impl Cups {
    pub fn new(spool_dir: impl Into<PathBuf>, test_page: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            test_page: test_page.into(),
            drivers: OnceCell::new(),
        }
    }

    fn driver_snapshot(&self) -> Result<&[DriverEntry]> {
        if let Some(drivers) = self.drivers.get() {
            return Ok(drivers.as_slice());
        }
        let out = run_query("lpinfo", &["-m"])?;
        let parsed = parse_lpinfo_models(&out.stdout);
        info!(count = parsed.len(), "driver catalog loaded");
        Ok(self.drivers.get_or_init(|| parsed).as_slice())
    }

    fn queue_options(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let out = run_query("lpoptions", &["-p", name])?;
        Ok(parse_lpoptions(&out.stdout))
    }
}

impl DriverCatalog for Cups {
    fn driver_exists(&self, driver: &DriverRef) -> Result<bool> {
        Ok(self
            .driver_snapshot()?
            .iter()
            .any(|entry| &entry.reference == driver))
    }

    fn list_available_drivers(&self) -> Result<Vec<DriverEntry>> {
        Ok(self.driver_snapshot()?.to_vec())
    }
}

impl QueueManager for Cups {
    #[instrument(skip(self))]
    fn list_queues(&self) -> Result<Vec<QueueState>> {
        let devices = run("lpstat", &["-v"])?;
        if !devices.success {
            // lpstat exits non-zero when no queue exists yet.
            if devices.message().contains("No destinations added") {
                return Ok(Vec::new());
            }
            return Err(AirspoolError::unavailable("cups", devices.message()));
        }
        let uris = parse_lpstat_devices(&devices.stdout);
        let enabled = parse_lpstat_printers(&run_query("lpstat", &["-p"])?.stdout);
        let accepting = parse_lpstat_accepting(&run_query("lpstat", &["-a"])?.stdout);

        let mut queues = Vec::with_capacity(uris.len());
        for (name, device_uri) in uris {
            let mut options = self.queue_options(&name)?;
            let driver_ref = options.remove(DRIVER_OPTION).map(DriverRef);
            let location = options.get("printer-location").cloned().unwrap_or_default();
            let shared = options
                .get("printer-is-shared")
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
            options.retain(|key, _| !is_attribute_key(key));

            queues.push(QueueState {
                enabled: enabled.get(&name).copied().unwrap_or(false),
                accepting: accepting.get(&name).copied().unwrap_or(false),
                name,
                device_uri,
                driver_ref,
                options,
                location,
                shared,
            });
        }
        debug!(count = queues.len(), "queues listed");
        Ok(queues)
    }

    #[instrument(skip(self, desired), fields(queue = %desired.name))]
    fn upsert_queue(&self, desired: &QueueState) -> Result<()> {
        let driver = desired
            .driver_ref
            .as_ref()
            .ok_or_else(|| AirspoolError::rejected(&desired.name, "no driver reference"))?;
        let shared = format!("printer-is-shared={}", desired.shared);
        let marker = format!("{DRIVER_OPTION}={driver}");
        run_for_queue(
            "lpadmin",
            &[
                "-p",
                &desired.name,
                "-v",
                &desired.device_uri,
                "-m",
                driver.as_str(),
                "-L",
                &desired.location,
                "-o",
                &shared,
                "-o",
                &marker,
            ],
            &desired.name,
        )?;
        info!(queue = %desired.name, driver = %driver, "queue written");
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove_queue(&self, name: &str) -> Result<()> {
        match run_for_queue("lpadmin", &["-x", name], name) {
            Err(AirspoolError::QueueRejected { detail, .. })
                if detail.contains("does not exist") || detail.contains("not found") =>
            {
                Err(AirspoolError::QueueNotFound(name.to_owned()))
            }
            other => other.map(|_| ()),
        }
    }

    fn set_default_options(&self, name: &str, options: &OptionMap) -> Result<()> {
        if options.is_empty() {
            return Ok(());
        }
        let pairs: Vec<String> = options.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut args = vec!["-p", name];
        for pair in &pairs {
            args.push("-o");
            args.push(pair);
        }
        run_for_queue("lpadmin", &args, name)?;
        debug!(queue = name, count = pairs.len(), "default options set");
        Ok(())
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let tool = if enabled { "cupsenable" } else { "cupsdisable" };
        run_for_queue(tool, &[name], name).map(|_| ())
    }

    fn set_accepting(&self, name: &str, accepting: bool) -> Result<()> {
        let tool = if accepting { "cupsaccept" } else { "cupsreject" };
        run_for_queue(tool, &[name], name).map(|_| ())
    }
}

impl JobControl for Cups {
    fn list_jobs(&self, filter: JobFilter) -> Result<Vec<PrintJob>> {
        let (args, state): (&[&str], JobState) = match filter {
            JobFilter::Active => (&["-o"][..], JobState::Pending),
            JobFilter::Completed => (&["-W", "completed", "-o"][..], JobState::Completed),
        };
        let out = run_query("lpstat", args)?;
        Ok(parse_lpstat_jobs(&out.stdout, state))
    }

    #[instrument(skip(self))]
    fn cancel_job(&self, id: JobId) -> Result<()> {
        let number = id.to_string();
        let out = run("cancel", &[&number])?;
        if out.success {
            return Ok(());
        }
        let message = out.message();
        if message.contains("does not exist") || message.contains("not found") {
            Err(AirspoolError::JobNotFound(id))
        } else if out.is_connection_failure() {
            Err(AirspoolError::unavailable("cups", message))
        } else {
            Err(AirspoolError::rejected(format!("job {id}"), message))
        }
    }

    #[instrument(skip(self))]
    fn cancel_all_jobs(&self, queue: &str) -> Result<()> {
        run_for_queue("cancel", &["-a", queue], queue).map(|_| ())
    }

    #[instrument(skip(self))]
    fn submit_test_page(&self, queue: &str) -> Result<JobId> {
        let page = self.test_page.to_string_lossy();
        let out = run_for_queue("lp", &["-d", queue, page.as_ref()], queue)?;
        parse_request_id(&out.stdout)
            .ok_or_else(|| AirspoolError::parse("lp reply", out.stdout.trim()))
    }

    fn list_spool_artifacts(&self) -> Result<Vec<SpoolArtifact>> {
        read_spool_dir(&self.spool_dir)
    }

    fn delete_spool_artifact(&self, artifact: &SpoolArtifact) -> Result<()> {
        match std::fs::remove_file(&artifact.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Spool directory
// ---------------------------------------------------------------------------

/// List `cNNNNN` and `dNNNNN-NNN` files in a CUPS spool directory.
pub fn read_spool_dir(dir: &Path) -> Result<Vec<SpoolArtifact>> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            AirspoolError::unavailable("cups spool", format!("{}: {e}", dir.display()))
        }
        _ => AirspoolError::Io(e),
    })?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some((job_id, kind)) = parse_spool_file_name(&file_name.to_string_lossy()) else {
            continue;
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(t) => t.into(),
            Err(e) => {
                warn!(file = %entry.path().display(), error = %e, "no mtime; skipping");
                continue;
            }
        };
        artifacts.push(SpoolArtifact {
            job_id,
            kind,
            path: entry.path(),
            size_bytes: metadata.len(),
            modified,
        });
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}

/// `c00012` -> (12, Control); `d00012-001` -> (12, Data).
pub fn parse_spool_file_name(name: &str) -> Option<(JobId, ArtifactKind)> {
    let (kind, rest) = match name.split_at_checked(1)? {
        ("c", rest) => (ArtifactKind::Control, rest),
        ("d", rest) => (ArtifactKind::Data, rest.split_once('-')?.0),
        _ => return None,
    };
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok().map(|n| (JobId(n), kind))
}

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

/// `lpinfo -v`: keep the URIs of `usb://` devices.
pub fn parse_lpinfo_devices(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|uri| uri.starts_with("usb://"))
        .map(String::from)
        .collect()
}

/// `lpinfo -m`: `<reference> <description>` per line.
pub fn parse_lpinfo_models(stdout: &str) -> Vec<DriverEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let (reference, description) = line.split_once(' ').unwrap_or((line, ""));
            Some(DriverEntry {
                reference: DriverRef(reference.to_owned()),
                description: description.trim().to_owned(),
            })
        })
        .collect()
}

/// `lpstat -v`: `device for <queue>: <uri>`, in listing order.
pub fn parse_lpstat_devices(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("device for ")?;
            let (name, uri) = rest.split_once(": ")?;
            Some((name.to_owned(), uri.trim().to_owned()))
        })
        .collect()
}

/// `lpstat -p`: queue name -> enabled.
pub fn parse_lpstat_printers(stdout: &str) -> BTreeMap<String, bool> {
    stdout
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("printer ")?;
            let name = rest.split_whitespace().next()?;
            let enabled = !rest.contains(" disabled since");
            Some((name.to_owned(), enabled))
        })
        .collect()
}

/// `lpstat -a`: queue name -> accepting.
pub fn parse_lpstat_accepting(stdout: &str) -> BTreeMap<String, bool> {
    stdout
        .lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once(' ')?;
            if rest.starts_with("accepting requests") {
                Some((name.to_owned(), true))
            } else if rest.starts_with("not accepting requests") {
                Some((name.to_owned(), false))
            } else {
                None
            }
        })
        .collect()
}

/// `lpoptions -p <queue>`: whitespace-separated `key=value` pairs where
/// values may be single- or double-quoted or backslash-escaped.
pub fn parse_lpoptions(stdout: &str) -> BTreeMap<String, String> {
    let mut options = BTreeMap::new();
    for token in split_shell_words(stdout) {
        if let Some((key, value)) = token.split_once('=') {
            options.insert(key.to_owned(), value.to_owned());
        } else if !token.is_empty() {
            options.insert(token, "true".to_owned());
        }
    }
    options
}

fn split_shell_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// Printer attributes that `lpoptions` mixes in with job defaults.
fn is_attribute_key(key: &str) -> bool {
    key.starts_with("printer-")
        || key.starts_with("marker-")
        || key == "device-uri"
        || key == "copies"
        || key == "job-sheets"
        || key == "finishings"
        || key == "number-up"
}

/// `lpstat -o`: `<queue>-<id> <owner> <size> <date...>`.
pub fn parse_lpstat_jobs(stdout: &str, state: JobState) -> Vec<PrintJob> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let (queue, number) = fields.next()?.rsplit_once('-')?;
            let id = JobId(number.parse().ok()?);
            let owner = fields.next().unwrap_or_default().to_owned();
            let size_bytes = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            Some(PrintJob {
                id,
                queue: queue.to_owned(),
                owner,
                size_bytes,
                state,
            })
        })
        .collect()
}

/// `lp`: `request id is <queue>-<id> (1 file(s))`.
pub fn parse_request_id(stdout: &str) -> Option<JobId> {
    let rest = stdout.trim().strip_prefix("request id is ")?;
    let token = rest.split_whitespace().next()?;
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpinfo_devices_keeps_usb_only() {
        let out = "network socket\n\
                   direct usb://HP/LaserJet%201320%20series?serial=00CNBW\n\
                   network ipp\n\
                   direct usb://DYMO/LabelWriter%204XL?serial=17032\n";
        assert_eq!(
            parse_lpinfo_devices(out),
            vec![
                "usb://HP/LaserJet%201320%20series?serial=00CNBW".to_owned(),
                "usb://DYMO/LabelWriter%204XL?serial=17032".to_owned(),
            ]
        );
    }

    #[test]
    fn lpinfo_models_splits_reference_and_description() {
        let out = "drv:///hpcups.drv/hp-laserjet_1320_series.ppd HP LaserJet 1320 Series, hpcups 3.22.10\n\
                   dymo:0/ppd/lw4xl.ppd DYMO LabelWriter 4XL\n\n";
        let entries = parse_lpinfo_models(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].reference, DriverRef::from("dymo:0/ppd/lw4xl.ppd"));
        assert_eq!(entries[1].description, "DYMO LabelWriter 4XL");
    }

    #[test]
    fn lpstat_devices_and_states() {
        let devices = "device for Dymo_4XL: usb://DYMO/LabelWriter%204XL?serial=17032\n\
                       device for HP_LaserJet_1320: usb://HP/LaserJet%201320%20series\n";
        let parsed = parse_lpstat_devices(devices);
        assert_eq!(parsed[0].0, "Dymo_4XL");
        assert_eq!(parsed[1].1, "usb://HP/LaserJet%201320%20series");

        let printers = "printer Dymo_4XL is idle.  enabled since Sat 18 Oct 2026 10:00:00 AM UTC\n\
                        printer HP_LaserJet_1320 disabled since Sat 18 Oct 2026 10:00:00 AM UTC -\n\
                        \treason unknown\n";
        let enabled = parse_lpstat_printers(printers);
        assert_eq!(enabled.get("Dymo_4XL"), Some(&true));
        assert_eq!(enabled.get("HP_LaserJet_1320"), Some(&false));

        let accepting = "Dymo_4XL accepting requests since Sat 18 Oct 2026\n\
                         HP_LaserJet_1320 not accepting requests since Sat 18 Oct 2026 -\n\
                         \tRejecting Jobs\n";
        let acc = parse_lpstat_accepting(accepting);
        assert_eq!(acc.get("Dymo_4XL"), Some(&true));
        assert_eq!(acc.get("HP_LaserJet_1320"), Some(&false));
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn lpoptions_handles_quotes_and_escapes() {
        let out = "copies=1 device-uri=usb://DYMO/LabelWriter%204XL media=w288h432 \
                   printer-location='Front desk' printer-info=Label\\ printer \
                   printer-is-shared=true airspool-driver=dymo:0/ppd/lw4xl.ppd\n";
        let opts = parse_lpoptions(out);
        assert_eq!(opts.get("printer-location").map(String::as_str), Some("Front desk"));
        assert_eq!(opts.get("printer-info").map(String::as_str), Some("Label printer"));
        assert_eq!(opts.get("media").map(String::as_str), Some("w288h432"));
        assert_eq!(
            opts.get(DRIVER_OPTION).map(String::as_str),
            Some("dymo:0/ppd/lw4xl.ppd")
        );
        assert!(is_attribute_key("printer-is-shared"));
        assert!(!is_attribute_key("media"));
    }

    #[test]
    fn lpstat_jobs_parses_queue_and_id() {
        let out = "HP_LaserJet_1320-12      pi      1024   Sat 18 Oct 2026 10:00:00 AM UTC\n\
                   Dymo_4XL-13              root    2048   Sat 18 Oct 2026 10:01:00 AM UTC\n";
        let jobs = parse_lpstat_jobs(out, JobState::Pending);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].queue, "HP_LaserJet_1320");
        assert_eq!(jobs[0].id, JobId(12));
        assert_eq!(jobs[1].owner, "root");
        assert_eq!(jobs[1].size_bytes, 2048);
    }

    #[test]
    fn request_id_from_lp_reply() {
        assert_eq!(
            parse_request_id("request id is Dymo_450-31 (1 file(s))\n"),
            Some(JobId(31))
        );
        assert_eq!(parse_request_id("lp: error"), None);
    }

    #[test]
    fn spool_file_names() {
        assert_eq!(parse_spool_file_name("c00012"), Some((JobId(12), ArtifactKind::Control)));
        assert_eq!(parse_spool_file_name("d00012-001"), Some((JobId(12), ArtifactKind::Data)));
        assert_eq!(parse_spool_file_name("cache"), None);
        assert_eq!(parse_spool_file_name("tmp"), None);
        assert_eq!(parse_spool_file_name("d"), None);
    }

    #[test]
    fn reads_spool_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("c00007"), b"ctl").expect("write c");
        std::fs::write(dir.path().join("d00007-001"), b"data!").expect("write d");
        std::fs::create_dir(dir.path().join("tmp")).expect("mkdir");

        let artifacts = read_spool_dir(dir.path()).expect("read spool");
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].kind, ArtifactKind::Control);
        assert_eq!(artifacts[1].size_bytes, 5);
        assert!(artifacts.iter().all(|a| a.job_id == JobId(7)));

        let cups = Cups::new(dir.path(), "/dev/null");
        cups.delete_spool_artifact(&artifacts[0]).expect("delete");
        cups.delete_spool_artifact(&artifacts[0]).expect("second delete is a no-op");
        assert_eq!(cups.list_spool_artifacts().expect("list").len(), 1);
    }

    #[test]
    fn missing_spool_directory_is_unavailable() {
        let err = read_spool_dir(Path::new("/nonexistent/airspool/spool")).expect_err("missing");
        assert!(err.is_fatal());
    }
}
