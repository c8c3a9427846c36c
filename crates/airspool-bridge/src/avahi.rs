// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Avahi static service directory as the advertisement host.
//
// One file per advertised queue, `AirPrint-<queue>.service`. Files without
// that prefix belong to someone else and are never listed or touched.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use airspool_core::error::{AirspoolError, Result};

use crate::command::run;
use crate::traits::AdvertisementHost;

const FILE_PREFIX: &str = "AirPrint-";
const FILE_SUFFIX: &str = ".service";

/// Descriptor files in an Avahi `services` directory.
pub struct AvahiServiceDir {
    dir: PathBuf,
}

impl AvahiServiceDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic descriptor path for a queue.
    pub fn descriptor_path(&self, queue: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{queue}{FILE_SUFFIX}"))
    }
}

impl AdvertisementHost for AvahiServiceDir {
    fn list_descriptors(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut queues = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(queue) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            {
                queues.push(queue.to_owned());
            }
        }
        queues.sort();
        Ok(queues)
    }

    fn read_descriptor(&self, queue: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.descriptor_path(queue)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file and rename, so Avahi never reads a
    /// half-written descriptor. The temporary file is removed if any step fails.
    #[instrument(skip(self, content))]
    fn write_descriptor(&self, queue: &str, content: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.descriptor_path(queue);
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{FILE_PREFIX}{queue}"))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file().set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "descriptor written");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_descriptor(&self, queue: &str) -> Result<()> {
        match std::fs::remove_file(self.descriptor_path(queue)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn reload_advertisement_service(&self) -> Result<()> {
        let out = run("systemctl", &["reload-or-restart", "avahi-daemon"])?;
        if !out.success {
            return Err(AirspoolError::unavailable("avahi-daemon", out.message()));
        }
        info!("avahi-daemon reloaded");
        Ok(())
    }
}
