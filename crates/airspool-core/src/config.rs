// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fleet configuration: printer profiles plus host paths and thresholds,
// loaded from a TOML file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AirspoolError, Result};
use crate::types::PrinterProfile;

/// Used when neither `--config` nor `AIRSPOOL_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/airspool/fleet.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "AIRSPOOL_CONFIG";

/// Complete fleet configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub avahi: AvahiSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub health: HealthThresholds,
    #[serde(default)]
    pub spool: SpoolSettings,
    /// Declared printers, in priority order.
    #[serde(default, rename = "printer")]
    pub printers: Vec<PrinterProfile>,
}

/// Where and how AirPrint descriptors are published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvahiSettings {
    pub service_dir: PathBuf,
    /// IPP port advertised in every descriptor.
    pub port: u16,
    /// Host name used in the `adminurl` TXT record.
    pub admin_host: String,
}

impl Default for AvahiSettings {
    fn default() -> Self {
        Self {
            service_dir: PathBuf::from("/etc/avahi/services"),
            port: 631,
            admin_host: "raspberrypi.local".into(),
        }
    }
}

/// Host file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub journal: PathBuf,
    pub cups_error_log: PathBuf,
    pub spool_dir: PathBuf,
    pub test_page: PathBuf,
    pub sysfs_usb: PathBuf,
    /// `health` reports usage of the filesystem holding this path.
    pub disk_mount: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            journal: PathBuf::from("/var/lib/airspool/journal.db"),
            cups_error_log: PathBuf::from("/var/log/cups/error_log"),
            spool_dir: PathBuf::from("/var/spool/cups"),
            test_page: PathBuf::from("/usr/share/cups/data/testprint"),
            sysfs_usb: PathBuf::from("/sys/bus/usb/devices"),
            disk_mount: PathBuf::from("/"),
        }
    }
}

/// Higher-is-worse band boundaries for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warn: f64,
    pub critical: f64,
}

/// Health snapshot thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub temperature_c: Threshold,
    pub memory_percent: Threshold,
    pub disk_percent: Threshold,
    pub uptime_days: Threshold,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            temperature_c: Threshold { warn: 70.0, critical: 80.0 },
            memory_percent: Threshold { warn: 80.0, critical: 90.0 },
            disk_percent: Threshold { warn: 80.0, critical: 90.0 },
            uptime_days: Threshold { warn: 60.0, critical: 180.0 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolSettings {
    /// Finished job artifacts older than this are removed by `cleanup`.
    pub retention_days: u32,
}

impl Default for SpoolSettings {
    fn default() -> Self {
        Self { retention_days: 7 }
    }
}

impl FleetConfig {
    /// Pick the config path: explicit flag, then environment, then default.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(from_env) = std::env::var(CONFIG_ENV_VAR) {
            if !from_env.trim().is_empty() {
                return PathBuf::from(from_env);
            }
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Read, parse, and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AirspoolError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: FleetConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the reconciler cannot act on deterministically.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for profile in &self.printers {
            validate_queue_name(&profile.logical_name)?;
            if !seen.insert(profile.logical_name.as_str()) {
                return Err(AirspoolError::Config(format!(
                    "printer {} is declared more than once",
                    profile.logical_name
                )));
            }
            if profile.match_pattern.trim().is_empty() {
                return Err(AirspoolError::Config(format!(
                    "printer {} has an empty match_pattern",
                    profile.logical_name
                )));
            }
            if profile.driver_candidates.is_empty() {
                return Err(AirspoolError::Config(format!(
                    "printer {} lists no driver_candidates",
                    profile.logical_name
                )));
            }
        }

        let h = &self.health;
        for (name, t) in [
            ("temperature_c", h.temperature_c),
            ("memory_percent", h.memory_percent),
            ("disk_percent", h.disk_percent),
            ("uptime_days", h.uptime_days),
        ] {
            if t.warn >= t.critical {
                return Err(AirspoolError::Config(format!(
                    "health.{name}: warn ({}) must be below critical ({})",
                    t.warn, t.critical
                )));
            }
        }
        Ok(())
    }

    /// Look up a declared profile by queue name.
    pub fn profile(&self, logical_name: &str) -> Option<&PrinterProfile> {
        self.printers.iter().find(|p| p.logical_name == logical_name)
    }
}

/// CUPS queue names: printable, no whitespace, `/` or `#`, at most 127 bytes.
pub fn validate_queue_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.len() > 127
        || name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == '#');
    if bad {
        return Err(AirspoolError::Config(format!(
            "{name:?} is not a valid queue name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [avahi]
        admin_host = "printserver.local"

        [spool]
        retention_days = 3

        [[printer]]
        logical_name = "HP_LaserJet_1320"
        match_pattern = "LaserJet 1320"
        driver_candidates = ["drv:///hpcups.drv/hp-laserjet_1320_series.ppd", "drv:///sample.drv/generic.ppd"]
        location = "Office"
        media_supported = ["iso_a4_210x297mm", "na_letter_8.5x11in"]

        [printer.default_options]
        media = "iso_a4_210x297mm"
        sides = "one-sided"

        [[printer]]
        logical_name = "Dymo_4XL"
        match_pattern = "LabelWriter 4XL"
        driver_candidates = ["dymo:0/ppd/lw4xl.ppd"]
        shared = false
    "#;

    #[test]
    fn parses_profiles_and_fills_defaults() {
        let config = FleetConfig::from_toml_str(SAMPLE).expect("valid config");
        assert_eq!(config.printers.len(), 2);
        assert_eq!(config.avahi.admin_host, "printserver.local");
        assert_eq!(config.avahi.port, 631);
        assert_eq!(config.spool.retention_days, 3);

        let hp = config.profile("HP_LaserJet_1320").expect("hp profile");
        assert!(hp.shared);
        assert_eq!(hp.media_default(), Some("iso_a4_210x297mm"));
        assert_eq!(hp.driver_candidates.len(), 2);

        let dymo = config.profile("Dymo_4XL").expect("dymo profile");
        assert!(!dymo.shared);
        assert!(dymo.default_options.is_empty());
    }

    #[test]
    fn duplicate_logical_names_are_rejected() {
        let text = r#"
            [[printer]]
            logical_name = "Dymo"
            match_pattern = "4XL"
            driver_candidates = ["a"]
            [[printer]]
            logical_name = "Dymo"
            match_pattern = "450"
            driver_candidates = ["b"]
        "#;
        let err = FleetConfig::from_toml_str(text).expect_err("duplicate");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn empty_driver_list_is_rejected() {
        let text = r#"
            [[printer]]
            logical_name = "Dymo"
            match_pattern = "4XL"
            driver_candidates = []
        "#;
        assert!(FleetConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let text = r#"
            [health]
            temperature_c = { warn = 90.0, critical = 80.0 }
        "#;
        let err = FleetConfig::from_toml_str(text).expect_err("inverted");
        assert!(err.to_string().contains("temperature_c"));
    }

    #[test]
    fn queue_names_follow_cups_rules() {
        assert!(validate_queue_name("HP_LaserJet_1320").is_ok());
        assert!(validate_queue_name("has space").is_err());
        assert!(validate_queue_name("a/b").is_err());
        assert!(validate_queue_name("").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, SAMPLE).expect("write");
        let config = FleetConfig::load(&path).expect("load");
        assert_eq!(config.printers[0].logical_name, "HP_LaserJet_1320");

        let missing = FleetConfig::load(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(AirspoolError::Config(_))));
    }

    #[test]
    fn reference_config_is_valid() {
        let text = include_str!("../../../config/fleet.toml");
        let config = FleetConfig::from_toml_str(text).expect("reference config");
        let names: Vec<&str> = config.printers.iter().map(|p| p.logical_name.as_str()).collect();
        assert_eq!(names, ["HP_LaserJet_1320", "Dymo_4XL", "Dymo_450"]);
        assert_eq!(config.health.uptime_days.critical, 180.0);
    }

    #[test]
    fn explicit_path_wins() {
        let p = FleetConfig::resolve_path(Some(Path::new("/tmp/x.toml")));
        assert_eq!(p, PathBuf::from("/tmp/x.toml"));
    }
}
