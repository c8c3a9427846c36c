// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Airspool bridge: adapters from the collaborator traits to the host.
//!
//! The fleet logic is written against the traits in [`traits`]. On a real
//! print server [`SystemBridge`] supplies CUPS, Avahi, systemd, and host
//! telemetry implementations; tests use [`memory::MemoryPrintSystem`].

pub mod avahi;
pub mod command;
pub mod cups;
pub mod memory;
pub mod systemd;
pub mod telemetry;
pub mod traits;
pub mod usb;

use airspool_core::config::FleetConfig;

use traits::{
    AdvertisementHost, DeviceCatalog, DriverCatalog, HealthTelemetry, JobControl, QueueManager,
    ServiceControl,
};

/// Borrowed set of every collaborator the fleet operations need.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub devices: &'a dyn DeviceCatalog,
    pub drivers: &'a dyn DriverCatalog,
    pub queues: &'a dyn QueueManager,
    pub jobs: &'a dyn JobControl,
    pub adverts: &'a dyn AdvertisementHost,
    pub services: &'a dyn ServiceControl,
    pub telemetry: &'a dyn HealthTelemetry,
}

impl<'a> Backends<'a> {
    /// All collaborators served by one object, as with the in-memory fake.
    pub fn uniform<T>(system: &'a T) -> Self
    where
        T: DeviceCatalog
            + DriverCatalog
            + QueueManager
            + JobControl
            + AdvertisementHost
            + ServiceControl
            + HealthTelemetry,
    {
        Self {
            devices: system,
            drivers: system,
            queues: system,
            jobs: system,
            adverts: system,
            services: system,
            telemetry: system,
        }
    }
}

/// The real host adapters, configured from the fleet config paths.
pub struct SystemBridge {
    pub usb: usb::UsbPrinterCatalog,
    pub cups: cups::Cups,
    pub avahi: avahi::AvahiServiceDir,
    pub systemd: systemd::Systemd,
    pub telemetry: telemetry::HostTelemetry,
}

impl SystemBridge {
    pub fn from_config(config: &FleetConfig) -> Self {
        let paths = &config.paths;
        Self {
            usb: usb::UsbPrinterCatalog::new(&paths.sysfs_usb),
            cups: cups::Cups::new(&paths.spool_dir, &paths.test_page),
            avahi: avahi::AvahiServiceDir::new(&config.avahi.service_dir),
            systemd: systemd::Systemd::new(&paths.cups_error_log),
            telemetry: telemetry::HostTelemetry::new(&paths.disk_mount),
        }
    }

    pub fn backends(&self) -> Backends<'_> {
        Backends {
            devices: &self.usb,
            drivers: &self.cups,
            queues: &self.cups,
            jobs: &self.cups,
            adverts: &self.avahi,
            services: &self.systemd,
            telemetry: &self.telemetry,
        }
    }
}
