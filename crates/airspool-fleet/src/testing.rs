// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for the fleet tests: the three-printer deployment.

use airspool_bridge::memory::MemoryPrintSystem;
use airspool_core::types::{DeviceDescriptor, DriverRef, OptionMap, PrinterProfile, QueueState};

pub const HP_EXACT: &str = "drv:///hpcups.drv/hp-laserjet_1320_series.ppd";
pub const HP_GENERIC: &str = "drv:///sample.drv/generpcl.ppd";
pub const DYMO_4XL_PPD: &str = "dymo:0/ppd/lw4xl.ppd";
pub const DYMO_450_PPD: &str = "dymo:0/ppd/lw450.ppd";

fn options(pairs: &[(&str, &str)]) -> OptionMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

pub fn fleet_profiles() -> Vec<PrinterProfile> {
    vec![
        PrinterProfile {
            logical_name: "HP_LaserJet_1320".into(),
            match_pattern: "LaserJet 1320".into(),
            driver_candidates: vec![DriverRef::from(HP_EXACT), DriverRef::from(HP_GENERIC)],
            default_options: options(&[("media", "iso_a4_210x297mm"), ("sides", "one-sided")]),
            location: "Office".into(),
            shared: true,
            media_supported: vec!["iso_a4_210x297mm".into(), "na_letter_8.5x11in".into()],
            make_and_model: Some("HP LaserJet 1320".into()),
        },
        PrinterProfile {
            logical_name: "Dymo_4XL".into(),
            match_pattern: "LabelWriter 4XL".into(),
            driver_candidates: vec![DriverRef::from(DYMO_4XL_PPD)],
            default_options: options(&[("media", "oe_4x6-label_4x6in")]),
            location: "Dispatch".into(),
            shared: true,
            media_supported: vec!["oe_4x6-label_4x6in".into()],
            make_and_model: Some("DYMO LabelWriter 4XL".into()),
        },
        PrinterProfile {
            logical_name: "Dymo_450".into(),
            match_pattern: "LabelWriter 450".into(),
            driver_candidates: vec![DriverRef::from(DYMO_450_PPD)],
            default_options: options(&[("media", "w79h252")]),
            location: "Dispatch".into(),
            shared: true,
            media_supported: vec!["w79h252".into()],
            make_and_model: None,
        },
    ]
}

/// Every candidate driver installed.
pub fn fleet_catalog() -> MemoryPrintSystem {
    MemoryPrintSystem::new()
        .with_driver(HP_EXACT, "HP LaserJet 1320 Series, hpcups")
        .with_driver(HP_GENERIC, "Generic PCL Laser Printer")
        .with_driver(DYMO_4XL_PPD, "DYMO LabelWriter 4XL")
        .with_driver(DYMO_450_PPD, "DYMO LabelWriter 450")
}

pub fn hp_device() -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id: 0x03f0,
        product_id: 0x1d17,
        serial_or_port: "00CNBW012345".into(),
        raw_description: "HP LaserJet 1320 series".into(),
        device_uri: "usb://HP/LaserJet%201320%20series?serial=00CNBW012345".into(),
    }
}

pub fn dymo_4xl_device() -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id: 0x0922,
        product_id: 0x001f,
        serial_or_port: "17032716".into(),
        raw_description: "DYMO LabelWriter 4XL".into(),
        device_uri: "usb://DYMO/LabelWriter%204XL?serial=17032716".into(),
    }
}

pub fn dymo_450_device() -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id: 0x0922,
        product_id: 0x0020,
        serial_or_port: "1-1.3".into(),
        raw_description: "DYMO LabelWriter 450".into(),
        device_uri: "usb://DYMO/LabelWriter%20450".into(),
    }
}

/// A queue some operator created by hand.
pub fn manual_queue(name: &str) -> QueueState {
    QueueState {
        name: name.into(),
        device_uri: "socket://192.168.1.40:9100".into(),
        driver_ref: None,
        options: OptionMap::new(),
        location: String::new(),
        enabled: true,
        accepting: true,
        shared: true,
    }
}
