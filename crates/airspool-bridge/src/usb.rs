// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB printer enumeration from sysfs, joined with the URIs CUPS reports.
//
// sysfs gives the structured identity (vendor/product ids, serial, port) and
// CUPS gives the backend URI a queue must use. A device is a printer when one
// of its interfaces has class 7.

use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tracing::{debug, instrument, warn};

use airspool_core::error::{AirspoolError, Result};
use airspool_core::types::RawDevice;

use crate::cups::usb_device_uris;
use crate::traits::DeviceCatalog;

/// USB interface class code for printers.
const PRINTER_INTERFACE_CLASS: &str = "07";

/// A printer-class device as read from sysfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsPrinter {
    pub port: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
    pub serial: Option<String>,
}

/// Device catalog backed by `/sys/bus/usb/devices` and `lpinfo -v`.
pub struct UsbPrinterCatalog {
    sysfs_root: PathBuf,
}

impl UsbPrinterCatalog {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
        }
    }
}

impl DeviceCatalog for UsbPrinterCatalog {
    #[instrument(skip(self), fields(root = %self.sysfs_root.display()))]
    fn list_attached_printer_devices(&self) -> Result<Vec<RawDevice>> {
        let printers = read_sysfs_printers(&self.sysfs_root)?;
        if printers.is_empty() {
            return Ok(Vec::new());
        }

        // Without lpinfo we can still synthesise the usb backend URI.
        let uris = match usb_device_uris() {
            Ok(uris) => uris,
            Err(e) => {
                warn!(error = %e, "lpinfo unavailable; synthesising device URIs");
                Vec::new()
            }
        };

        Ok(printers
            .into_iter()
            .map(|p| {
                let device_uri = pick_device_uri(&p, &uris);
                RawDevice {
                    vendor_id: p.vendor_id,
                    product_id: p.product_id,
                    description: format!("{} {}", p.manufacturer, p.product).trim().to_owned(),
                    serial: p.serial,
                    port: p.port,
                    device_uri,
                }
            })
            .collect())
    }
}

/// Find printer-class devices under a sysfs `devices` directory, sorted by
/// port so enumeration order is stable across runs.
pub fn read_sysfs_printers(root: &Path) -> Result<Vec<SysfsPrinter>> {
    let entries = std::fs::read_dir(root)
        .map_err(|e| AirspoolError::unavailable("usb sysfs", format!("{}: {e}", root.display())))?;

    let mut ports: Vec<String> = Vec::new();
    for entry in entries {
        let name = entry?.file_name().to_string_lossy().into_owned();
        // Interfaces are named `<port>:<config>.<interface>`.
        let Some((port, _)) = name.split_once(':') else {
            continue;
        };
        let class = read_attr(&root.join(&name), "bInterfaceClass");
        if class.as_deref() == Some(PRINTER_INTERFACE_CLASS) && !ports.iter().any(|p| p == port) {
            ports.push(port.to_owned());
        }
    }
    ports.sort();

    let mut printers = Vec::with_capacity(ports.len());
    for port in ports {
        let dir = root.join(&port);
        let ids = read_attr(&dir, "idVendor")
            .and_then(|v| u16::from_str_radix(&v, 16).ok())
            .zip(read_attr(&dir, "idProduct").and_then(|v| u16::from_str_radix(&v, 16).ok()));
        let Some((vendor_id, product_id)) = ids else {
            warn!(port = %port, "printer interface without readable ids; skipping");
            continue;
        };
        let printer = SysfsPrinter {
            vendor_id,
            product_id,
            manufacturer: read_attr(&dir, "manufacturer").unwrap_or_default(),
            product: read_attr(&dir, "product").unwrap_or_default(),
            serial: read_attr(&dir, "serial").filter(|s| !s.is_empty()),
            port,
        };
        debug!(port = %printer.port, product = %printer.product, "printer found in sysfs");
        printers.push(printer);
    }
    Ok(printers)
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_owned())
}

/// Choose the CUPS URI for a device: match by serial, then by product name,
/// else build the usb backend form `usb://<make>/<model>?serial=<serial>`.
pub fn pick_device_uri(printer: &SysfsPrinter, uris: &[String]) -> String {
    if let Some(serial) = &printer.serial {
        let needle = format!("serial={serial}");
        if let Some(uri) = uris.iter().find(|u| u.contains(&needle)) {
            return uri.clone();
        }
    }
    if !printer.product.is_empty() {
        let product = printer.product.to_lowercase();
        if let Some(uri) = uris
            .iter()
            .find(|u| percent_decode(u).to_lowercase().contains(&product))
        {
            return uri.clone();
        }
    }

    let mut uri = format!(
        "usb://{}/{}",
        percent_encode(&printer.manufacturer),
        percent_encode(&printer.product)
    );
    if let Some(serial) = &printer.serial {
        uri.push_str("?serial=");
        uri.push_str(serial);
    }
    uri
}

/// Bytes escaped in the make and model parts of a usb backend URI.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn percent_encode(text: &str) -> String {
    utf8_percent_encode(text, URI_COMPONENT).to_string()
}

fn percent_decode(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}
