// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AirPrint advertisement synchronisation.
//
// Full sync: every run renders the descriptor for every advertisable queue and
// deletes descriptors for everything else. Rendering is deterministic, so a
// descriptor is only written when its bytes differ from what is on disk, and
// the advertisement service is reloaded at most once, and only when something
// was written or deleted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use airspool_bridge::traits::AdvertisementHost;
use airspool_core::config::AvahiSettings;
use airspool_core::error::Result;
use airspool_core::types::{PrinterProfile, QueueState, ServiceAdvertisement, IPP_SERVICE_TYPE};

/// Subtype that makes iOS treat the service as an AirPrint printer.
pub const AIRPRINT_SUBTYPE: &str = "_universal._sub._ipp._tcp";

const PDL: &str = "application/octet-stream,application/pdf,application/postscript,image/jpeg,image/png,image/pwg-raster,image/urf";
const URF: &str = "W8,SRGB24,CP1,RS600";
const PRODUCT: &str = "(GPL Ghostscript)";
/// IPP `printer-state` idle.
const PRINTER_STATE_IDLE: &str = "3";
const PRINTER_TYPE: &str = "0x801046";
/// DNS-SD caps one TXT string, `key=value`, at 255 bytes.
pub const MAX_TXT_ENTRY: usize = 255;

/// Build the advertisement for one queue.
///
/// Media comes from the queue's `media` option and the profile's declared
/// supported list; queues without a profile advertise their own media only.
pub fn advertisement_for(
    queue: &QueueState,
    profile: Option<&PrinterProfile>,
    settings: &AvahiSettings,
) -> ServiceAdvertisement {
    let media_default = queue
        .options
        .get("media")
        .cloned()
        .or_else(|| profile.and_then(|p| p.media_default().map(String::from)));
    let mut media_supported = profile.map(|p| p.media_supported.clone()).unwrap_or_default();
    if let Some(default) = &media_default {
        if !media_supported.contains(default) {
            media_supported.insert(0, default.clone());
        }
    }

    let model = profile
        .and_then(|p| p.make_and_model.clone())
        .unwrap_or_else(|| queue.name.replace('_', " "));
    let port = settings.port;
    let host = &settings.admin_host;
    let name = &queue.name;

    let mut txt: Vec<(String, String)> = vec![
        ("txtvers".into(), "1".into()),
        ("qtotal".into(), "1".into()),
        ("rp".into(), format!("printers/{name}")),
        ("ty".into(), model),
        ("adminurl".into(), format!("http://{host}:{port}/printers/{name}")),
        ("note".into(), queue.location.clone()),
        ("product".into(), PRODUCT.into()),
        ("pdl".into(), PDL.into()),
        ("URF".into(), URF.into()),
        ("Transparent".into(), "T".into()),
        ("Binary".into(), "T".into()),
        ("printer-state".into(), PRINTER_STATE_IDLE.into()),
        ("printer-type".into(), PRINTER_TYPE.into()),
    ];
    if let Some(default) = &media_default {
        txt.push(("media-default".into(), default.clone()));
    }
    if !media_supported.is_empty() {
        txt.push(("media-supported".into(), media_supported.join(",")));
    }

    ServiceAdvertisement {
        txt_records: fit_txt_records(name, txt),
        queue_name: name.clone(),
        service_type: IPP_SERVICE_TYPE.into(),
        media_default,
        media_supported,
    }
}

/// Shorten entries over `MAX_TXT_ENTRY`. Comma lists lose whole trailing
/// items; other values are cut at a character boundary. An entry with no
/// room left for its value is dropped.
fn fit_txt_records(queue: &str, txt: Vec<(String, String)>) -> Vec<(String, String)> {
    txt.into_iter()
        .filter_map(|(key, value)| {
            let Some(room) = MAX_TXT_ENTRY.checked_sub(key.len() + 1) else {
                warn!(queue, key = %key, "TXT key too long; dropped");
                return None;
            };
            if value.len() <= room {
                return Some((key, value));
            }
            let mut cut = room;
            while !value.is_char_boundary(cut) {
                cut -= 1;
            }
            let head = &value[..cut];
            let fitted = if value.as_bytes().get(cut) == Some(&b',') {
                head
            } else {
                head.rfind(',').map_or(head, |comma| &value[..comma])
            };
            if fitted.is_empty() {
                warn!(queue, key = %key, bytes = value.len(), "TXT record too long; dropped");
                return None;
            }
            warn!(queue, key = %key, bytes = value.len(), kept = fitted.len(), "TXT record too long; truncated");
            Some((key, fitted.to_owned()))
        })
        .collect()
}

/// Render an Avahi static service file.
pub fn render_descriptor(ad: &ServiceAdvertisement, port: u16) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" standalone='no'?>\n");
    out.push_str("<!DOCTYPE service-group SYSTEM \"avahi-service.dtd\">\n");
    out.push_str("<service-group>\n");
    out.push_str(&format!(
        "  <name replace-wildcards=\"yes\">AirPrint {} @ %h</name>\n",
        xml_escape(&ad.queue_name)
    ));
    out.push_str("  <service>\n");
    out.push_str(&format!("    <type>{}</type>\n", xml_escape(&ad.service_type)));
    out.push_str(&format!("    <subtype>{AIRPRINT_SUBTYPE}</subtype>\n"));
    out.push_str(&format!("    <port>{port}</port>\n"));
    for (key, value) in &ad.txt_records {
        out.push_str(&format!(
            "    <txt-record>{}={}</txt-record>\n",
            xml_escape(key),
            xml_escape(value)
        ));
    }
    out.push_str("  </service>\n");
    out.push_str("</service-group>\n");
    out
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// SHA-256 over the rendered descriptor set, sorted by queue name.
pub fn fingerprint<'a>(rendered: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut sorted: Vec<(&str, &str)> = rendered.into_iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    for (queue, content) in sorted {
        hasher.update(queue.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// What a sync changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Queues advertised after the sync, sorted.
    pub advertised: Vec<String>,
    pub written: Vec<String>,
    pub removed: Vec<String>,
    pub reloaded: bool,
    pub fingerprint: String,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !self.written.is_empty() || !self.removed.is_empty()
    }
}

/// Make the descriptor set match the advertisable subset of `queues`.
#[instrument(skip_all, fields(queues = queues.len()))]
pub fn sync(
    queues: &[QueueState],
    profiles: &[PrinterProfile],
    settings: &AvahiSettings,
    host: &dyn AdvertisementHost,
) -> Result<SyncReport> {
    let mut rendered: Vec<(String, String)> = queues
        .iter()
        .filter(|q| q.is_advertisable())
        .map(|q| {
            let profile = profiles.iter().find(|p| p.logical_name == q.name);
            let ad = advertisement_for(q, profile, settings);
            (q.name.clone(), render_descriptor(&ad, settings.port))
        })
        .collect();
    rendered.sort();

    let mut report = SyncReport::default();
    for (queue, content) in &rendered {
        if host.read_descriptor(queue)?.as_deref() == Some(content.as_str()) {
            debug!(queue = %queue, "descriptor unchanged");
        } else {
            host.write_descriptor(queue, content)?;
            info!(queue = %queue, "descriptor written");
            report.written.push(queue.clone());
        }
        report.advertised.push(queue.clone());
    }

    let keep: BTreeSet<&str> = rendered.iter().map(|(q, _)| q.as_str()).collect();
    report.removed = delete_unlisted(host, &keep)?;

    if report.changed() {
        host.reload_advertisement_service()?;
        report.reloaded = true;
    }
    report.fingerprint = fingerprint(rendered.iter().map(|(q, c)| (q.as_str(), c.as_str())));
    info!(
        advertised = report.advertised.len(),
        written = report.written.len(),
        removed = report.removed.len(),
        reloaded = report.reloaded,
        "advertisements synced"
    );
    Ok(report)
}

/// Delete descriptors of queues that no longer qualify for advertisement,
/// leaving every other descriptor alone. Reloads when anything was removed.
pub fn remove_orphans(queues: &[QueueState], host: &dyn AdvertisementHost) -> Result<Vec<String>> {
    let keep: BTreeSet<&str> = queues
        .iter()
        .filter(|q| q.is_advertisable())
        .map(|q| q.name.as_str())
        .collect();
    let removed = delete_unlisted(host, &keep)?;
    if !removed.is_empty() {
        host.reload_advertisement_service()?;
    }
    Ok(removed)
}

fn delete_unlisted(host: &dyn AdvertisementHost, keep: &BTreeSet<&str>) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for queue in host.list_descriptors()? {
        if !keep.contains(queue.as_str()) {
            host.delete_descriptor(&queue)?;
            info!(queue = %queue, "orphaned descriptor removed");
            removed.push(queue);
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use airspool_bridge::avahi::AvahiServiceDir;
    use airspool_bridge::memory::MemoryPrintSystem;

    fn queue(name: &str, enabled: bool, accepting: bool, shared: bool) -> QueueState {
        let mut q = manual_queue(name);
        q.enabled = enabled;
        q.accepting = accepting;
        q.shared = shared;
        q
    }

    #[test]
    fn descriptor_exists_iff_enabled_accepting_shared() {
        let host = MemoryPrintSystem::new();
        let mut queues = Vec::new();
        for flags in 0..8u8 {
            let (e, a, s) = (flags & 1 != 0, flags & 2 != 0, flags & 4 != 0);
            queues.push(queue(&format!("Q{flags}"), e, a, s));
        }
        sync(&queues, &[], &AvahiSettings::default(), &host).expect("sync");

        for q in &queues {
            let present = host.state().descriptors.contains_key(&q.name);
            assert_eq!(present, q.enabled && q.accepting && q.shared, "queue {}", q.name);
        }
    }

    #[test]
    fn unchanged_input_writes_nothing_and_skips_reload() {
        let host = MemoryPrintSystem::new();
        let profiles = fleet_profiles();
        let queues = vec![queue("Dymo_4XL", true, true, true)];
        let settings = AvahiSettings::default();

        let first = sync(&queues, &profiles, &settings, &host).expect("first sync");
        assert!(first.reloaded);
        let second = sync(&queues, &profiles, &settings, &host).expect("second sync");
        assert!(!second.changed());
        assert!(!second.reloaded);
        assert_eq!(first.fingerprint, second.fingerprint);

        let s = host.state();
        assert_eq!(s.descriptor_writes, 1);
        assert_eq!(s.reloads, 1);
    }

    #[test]
    fn disabled_queue_loses_descriptor_with_one_reload() {
        let host = MemoryPrintSystem::new();
        let settings = AvahiSettings::default();
        let mut queues = vec![queue("A", true, true, true), queue("B", true, true, true)];
        sync(&queues, &[], &settings, &host).expect("sync");

        queues[0].enabled = false;
        queues[1].shared = false;
        let report = sync(&queues, &[], &settings, &host).expect("sync");
        assert_eq!(report.removed, vec!["A".to_owned(), "B".to_owned()]);
        assert_eq!(host.state().reloads, 2);
    }

    #[test]
    fn txt_records_follow_fixed_order_and_profile_media() {
        let profiles = fleet_profiles();
        let mut q = queue("HP_LaserJet_1320", true, true, true);
        q.options.insert("media".into(), "iso_a4_210x297mm".into());
        q.location = "Office".into();
        let ad = advertisement_for(&q, profiles.first(), &AvahiSettings::default());

        let keys: Vec<&str> = ad.txt_records.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "txtvers", "qtotal", "rp", "ty", "adminurl", "note", "product", "pdl", "URF",
                "Transparent", "Binary", "printer-state", "printer-type", "media-default",
                "media-supported"
            ]
        );
        assert_eq!(ad.service_type, "_ipp._tcp");
        assert_eq!(ad.media_default.as_deref(), Some("iso_a4_210x297mm"));
        assert_eq!(ad.media_supported, vec!["iso_a4_210x297mm", "na_letter_8.5x11in"]);

        let xml = render_descriptor(&ad, 631);
        assert!(xml.contains("<txt-record>rp=printers/HP_LaserJet_1320</txt-record>"));
        assert!(xml.contains("<txt-record>ty=HP LaserJet 1320</txt-record>"));
        assert!(xml.contains("<subtype>_universal._sub._ipp._tcp</subtype>"));
        assert!(xml.contains(
            "<txt-record>adminurl=http://raspberrypi.local:631/printers/HP_LaserJet_1320</txt-record>"
        ));
    }

    #[test]
    fn oversized_txt_entries_are_shortened_to_fit() {
        let mut profiles = fleet_profiles();
        let dymo = profiles.iter_mut().find(|p| p.logical_name == "Dymo_450").expect("dymo");
        dymo.media_supported = (0..40).map(|i| format!("w{i}h{i}0mm_label")).collect();
        let mut q = queue("Dymo_450", true, true, true);
        q.location = "x".repeat(300);
        let profile = profiles.iter().find(|p| p.logical_name == "Dymo_450");
        let ad = advertisement_for(&q, profile, &AvahiSettings::default());

        for (key, value) in &ad.txt_records {
            assert!(key.len() + 1 + value.len() <= MAX_TXT_ENTRY, "{key} is too long");
        }
        let media = &ad.txt_records.iter().find(|(k, _)| k == "media-supported").expect("media").1;
        assert!(media.starts_with("w79h252,w0h00mm_label,"));
        assert!(!media.ends_with(','));
        assert!(media.split(',').all(|m| ad.media_supported.iter().any(|s| s == m)));
        let note = &ad.txt_records.iter().find(|(k, _)| k == "note").expect("note").1;
        assert_eq!(note.len(), MAX_TXT_ENTRY - "note=".len());
    }

    #[test]
    fn overlong_value_without_room_is_dropped() {
        let kept = fit_txt_records(
            "Q",
            vec![("k".repeat(255), "v".into()), ("rp".into(), "printers/Q".into())],
        );
        assert_eq!(kept, vec![("rp".to_owned(), "printers/Q".to_owned())]);
    }

    #[test]
    fn values_are_xml_escaped() {
        let mut q = queue("Lab", true, true, true);
        q.location = "R&D <2nd floor>".into();
        let xml = render_descriptor(&advertisement_for(&q, None, &AvahiSettings::default()), 631);
        assert!(xml.contains("note=R&amp;D &lt;2nd floor&gt;"));
    }

    #[test]
    fn foreign_service_files_survive_sync() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ssh.service"), "<service-group/>").expect("foreign");
        std::fs::write(dir.path().join("AirPrint-Gone.service"), "<service-group/>").expect("stale");
        let host = AvahiServiceDir::new(dir.path());

        let keep: BTreeSet<&str> = ["Kept"].into_iter().collect();
        let removed = delete_unlisted(&host, &keep).expect("delete");
        assert_eq!(removed, vec!["Gone".to_owned()]);
        assert!(!dir.path().join("AirPrint-Gone.service").exists());
        assert!(dir.path().join("ssh.service").exists());
    }

    #[test]
    fn remove_orphans_reloads_only_when_something_went() {
        let host = MemoryPrintSystem::new();
        host.write_descriptor("Old", "<service-group/>").expect("seed");
        assert!(remove_orphans(&[queue("Old", true, true, true)], &host).expect("none").is_empty());
        assert_eq!(host.state().reloads, 0);

        let removed = remove_orphans(&[queue("Old", false, true, true)], &host).expect("orphan");
        assert_eq!(removed, vec!["Old".to_owned()]);
        assert_eq!(host.state().reloads, 1);
    }

    #[test]
    fn fingerprint_ignores_input_order() {
        let a = fingerprint([("A", "x"), ("B", "y")]);
        let b = fingerprint([("B", "y"), ("A", "x")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint([("A", "y"), ("B", "x")]));
    }
}
