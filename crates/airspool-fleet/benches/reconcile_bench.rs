// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for reconcile planning and descriptor rendering.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use airspool_bridge::memory::MemoryPrintSystem;
use airspool_core::config::AvahiSettings;
use airspool_core::types::{DeviceDescriptor, DriverRef, OptionMap, PrinterProfile, QueueState};
use airspool_fleet::advertise::{advertisement_for, render_descriptor};
use airspool_fleet::reconciler::reconcile;

// ---------------------------------------------------------------------------
// Fixtures: a lab of label printers, one profile per model
// ---------------------------------------------------------------------------

const MODELS: usize = 24;

fn profiles() -> Vec<PrinterProfile> {
    (0..MODELS)
        .map(|i| PrinterProfile {
            logical_name: format!("Label_{i:02}"),
            match_pattern: format!("LabelWriter M{i:02}"),
            driver_candidates: vec![
                DriverRef(format!("dymo:0/ppd/m{i:02}.ppd")),
                DriverRef::from("drv:///sample.drv/dymo.ppd"),
            ],
            default_options: [("media".to_owned(), "w79h252".to_owned())].into_iter().collect(),
            location: "Warehouse".into(),
            shared: true,
            media_supported: vec!["w79h252".into(), "w167h288".into()],
            make_and_model: Some(format!("DYMO LabelWriter M{i:02}")),
        })
        .collect()
}

fn devices() -> Vec<DeviceDescriptor> {
    (0..MODELS)
        .rev()
        .map(|i| DeviceDescriptor {
            vendor_id: 0x0922,
            product_id: 0x0020 + i as u16,
            serial_or_port: format!("SN{i:06}"),
            raw_description: format!("DYMO LabelWriter M{i:02}"),
            device_uri: format!("usb://DYMO/LabelWriter%20M{i:02}?serial=SN{i:06}"),
        })
        .collect()
}

/// Every other model already has an up-to-date queue.
fn queues() -> Vec<QueueState> {
    (0..MODELS)
        .step_by(2)
        .map(|i| QueueState {
            name: format!("Label_{i:02}"),
            device_uri: format!("usb://DYMO/LabelWriter%20M{i:02}?serial=SN{i:06}"),
            driver_ref: Some(DriverRef(format!("dymo:0/ppd/m{i:02}.ppd"))),
            options: [("media".to_owned(), "w79h252".to_owned())].into_iter().collect::<OptionMap>(),
            location: "Warehouse".into(),
            enabled: true,
            accepting: true,
            shared: true,
        })
        .collect()
}

fn catalog() -> MemoryPrintSystem {
    (0..MODELS)
        .filter(|i| i % 3 != 0)
        .fold(MemoryPrintSystem::new(), |sys, i| {
            sys.with_driver(&format!("dymo:0/ppd/m{i:02}.ppd"), "DYMO label printer")
        })
        .with_driver("drv:///sample.drv/dymo.ppd", "Generic DYMO")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_reconcile(c: &mut Criterion) {
    let (profiles, devices, queues, catalog) = (profiles(), devices(), queues(), catalog());
    c.bench_function("reconcile_24_profiles", |b| {
        b.iter(|| reconcile(black_box(&profiles), black_box(&devices), black_box(&queues), &catalog))
    });
}

fn bench_render(c: &mut Criterion) {
    let profiles = profiles();
    let queues = queues();
    let queue = &queues[0];
    let settings = AvahiSettings::default();
    c.bench_function("render_descriptor", |b| {
        b.iter(|| {
            let ad = advertisement_for(black_box(queue), profiles.first(), &settings);
            render_descriptor(&ad, settings.port)
        })
    });
}

criterion_group!(benches, bench_reconcile, bench_render);
criterion_main!(benches);
