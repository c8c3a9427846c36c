// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Airspool fleet logic.
//!
//! The reconcile pipeline runs scanner, resolver, reconciler, and advertiser
//! in that order against one snapshot of the print subsystem. The console
//! offers the maintenance operations that run independently of it.

pub mod advertise;
pub mod console;
pub mod discovery;
pub mod health;
pub mod journal;
pub mod pipeline;
pub mod reconciler;
pub mod resolver;
pub mod scanner;
pub mod spool;

#[cfg(test)]
mod testing;

pub use console::Console;
pub use pipeline::{PipelineReport, RunOutcome};
pub use reconciler::{PlanStep, ReconcilePlan};
