// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Airspool: core types, errors, and fleet configuration shared across all crates.

pub mod config;
pub mod error;
pub mod hints;
pub mod types;

pub use config::FleetConfig;
pub use error::AirspoolError;
pub use types::*;
