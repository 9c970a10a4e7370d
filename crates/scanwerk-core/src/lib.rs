// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk core types, pipeline constants and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{OUTPUT_DPI, PipelineConfig, SCAN_DPI, ScanConfiguration, ScanOption};
pub use error::ScanwerkError;
pub use types::*;
