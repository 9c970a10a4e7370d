// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline constants and the fixed scanner option set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};
use crate::types::{OptionValue, PaperSize};

/// Resolution pages are acquired at.
pub const SCAN_DPI: u32 = 300;

/// Resolution pages are embedded into the PDF at.
pub const OUTPUT_DPI: u32 = 150;

/// Settings of the document side of the pipeline, fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Acquisition resolution.
    pub scan_dpi: u32,
    /// Output resolution; `scan_dpi / output_dpi` is the DPI reduction ratio.
    pub output_dpi: u32,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// PDF page format; also drives the scan area.
    pub paper_size: PaperSize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan_dpi: SCAN_DPI,
            output_dpi: OUTPUT_DPI,
            jpeg_quality: 95,
            paper_size: PaperSize::A4,
        }
    }
}

/// One named scanner option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOption {
    pub name: String,
    pub value: OptionValue,
}

/// The scanner options applied at the start of every scan.
///
/// Built once at startup and never mutated afterwards. Options are kept in
/// application order: some backends narrow the valid range of the scan area
/// (`br-x`, `br-y`) depending on the page geometry set before it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanConfiguration {
    options: Vec<ScanOption>,
}

impl ScanConfiguration {
    /// The default option set for a duplex sheet-fed scanner.
    pub fn for_paper(paper: PaperSize, scan_dpi: u32) -> Self {
        let (width_mm, height_mm) = paper.dimensions_mm();
        let (width_mm, height_mm) = (f64::from(width_mm), f64::from(height_mm));

        Self::default()
            // Duplex scan: both sides in one pass.
            .with("source", "ADF Duplex")
            .with("mode", "Color")
            .with("resolution", i64::from(scan_dpi))
            .with("page-width", width_mm)
            .with("page-height", height_mm)
            .with("tl-x", 0.0)
            .with("tl-y", 0.0)
            .with("br-x", width_mm)
            .with("br-y", height_mm)
            // Detect the end of short pages.
            .with("ald", true)
            // Whiten the paper background.
            .with("brightness", 25i64)
            .with("buffermode", "On")
            // Never power down between jobs.
            .with("offtimer", 0i64)
            // Remove black specks.
            .with("swdespeck", 2i64)
            // Discard pages that are at least 10% empty.
            .with("swskip", 10.0)
    }

    /// Set an option, replacing an earlier value in place.
    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        let value = value.into();
        match self.options.iter_mut().find(|o| o.name == name) {
            Some(existing) => existing.value = value,
            None => self.options.push(ScanOption {
                name: name.to_string(),
                value,
            }),
        }
        self
    }

    /// Merge options from a JSON file (an array of `{"name", "value"}`).
    ///
    /// The acquisition resolution is a pipeline constant, so the file may not
    /// change it.
    pub fn merge_file(self, path: impl AsRef<Path>, scan_dpi: u32) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let overrides: Vec<ScanOption> = serde_json::from_str(&raw)?;

        let mut merged = self;
        for option in overrides {
            if option.name == "resolution" && option.value != OptionValue::Int(i64::from(scan_dpi))
            {
                return Err(ScanwerkError::Config(format!(
                    "{}: resolution must stay at {} dpi, got {}",
                    path.as_ref().display(),
                    scan_dpi,
                    option.value
                )));
            }
            merged = merged.with(&option.name, option.value);
        }
        Ok(merged)
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.options.iter().find(|o| o.name == name).map(|o| &o.value)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Options in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.options.iter().map(|o| (o.name.as_str(), &o.value))
    }
}
