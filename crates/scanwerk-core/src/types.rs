// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scan-to-PDF pipeline.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one scan request, carried on every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanJobId(pub Uuid);

impl ScanJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States a scan request moves through.
///
/// `Idle -> Acquiring -> Resampling -> Assembling -> Responding -> Idle`,
/// with `Failed` reachable from every non-idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Acquiring,
    Resampling,
    Assembling,
    Responding,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Resampling => "resampling",
            Self::Assembling => "assembling",
            Self::Responding => "responding",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A single scanner option value.
///
/// Deserialised untagged, so a JSON options file reads naturally:
/// `true`, `25`, `210.0`, `"ADF Duplex"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Short type name used in rejection messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A5,
    Letter,
    Legal,
}

/// PostScript points per millimetre.
const PT_PER_MM: f32 = 72.0 / 25.4;

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
        }
    }

    /// Dimensions in PDF points (width, height).
    pub fn dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (w * PT_PER_MM, h * PT_PER_MM)
    }
}

/// One acquired bitmap, i.e. one physical side of a scanned sheet.
///
/// Owned by exactly one pipeline stage at a time; stages consume a page and
/// hand on a new one rather than mutating it.
#[derive(Debug, Clone)]
pub struct RasterPage {
    image: DynamicImage,
    dpi: u32,
}

impl RasterPage {
    pub fn new(image: DynamicImage, dpi: u32) -> Self {
        Self { image, dpi }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resolution the bitmap was acquired (or resampled) at.
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}

/// Pages in physical feed order. Order is never changed downstream.
#[derive(Debug, Clone, Default)]
pub struct PageSequence {
    pages: Vec<RasterPage>,
}

impl PageSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: RasterPage) {
        self.pages.push(page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RasterPage> {
        self.pages.iter()
    }
}

impl From<Vec<RasterPage>> for PageSequence {
    fn from(pages: Vec<RasterPage>) -> Self {
        Self { pages }
    }
}

impl IntoIterator for PageSequence {
    type Item = RasterPage;
    type IntoIter = std::vec::IntoIter<RasterPage>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}
