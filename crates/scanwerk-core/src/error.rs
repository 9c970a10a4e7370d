// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

use crate::types::Stage;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Acquisition errors --
    #[error("unable to initialise scanner backend: {0}")]
    Init(String),

    #[error("unable to list devices: {0}")]
    ListDevices(String),

    #[error("no scanners found")]
    NoDevice,

    #[error("unable to open scanner {device}: {cause}")]
    Open { device: String, cause: String },

    #[error("scanner rejected option {option}: {cause}")]
    OptionRejected { option: String, cause: String },

    #[error("unable to read page {page_index}: {cause}")]
    Read { page_index: usize, cause: String },

    // -- Document errors --
    #[error("unable to encode page {page_index}: {cause}")]
    Encode { page_index: usize, cause: String },

    #[error("unable to render PDF: {0}")]
    Render(String),

    #[error("scan produced no pages")]
    EmptyDocument,

    // -- Server --
    #[error("scanner is busy with another job")]
    Busy,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanwerkError {
    /// The pipeline stage this error terminates.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Init(_)
            | Self::ListDevices(_)
            | Self::NoDevice
            | Self::Open { .. }
            | Self::OptionRejected { .. }
            | Self::Read { .. }
            | Self::Busy => Stage::Acquiring,
            Self::Encode { .. } => Stage::Resampling,
            Self::Render(_) | Self::EmptyDocument => Stage::Assembling,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => Stage::Idle,
        }
    }

    /// Short single-line message for HTTP callers.
    ///
    /// Deliberately terse: device names, option values and driver messages
    /// stay in the log.
    pub fn caller_message(&self) -> String {
        match self {
            Self::Busy => "Scanner is busy".into(),
            Self::EmptyDocument => "No pages were scanned".into(),
            Self::Encode { page_index, .. } => format!("Unable to encode page {page_index}"),
            Self::Render(_) => "Unable to generate PDF".into(),
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => "Internal error".into(),
            _ => "Unable to fetch pages".into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
