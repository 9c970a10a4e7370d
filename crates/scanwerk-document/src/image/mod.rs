// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: resolution reduction and lossy page encoding.

pub mod encode;
pub mod resample;

pub use encode::{EncodedPage, JpegPageEncoder, PageEncoder};
pub use resample::Resampler;
