// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document: the document side of the scan pipeline.
//
// Downsamples acquired pages to output resolution, encodes them as JPEG and
// assembles the encoded pages into a single PDF. Also provides a small PDF
// reader used to inspect what was produced.

pub mod convert;
pub mod image;
pub mod pdf;

pub use convert::{assemble, encode_pages};
pub use self::image::encode::{EncodedPage, JpegPageEncoder, PageEncoder};
pub use self::image::resample::Resampler;
pub use pdf::assembler::DocumentAssembler;
pub use pdf::reader::PdfReader;
