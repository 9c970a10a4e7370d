// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: assembling JPEG pages into a document and reading it back.

pub mod assembler;
pub mod jpeg;
pub mod reader;

pub use assembler::DocumentAssembler;
pub use reader::PdfReader;
