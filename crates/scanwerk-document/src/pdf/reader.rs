// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: inspect documents produced by the assembler using `lopdf`.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, instrument};

fn pdf_err(context: &str, err: impl std::fmt::Display) -> ScanwerkError {
    ScanwerkError::Render(format!("{context}: {err}"))
}

/// Read-only view of a scanned document.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Load a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document =
            Document::load_mem(data).map_err(|err| pdf_err("failed to load PDF", err))?;
        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// `/Producer` from the `/Info` dictionary.
    pub fn producer(&self) -> Option<String> {
        let info_id = self.document.trailer.get(b"Info").ok()?.as_reference().ok()?;
        match self.document.get_dictionary(info_id).ok()?.get(b"Producer").ok()? {
            Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// `[llx, lly, urx, ury]` of page `page_number` (1-indexed).
    pub fn media_box(&self, page_number: u32) -> Result<[f32; 4]> {
        let page = self.page_dict(page_number)?;
        let values = page
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .map_err(|err| pdf_err("no /MediaBox", err))?;
        numbers(values)
    }

    /// Operands of the `cm` operator that places the page image.
    pub fn image_placement(&self, page_number: u32) -> Result<[f32; 6]> {
        let page_id = self.page_id(page_number)?;
        let raw = self
            .document
            .get_page_content(page_id)
            .map_err(|err| pdf_err("no page content", err))?;
        let content =
            Content::decode(&raw).map_err(|err| pdf_err("undecodable content stream", err))?;
        let cm = content
            .operations
            .iter()
            .find(|op| op.operator == "cm")
            .ok_or_else(|| ScanwerkError::Render(format!("page {page_number} places no image")))?;
        numbers(&cm.operands)
    }

    /// Raw stream bytes of the page image.
    pub fn image_bytes(&self, page_number: u32) -> Result<Vec<u8>> {
        Ok(self.image_stream(page_number)?.content.clone())
    }

    /// `/ColorSpace` of the page image.
    pub fn image_color_space(&self, page_number: u32) -> Result<String> {
        let stream = self.image_stream(page_number)?;
        let name = stream
            .dict
            .get(b"ColorSpace")
            .and_then(Object::as_name)
            .map_err(|err| pdf_err("no /ColorSpace", err))?;
        Ok(String::from_utf8_lossy(name).into_owned())
    }

    // -- Helpers --------------------------------------------------------------

    fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        self.document
            .get_pages()
            .get(&page_number)
            .copied()
            .ok_or_else(|| {
                ScanwerkError::Render(format!(
                    "page {} out of range (document has {} pages)",
                    page_number,
                    self.page_count()
                ))
            })
    }

    fn page_dict(&self, page_number: u32) -> Result<&Dictionary> {
        let page_id = self.page_id(page_number)?;
        self.document
            .get_dictionary(page_id)
            .map_err(|err| pdf_err("page is not a dictionary", err))
    }

    fn image_stream(&self, page_number: u32) -> Result<&lopdf::Stream> {
        let page = self.page_dict(page_number)?;
        let xobjects = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|resources| resources.get(b"XObject"))
            .and_then(Object::as_dict)
            .map_err(|err| pdf_err("no image resource", err))?;
        let (_, image) = xobjects.iter().next().ok_or_else(|| {
            ScanwerkError::Render(format!("page {page_number} has no image resource"))
        })?;
        let image_id = image
            .as_reference()
            .map_err(|err| pdf_err("image resource is not a reference", err))?;
        self.document
            .get_object(image_id)
            .and_then(Object::as_stream)
            .map_err(|err| pdf_err("image is not a stream", err))
    }
}

/// Every operand as a number.
fn numbers<const N: usize>(values: &[Object]) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    if values.len() != N {
        return Err(ScanwerkError::Render(format!(
            "expected {N} numbers, found {}",
            values.len()
        )));
    }
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = value
            .as_float()
            .map_err(|err| pdf_err("expected a number", err))?;
    }
    Ok(out)
}
