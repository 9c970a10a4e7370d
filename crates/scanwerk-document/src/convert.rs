// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page sequence -> PDF conversion.
//
// Two steps, each all-or-nothing: every page is resampled and encoded in
// feed order, then the encoded pages are assembled into one document. The
// first failing page aborts the job and its index is reported.

use scanwerk_core::PageSequence;
use scanwerk_core::PaperSize;
use scanwerk_core::error::Result;
use tracing::{debug, info, instrument};

use crate::image::encode::{EncodedPage, PageEncoder};
use crate::image::resample::Resampler;
use crate::pdf::assembler::DocumentAssembler;

/// Resample and encode every page, in order.
#[instrument(skip_all, fields(pages = pages.len(), ratio = resampler.ratio()))]
pub fn encode_pages(
    pages: PageSequence,
    resampler: &Resampler,
    encoder: &dyn PageEncoder,
) -> Result<Vec<EncodedPage>> {
    let mut encoded = Vec::with_capacity(pages.len());
    for (page_index, page) in pages.into_iter().enumerate() {
        let page = resampler.resample(page);
        let out = encoder.encode(&page, page_index)?;
        debug!(
            page_index,
            width = out.width(),
            height = out.height(),
            bytes = out.len(),
            sha256 = %out.digest(),
            "Page ready"
        );
        encoded.push(out);
    }
    info!(pages = encoded.len(), "All pages encoded");
    Ok(encoded)
}

/// Assemble encoded pages into a PDF, in the order given.
#[instrument(skip_all, fields(pages = pages.len(), paper = ?paper_size))]
pub fn assemble(pages: &[EncodedPage], paper_size: PaperSize) -> Result<Vec<u8>> {
    let mut assembler = DocumentAssembler::new(paper_size);
    for page in pages {
        assembler.append_page(page.bytes())?;
    }
    assembler.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::encode::JpegPageEncoder;
    use crate::pdf::reader::PdfReader;
    use image::{DynamicImage, Rgb, RgbImage};
    use scanwerk_core::RasterPage;
    use scanwerk_core::error::ScanwerkError;

    fn pages(widths: &[u32]) -> PageSequence {
        widths
            .iter()
            .map(|&w| {
                let img = RgbImage::from_pixel(w, 100, Rgb([w as u8, 0, 0]));
                RasterPage::new(DynamicImage::ImageRgb8(img), 300)
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn pages_are_halved_and_stay_in_order() {
        let resampler = Resampler::new(300, 150).expect("ratio");
        let encoded =
            encode_pages(pages(&[40, 60, 80]), &resampler, &JpegPageEncoder::default()).expect("ok");
        let widths: Vec<u32> = encoded.iter().map(EncodedPage::width).collect();
        assert_eq!(widths, vec![20, 30, 40]);
        let indices: Vec<usize> = encoded.iter().map(EncodedPage::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn document_carries_every_page_once() {
        let resampler = Resampler::new(300, 150).expect("ratio");
        let encoded =
            encode_pages(pages(&[40, 60]), &resampler, &JpegPageEncoder::default()).expect("ok");
        let pdf = assemble(&encoded, PaperSize::A4).expect("pdf");

        let reader = PdfReader::from_bytes(&pdf).expect("read back");
        assert_eq!(reader.page_count(), 2);
        assert_eq!(reader.image_bytes(2).expect("page 2"), encoded[1].bytes());
    }

    #[test]
    fn empty_sequence_is_an_empty_document() {
        let resampler = Resampler::new(300, 150).expect("ratio");
        let encoded =
            encode_pages(PageSequence::new(), &resampler, &JpegPageEncoder::default()).expect("ok");
        let err = assemble(&encoded, PaperSize::A4).expect_err("empty");
        assert!(matches!(err, ScanwerkError::EmptyDocument));
    }
}
