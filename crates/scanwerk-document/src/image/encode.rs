// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lossy page encoding.

use image::DynamicImage;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use scanwerk_core::RasterPage;
use scanwerk_core::error::{Result, ScanwerkError};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// Largest side a baseline JPEG can describe.
const MAX_JPEG_SIDE: u32 = u16::MAX as u32;

/// One compressed page, ready to be placed in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    index: usize,
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

impl EncodedPage {
    pub fn new(index: usize, width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            bytes,
        }
    }

    /// Position of the page in the scan.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the encoded bytes.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Compresses a raster page.
pub trait PageEncoder: Send + Sync {
    /// Encode `page`; `page_index` identifies the page in errors.
    fn encode(&self, page: &RasterPage, page_index: usize) -> Result<EncodedPage>;
}

/// Baseline JPEG at a fixed quality, with the page DPI recorded in the JFIF
/// density fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegPageEncoder {
    quality: u8,
}

impl JpegPageEncoder {
    /// `quality` is clamped to 1-100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegPageEncoder {
    fn default() -> Self {
        Self::new(95)
    }
}

impl PageEncoder for JpegPageEncoder {
    #[instrument(skip(self, page), fields(quality = self.quality))]
    fn encode(&self, page: &RasterPage, page_index: usize) -> Result<EncodedPage> {
        let (width, height) = (page.width(), page.height());
        let encode_err = |cause: String| ScanwerkError::Encode { page_index, cause };

        if width == 0 || height == 0 {
            return Err(encode_err(format!("empty bitmap {width}x{height}")));
        }
        if width > MAX_JPEG_SIDE || height > MAX_JPEG_SIDE {
            return Err(encode_err(format!(
                "{width}x{height} exceeds the JPEG limit of {MAX_JPEG_SIDE} pixels"
            )));
        }
        let density = u16::try_from(page.dpi())
            .map_err(|_| encode_err(format!("resolution {} dpi out of range", page.dpi())))?;

        let mut bytes = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
            encoder.set_pixel_density(PixelDensity::dpi(density));

            // JPEG carries 8-bit gray or RGB; everything else is narrowed to
            // one of those.
            let written = match page.image() {
                DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
                DynamicImage::ImageRgb8(rgb) => encoder.encode_image(rgb),
                DynamicImage::ImageLuma16(_)
                | DynamicImage::ImageLumaA8(_)
                | DynamicImage::ImageLumaA16(_) => encoder.encode_image(&page.image().to_luma8()),
                other => encoder.encode_image(&other.to_rgb8()),
            };
            written.map_err(|err| encode_err(err.to_string()))?;
        }

        debug!(page_index, width, height, bytes = bytes.len(), "Page encoded");
        Ok(EncodedPage::new(page_index, width, height, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::jpeg;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

    fn rgb_page(width: u32, height: u32, dpi: u32) -> RasterPage {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        RasterPage::new(DynamicImage::ImageRgb8(img), dpi)
    }

    #[test]
    fn writes_baseline_jpeg_with_density() {
        let encoded = JpegPageEncoder::new(95)
            .encode(&rgb_page(64, 40, 150), 0)
            .expect("encode");
        assert_eq!(&encoded.bytes()[..2], &[0xFF, 0xD8]);
        assert_eq!((encoded.width(), encoded.height()), (64, 40));

        let info = jpeg::probe(encoded.bytes()).expect("probe");
        assert_eq!((info.width, info.height, info.components), (64, 40, 3));
        assert_eq!(info.density, Some((150.0, 150.0)));

        let decoded = image::load_from_memory(encoded.bytes()).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (64, 40));
    }

    #[test]
    fn gray_pages_stay_single_channel() {
        let page = RasterPage::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([90]))),
            150,
        );
        let encoded = JpegPageEncoder::default().encode(&page, 1).expect("encode");
        assert_eq!(jpeg::probe(encoded.bytes()).expect("probe").components, 1);
    }

    #[test]
    fn sixteen_bit_pages_are_narrowed() {
        let img: ImageBuffer<Rgb<u16>, Vec<u16>> = ImageBuffer::from_pixel(8, 8, Rgb([65535, 0, 0]));
        let page = RasterPage::new(DynamicImage::ImageRgb16(img), 150);
        let encoded = JpegPageEncoder::default().encode(&page, 0).expect("encode");
        assert_eq!(jpeg::probe(encoded.bytes()).expect("probe").components, 3);
    }

    #[test]
    fn empty_bitmap_is_an_encode_error() {
        let page = RasterPage::new(DynamicImage::ImageRgb8(RgbImage::new(0, 0)), 150);
        let err = JpegPageEncoder::default().encode(&page, 4).expect_err("empty");
        assert!(matches!(err, ScanwerkError::Encode { page_index: 4, .. }));
    }

    #[test]
    fn oversized_bitmap_is_an_encode_error() {
        let page = RasterPage::new(
            DynamicImage::ImageLuma8(GrayImage::new(MAX_JPEG_SIDE + 1, 1)),
            150,
        );
        let err = JpegPageEncoder::default().encode(&page, 2).expect_err("too wide");
        assert!(matches!(err, ScanwerkError::Encode { page_index: 2, .. }));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let page = rgb_page(128, 128, 150);
        let high = JpegPageEncoder::new(95).encode(&page, 0).expect("high");
        let low = JpegPageEncoder::new(20).encode(&page, 0).expect("low");
        assert!(low.len() < high.len());
    }

    #[test]
    fn digest_identifies_content() {
        let encoder = JpegPageEncoder::default();
        let a = encoder.encode(&rgb_page(32, 32, 150), 0).expect("a");
        let b = encoder.encode(&rgb_page(32, 32, 150), 1).expect("b");
        let c = encoder.encode(&rgb_page(32, 16, 150), 2).expect("c");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(JpegPageEncoder::new(0).quality(), 1);
        assert_eq!(JpegPageEncoder::new(200).quality(), 100);
    }
}
