// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF assembler: one JPEG per page, embedded unchanged, using `lopdf`.
//
// The JPEG stream goes into the file as a `DCTDecode` image XObject, so the
// pixels are never decoded or re-compressed on the way in.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use scanwerk_core::PaperSize;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

use super::jpeg::{self, JpegInfo};

/// Resource name of the page image.
const IMAGE_NAME: &str = "Im0";

/// Builds a document page by page.
///
/// Pages appear in call order; nothing is ever reordered or dropped.
pub struct DocumentAssembler {
    document: Document,
    /// Reserved for the page tree root, written by `finalize`.
    pages_id: ObjectId,
    kids: Vec<Object>,
    paper_size: PaperSize,
    producer: String,
}

impl DocumentAssembler {
    pub fn new(paper_size: PaperSize) -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            paper_size,
            producer: format!("Scanwerk {}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Override the `/Producer` entry.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append one page showing `jpeg` at the top-left corner, spanning the
    /// full page width.
    ///
    /// The image height follows the aspect ratio recorded in the JPEG's
    /// density fields, falling back to its pixel aspect ratio when the
    /// stream carries no absolute density.
    #[instrument(skip_all, fields(page = self.kids.len(), bytes = jpeg.len()))]
    pub fn append_page(&mut self, jpeg: &[u8]) -> Result<()> {
        let info = jpeg::probe(jpeg)?;
        let (page_w, page_h) = self.paper_size.dimensions_pt();
        let (draw_w, draw_h) = placement_size(&info, page_w);

        let image_id = self.document.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(info.width),
                "Height" => i64::from(info.height),
                "ColorSpace" => info.color_space(),
                "BitsPerComponent" => i64::from(info.bits_per_component),
                "Filter" => "DCTDecode",
            },
            jpeg.to_vec(),
        )
        .with_compression(false));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(draw_w),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(draw_h),
                        Object::Integer(0),
                        Object::Real(page_h - draw_h),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|err| ScanwerkError::Render(format!("content stream: {err}")))?;
        let content_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), content_bytes));

        let mut xobjects = Dictionary::new();
        xobjects.set(IMAGE_NAME, image_id);
        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_w),
                Object::Real(page_h),
            ],
            "Resources" => dictionary! { "XObject" => xobjects },
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());

        debug!(
            width_px = info.width,
            height_px = info.height,
            draw_w,
            draw_h,
            "Page appended"
        );
        Ok(())
    }

    /// Write the page tree, catalog and `/Info`, and serialise the document.
    ///
    /// A document without pages is refused with `EmptyDocument`.
    #[instrument(skip_all, fields(pages = self.kids.len()))]
    pub fn finalize(mut self) -> Result<Vec<u8>> {
        if self.kids.is_empty() {
            return Err(ScanwerkError::EmptyDocument);
        }

        let count = self.kids.len() as i64;
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let created = chrono::Utc::now().format("D:%Y%m%d%H%M%S+00'00'").to_string();
        let info_id = self.document.add_object(dictionary! {
            "Producer" => Object::string_literal(self.producer),
            "CreationDate" => Object::string_literal(created),
        });
        self.document.trailer.set("Root", catalog_id);
        self.document.trailer.set("Info", info_id);

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| ScanwerkError::Render(format!("failed to serialise PDF: {err}")))?;

        info!(pages = count, bytes = output.len(), "PDF assembled");
        Ok(output)
    }
}

/// Size at which an image is drawn on a page `page_w` points wide.
fn placement_size(info: &JpegInfo, page_w: f32) -> (f32, f32) {
    let aspect = match info.density {
        Some((dpi_x, dpi_y)) => {
            let inches_w = info.width as f32 / dpi_x;
            let inches_h = info.height as f32 / dpi_y;
            inches_h / inches_w
        }
        None => info.height as f32 / info.width as f32,
    };
    (page_w, page_w * aspect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::encode::{JpegPageEncoder, PageEncoder};
    use crate::pdf::reader::PdfReader;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
    use scanwerk_core::RasterPage;

    fn jpeg(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        let page = RasterPage::new(DynamicImage::ImageRgb8(img), 150);
        JpegPageEncoder::default()
            .encode(&page, 0)
            .expect("encode")
            .bytes()
            .to_vec()
    }

    #[test]
    fn empty_document_is_refused() {
        let err = DocumentAssembler::new(PaperSize::A4).finalize().expect_err("empty");
        assert!(matches!(err, ScanwerkError::EmptyDocument));
    }

    #[test]
    fn pages_keep_call_order_and_bytes() {
        let streams: Vec<Vec<u8>> = [10u8, 120, 240].iter().map(|s| jpeg(62, 88, *s)).collect();
        let mut assembler = DocumentAssembler::new(PaperSize::A4);
        for stream in &streams {
            assembler.append_page(stream).expect("append");
        }
        assert_eq!(assembler.page_count(), 3);

        let pdf = assembler.finalize().expect("finalize");
        let reader = PdfReader::from_bytes(&pdf).expect("read back");
        assert_eq!(reader.page_count(), 3);
        for (i, stream) in streams.iter().enumerate() {
            assert_eq!(&reader.image_bytes(i as u32 + 1).expect("image"), stream);
        }
    }

    #[test]
    fn image_spans_page_width_from_top_left() {
        let mut assembler = DocumentAssembler::new(PaperSize::A4);
        assembler.append_page(&jpeg(1240, 1754, 200)).expect("append");
        let pdf = assembler.finalize().expect("finalize");
        let reader = PdfReader::from_bytes(&pdf).expect("read back");

        let media = reader.media_box(1).expect("media box");
        assert!((media[2] - 595.276).abs() < 0.01);
        assert!((media[3] - 841.89).abs() < 0.01);

        let [w, b, c, h, x, y] = reader.image_placement(1).expect("placement");
        assert!((w - media[2]).abs() < 0.01);
        assert_eq!((b, c, x), (0.0, 0.0, 0.0));
        // 1240x1754 at 150 dpi is 8.267 x 11.693 inches.
        assert!((h - 595.276 * 1754.0 / 1240.0).abs() < 0.05, "height {h}");
        // Top edge touches the top of the page.
        assert!((y + h - media[3]).abs() < 0.05, "y {y}");
    }

    #[test]
    fn anisotropic_density_drives_height() {
        let mut jpeg = jpeg(100, 100, 50);
        // Rewrite the JFIF density to 100 x 200 dpi.
        let app0 = 2 + 2 + 2 + 5 + 2 + 1;
        jpeg[app0..app0 + 4].copy_from_slice(&[0, 100, 0, 200]);

        let mut assembler = DocumentAssembler::new(PaperSize::A4);
        assembler.append_page(&jpeg).expect("append");
        let pdf = assembler.finalize().expect("finalize");
        let [w, _, _, h, _, _] = PdfReader::from_bytes(&pdf)
            .expect("read back")
            .image_placement(1)
            .expect("placement");
        assert!((h - w / 2.0).abs() < 0.05, "w {w} h {h}");
    }

    #[test]
    fn gray_pages_use_gray_colour_space() {
        let page = RasterPage::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([0]))),
            150,
        );
        let encoded = JpegPageEncoder::default().encode(&page, 0).expect("encode");
        let mut assembler = DocumentAssembler::new(PaperSize::Letter);
        assembler.append_page(encoded.bytes()).expect("append");
        let pdf = assembler.finalize().expect("finalize");
        let reader = PdfReader::from_bytes(&pdf).expect("read back");
        assert_eq!(reader.image_color_space(1).expect("colour space"), "DeviceGray");
        assert!((reader.media_box(1).expect("media")[2] - 612.0).abs() < 0.01);
    }

    #[test]
    fn non_jpeg_page_is_a_render_error() {
        let mut assembler = DocumentAssembler::new(PaperSize::A4);
        let err = assembler.append_page(b"not a jpeg").expect_err("invalid");
        assert!(matches!(err, ScanwerkError::Render(_)));
        assert_eq!(assembler.page_count(), 0);
    }

    #[test]
    fn info_dictionary_names_the_producer() {
        let mut assembler = DocumentAssembler::new(PaperSize::A4).with_producer("Test Producer");
        assembler.append_page(&jpeg(10, 10, 0)).expect("append");
        let pdf = assembler.finalize().expect("finalize");
        let reader = PdfReader::from_bytes(&pdf).expect("read back");
        assert_eq!(reader.producer().as_deref(), Some("Test Producer"));
    }
}
