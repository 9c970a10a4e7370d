// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Turns raw SANE frames into bitmaps.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use super::protocol::{ByteOrder, FrameFormat, Parameters, ProtocolError, ProtocolResult};

/// One frame of image data and the parameters it was read under.
#[derive(Debug, Clone)]
pub struct Frame {
    pub params: Parameters,
    pub data: Vec<u8>,
}

impl Frame {
    /// Complete lines actually received, capped by the announced count.
    fn lines(&self) -> ProtocolResult<usize> {
        let bpl = self.bytes_per_line()?;
        let received = self.data.len() / bpl;
        let lines = match usize::try_from(self.params.lines) {
            Ok(announced) => announced.min(received),
            // Hand scanners and ALD report -1 and stop whenever the page ends.
            Err(_) => received,
        };
        if lines == 0 {
            return Err(ProtocolError::Malformed("frame carries no image lines".into()));
        }
        Ok(lines)
    }

    fn bytes_per_line(&self) -> ProtocolResult<usize> {
        match usize::try_from(self.params.bytes_per_line) {
            Ok(bpl) if bpl > 0 => Ok(bpl),
            _ => Err(ProtocolError::Malformed(format!(
                "bytes per line {}",
                self.params.bytes_per_line
            ))),
        }
    }

    fn width(&self) -> ProtocolResult<u32> {
        match u32::try_from(self.params.pixels_per_line) {
            Ok(width) if width > 0 => Ok(width),
            _ => Err(ProtocolError::Malformed(format!(
                "pixels per line {}",
                self.params.pixels_per_line
            ))),
        }
    }

    /// Row `y`, without line padding.
    fn row(&self, y: usize, bpl: usize) -> &[u8] {
        &self.data[y * bpl..(y + 1) * bpl]
    }

    /// The frame as one sample plane (gray or a single colour channel).
    fn plane8(&self) -> ProtocolResult<GrayImage> {
        let width = self.width()?;
        let lines = self.lines()?;
        let bpl = self.bytes_per_line()?;
        let depth = self.params.depth;
        let needed = match depth {
            1 => (width as usize).div_ceil(8),
            8 => width as usize,
            other => {
                return Err(ProtocolError::Malformed(format!("unsupported depth {other}")));
            }
        };
        if bpl < needed {
            return Err(ProtocolError::Malformed(format!(
                "{bpl} bytes per line cannot hold {width} pixels at depth {depth}"
            )));
        }

        let mut img = GrayImage::new(width, lines as u32);
        for y in 0..lines {
            let row = self.row(y, bpl);
            for x in 0..width as usize {
                let value = if depth == 1 {
                    // Set bit means black.
                    if row[x / 8] & (0x80 >> (x % 8)) != 0 { 0 } else { 255 }
                } else {
                    row[x]
                };
                img.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
        Ok(img)
    }

    /// The frame as 16-bit samples, `channels` per pixel.
    fn samples16(&self, channels: usize, order: ByteOrder) -> ProtocolResult<(u32, u32, Vec<u16>)> {
        let width = self.width()?;
        let lines = self.lines()?;
        let bpl = self.bytes_per_line()?;
        let needed = width as usize * channels * 2;
        if bpl < needed {
            return Err(ProtocolError::Malformed(format!(
                "{bpl} bytes per line cannot hold {width} pixels of {channels}x16 bits"
            )));
        }

        let mut samples = Vec::with_capacity(width as usize * lines * channels);
        for y in 0..lines {
            for pair in self.row(y, bpl)[..needed].chunks_exact(2) {
                let bytes = [pair[0], pair[1]];
                samples.push(match order {
                    ByteOrder::Little => u16::from_le_bytes(bytes),
                    ByteOrder::Big => u16::from_be_bytes(bytes),
                });
            }
        }
        Ok((width, lines as u32, samples))
    }

    fn rgb8(&self) -> ProtocolResult<RgbImage> {
        let width = self.width()?;
        let lines = self.lines()?;
        let bpl = self.bytes_per_line()?;
        let needed = width as usize * 3;
        if self.params.depth != 8 || bpl < needed {
            return Err(ProtocolError::Malformed(format!(
                "RGB frame: depth {}, {bpl} bytes per line for {width} pixels",
                self.params.depth
            )));
        }

        let mut raw = Vec::with_capacity(needed * lines);
        for y in 0..lines {
            raw.extend_from_slice(&self.row(y, bpl)[..needed]);
        }
        RgbImage::from_raw(width, lines as u32, raw)
            .ok_or_else(|| ProtocolError::Malformed("RGB frame size mismatch".into()))
    }
}

/// Assemble the frames of one page into a bitmap.
///
/// Accepts a single GRAY frame (depth 1, 8 or 16), a single RGB frame
/// (depth 8 or 16), or three single-channel RED/GREEN/BLUE frames in any
/// order (depth 8 or 16).
pub fn assemble(frames: &[Frame], order: ByteOrder) -> ProtocolResult<DynamicImage> {
    match frames {
        [] => Err(ProtocolError::Malformed("page has no frames".into())),
        [frame] => match (frame.params.format, frame.params.depth) {
            (FrameFormat::Gray, 16) => {
                let (w, h, samples) = frame.samples16(1, order)?;
                ImageBuffer::<Luma<u16>, _>::from_raw(w, h, samples)
                    .map(DynamicImage::ImageLuma16)
                    .ok_or_else(|| ProtocolError::Malformed("gray frame size mismatch".into()))
            }
            (FrameFormat::Gray, _) => Ok(DynamicImage::ImageLuma8(frame.plane8()?)),
            (FrameFormat::Rgb, 16) => {
                let (w, h, samples) = frame.samples16(3, order)?;
                ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, samples)
                    .map(DynamicImage::ImageRgb16)
                    .ok_or_else(|| ProtocolError::Malformed("RGB frame size mismatch".into()))
            }
            (FrameFormat::Rgb, _) => Ok(DynamicImage::ImageRgb8(frame.rgb8()?)),
            (format, _) => Err(ProtocolError::Malformed(format!(
                "single {format:?} frame without its sibling channels"
            ))),
        },
        frames => assemble_three_pass(frames, order),
    }
}

fn assemble_three_pass(frames: &[Frame], order: ByteOrder) -> ProtocolResult<DynamicImage> {
    if frames.len() != 3 {
        return Err(ProtocolError::Malformed(format!(
            "{} frames in one page",
            frames.len()
        )));
    }
    let planes = [
        channel(frames, FrameFormat::Red)?,
        channel(frames, FrameFormat::Green)?,
        channel(frames, FrameFormat::Blue)?,
    ];

    let depth = planes[0].params.depth;
    if planes.iter().any(|p| p.params.depth != depth) {
        return Err(ProtocolError::Malformed("channel depths differ".into()));
    }

    if depth == 16 {
        let mut decoded = Vec::with_capacity(3);
        for plane in planes {
            decoded.push(plane.samples16(1, order)?);
        }
        let (w, h) = common_size(decoded.iter().map(|(w, h, _)| (*w, *h)))?;
        let mut samples = Vec::with_capacity(w as usize * h as usize * 3);
        for i in 0..(w as usize * h as usize) {
            for (_, _, plane) in &decoded {
                samples.push(plane[i]);
            }
        }
        return ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, samples)
            .map(DynamicImage::ImageRgb16)
            .ok_or_else(|| ProtocolError::Malformed("three-pass size mismatch".into()));
    }

    let mut decoded = Vec::with_capacity(3);
    for plane in planes {
        decoded.push(plane.plane8()?);
    }
    let (w, h) = common_size(decoded.iter().map(|p| p.dimensions()))?;
    let img = RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            decoded[0].get_pixel(x, y)[0],
            decoded[1].get_pixel(x, y)[0],
            decoded[2].get_pixel(x, y)[0],
        ])
    });
    Ok(DynamicImage::ImageRgb8(img))
}

fn channel(frames: &[Frame], format: FrameFormat) -> ProtocolResult<&Frame> {
    let mut matching = frames.iter().filter(|f| f.params.format == format);
    match (matching.next(), matching.next()) {
        (Some(frame), None) => Ok(frame),
        _ => Err(ProtocolError::Malformed(format!(
            "three-pass scan needs exactly one {format:?} frame"
        ))),
    }
}

/// The size shared by every plane; lines are cut to the shortest plane.
fn common_size(mut sizes: impl Iterator<Item = (u32, u32)>) -> ProtocolResult<(u32, u32)> {
    let (width, mut height) = sizes
        .next()
        .ok_or_else(|| ProtocolError::Malformed("no planes".into()))?;
    for (w, h) in sizes {
        if w != width {
            return Err(ProtocolError::Malformed("channel widths differ".into()));
        }
        height = height.min(h);
    }
    Ok((width, height))
}
