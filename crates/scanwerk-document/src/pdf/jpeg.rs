// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JPEG header probe.
//
// Reads just enough of a JPEG stream to embed it in a PDF unchanged: frame
// size and component count from the SOF segment, and the pixel density
// from the JFIF APP0 segment.

use scanwerk_core::error::{Result, ScanwerkError};

/// What the PDF needs to know about an embedded JPEG.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub bits_per_component: u8,
    /// Horizontal and vertical density in dots per inch, when the stream
    /// records an absolute one.
    pub density: Option<(f32, f32)>,
}

impl JpegInfo {
    /// PDF colour space for the component count.
    pub fn color_space(&self) -> &'static str {
        match self.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        }
    }
}

fn malformed(cause: impl std::fmt::Display) -> ScanwerkError {
    ScanwerkError::Render(format!("malformed JPEG: {cause}"))
}

fn be16(bytes: &[u8], at: usize) -> Result<u16> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| malformed("truncated segment"))
}

/// Parse the JFIF density fields of an APP0 payload.
fn jfif_density(payload: &[u8]) -> Option<(f32, f32)> {
    if payload.len() < 12 || &payload[..5] != b"JFIF\0" {
        return None;
    }
    let units = payload[7];
    let x = f32::from(u16::from_be_bytes([payload[8], payload[9]]));
    let y = f32::from(u16::from_be_bytes([payload[10], payload[11]]));
    if x == 0.0 || y == 0.0 {
        return None;
    }
    match units {
        1 => Some((x, y)),
        // Dots per centimetre.
        2 => Some((x * 2.54, y * 2.54)),
        _ => None,
    }
}

/// Probe a JPEG stream.
pub fn probe(bytes: &[u8]) -> Result<JpegInfo> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return Err(malformed("missing start-of-image marker"));
    }

    let mut density = None;
    let mut pos = 2;
    loop {
        // Skip fill bytes before the marker code.
        while bytes.get(pos) == Some(&0xFF) && bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        match (bytes.get(pos), bytes.get(pos + 1)) {
            (Some(&0xFF), Some(&marker)) => {
                pos += 2;
                match marker {
                    // Standalone markers.
                    0x01 | 0xD0..=0xD7 => continue,
                    0xD9 | 0xDA => return Err(malformed("no frame header before scan data")),
                    _ => {}
                }
                let len = usize::from(be16(bytes, pos)?);
                if len < 2 {
                    return Err(malformed(format!("segment length {len}")));
                }
                let payload = bytes
                    .get(pos + 2..pos + len)
                    .ok_or_else(|| malformed("truncated segment"))?;

                match marker {
                    0xE0 if density.is_none() => density = jfif_density(payload),
                    // SOF0-SOF15 except DHT (C4), JPG (C8) and DAC (CC).
                    0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                        if payload.len() < 6 {
                            return Err(malformed("short frame header"));
                        }
                        let height = u32::from(be16(payload, 1)?);
                        let width = u32::from(be16(payload, 3)?);
                        if width == 0 || height == 0 {
                            return Err(malformed(format!("frame size {width}x{height}")));
                        }
                        return Ok(JpegInfo {
                            width,
                            height,
                            components: payload[5],
                            bits_per_component: payload[0],
                            density,
                        });
                    }
                    _ => {}
                }
                pos += len;
            }
            _ => return Err(malformed(format!("expected marker at offset {pos}"))),
        }
    }
}
