// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resolution reduction from acquisition DPI to output DPI.

use image::imageops::FilterType;
use scanwerk_core::RasterPage;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, instrument};

/// Downsamples pages by a fixed integer ratio.
///
/// The ratio is `scan_dpi / output_dpi` and is fixed for the lifetime of the
/// process. Resampling is pure: the same page always yields the same pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    ratio: u32,
}

impl Resampler {
    /// Build a resampler for `scan_dpi -> output_dpi`.
    ///
    /// The output resolution must be non-zero, no higher than the scan
    /// resolution, and divide it exactly.
    pub fn new(scan_dpi: u32, output_dpi: u32) -> Result<Self> {
        if output_dpi == 0 || scan_dpi < output_dpi || scan_dpi % output_dpi != 0 {
            return Err(ScanwerkError::Config(format!(
                "output resolution {output_dpi} dpi must divide scan resolution {scan_dpi} dpi"
            )));
        }
        Self::with_ratio(scan_dpi / output_dpi)
    }

    pub fn with_ratio(ratio: u32) -> Result<Self> {
        if ratio == 0 {
            return Err(ScanwerkError::Config("resampling ratio must be at least 1".into()));
        }
        Ok(Self { ratio })
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// Target box for a `width` x `height` page: each side divided by the
    /// ratio, rounded down.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        (width / self.ratio, height / self.ratio)
    }

    /// Downsample `page` into its target box with a Lanczos3 filter,
    /// preserving aspect ratio. The result is tagged with the reduced DPI.
    ///
    /// Pages must be at least `ratio` pixels on each side; smaller pages
    /// collapse to a single pixel on the short side.
    #[instrument(skip_all, fields(ratio = self.ratio))]
    pub fn resample(&self, page: RasterPage) -> RasterPage {
        let dpi = page.dpi() / self.ratio;
        if self.ratio == 1 {
            return page;
        }

        let (target_w, target_h) = self.target_size(page.width(), page.height());
        let (from_w, from_h) = (page.width(), page.height());
        let resized = page
            .into_image()
            .resize(target_w.max(1), target_h.max(1), FilterType::Lanczos3);
        debug!(
            from_w,
            from_h,
            to_w = resized.width(),
            to_h = resized.height(),
            dpi,
            "Page resampled"
        );
        RasterPage::new(resized, dpi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

    fn gray(width: u32, height: u32) -> RasterPage {
        RasterPage::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([200]))),
            300,
        )
    }

    #[test]
    fn ratio_follows_resolutions() {
        assert_eq!(Resampler::new(300, 150).expect("valid").ratio(), 2);
        assert_eq!(Resampler::new(600, 150).expect("valid").ratio(), 4);
        assert_eq!(Resampler::new(300, 300).expect("valid").ratio(), 1);
    }

    #[test]
    fn invalid_resolutions_are_config_errors() {
        for (scan, out) in [(300, 0), (150, 300), (300, 200)] {
            let err = Resampler::new(scan, out).expect_err("invalid pair");
            assert!(matches!(err, ScanwerkError::Config(_)), "{scan}/{out}");
        }
    }

    #[test]
    fn a4_at_300_dpi_halves_exactly() {
        let resampler = Resampler::new(300, 150).expect("valid");
        let out = resampler.resample(gray(2480, 3508));
        assert_eq!((out.width(), out.height()), (1240, 1754));
        assert_eq!(out.dpi(), 150);
    }

    #[test]
    fn odd_sizes_fit_the_floored_box() {
        let resampler = Resampler::new(300, 150).expect("valid");
        for (w, h) in [(101, 51), (7, 300), (333, 333)] {
            let (tw, th) = resampler.target_size(w, h);
            let out = resampler.resample(gray(w, h));
            assert!(out.width() <= tw && out.height() <= th, "{w}x{h}");
            // One side always fills its box.
            assert!(out.width() == tw || out.height() == th, "{w}x{h}");
            // The other side is off the exact ratio by at most a rounded pixel.
            let (ow, oh) = (f64::from(out.width()), f64::from(out.height()));
            let skew = ow * f64::from(h) - oh * f64::from(w);
            assert!(skew.abs() <= f64::from(w.max(h)), "{w}x{h} -> {ow}x{oh}");
        }
    }

    #[test]
    fn ratio_one_is_identity() {
        let resampler = Resampler::with_ratio(1).expect("valid");
        let page = gray(40, 30);
        let out = resampler.resample(page.clone());
        assert_eq!(out.image().as_bytes(), page.image().as_bytes());
        assert_eq!(out.dpi(), 300);
    }

    #[test]
    fn flat_colour_survives_filtering() {
        let img = RgbImage::from_pixel(64, 48, Rgb([10, 120, 240]));
        let page = RasterPage::new(DynamicImage::ImageRgb8(img), 300);
        let out = Resampler::new(300, 150).expect("valid").resample(page).image().to_rgb8();
        assert_eq!(out.dimensions(), (32, 24));
        assert_eq!(out.get_pixel(16, 12), &Rgb([10, 120, 240]));
    }

    #[test]
    fn resampling_is_deterministic() {
        let img = RgbImage::from_fn(90, 60, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 7]));
        let page = RasterPage::new(DynamicImage::ImageRgb8(img), 300);
        let resampler = Resampler::new(300, 150).expect("valid");
        let a = resampler.resample(page.clone());
        let b = resampler.resample(page);
        assert_eq!(a.image().as_bytes(), b.image().as_bytes());
    }
}
