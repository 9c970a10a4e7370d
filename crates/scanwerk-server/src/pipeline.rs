// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One scan job, end to end: acquire, resample and encode each page, assemble.
//
// Runs synchronously on the calling thread. Every failure is terminal for the
// job; nothing is retried and no partial document is produced.

use std::sync::Arc;
use std::time::{Duration, Instant};

use scanwerk_core::error::Result;
use scanwerk_core::{PaperSize, PipelineConfig, ScanConfiguration, ScanJobId, Stage};
use scanwerk_device::{AcquisitionSession, BackendFactory};
use scanwerk_document::{JpegPageEncoder, PageEncoder, Resampler, assemble, encode_pages};
use tracing::{debug, error, info, instrument};

/// A finished document.
#[derive(Debug)]
pub struct ScanOutput {
    pub pdf: Vec<u8>,
    pub pages: usize,
    /// Time from the start of acquisition to the serialised document.
    pub elapsed: Duration,
}

/// Everything a scan job needs, fixed at startup and shared by every request.
pub struct ScanPipeline {
    factory: BackendFactory,
    options: ScanConfiguration,
    resampler: Resampler,
    encoder: Arc<dyn PageEncoder>,
    paper_size: PaperSize,
}

impl ScanPipeline {
    pub fn new(
        factory: BackendFactory,
        options: ScanConfiguration,
        config: &PipelineConfig,
    ) -> Result<Self> {
        Ok(Self {
            factory,
            options,
            resampler: Resampler::new(config.scan_dpi, config.output_dpi)?,
            encoder: Arc::new(JpegPageEncoder::new(config.jpeg_quality)),
            paper_size: config.paper_size,
        })
    }

    /// Swap the page encoder.
    #[cfg(test)]
    pub fn with_encoder(mut self, encoder: Arc<dyn PageEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Run one job. Blocks for as long as the device takes to drain.
    #[instrument(skip_all, fields(job = %job))]
    pub fn run(&self, job: ScanJobId) -> Result<ScanOutput> {
        let started = Instant::now();
        let mut stage = Stage::Acquiring;
        match self.stages(&mut stage) {
            Ok((pdf, pages)) => {
                let elapsed = started.elapsed();
                info!(pages, bytes = pdf.len(), ?elapsed, "Scan complete");
                Ok(ScanOutput {
                    pdf,
                    pages,
                    elapsed,
                })
            }
            Err(err) => {
                error!(%stage, error = %err, "Scan failed");
                debug!(from = %stage, to = %Stage::Failed, "Stage transition");
                Err(err)
            }
        }
    }

    fn stages(&self, stage: &mut Stage) -> Result<(Vec<u8>, usize)> {
        debug!(from = %Stage::Idle, to = %Stage::Acquiring, "Stage transition");
        let pages = {
            let mut backend = (self.factory)();
            AcquisitionSession::acquire(backend.as_mut(), &self.options)?
        };
        let count = pages.len();

        advance(stage, Stage::Resampling);
        let encoded = encode_pages(pages, &self.resampler, self.encoder.as_ref())?;

        advance(stage, Stage::Assembling);
        let pdf = assemble(&encoded, self.paper_size)?;
        Ok((pdf, count))
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "Stage transition");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{DynamicImage, Rgb, RgbImage};
    use scanwerk_core::error::ScanwerkError;
    use scanwerk_core::{RasterPage, SCAN_DPI};
    use scanwerk_device::{ScannerBackend, StubCall, StubCalls, StubFailure, StubScanner};
    use scanwerk_document::{EncodedPage, PdfReader};

    fn page(width: u32, shade: u8) -> RasterPage {
        let img = RgbImage::from_pixel(width, 60, Rgb([shade, shade, shade]));
        RasterPage::new(DynamicImage::ImageRgb8(img), SCAN_DPI)
    }

    fn factory(
        pages: Vec<RasterPage>,
        failure: Option<StubFailure>,
    ) -> (BackendFactory, Arc<StubCalls>) {
        let calls = Arc::new(StubCalls::default());
        let shared = Arc::clone(&calls);
        let factory: BackendFactory = Arc::new(move || {
            let mut stub = StubScanner::new(pages.clone()).with_calls(Arc::clone(&shared));
            if let Some(failure) = failure {
                stub = stub.fail_with(failure);
            }
            Box::new(stub) as Box<dyn ScannerBackend>
        });
        (factory, calls)
    }

    fn pipeline(factory: BackendFactory) -> ScanPipeline {
        ScanPipeline::new(
            factory,
            ScanConfiguration::for_paper(PaperSize::A4, SCAN_DPI),
            &PipelineConfig::default(),
        )
        .expect("pipeline")
    }

    /// Encodes normally until `fail_at`, counting every call.
    struct FailingEncoder {
        fail_at: usize,
        calls: AtomicUsize,
        inner: JpegPageEncoder,
    }

    impl PageEncoder for FailingEncoder {
        fn encode(&self, page: &RasterPage, page_index: usize) -> Result<EncodedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if page_index == self.fail_at {
                return Err(ScanwerkError::Encode {
                    page_index,
                    cause: "encoder out of memory".into(),
                });
            }
            self.inner.encode(page, page_index)
        }
    }

    #[test]
    fn pages_come_out_in_feed_order() {
        let (factory, calls) = factory(vec![page(40, 10), page(80, 200), page(60, 90)], None);
        let output = pipeline(factory).run(ScanJobId::new()).expect("scan");
        assert_eq!(output.pages, 3);

        let reader = PdfReader::from_bytes(&output.pdf).expect("read back");
        assert_eq!(reader.page_count(), 3);
        // Each page has its own aspect ratio, so the order shows in the heights.
        let heights: Vec<f32> = (1..=3)
            .map(|n| reader.image_placement(n).expect("placement")[3])
            .collect();
        assert!(heights[0] > heights[2] && heights[2] > heights[1], "{heights:?}");
        assert_eq!(calls.get(StubCall::Exit), 1);
    }

    #[test]
    fn encoder_failure_aborts_the_job_and_releases_the_device() {
        let (factory, calls) = factory(vec![page(40, 0), page(40, 0), page(40, 0)], None);
        let encoder = Arc::new(FailingEncoder {
            fail_at: 1,
            calls: AtomicUsize::new(0),
            inner: JpegPageEncoder::default(),
        });
        let err = pipeline(factory)
            .with_encoder(encoder.clone())
            .run(ScanJobId::new())
            .expect_err("encode failure");

        assert!(matches!(err, ScanwerkError::Encode { page_index: 1, .. }));
        // Page 2 is never attempted.
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(calls.get(StubCall::Close), 1);
    }

    #[test]
    fn option_failure_returns_no_pages_and_releases_once() {
        let (factory, calls) = factory(vec![page(40, 0)], Some(StubFailure::Option("mode")));
        let err = pipeline(factory).run(ScanJobId::new()).expect_err("option");

        assert!(matches!(err, ScanwerkError::OptionRejected { .. }));
        assert_eq!(calls.get(StubCall::Read), 0);
        assert_eq!(calls.get(StubCall::Close), 1);
        assert_eq!(calls.get(StubCall::Exit), 1);
    }

    #[test]
    fn empty_feeder_is_an_empty_document() {
        let (factory, _) = factory(Vec::new(), None);
        let err = pipeline(factory).run(ScanJobId::new()).expect_err("empty");
        assert!(matches!(err, ScanwerkError::EmptyDocument));
    }

    #[test]
    fn every_job_gets_a_fresh_backend() {
        let (factory, calls) = factory(vec![page(20, 0)], None);
        let pipeline = pipeline(factory);
        pipeline.run(ScanJobId::new()).expect("first");
        pipeline.run(ScanJobId::new()).expect("second");
        assert_eq!(calls.get(StubCall::Init), 2);
        assert_eq!(calls.get(StubCall::Exit), 2);
    }
}
