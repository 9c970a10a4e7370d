// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Acquisition session: one scan job from driver start to driver release.

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{PageSequence, ScanConfiguration};
use tracing::{debug, info, instrument};

use crate::traits::{DeviceHandle, ScannerBackend};

/// Owns an initialised backend (and, once opened, a device handle) for the
/// duration of one scan job.
///
/// Release happens in `Drop`: cancel and close the device if it was opened,
/// then exit the backend. That is the only release path, so it runs after a
/// successful drain, after any early error return and during unwinding.
pub struct AcquisitionSession<'a> {
    backend: &'a mut dyn ScannerBackend,
    handle: Option<DeviceHandle>,
}

impl<'a> AcquisitionSession<'a> {
    /// Run a complete acquisition: select the first device, apply every
    /// option in `config`, and drain the feeder.
    ///
    /// Pages are returned in the order the device produced them. A failure at
    /// any step discards pages already read.
    #[instrument(skip_all, fields(options = config.len()))]
    pub fn acquire(
        backend: &'a mut dyn ScannerBackend,
        config: &ScanConfiguration,
    ) -> Result<PageSequence> {
        // Nothing is held until init succeeds, so nothing to release before.
        backend.init()?;
        let mut session = Self {
            backend,
            handle: None,
        };
        session.run(config)
    }

    fn run(&mut self, config: &ScanConfiguration) -> Result<PageSequence> {
        let device = self
            .backend
            .devices()?
            .into_iter()
            .next()
            .ok_or(ScanwerkError::NoDevice)?;
        info!(
            device = %device.name,
            vendor = %device.vendor,
            model = %device.model,
            kind = %device.kind,
            "Using scanner"
        );

        let handle = self.backend.open(&device.name)?;
        self.handle = Some(handle);

        for (name, value) in config.iter() {
            self.backend.set_option(handle, name, value)?;
            debug!(option = name, %value, "Option applied");
        }

        let mut pages = PageSequence::new();
        while let Some(page) = self.backend.read_page(handle, pages.len())? {
            debug!(
                page_index = pages.len(),
                width = page.width(),
                height = page.height(),
                "Page acquired"
            );
            pages.push(page);
        }

        info!(pages = pages.len(), "Feeder drained");
        Ok(pages)
    }
}

impl Drop for AcquisitionSession<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.cancel(handle);
            self.backend.close(handle);
        }
        self.backend.exit();
        debug!("Scanner released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{StubCall, StubFailure, StubScanner};
    use image::{DynamicImage, GrayImage, Luma};
    use scanwerk_core::{OptionValue, PaperSize, RasterPage, SCAN_DPI};

    fn page(width: u32) -> RasterPage {
        RasterPage::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(width, 8, Luma([255]))),
            SCAN_DPI,
        )
    }

    fn config() -> ScanConfiguration {
        ScanConfiguration::for_paper(PaperSize::A4, SCAN_DPI)
    }

    #[test]
    fn drains_pages_in_device_order_and_releases() {
        let mut scanner = StubScanner::new(vec![page(10), page(20), page(30)]);
        let calls = scanner.calls();

        let pages = AcquisitionSession::acquire(&mut scanner, &config()).expect("acquire");
        let widths: Vec<u32> = pages.iter().map(RasterPage::width).collect();
        assert_eq!(widths, vec![10, 20, 30]);

        assert_eq!(calls.get(StubCall::SetOption), config().len());
        assert_eq!(calls.get(StubCall::Cancel), 1);
        assert_eq!(calls.get(StubCall::Close), 1);
        assert_eq!(calls.get(StubCall::Exit), 1);
    }

    #[test]
    fn applies_options_in_configuration_order() {
        let mut scanner = StubScanner::new(vec![]);
        let config = ScanConfiguration::default()
            .with("source", "ADF Front")
            .with("resolution", 300i64);

        AcquisitionSession::acquire(&mut scanner, &config).expect("acquire");
        assert_eq!(
            scanner.applied_options(),
            &[
                ("source".to_string(), OptionValue::Text("ADF Front".into())),
                ("resolution".to_string(), OptionValue::Int(300)),
            ]
        );
    }

    #[test]
    fn empty_feeder_yields_empty_sequence() {
        let mut scanner = StubScanner::new(vec![]);
        let calls = scanner.calls();

        let pages = AcquisitionSession::acquire(&mut scanner, &config()).expect("acquire");
        assert!(pages.is_empty());
        assert_eq!(calls.get(StubCall::Close), 1);
    }

    #[test]
    fn rejected_option_aborts_and_releases_once() {
        let mut scanner =
            StubScanner::new(vec![page(10)]).fail_with(StubFailure::Option("swdespeck"));
        let calls = scanner.calls();

        let err = AcquisitionSession::acquire(&mut scanner, &config()).expect_err("rejected");
        match err {
            ScanwerkError::OptionRejected { option, .. } => assert_eq!(option, "swdespeck"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.get(StubCall::Read), 0, "no page may be read");
        assert_eq!(calls.get(StubCall::Cancel), 1);
        assert_eq!(calls.get(StubCall::Close), 1);
        assert_eq!(calls.get(StubCall::Exit), 1);
    }

    #[test]
    fn read_failure_discards_partial_pages() {
        let mut scanner = StubScanner::new(vec![page(10), page(20), page(30)])
            .fail_with(StubFailure::Read { after_pages: 2 });
        let calls = scanner.calls();

        let err = AcquisitionSession::acquire(&mut scanner, &config()).expect_err("jammed");
        assert!(matches!(err, ScanwerkError::Read { page_index: 2, .. }));
        assert_eq!(calls.get(StubCall::Close), 1);
        assert_eq!(calls.get(StubCall::Exit), 1);
    }

    #[test]
    fn open_failure_exits_without_closing() {
        let mut scanner = StubScanner::new(vec![page(10)]).fail_with(StubFailure::Open);
        let calls = scanner.calls();

        let err = AcquisitionSession::acquire(&mut scanner, &config()).expect_err("open");
        assert!(matches!(err, ScanwerkError::Open { .. }));
        assert_eq!(calls.get(StubCall::Close), 0, "nothing was opened");
        assert_eq!(calls.get(StubCall::Exit), 1);
    }

    #[test]
    fn no_device_is_reported() {
        let mut scanner = StubScanner::new(vec![]).fail_with(StubFailure::NoDevice);
        let calls = scanner.calls();

        let err = AcquisitionSession::acquire(&mut scanner, &config()).expect_err("no device");
        assert!(matches!(err, ScanwerkError::NoDevice));
        assert_eq!(calls.get(StubCall::Open), 0);
        assert_eq!(calls.get(StubCall::Exit), 1);
    }

    #[test]
    fn list_failure_is_reported() {
        let mut scanner = StubScanner::new(vec![]).fail_with(StubFailure::ListDevices);
        let err = AcquisitionSession::acquire(&mut scanner, &config()).expect_err("list");
        assert!(matches!(err, ScanwerkError::ListDevices(_)));
    }

    #[test]
    fn init_failure_releases_nothing() {
        let mut scanner = StubScanner::new(vec![]).fail_with(StubFailure::Init);
        let calls = scanner.calls();

        let err = AcquisitionSession::acquire(&mut scanner, &config()).expect_err("init");
        assert!(matches!(err, ScanwerkError::Init(_)));
        assert_eq!(calls.get(StubCall::Devices), 0);
        assert_eq!(calls.get(StubCall::Exit), 0);
    }
}
