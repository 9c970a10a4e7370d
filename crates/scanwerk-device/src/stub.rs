// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory stub backend.
//
// Used for hardware-free runs (`--backend stub`) and as the fake device in
// tests. Every call is counted in a shared recorder so callers can verify
// that the device was released no matter where a job failed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, Rgb, RgbImage};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{OptionValue, RasterPage};
use tracing::{debug, info};

use crate::traits::{DeviceHandle, DeviceInfo, ScannerBackend};

/// Name of the single device the stub reports.
pub const STUB_DEVICE_NAME: &str = "stub:sheetfed";

/// Where the stub should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubFailure {
    Init,
    ListDevices,
    /// Report an empty device list.
    NoDevice,
    Open,
    /// Reject the named option.
    Option(&'static str),
    /// Fail the read that follows `after_pages` successful reads.
    Read { after_pages: usize },
}

/// Calls recorded by [`StubCalls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubCall {
    Init,
    Devices,
    Open,
    SetOption,
    Read,
    Cancel,
    Close,
    Exit,
}

/// Shared call counters.
#[derive(Debug, Default)]
pub struct StubCalls {
    counters: [AtomicUsize; 8],
}

impl StubCalls {
    fn slot(call: StubCall) -> usize {
        call as usize
    }

    fn record(&self, call: StubCall) {
        self.counters[Self::slot(call)].fetch_add(1, Ordering::SeqCst);
    }

    /// How many times `call` has been made.
    pub fn get(&self, call: StubCall) -> usize {
        self.counters[Self::slot(call)].load(Ordering::SeqCst)
    }
}

/// A scanner that yields preset pages.
pub struct StubScanner {
    pages: VecDeque<RasterPage>,
    failure: Option<StubFailure>,
    calls: Arc<StubCalls>,
    applied: Vec<(String, OptionValue)>,
    reads: usize,
}

impl StubScanner {
    pub fn new(pages: Vec<RasterPage>) -> Self {
        Self {
            pages: pages.into(),
            failure: None,
            calls: Arc::new(StubCalls::default()),
            applied: Vec::new(),
            reads: 0,
        }
    }

    /// A stub producing `count` white pages of `width` x `height` pixels,
    /// each with a grey bar whose position encodes the page number.
    pub fn blank_pages(count: usize, width: u32, height: u32, dpi: u32) -> Self {
        let pages = (0..count)
            .map(|index| {
                let bar_top = bar_top(index, height);
                let image = RgbImage::from_fn(width, height, |_, y| {
                    if y >= bar_top && y < bar_top.saturating_add(20) {
                        Rgb([96, 96, 96])
                    } else {
                        Rgb([255, 255, 255])
                    }
                });
                RasterPage::new(DynamicImage::ImageRgb8(image), dpi)
            })
            .collect();
        Self::new(pages)
    }

    /// Make the stub fail at the given step.
    pub fn fail_with(mut self, failure: StubFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Share the recorder with another stub, so counts accumulate across
    /// the fresh backends a factory hands out.
    pub fn with_calls(mut self, calls: Arc<StubCalls>) -> Self {
        self.calls = calls;
        self
    }

    /// The call recorder; stays valid after the stub has been dropped.
    pub fn calls(&self) -> Arc<StubCalls> {
        Arc::clone(&self.calls)
    }

    /// Options applied so far, in order.
    pub fn applied_options(&self) -> &[(String, OptionValue)] {
        &self.applied
    }

    fn fails_at(&self, failure: StubFailure) -> bool {
        self.failure == Some(failure)
    }
}

impl ScannerBackend for StubScanner {
    fn init(&mut self) -> Result<()> {
        self.calls.record(StubCall::Init);
        if self.fails_at(StubFailure::Init) {
            return Err(ScanwerkError::Init("stub driver refused to start".into()));
        }
        info!(pages = self.pages.len(), "Stub scanner initialised");
        Ok(())
    }

    fn devices(&mut self) -> Result<Vec<DeviceInfo>> {
        self.calls.record(StubCall::Devices);
        if self.fails_at(StubFailure::ListDevices) {
            return Err(ScanwerkError::ListDevices("stub enumeration failed".into()));
        }
        if self.fails_at(StubFailure::NoDevice) {
            return Ok(Vec::new());
        }
        Ok(vec![DeviceInfo {
            name: STUB_DEVICE_NAME.into(),
            vendor: "Scanwerk".into(),
            model: "Stub".into(),
            kind: "sheetfed scanner".into(),
        }])
    }

    fn open(&mut self, name: &str) -> Result<DeviceHandle> {
        self.calls.record(StubCall::Open);
        if self.fails_at(StubFailure::Open) {
            return Err(ScanwerkError::Open {
                device: name.into(),
                cause: "Device busy".into(),
            });
        }
        Ok(DeviceHandle(0))
    }

    fn set_option(&mut self, _handle: DeviceHandle, name: &str, value: &OptionValue) -> Result<()> {
        self.calls.record(StubCall::SetOption);
        if let Some(StubFailure::Option(rejected)) = self.failure {
            if rejected == name {
                return Err(ScanwerkError::OptionRejected {
                    option: name.into(),
                    cause: "Invalid argument".into(),
                });
            }
        }
        self.applied.push((name.to_string(), value.clone()));
        Ok(())
    }

    fn read_page(&mut self, _handle: DeviceHandle, page_index: usize) -> Result<Option<RasterPage>> {
        self.calls.record(StubCall::Read);
        if let Some(StubFailure::Read { after_pages }) = self.failure {
            if self.reads == after_pages {
                return Err(ScanwerkError::Read {
                    page_index,
                    cause: "Document feeder jammed".into(),
                });
            }
        }
        self.reads += 1;
        Ok(self.pages.pop_front())
    }

    fn cancel(&mut self, _handle: DeviceHandle) {
        self.calls.record(StubCall::Cancel);
    }

    fn close(&mut self, _handle: DeviceHandle) {
        self.calls.record(StubCall::Close);
    }

    fn exit(&mut self) {
        self.calls.record(StubCall::Exit);
        debug!("Stub scanner exited");
    }
}

/// First row of the marker bar on page `index`.
fn bar_top(index: usize, height: u32) -> u32 {
    let height = u64::from(height.max(1));
    (index as u64 % height * 40 % height) as u32
}
