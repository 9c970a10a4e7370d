// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend-agnostic trait definitions for scanner access.
//
// The shape follows the classic scanner driver API: a driver subsystem that
// is initialised and torn down, a device list, and handles to opened devices
// on which options are set and pages are read.

use std::sync::Arc;

use scanwerk_core::error::Result;
use scanwerk_core::{OptionValue, RasterPage};

/// A device reported by the backend's device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Backend-unique name passed to [`ScannerBackend::open`].
    pub name: String,
    pub vendor: String,
    pub model: String,
    /// Device class, e.g. "sheetfed scanner".
    pub kind: String,
}

/// Opaque handle to an opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub i32);

/// A scanner driver subsystem.
///
/// Methods are blocking; callers run them off the async runtime. Release
/// operations (`cancel`, `close`, `exit`) cannot fail from the caller's point
/// of view: implementations log what went wrong and carry on, so a release
/// sequence always runs to the end.
pub trait ScannerBackend: Send {
    /// Start the driver subsystem.
    fn init(&mut self) -> Result<()>;

    /// Enumerate reachable devices, in the backend's order.
    fn devices(&mut self) -> Result<Vec<DeviceInfo>>;

    /// Open a device by name.
    fn open(&mut self, name: &str) -> Result<DeviceHandle>;

    /// Apply one option value to an open device.
    fn set_option(&mut self, handle: DeviceHandle, name: &str, value: &OptionValue) -> Result<()>;

    /// Acquire the next page of the current job.
    ///
    /// Returns `Ok(None)` once the feeder reports that no documents remain.
    /// `page_index` is the index the page will have in the sequence and is
    /// only used for error reporting.
    fn read_page(&mut self, handle: DeviceHandle, page_index: usize) -> Result<Option<RasterPage>>;

    /// Abort any acquisition in progress.
    fn cancel(&mut self, handle: DeviceHandle);

    /// Close an open device.
    fn close(&mut self, handle: DeviceHandle);

    /// Shut the driver subsystem down.
    fn exit(&mut self);
}

/// Produces a fresh backend for every scan request.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn ScannerBackend> + Send + Sync>;
