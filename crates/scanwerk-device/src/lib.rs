// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-device: scanner access for the Scanwerk scan-to-PDF service.
//
// Defines the backend trait the pipeline talks to, the acquisition session
// that guarantees the device is released on every exit path, a client for
// the SANE network protocol (`saned`), and an in-memory stub backend for
// hardware-free runs and tests.

pub mod sane;
pub mod session;
pub mod stub;
pub mod traits;

pub use sane::SaneNetBackend;
pub use session::AcquisitionSession;
pub use stub::{StubCall, StubCalls, StubFailure, StubScanner};
pub use traits::{BackendFactory, DeviceHandle, DeviceInfo, ScannerBackend};
