// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client side of the SANE network protocol.

pub mod frame;
pub mod net;
pub mod protocol;
pub mod wire;

pub use net::SaneNetBackend;
pub use protocol::{ProtocolError, SANED_PORT};
