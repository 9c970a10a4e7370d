// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line flags.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use scanwerk_core::PaperSize;
use scanwerk_device::sane::SANED_PORT;
use tracing_subscriber::filter::LevelFilter;

/// Scan-to-PDF over HTTP: every request to /scan.pdf drains the document
/// feeder and answers with one PDF.
#[derive(Debug, Parser)]
#[command(name = "scanwerk", version, about)]
pub struct Args {
    /// Listen address; a leading ':' means all interfaces.
    #[arg(long, default_value = ":3000", value_parser = parse_listen)]
    pub listen: SocketAddr,

    /// Log verbosity. `RUST_LOG` directives refine it.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Where pages come from.
    #[arg(long, value_enum, default_value_t = Backend::Sane)]
    pub backend: Backend,

    /// Address of the SANE network daemon.
    #[arg(long, default_value_t = format!("localhost:{SANED_PORT}"))]
    pub saned: String,

    /// Seconds any single device I/O operation may block.
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub device_timeout: u64,

    /// JSON file of additional or overriding scan options.
    #[arg(long)]
    pub scan_options: Option<PathBuf>,

    /// Paper format for the scan area and the PDF pages.
    #[arg(long, value_enum, default_value_t = Paper::A4)]
    pub paper_size: Paper,

    /// JPEG quality of the embedded pages.
    #[arg(long, default_value_t = 95, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Pages produced per request by the stub backend.
    #[arg(long, default_value_t = 2)]
    pub stub_pages: usize,

    /// Advertise the endpoint as `_http._tcp.local.` via mDNS-SD.
    #[arg(long)]
    pub mdns: bool,
}

impl Args {
    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Default filter level. `fatal` has no tracing level of its own and
    /// maps to `error`.
    pub fn filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error | Self::Fatal => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Network SANE daemon.
    Sane,
    /// Synthetic pages, no hardware.
    Stub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Paper {
    A4,
    A5,
    Letter,
    Legal,
}

impl From<Paper> for PaperSize {
    fn from(paper: Paper) -> Self {
        match paper {
            Paper::A4 => Self::A4,
            Paper::A5 => Self::A5,
            Paper::Letter => Self::Letter,
            Paper::Legal => Self::Legal,
        }
    }
}

/// Parse a listen address. `:3000` binds every interface.
pub fn parse_listen(raw: &str) -> Result<SocketAddr, String> {
    let raw = raw.trim();
    let full = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => raw.to_string(),
    };
    if let Ok(addr) = full.parse::<SocketAddr>() {
        return Ok(addr);
    }
    full.to_socket_addrs()
        .map_err(|err| format!("invalid listen address {raw:?}: {err}"))?
        .next()
        .ok_or_else(|| format!("listen address {raw:?} resolves to nothing"))
}
