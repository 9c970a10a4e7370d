// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: scan-to-PDF over HTTP.
//
// Entry point. Parses flags, initialises logging, builds the fixed scan
// configuration and serves /scan.pdf until Ctrl-C or SIGTERM.

mod advertise;
mod cli;
mod duration;
mod pipeline;
mod server;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{OUTPUT_DPI, PaperSize, PipelineConfig, SCAN_DPI, ScanConfiguration};
use scanwerk_device::{BackendFactory, SaneNetBackend, ScannerBackend, StubScanner};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use advertise::Advertisement;
use cli::{Args, Backend, LogLevel};
use pipeline::ScanPipeline;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Scanwerk failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.filter().into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(args: Args) -> Result<()> {
    let paper_size: PaperSize = args.paper_size.into();
    let config = PipelineConfig {
        scan_dpi: SCAN_DPI,
        output_dpi: OUTPUT_DPI,
        jpeg_quality: args.jpeg_quality,
        paper_size,
    };

    let mut options = ScanConfiguration::for_paper(paper_size, SCAN_DPI);
    if let Some(path) = &args.scan_options {
        options = options.merge_file(path, SCAN_DPI)?;
        info!(file = %path.display(), options = options.len(), "Scan options merged");
    }

    let pipeline = ScanPipeline::new(backend_factory(&args, paper_size), options, &config)?;
    let app = server::router(pipeline);

    let listener = TcpListener::bind(args.listen)
        .await
        .map_err(|err| ScanwerkError::Config(format!("bind {}: {err}", args.listen)))?;
    let local = listener.local_addr()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %local,
        path = server::SCAN_PATH,
        backend = ?args.backend,
        "Scanwerk listening"
    );

    let advertisement = if args.mdns {
        Advertisement::register(local.port())
    } else {
        None
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(advertisement) = advertisement {
        advertisement.unregister();
    }
    served?;

    info!("Server shutdown complete");
    Ok(())
}

/// A fresh backend per request, as selected by `--backend`.
fn backend_factory(args: &Args, paper_size: PaperSize) -> BackendFactory {
    match args.backend {
        Backend::Sane => {
            let addr = args.saned.clone();
            let timeout = args.device_timeout();
            info!(saned = %addr, ?timeout, "Using SANE network backend");
            Arc::new(move || {
                Box::new(SaneNetBackend::new(addr.clone(), timeout)) as Box<dyn ScannerBackend>
            })
        }
        Backend::Stub => {
            let count = args.stub_pages;
            let (width, height) = page_pixels(paper_size, SCAN_DPI);
            warn!(pages = count, width, height, "Using stub backend, no scanner is involved");
            Arc::new(move || {
                Box::new(StubScanner::blank_pages(count, width, height, SCAN_DPI))
                    as Box<dyn ScannerBackend>
            })
        }
    }
}

/// Pixel size of a full page acquired at `dpi`.
fn page_pixels(paper_size: PaperSize, dpi: u32) -> (u32, u32) {
    let (w_mm, h_mm) = paper_size.dimensions_mm();
    let px = |mm: f32| (mm / 25.4 * dpi as f32).round() as u32;
    (px(w_mm), px(h_mm))
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_scan_resolution() {
        assert_eq!(page_pixels(PaperSize::A4, SCAN_DPI), (2480, 3508));
        assert_eq!(page_pixels(PaperSize::Letter, SCAN_DPI), (2550, 3300));
    }
}
