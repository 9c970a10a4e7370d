// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP surface: a single route that runs one scan job per request.
//
// A one-permit semaphore admits at most one job at a time; a request that
// finds the slot taken is turned away with 503 instead of racing on the
// device. The permit moves into the blocking task, so the slot stays taken
// until the device has been released even when the client has gone away.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use scanwerk_core::{ScanJobId, ScanwerkError, Stage};
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::duration::format_duration;
use crate::pipeline::{ScanOutput, ScanPipeline};

/// The only route.
pub const SCAN_PATH: &str = "/scan.pdf";

/// Response header carrying the time spent producing the document.
pub const GENERATION_TIME: HeaderName = HeaderName::from_static("x-generation-time");

#[derive(Clone)]
struct AppState {
    gate: Arc<Semaphore>,
    pipeline: Arc<ScanPipeline>,
}

/// Build the router around a pipeline.
pub fn router(pipeline: ScanPipeline) -> Router {
    let state = AppState {
        gate: Arc::new(Semaphore::new(1)),
        pipeline: Arc::new(pipeline),
    };
    Router::new()
        .route(SCAN_PATH, any(scan))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn scan(State(state): State<AppState>) -> Response {
    let job = ScanJobId::new();
    let Ok(permit) = Arc::clone(&state.gate).try_acquire_owned() else {
        warn!(%job, "Scanner busy, request rejected");
        return failure(StatusCode::SERVICE_UNAVAILABLE, &ScanwerkError::Busy);
    };

    info!(%job, "Scan requested");
    let pipeline = Arc::clone(&state.pipeline);
    let joined = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        pipeline.run(job)
    })
    .await;

    match joined {
        Ok(Ok(output)) => {
            debug!(
                %job,
                pages = output.pages,
                from = %Stage::Assembling,
                to = %Stage::Responding,
                "Stage transition"
            );
            document(output)
        }
        Ok(Err(err)) => failure(StatusCode::INTERNAL_SERVER_ERROR, &err),
        Err(err) => {
            error!(%job, error = %err, "Scan task aborted");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

fn document(output: ScanOutput) -> Response {
    let elapsed = format_duration(output.elapsed);
    let elapsed = HeaderValue::from_str(&elapsed).unwrap_or(HeaderValue::from_static("0s"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (GENERATION_TIME, elapsed),
            (header::CONTENT_LENGTH, HeaderValue::from(output.pdf.len())),
        ],
        output.pdf,
    )
        .into_response()
}

fn failure(status: StatusCode, err: &ScanwerkError) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        err.caller_message(),
    )
        .into_response()
}
