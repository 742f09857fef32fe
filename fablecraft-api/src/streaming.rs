//! NDJSON Response Adapter
//!
//! Turns a stream-frame receiver into an HTTP response whose body is
//! one JSON object per line. The body is produced as frames arrive, so
//! a client sees the first line before the last page has been fetched,
//! and a client that disconnects closes the receiver, which the
//! producer observes as a failed send.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use fablecraft_gate::StreamFrame;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const CONTENT_TYPE_NDJSON: &str = "application/x-ndjson";
pub const HEADER_STREAMING: &str = "x-streaming";

/// Build a streaming NDJSON response from a frame receiver.
pub fn ndjson_response(rx: mpsc::Receiver<StreamFrame>) -> Response {
    let lines = ReceiverStream::new(rx).map(|frame| {
        serde_json::to_string(&frame).map(|mut line| {
            line.push('\n');
            line
        })
    });

    // Header values here are static and always valid
    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_static(CONTENT_TYPE_NDJSON),
        )
        .header(HEADER_STREAMING, HeaderValue::from_static("true"))
        .header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))
        .body(Body::from_stream(lines))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
