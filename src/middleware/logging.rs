//! Logging middleware
//!
//! Records HTTP request and response information

use axum::{
    extract::Request,
    http::{HeaderValue, Method, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Response header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Requests slower than this are logged as slow
const SLOW_REQUEST_SECS: u64 = 30;

/// Request logging middleware
///
/// Runs each request inside a span tagged with a fresh request id.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %uri.path(),
    );

    async move {
        info!(
            "Request started: {} {} - User-Agent: {}",
            method,
            uri,
            request
                .headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
        );

        let mut response = next.run(request).await;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        log_completion(&method, &uri, &response, start_time);
        response
    }
    .instrument(span)
    .await
}

/// Log the response status and duration
///
/// For streams this marks when headers were sent, not when the body finished.
fn log_completion(method: &Method, uri: &Uri, response: &Response, start_time: Instant) {
    let duration = start_time.elapsed();
    let status = response.status();
    let millis = duration.as_secs_f64() * 1000.0;

    if status.is_success() {
        info!("Request completed: {} - Duration: {:.2}ms", status, millis);
    } else if status.is_client_error() {
        warn!("Client error: {} - Duration: {:.2}ms", status, millis);
    } else if status.is_server_error() {
        warn!("Server error: {} - Duration: {:.2}ms", status, millis);
    } else {
        info!("Request response: {} - Duration: {:.2}ms", status, millis);
    }

    if duration.as_secs() > SLOW_REQUEST_SECS {
        warn!(
            "Slow request detected: {} {} - Duration: {:.2}s",
            method,
            uri,
            duration.as_secs_f64()
        );
    }
}
