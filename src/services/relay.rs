//! Streaming relay
//!
//! Forwards upstream event-stream bytes to the client verbatim, bounded by a
//! watchdog and tied to the client connection.

use crate::models::openai::{StreamChunkUsage, Usage};
use crate::providers::BoxStream;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Largest partial SSE line kept while scanning for usage
const MAX_PENDING_LINE: usize = 64 * 1024;

/// Error yielded into the client body to abort the connection
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Stream watchdog expired")]
    WatchdogExpired,
}

/// How a relay ended
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Upstream finished; usage is present when a chunk reported it
    Completed { usage: Option<Usage> },
    /// Upstream failed mid-stream; the client stream ended without an error body
    UpstreamFailed { usage: Option<Usage> },
    /// Watchdog fired before a terminal event
    WatchdogExpired,
    /// Client went away
    ClientDisconnected,
}

impl RelayOutcome {
    /// Usage reported by the upstream, if any
    pub fn usage(&self) -> Option<Usage> {
        match self {
            RelayOutcome::Completed { usage } | RelayOutcome::UpstreamFailed { usage } => *usage,
            _ => None,
        }
    }
}

/// Client-facing body of a relay
///
/// Once the abort signal fires, the next poll yields the watchdog error
/// ahead of any chunks still buffered, then the stream ends.
pub struct RelayBody {
    chunks: ReceiverStream<Bytes>,
    abort: Option<oneshot::Receiver<()>>,
    aborted: bool,
}

impl RelayBody {
    fn new(chunks: mpsc::Receiver<Bytes>, abort: oneshot::Receiver<()>) -> Self {
        Self {
            chunks: ReceiverStream::new(chunks),
            abort: Some(abort),
            aborted: false,
        }
    }
}

impl Stream for RelayBody {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.aborted {
            return Poll::Ready(None);
        }

        if let Some(abort) = this.abort.as_mut() {
            match Pin::new(abort).poll(cx) {
                Poll::Ready(Ok(())) => {
                    this.aborted = true;
                    this.abort = None;
                    return Poll::Ready(Some(Err(RelayError::WatchdogExpired)));
                }
                // Sender dropped without firing: the relay ended some other way
                Poll::Ready(Err(_)) => this.abort = None,
                Poll::Pending => {}
            }
        }

        Pin::new(&mut this.chunks).poll_next(cx).map(|chunk| chunk.map(Ok))
    }
}

/// Running relay
pub struct RelayHandle {
    pub body: RelayBody,
    pub task: JoinHandle<RelayOutcome>,
}

impl RelayHandle {
    /// Wrap the body in an event-stream response, detaching the task
    pub fn into_response(self) -> Response {
        stream_response(self.body)
    }
}

/// Stream relay settings
#[derive(Debug, Clone, Copy)]
pub struct StreamRelay {
    grace: Duration,
    buffer: usize,
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl StreamRelay {
    pub fn new(grace: Duration) -> Self {
        Self { grace, buffer: 32 }
    }

    /// Watchdog deadline for a request started at `started` with the given timeout
    pub fn deadline(&self, started: Instant, timeout: Duration) -> Instant {
        started + timeout + self.grace
    }

    /// Start relaying `upstream` until completion, failure, the deadline, or disconnect
    ///
    /// `on_finish` runs once after the upstream has been dropped.
    pub fn spawn<F>(&self, upstream: BoxStream<'static, Bytes>, deadline: Instant, on_finish: F) -> RelayHandle
    where
        F: FnOnce(&RelayOutcome) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Bytes>(self.buffer);
        let (abort_tx, abort_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut upstream = upstream;
            let mut tap = UsageTap::default();
            let watchdog = tokio::time::sleep_until(deadline);
            tokio::pin!(watchdog);

            let outcome = loop {
                tokio::select! {
                    _ = tx.closed() => break RelayOutcome::ClientDisconnected,
                    _ = &mut watchdog => break RelayOutcome::WatchdogExpired,
                    next = upstream.next() => match next {
                        Some(Ok(chunk)) => {
                            tap.observe(&chunk);
                            tokio::select! {
                                sent = tx.send(chunk) => {
                                    if sent.is_err() {
                                        break RelayOutcome::ClientDisconnected;
                                    }
                                }
                                _ = &mut watchdog => break RelayOutcome::WatchdogExpired,
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Upstream stream error: {:#}", e);
                            break RelayOutcome::UpstreamFailed { usage: tap.usage() };
                        }
                        None => break RelayOutcome::Completed { usage: tap.usage() },
                    }
                }
            };

            drop(upstream);

            if outcome == RelayOutcome::WatchdogExpired {
                // Receiver already gone means the client left first
                let _ = abort_tx.send(());
            }

            match &outcome {
                RelayOutcome::Completed { .. } => debug!("Stream relay completed"),
                RelayOutcome::ClientDisconnected => debug!("Client disconnected, upstream released"),
                RelayOutcome::WatchdogExpired => warn!("Stream watchdog expired, closing client connection"),
                RelayOutcome::UpstreamFailed { .. } => {}
            }

            on_finish(&outcome);
            outcome
        });

        RelayHandle {
            body: RelayBody::new(rx, abort_rx),
            task,
        }
    }
}

/// Event-stream response around a relay body
pub fn stream_response(body: RelayBody) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                header::HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Read-only scan of SSE `data:` lines for a usage object
#[derive(Debug, Default)]
struct UsageTap {
    pending: Vec<u8>,
    usage: Option<Usage>,
}

impl UsageTap {
    fn observe(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.inspect_line(&line);
        }

        if self.pending.len() > MAX_PENDING_LINE {
            self.pending.clear();
        }
    }

    fn inspect_line(&mut self, line: &[u8]) {
        let Ok(line) = std::str::from_utf8(line) else {
            return;
        };
        let Some(data) = line.trim().strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return;
        }

        if let Some(usage) = serde_json::from_str::<StreamChunkUsage>(data)
            .ok()
            .and_then(StreamChunkUsage::reported)
        {
            self.usage = Some(usage.with_total());
        }
    }

    fn usage(&self) -> Option<Usage> {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn chunks(parts: &[&'static str]) -> BoxStream<'static, Bytes> {
        let items: Vec<anyhow::Result<Bytes>> = parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        Box::pin(tokio_stream::iter(items))
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[tokio::test]
    async fn test_chunks_relayed_in_order() {
        let parts = ["data: {\"a\":1}\n\n", "data: {\"a\":2}\n\n", "data: [DONE]\n\n"];
        let relay = StreamRelay::default();
        let handle = relay.spawn(chunks(&parts), far_deadline(), |_| {});

        let received: Vec<Bytes> = handle.body.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(received, parts.iter().map(|p| Bytes::from_static(p.as_bytes())).collect::<Vec<_>>());

        let outcome = handle.task.await.unwrap();
        assert_eq!(outcome, RelayOutcome::Completed { usage: None });
    }

    #[tokio::test]
    async fn test_usage_tap_across_chunk_boundary() {
        let parts = [
            "data: {\"choices\":[]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tok",
            "ens\":7,\"completion_tokens\":5}}\n\ndata: [DONE]\n\n",
        ];
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let relay = StreamRelay::default();
        let handle = relay.spawn(chunks(&parts), far_deadline(), move |outcome| {
            *seen_clone.lock().unwrap() = outcome.usage();
        });

        let _: Vec<_> = handle.body.collect().await;
        handle.task.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(Usage::new(7, 5)));
    }

    #[tokio::test]
    async fn test_stalled_upstream_hits_watchdog() {
        let relay = StreamRelay::new(Duration::from_millis(20));
        let deadline = relay.deadline(Instant::now(), Duration::from_millis(30));
        let stalled: BoxStream<'static, Bytes> = Box::pin(tokio_stream::pending());

        let started = std::time::Instant::now();
        let handle = relay.spawn(stalled, deadline, |_| {});
        let received: Vec<Result<Bytes, RelayError>> = handle.body.collect().await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(received.len(), 1);
        assert!(matches!(received[0], Err(RelayError::WatchdogExpired)));
        assert_eq!(handle.task.await.unwrap(), RelayOutcome::WatchdogExpired);
    }

    #[tokio::test]
    async fn test_watchdog_aborts_slow_reader_with_full_buffer() {
        let items: Vec<anyhow::Result<Bytes>> = (0..10_000)
            .map(|_| Ok(Bytes::from_static(b"data: {\"choices\":[]}\n\n")))
            .collect();
        let relay = StreamRelay::new(Duration::from_millis(10));
        let deadline = relay.deadline(Instant::now(), Duration::from_millis(10));

        let handle = relay.spawn(Box::pin(tokio_stream::iter(items)), deadline, |_| {});

        // Client does not read until well past the deadline
        tokio::time::sleep(Duration::from_millis(200)).await;
        let received: Vec<Result<Bytes, RelayError>> = handle.body.collect().await;

        let errors = received.iter().filter(|item| item.is_err()).count();
        assert_eq!(errors, 1);
        assert!(matches!(received.last(), Some(Err(RelayError::WatchdogExpired))));
        assert_eq!(handle.task.await.unwrap(), RelayOutcome::WatchdogExpired);
    }

    #[tokio::test]
    async fn test_usage_tap_reads_groq_extension() {
        let parts = [
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
            "data: {\"choices\":[],\"x_groq\":{\"id\":\"req_1\",\"usage\":{\"queue_time\":0.01,\"prompt_tokens\":9,\"completion_tokens\":4,\"total_tokens\":13}}}\n\n",
            "data: [DONE]\n\n",
        ];
        let relay = StreamRelay::default();
        let handle = relay.spawn(chunks(&parts), far_deadline(), |_| {});

        let _: Vec<_> = handle.body.collect().await;
        assert_eq!(handle.task.await.unwrap().usage(), Some(Usage::new(9, 4)));
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream_cleanly() {
        let items: Vec<anyhow::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: {}\n\n")),
            Err(anyhow::anyhow!("connection reset")),
        ];
        let relay = StreamRelay::default();
        let handle = relay.spawn(Box::pin(tokio_stream::iter(items)), far_deadline(), |_| {});

        let received: Vec<Result<Bytes, RelayError>> = handle.body.collect().await;
        assert_eq!(received.len(), 1);
        assert!(received[0].is_ok());
        assert_eq!(handle.task.await.unwrap(), RelayOutcome::UpstreamFailed { usage: None });
    }

    #[tokio::test]
    async fn test_client_disconnect_releases_upstream() {
        let (up_tx, up_rx) = mpsc::channel::<anyhow::Result<Bytes>>(4);
        let upstream: BoxStream<'static, Bytes> = Box::pin(ReceiverStream::new(up_rx));

        let relay = StreamRelay::default();
        let handle = relay.spawn(upstream, far_deadline(), |_| {});

        up_tx.send(Ok(Bytes::from_static(b"data: {}\n\n"))).await.unwrap();
        drop(handle.body);

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle.task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, RelayOutcome::ClientDisconnected);
        assert!(up_tx.is_closed());
    }

    #[test]
    fn test_stream_response_headers() {
        let (_tx, rx) = mpsc::channel(1);
        let (_abort_tx, abort_rx) = oneshot::channel();
        let response = stream_response(RelayBody::new(rx, abort_rx));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");
        assert!(response.headers().get(header::CONNECTION).is_none());
    }
}
