//! Per-request `edge_request` span.
//!
//! The span carries the method and path and records the response status and
//! the time to the response head once the inner service completes. Streamed
//! bodies may keep flowing after that.

use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, info_span, warn, Instrument, Span};

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// Wraps every proxied request in an `edge_request` span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = EdgeTracing<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EdgeTracing { inner }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeTracing<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for EdgeTracing<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let span = info_span!(
            "edge_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            http.status_code = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        );

        let started = Instant::now();
        let fut = inner.call(req);
        Box::pin(
            async move {
                let result = fut.await;

                if let Ok(response) = &result {
                    let status = response.status();
                    let span = Span::current();
                    span.record("http.status_code", status.as_u16());
                    span.record("latency_ms", started.elapsed().as_millis() as u64);

                    if status.is_server_error() {
                        warn!(status = status.as_u16(), "edge request failed");
                    } else {
                        debug!(status = status.as_u16(), "edge request completed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
