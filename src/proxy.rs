//! Reverse proxy forwarding engine
//!
//! Forwards an inbound request to a resolved backend address over a pooled
//! HTTP client, rewriting the host-identifying fields. Connectivity failures
//! surface as `Error::Upstream`, which the gateway renders as 502.

use crate::error::{Error, HttpBody};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, HOST};
use hyper::http::request::Parts;
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;

/// Maximum idle connections kept per backend
const MAX_IDLE_PER_HOST: usize = 10;

/// Idle connection timeout
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Pooled HTTP client for backend connections
pub struct ProxyClient {
    client: Client<HttpConnector, Incoming>,
}

impl ProxyClient {
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        connector.enforce_http(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .build(connector);

        debug!(
            max_idle = MAX_IDLE_PER_HOST,
            idle_timeout_secs = IDLE_TIMEOUT.as_secs(),
            "Proxy client initialized"
        );

        Self { client }
    }

    /// Forward a request to the backend, streaming the response back unmodified.
    ///
    /// Method, path, query, headers, and body carry over; only the destination
    /// authority and the Host header are rewritten to the backend address.
    pub async fn forward(
        &self,
        req: Request<Incoming>,
        backend: &str,
    ) -> Result<Response<HttpBody>, Error> {
        let (mut parts, body) = req.into_parts();
        rewrite_destination(&mut parts, backend)?;
        let outbound = Request::from_parts(parts, body);

        debug!(
            backend,
            method = %outbound.method(),
            uri = %outbound.uri(),
            "Forwarding request"
        );

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| Error::Upstream {
                backend: backend.to_string(),
                detail: e.to_string(),
            })?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, body.boxed()))
    }
}

impl Default for ProxyClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Point a request at the backend address.
///
/// The inbound Host header names the subdomain the caller used, which the
/// backend application does not recognize; it must see its own address.
fn rewrite_destination(parts: &mut Parts, backend: &str) -> Result<(), Error> {
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let uri: Uri = format!("http://{}{}", backend, path)
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| Error::Upstream {
            backend: backend.to_string(),
            detail: format!("invalid backend address: {}", e),
        })?;

    let host = HeaderValue::from_str(backend).map_err(|e| Error::Upstream {
        backend: backend.to_string(),
        detail: format!("invalid backend address: {}", e),
    })?;

    parts.headers.insert(HOST, host);
    parts.uri = uri;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(uri: &str, host: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .uri(uri)
            .header(HOST, host)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_rewrite_sets_backend_authority_and_host() {
        let mut parts = inbound("/some/path?x=1", "foo.example.test");
        rewrite_destination(&mut parts, "127.0.0.1:9001").unwrap();

        assert_eq!(
            parts.uri.to_string(),
            "http://127.0.0.1:9001/some/path?x=1"
        );
        assert_eq!(parts.headers.get(HOST).unwrap(), "127.0.0.1:9001");
    }

    #[test]
    fn test_rewrite_defaults_empty_path_to_root() {
        let mut parts = inbound("/", "foo.example.test");
        rewrite_destination(&mut parts, "127.0.0.1:9001").unwrap();

        assert_eq!(parts.uri.to_string(), "http://127.0.0.1:9001/");
    }

    #[test]
    fn test_rewrite_preserves_other_headers() {
        let (mut parts, ()) = Request::builder()
            .uri("/api")
            .header(HOST, "foo.example.test")
            .header("x-custom", "value")
            .body(())
            .unwrap()
            .into_parts();

        rewrite_destination(&mut parts, "127.0.0.1:9001").unwrap();
        assert_eq!(parts.headers.get("x-custom").unwrap(), "value");
    }

    #[test]
    fn test_rewrite_rejects_malformed_backend() {
        let mut parts = inbound("/", "foo.example.test");
        let err = rewrite_destination(&mut parts, "not a host").unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }
}
