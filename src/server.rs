//! Gateway server
//!
//! A single listener carries all traffic. Every request is first checked
//! against the subdomain routing rules; subdomain-addressed requests are
//! proxied to their container backend, and everything else falls through to
//! the management API and the embedded dashboard.

use crate::api::Api;
use crate::builder::ImageBuilder;
use crate::dashboard;
use crate::error::{json_error_response, text_response, Error, HttpBody};
use crate::orchestrator::Orchestrator;
use crate::proxy::ProxyClient;
use crate::resolver::{self, Resolution};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderValue, HOST};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Longest hostname accepted before routing is even attempted
const MAX_HOSTNAME_LEN: usize = 253;

/// The public entry point: routing intercept, proxy, API, and dashboard
pub struct Gateway {
    bind_addr: SocketAddr,
    orchestrator: Arc<Orchestrator>,
    proxy: ProxyClient,
    api: Api,
    shutdown_rx: watch::Receiver<bool>,
}

impl Gateway {
    pub fn new(
        bind_addr: SocketAddr,
        orchestrator: Arc<Orchestrator>,
        builder: Arc<ImageBuilder>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let api = Api::new(Arc::clone(&orchestrator), builder);
        Self {
            bind_addr,
            orchestrator,
            proxy: ProxyClient::new(),
            api,
            shutdown_rx,
        }
    }

    /// Accept connections until the shutdown signal flips
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "Gateway listening");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Gateway shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let gateway = Arc::clone(&self);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let gateway = Arc::clone(&gateway);
                            async move { gateway.handle_request(req, peer).await }
                        });

                        if let Err(e) = auto::Builder::new(TokioExecutor::new())
                            .serve_connection_with_upgrades(io, service)
                            .await
                        {
                            debug!(%peer, error = %e, "Connection ended with error");
                        }
                    });
                }
            }
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
        peer: SocketAddr,
    ) -> Result<Response<HttpBody>, hyper::Error> {
        let Some(hostname) = extract_hostname(&req) else {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                "missing or invalid Host header",
            ));
        };

        // Subdomain routing runs before every other surface so an app named
        // "api" can never shadow or be shadowed by the management routes.
        if resolver::subdomain(&hostname).is_some() {
            return self.handle_app_request(req, &hostname, peer).await;
        }

        Ok(self.handle_platform_request(req).await?)
    }

    /// A subdomain-addressed request: resolve against a fresh snapshot set
    /// and proxy, or explain why not.
    async fn handle_app_request(
        &self,
        mut req: Request<Incoming>,
        hostname: &str,
        peer: SocketAddr,
    ) -> Result<Response<HttpBody>, hyper::Error> {
        let snapshots = match self.orchestrator.list().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(hostname, error = %e, "Failed to list containers for routing");
                return Ok(json_error_response(&e));
            }
        };

        match resolver::resolve(hostname, &snapshots) {
            Resolution::Proxy(backend) => {
                add_forwarding_headers(req.headers_mut(), hostname, peer);
                match self.proxy.forward(req, &backend).await {
                    Ok(response) => Ok(response),
                    Err(e) => {
                        warn!(hostname, backend, error = %e, "Proxy request failed");
                        Ok(text_response(StatusCode::BAD_GATEWAY, e.to_string()))
                    }
                }
            }
            Resolution::NotFound(app) => {
                debug!(hostname, app, "No running container for subdomain");
                Ok(text_response(
                    StatusCode::NOT_FOUND,
                    format!("app '{}' not found or not running", app),
                ))
            }
            Resolution::Bypass => self.handle_platform_request(req).await,
        }
    }

    /// API and dashboard routes, reached when no subdomain intercepts
    async fn handle_platform_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<HttpBody>, hyper::Error> {
        let path = req.uri().path();

        if Api::matches(path) {
            return self.api.handle(req).await;
        }

        match (req.method(), path) {
            (&Method::GET, "/") => Ok(dashboard::serve_dashboard()),
            (&Method::GET, "/style.css") => Ok(dashboard::serve_css()),
            (&Method::GET, "/app.js") => Ok(dashboard::serve_js()),
            _ => Ok(json_error_response(&Error::NotFound(format!(
                "no route for {}",
                path
            )))),
        }
    }
}

/// Pull a validated hostname out of a request.
///
/// HTTP/2 carries the authority in the URI; HTTP/1.1 in the Host header.
/// The port is stripped and the result lowercased before validation.
fn extract_hostname(req: &Request<Incoming>) -> Option<String> {
    let raw = req
        .uri()
        .host()
        .map(str::to_string)
        .or_else(|| {
            req.headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })?;

    normalize_hostname(&raw)
}

/// Strip the port, lowercase, and reject anything that is not a plausible
/// DNS name. Untrusted input; a bad Host header must not reach the resolver.
fn normalize_hostname(raw: &str) -> Option<String> {
    let without_port = raw.split(':').next().unwrap_or(raw).to_lowercase();

    if without_port.is_empty() || without_port.len() > MAX_HOSTNAME_LEN {
        return None;
    }
    if !without_port
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return None;
    }

    Some(without_port)
}

/// Stamp the standard forwarding headers onto a proxied request.
///
/// x-request-id is propagated when the caller set one; the x-forwarded-*
/// family is always overwritten since the client is untrusted.
fn add_forwarding_headers(headers: &mut HeaderMap, hostname: &str, peer: SocketAddr) {
    if !headers.contains_key("x-request-id") {
        let id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            headers.insert("x-request-id", value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&peer.ip().to_string()) {
        headers.insert("x-forwarded-for", value);
    }
    if let Ok(value) = HeaderValue::from_str(hostname) {
        headers.insert("x-forwarded-host", value);
    }
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_port_and_lowercases() {
        assert_eq!(
            normalize_hostname("Foo.Example.Test:3000"),
            Some("foo.example.test".to_string())
        );
        assert_eq!(
            normalize_hostname("localhost:3000"),
            Some("localhost".to_string())
        );
    }

    #[test]
    fn test_normalize_rejects_implausible_hostnames() {
        assert_eq!(normalize_hostname(""), None);
        assert_eq!(normalize_hostname(":3000"), None);
        assert_eq!(normalize_hostname("bad_host.example.test"), None);
        assert_eq!(normalize_hostname("evil host"), None);
        assert_eq!(normalize_hostname(&"a".repeat(300)), None);
    }

    #[test]
    fn test_normalize_allows_hyphenated_labels() {
        assert_eq!(
            normalize_hostname("my-app.example.test"),
            Some("my-app.example.test".to_string())
        );
    }

    #[test]
    fn test_forwarding_headers_overwrite_spoofed_client_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.9.9.9"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("other.example"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));

        let peer: SocketAddr = "203.0.113.7:55555".parse().unwrap();
        add_forwarding_headers(&mut headers, "foo.example.test", peer);

        assert_eq!(headers.get("x-forwarded-for").unwrap(), "203.0.113.7");
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "foo.example.test");
        assert_eq!(headers.get("x-forwarded-proto").unwrap(), "http");
    }

    #[test]
    fn test_request_id_is_propagated_not_replaced() {
        let peer: SocketAddr = "203.0.113.7:55555".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("caller-id"));
        add_forwarding_headers(&mut headers, "foo.example.test", peer);
        assert_eq!(headers.get("x-request-id").unwrap(), "caller-id");

        let mut headers = HeaderMap::new();
        add_forwarding_headers(&mut headers, "foo.example.test", peer);
        assert!(!headers.get("x-request-id").unwrap().is_empty());
    }
}
