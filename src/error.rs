//! Error taxonomy and HTTP error rendering for the control plane

use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Boxed response body used across the gateway
pub type HttpBody = BoxBody<Bytes, hyper::Error>;

/// Build a complete in-memory response body
pub fn full(body: impl Into<Bytes>) -> HttpBody {
    Full::new(body.into()).map_err(|never| match never {}).boxed()
}

/// Errors produced by the orchestrator, builder, and proxy paths
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request fields
    #[error("invalid request: {0}")]
    Validation(String),

    /// Unknown container id or unresolved application name
    #[error("not found: {0}")]
    NotFound(String),

    /// Image could not be inspected locally or pulled from a registry
    #[error("image resolution failed for '{image}': {detail}")]
    ImageResolution { image: String, detail: String },

    /// Engine rejected container creation
    #[error("container create failed for image '{image}': {detail}")]
    ContainerCreate { image: String, detail: String },

    /// Engine rejected container start
    #[error("container start failed for '{id}': {detail}")]
    ContainerStart { id: String, detail: String },

    /// Engine rejected the stop request (including unknown ids)
    #[error("container stop failed for '{id}': {detail}")]
    ContainerStop { id: String, detail: String },

    /// Readiness probe exhausted its budget under the `required` policy
    #[error("container '{id}' did not accept connections within the readiness budget")]
    ReadinessTimeout { id: String },

    /// Source-based image build failed
    #[error("build failed for '{repo_url}': {detail}")]
    Build { repo_url: String, detail: String },

    /// Engine-level failure outside the lifecycle operations (list, inspect)
    #[error("engine {op} failed: {detail}")]
    Engine { op: &'static str, detail: String },

    /// Backend unreachable from the reverse proxy
    #[error("upstream {backend} unreachable: {detail}")]
    Upstream { backend: String, detail: String },

    /// Unexpected internal failure (serialization and the like)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable error codes surfaced in JSON bodies and the x-gateway-error header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    NotFound,
    ImageResolution,
    ContainerCreate,
    ContainerStart,
    ContainerStop,
    ReadinessTimeout,
    Build,
    Engine,
    Upstream,
    Internal,
}

impl ErrorCode {
    pub fn as_header_value(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ImageResolution => "IMAGE_RESOLUTION",
            ErrorCode::ContainerCreate => "CONTAINER_CREATE",
            ErrorCode::ContainerStart => "CONTAINER_START",
            ErrorCode::ContainerStop => "CONTAINER_STOP",
            ErrorCode::ReadinessTimeout => "READINESS_TIMEOUT",
            ErrorCode::Build => "BUILD",
            ErrorCode::Engine => "ENGINE",
            ErrorCode::Upstream => "UPSTREAM",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation(_) => ErrorCode::Validation,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::ImageResolution { .. } => ErrorCode::ImageResolution,
            Error::ContainerCreate { .. } => ErrorCode::ContainerCreate,
            Error::ContainerStart { .. } => ErrorCode::ContainerStart,
            Error::ContainerStop { .. } => ErrorCode::ContainerStop,
            Error::ReadinessTimeout { .. } => ErrorCode::ReadinessTimeout,
            Error::Build { .. } => ErrorCode::Build,
            Error::Engine { .. } => ErrorCode::Engine,
            Error::Upstream { .. } => ErrorCode::Upstream,
            Error::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body: `{code, message, status}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(error: &Error) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            status: error.status_code().as_u16(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"code":"{}","message":"{}","status":{}}}"#,
                self.code.as_header_value(),
                self.message.replace('"', "\\\""),
                self.status
            )
        })
    }
}

/// Render an error as a JSON response with an x-gateway-error code header
pub fn json_error_response(error: &Error) -> Response<HttpBody> {
    let body = ErrorResponse::new(error).to_json();

    Response::builder()
        .status(error.status_code())
        .header("Content-Type", "application/json")
        .header("X-Gateway-Error", error.code().as_header_value())
        .body(full(body))
        .expect("valid response with StatusCode enum and static headers")
}

/// Render a plain-text response (used by the proxy and log paths)
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<HttpBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(full(body))
        .expect("valid response with StatusCode enum and static headers")
}
