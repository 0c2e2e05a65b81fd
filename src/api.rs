//! Container management API
//!
//! RESTful /api/v1 endpoints for deploying, listing, stopping, and inspecting
//! application containers. Reached only when the routing intercept bypasses a
//! request (root domain or reserved subdomain).

use crate::builder::{ImageBuilder, DEFAULT_BUILT_IMAGE};
use crate::error::{full, json_error_response, text_response, Error, HttpBody};
use crate::orchestrator::Orchestrator;
use futures::StreamExt;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collection path for container resources
pub const CONTAINERS_PATH: &str = "/api/v1/containers";

/// Request to deploy a container.
///
/// Image-based deployments name an existing image; source-based deployments
/// supply a git `repo_url` to build first (with `image` as an optional tag).
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub id: String,
    pub image: String,
}

/// How a deployment request obtains its image
#[derive(Debug, PartialEq, Eq)]
enum DeploySource {
    /// Run an existing image
    Prebuilt(String),
    /// Build the repository first, tagging the result
    Source { repo_url: String, image_name: String },
}

/// Decide the deployment mode from the request fields
fn deploy_source(request: &DeployRequest) -> Result<DeploySource, Error> {
    let image = request.image.as_deref().filter(|s| !s.trim().is_empty());
    let repo_url = request.repo_url.as_deref().filter(|s| !s.trim().is_empty());

    match (repo_url, image) {
        (Some(repo_url), image) => Ok(DeploySource::Source {
            repo_url: repo_url.to_string(),
            image_name: image.unwrap_or(DEFAULT_BUILT_IMAGE).to_string(),
        }),
        (None, Some(image)) => Ok(DeploySource::Prebuilt(image.to_string())),
        (None, None) => Err(Error::Validation(
            "image or repo_url is required".to_string(),
        )),
    }
}

/// Dispatch target for an API request
#[derive(Debug, PartialEq, Eq)]
enum Route {
    List,
    Deploy,
    /// Container id, possibly empty when the path segment is missing
    Logs(String),
    Stop(String),
    Unknown,
}

/// Match a method and path to a dispatch target.
///
/// Only paths under the exact `/api/v1/containers` prefix resolve; anything
/// else under `/api/` is Unknown and renders as 404, not a field error.
fn route(method: &Method, path: &str) -> Route {
    let item = path.strip_prefix("/api/v1/containers/");

    match (method, item) {
        (&Method::GET, None) if path == CONTAINERS_PATH => Route::List,
        (&Method::POST, None) if path == CONTAINERS_PATH => Route::Deploy,
        (&Method::GET, Some(rest)) => match rest.strip_suffix("/logs") {
            Some(id) => Route::Logs(id.to_string()),
            None => Route::Unknown,
        },
        (&Method::DELETE, None) if path == CONTAINERS_PATH => Route::Stop(String::new()),
        (&Method::DELETE, Some(id)) => Route::Stop(id.to_string()),
        _ => Route::Unknown,
    }
}

/// Container management API handlers
pub struct Api {
    orchestrator: Arc<Orchestrator>,
    builder: Arc<ImageBuilder>,
}

impl Api {
    pub fn new(orchestrator: Arc<Orchestrator>, builder: Arc<ImageBuilder>) -> Self {
        Self {
            orchestrator,
            builder,
        }
    }

    /// Whether a request path belongs to this API
    pub fn matches(path: &str) -> bool {
        path == CONTAINERS_PATH || path.starts_with("/api/")
    }

    pub async fn handle(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<HttpBody>, hyper::Error> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(%method, %path, "API request");

        let result = match route(&method, &path) {
            Route::List => self.list_containers().await,
            Route::Deploy => self.deploy(req).await,
            Route::Logs(id) => self.logs(&id).await,
            Route::Stop(id) => self.stop_container(&id).await,
            Route::Unknown => Err(Error::NotFound(format!("no route for {}", path))),
        };

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                error!(%path, error = %e, "API request failed");
                Ok(json_error_response(&e))
            }
        }
    }

    async fn list_containers(&self) -> Result<Response<HttpBody>, Error> {
        let snapshots = self.orchestrator.list().await?;
        let body = serde_json::to_string(&snapshots)
            .map_err(|e| Error::Internal(format!("failed to serialize snapshots: {}", e)))?;
        Ok(json_response(StatusCode::OK, body))
    }

    async fn deploy(&self, req: Request<Incoming>) -> Result<Response<HttpBody>, Error> {
        let body = req
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Validation(format!("failed to read request body: {}", e)))?
            .to_bytes();

        let deploy: DeployRequest = serde_json::from_slice(&body)
            .map_err(|e| Error::Validation(format!("invalid JSON: {}", e)))?;

        let image = match deploy_source(&deploy)? {
            DeploySource::Prebuilt(image) => image,
            DeploySource::Source {
                repo_url,
                image_name,
            } => self.builder.build(&repo_url, &image_name).await?,
        };

        let id = self
            .orchestrator
            .create_and_start(&image, deploy.name.as_deref())
            .await?;

        info!(id, image, "Deployed container");

        let response = DeployResponse { id, image };
        let body = serde_json::to_string(&response)
            .map_err(|e| Error::Internal(format!("failed to serialize response: {}", e)))?;
        Ok(json_response(StatusCode::CREATED, body))
    }

    async fn stop_container(&self, id: &str) -> Result<Response<HttpBody>, Error> {
        if id.is_empty() || id.contains('/') {
            return Err(Error::Validation("container id is required".to_string()));
        }

        self.orchestrator.stop(id).await?;
        Ok(json_response(StatusCode::OK, r#"{"success":true}"#.to_string()))
    }

    async fn logs(&self, id: &str) -> Result<Response<HttpBody>, Error> {
        if id.is_empty() || id.contains('/') {
            return Err(Error::Validation("container id is required".to_string()));
        }

        let mut stream = self.orchestrator.logs(id).await?;

        // Non-following stream, so the whole capture is bounded; an errored
        // chunk truncates the output rather than failing the response.
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => collected.extend_from_slice(&bytes),
                Err(e) => {
                    warn!(id, error = %e, "Log stream ended early");
                    break;
                }
            }
        }

        Ok(text_response(StatusCode::OK, collected))
    }
}

fn json_response(status: StatusCode, body: String) -> Response<HttpBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full(body))
        .expect("valid response with StatusCode enum and static headers")
}
