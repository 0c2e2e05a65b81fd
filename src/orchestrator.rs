//! Container lifecycle orchestration over the Docker engine
//!
//! Owns image resolution, routable-port auto-detection, ephemeral port
//! allocation, the post-start readiness probe, and graceful stop. Every query
//! goes straight to the engine; no container state is cached in-process.

use crate::config::{EngineConfig, ReadinessConfig, ReadinessPolicy};
use crate::error::Error;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogsOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerSummary, HostConfig, PortBinding, PortTypeEnum};
use bollard::Docker;
use futures::stream::BoxStream;
use futures::StreamExt;
use hyper::body::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Routable-port preference order applied to an image's declared ports
pub const PREFERRED_PORTS: [u16; 3] = [80, 8080, 3000];

/// Port assumed when an image declares no exposed ports
pub const DEFAULT_PORT: u16 = 8080;

/// Coarse-grained container state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Exited,
    Unknown,
}

impl ContainerState {
    pub fn parse(state: &str) -> Self {
        match state {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "exited" => ContainerState::Exited,
            _ => ContainerState::Unknown,
        }
    }
}

/// Read-only view of a container, produced fresh on every `list()` query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// Engine-assigned identifier, immutable for the container's lifetime
    pub id: String,
    /// Caller-assigned name, used as the routing key (uniqueness assumed)
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
    /// Free-text descriptive status, e.g. "Up 2 hours"
    pub status: String,
    pub state: ContainerState,
    /// host:port reachable by the proxy; only set while running with a mapping
    pub backend_address: Option<String>,
    /// Engine creation timestamp, used as the duplicate-name tie-break
    pub created: i64,
}

/// The single exposed-port binding for a container instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub container_port: u16,
    pub protocol: String,
    /// 0 requests an engine-assigned ephemeral host port
    pub host_port: u16,
}

impl PortSpec {
    pub fn tcp(container_port: u16) -> Self {
        Self {
            container_port,
            protocol: "tcp".to_string(),
            host_port: 0,
        }
    }

    /// Render the engine's port-map key, e.g. "80/tcp"
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }

    /// Parse an engine port-map key; a missing protocol suffix means tcp
    pub fn parse_key(key: &str) -> Option<Self> {
        let (port, protocol) = match key.split_once('/') {
            Some((port, protocol)) => (port, protocol),
            None => (key, "tcp"),
        };
        Some(Self {
            container_port: port.parse().ok()?,
            protocol: protocol.to_string(),
            host_port: 0,
        })
    }
}

/// Pick the container's routable port from the image's declared exposed ports.
///
/// Preference order: 80/tcp, 8080/tcp, 3000/tcp, then the lowest-numbered
/// declared port (the engine reports declarations as an unordered map, so
/// numeric order stands in for declaration order). No declarations: 8080/tcp.
pub fn select_routable_port(exposed: Option<&HashMap<String, HashMap<(), ()>>>) -> PortSpec {
    let declared: Vec<PortSpec> = exposed
        .map(|ports| ports.keys().filter_map(|key| PortSpec::parse_key(key)).collect())
        .unwrap_or_default();

    for preferred in PREFERRED_PORTS {
        if let Some(spec) = declared
            .iter()
            .find(|p| p.container_port == preferred && p.protocol == "tcp")
        {
            return spec.clone();
        }
    }

    declared
        .into_iter()
        .min_by(|a, b| {
            (a.container_port, &a.protocol).cmp(&(b.container_port, &b.protocol))
        })
        .unwrap_or_else(|| PortSpec::tcp(DEFAULT_PORT))
}

/// Derive a default container name from an image reference,
/// e.g. "ghcr.io/acme/web-app:1.2" becomes "web-app"
pub fn default_container_name(image: &str) -> String {
    let base = image.rsplit('/').next().unwrap_or(image);
    let base = base.split(['@', ':']).next().unwrap_or(base);

    let name: String = base
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let name = name
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string();
    if name.is_empty() {
        "app".to_string()
    } else {
        name
    }
}

/// Map an engine listing entry into a snapshot
fn snapshot_from_summary(summary: ContainerSummary) -> ContainerSnapshot {
    // The engine reports names with a leading slash (e.g. "/my-app")
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();

    let state = summary
        .state
        .as_deref()
        .map(ContainerState::parse)
        .unwrap_or(ContainerState::Unknown);

    let backend_address = if state == ContainerState::Running {
        derive_backend_address(&summary)
    } else {
        None
    };

    ContainerSnapshot {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
        state,
        backend_address,
        created: summary.created.unwrap_or_default(),
    }
}

/// Best-effort backend address for a running container.
///
/// A published host-port mapping is the reliable path. Without one, fall back
/// to the container's internal network address with its private port; that
/// assumes a port the system cannot verify from a listing entry.
fn derive_backend_address(summary: &ContainerSummary) -> Option<String> {
    let ports = summary.ports.as_deref().unwrap_or(&[]);

    if let Some(public) = ports
        .iter()
        .filter(|p| p.typ != Some(PortTypeEnum::UDP))
        .find_map(|p| p.public_port)
    {
        return Some(format!("127.0.0.1:{}", public));
    }

    let ip = summary
        .network_settings
        .as_ref()?
        .networks
        .as_ref()?
        .values()
        .find_map(|endpoint| endpoint.ip_address.as_deref().filter(|ip| !ip.is_empty()))?;
    let private = ports
        .iter()
        .filter(|p| p.typ != Some(PortTypeEnum::UDP))
        .map(|p| p.private_port)
        .min()?;

    Some(format!("{}:{}", ip, private))
}

/// Orchestrates single-container lifecycles against the Docker daemon
pub struct Orchestrator {
    client: Docker,
    stop_grace: Duration,
    readiness: ReadinessConfig,
}

impl Orchestrator {
    /// Connect to the Docker daemon.
    ///
    /// Connection priority: explicit `docker_host` from config, then the
    /// DOCKER_HOST environment variable, then well-known socket paths.
    pub async fn new(engine: &EngineConfig, readiness: ReadinessConfig) -> anyhow::Result<Self> {
        let client = if let Some(host) = engine.docker_host.as_deref() {
            connect_to_host(host)?
        } else if let Ok(host) = std::env::var("DOCKER_HOST") {
            connect_to_host(&host)?
        } else {
            connect_with_defaults().await?
        };

        // Verify connection
        client.ping().await.map_err(|e| {
            anyhow::anyhow!(
                "Docker daemon is not responding: {}. \
                 Ensure dockerd, Docker Desktop, or Colima is running.",
                e
            )
        })?;

        debug!("Connected to Docker daemon");
        Ok(Self {
            client,
            stop_grace: engine.stop_grace(),
            readiness,
        })
    }

    /// Deploy a container from an image reference and return its id.
    ///
    /// Resolves the image (pulling if absent), auto-detects the routable port,
    /// binds it to an engine-assigned ephemeral host port on all interfaces,
    /// starts the container, and runs the readiness probe. Under the default
    /// best-effort policy a probe timeout still returns the id.
    pub async fn create_and_start(&self, image: &str, name: Option<&str>) -> Result<String, Error> {
        if image.trim().is_empty() {
            return Err(Error::Validation("image reference is required".to_string()));
        }

        let inspect = self.resolve_image(image).await?;
        let port = select_routable_port(
            inspect
                .config
                .as_ref()
                .and_then(|config| config.exposed_ports.as_ref()),
        );

        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => default_container_name(image),
        };

        // Duplicate names would make routing ambiguous; reject up front.
        if self.list().await?.iter().any(|s| s.name == name) {
            return Err(Error::Validation(format!(
                "container name '{}' is already in use",
                name
            )));
        }

        let port_key = port.key();
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        port_bindings.insert(
            port_key.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(port.host_port.to_string()),
            }]),
        );

        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        exposed_ports.insert(port_key.clone(), HashMap::new());

        let container_config = Config {
            image: Some(image.to_string()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };

        let response = self
            .client
            .create_container(Some(create_options), container_config)
            .await
            .map_err(|e| Error::ContainerCreate {
                image: image.to_string(),
                detail: e.to_string(),
            })?;

        let id = response.id;
        info!(id, name, image, port = %port_key, "Created container");

        if let Err(e) = self
            .client
            .start_container(&id, None::<StartContainerOptions<String>>)
            .await
        {
            // Known gap: the created-but-unstarted container is not rolled back.
            warn!(id, error = %e, "Start failed; created container left behind");
            return Err(Error::ContainerStart {
                id,
                detail: e.to_string(),
            });
        }

        info!(id, name, "Started container");

        match self.discover_host_port(&id, &port_key).await {
            Some(host_port) => {
                if self.probe_ready(host_port).await {
                    debug!(id, host_port, "Container is accepting connections");
                } else {
                    warn!(
                        id,
                        host_port,
                        attempts = self.readiness.attempts,
                        "Readiness probe exhausted its budget"
                    );
                    readiness_failure(self.readiness.policy, id.clone())?;
                }
            }
            None => {
                debug!(id, "No published host port discovered; skipping readiness probe");
            }
        }

        Ok(id)
    }

    /// Request graceful termination, bounded by the configured grace period.
    ///
    /// Success means the engine acknowledged the request; final exit state is
    /// not verified. An already-stopped container is acknowledged, an unknown
    /// id is an error.
    pub async fn stop(&self, id: &str) -> Result<(), Error> {
        if id.is_empty() {
            return Err(Error::Validation("container id is required".to_string()));
        }

        let options = StopContainerOptions {
            t: self.stop_grace.as_secs() as i64,
        };

        let result = self.client.stop_container(id, Some(options)).await;
        stop_outcome(id, result)
    }

    /// Point-in-time combined stdout+stderr log stream with timestamps.
    ///
    /// Non-following; the caller owns (and ends) the returned stream.
    pub async fn logs(&self, id: &str) -> Result<BoxStream<'static, Result<Bytes, Error>>, Error> {
        if id.is_empty() {
            return Err(Error::Validation("container id is required".to_string()));
        }

        match self.client.inspect_container(id, None).await {
            Ok(_) => {}
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                return Err(Error::NotFound(format!("container {}", id)));
            }
            Err(e) => {
                return Err(Error::Engine {
                    op: "inspect",
                    detail: e.to_string(),
                });
            }
        }

        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            timestamps: true,
            follow: false,
            ..Default::default()
        };

        let stream = self.client.logs(id, Some(options)).map(|result| {
            result
                .map(|output| output.into_bytes())
                .map_err(|e| Error::Engine {
                    op: "logs",
                    detail: e.to_string(),
                })
        });

        Ok(stream.boxed())
    }

    /// Fresh snapshot of all containers regardless of state
    pub async fn list(&self) -> Result<Vec<ContainerSnapshot>, Error> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let summaries = self
            .client
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::Engine {
                op: "list",
                detail: e.to_string(),
            })?;

        Ok(summaries.into_iter().map(snapshot_from_summary).collect())
    }

    /// Inspect the image, pulling it synchronously when absent locally
    async fn resolve_image(
        &self,
        image: &str,
    ) -> Result<bollard::models::ImageInspect, Error> {
        match self.client.inspect_image(image).await {
            Ok(inspect) => return Ok(inspect),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => {
                return Err(Error::ImageResolution {
                    image: image.to_string(),
                    detail: e.to_string(),
                });
            }
        }

        info!(image, "Image not found locally, pulling");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!(image, status, "Pull progress");
                    }
                    if let Some(detail) = progress.error {
                        return Err(Error::ImageResolution {
                            image: image.to_string(),
                            detail,
                        });
                    }
                }
                Err(e) => {
                    return Err(Error::ImageResolution {
                        image: image.to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }
        info!(image, "Image pulled");

        self.client
            .inspect_image(image)
            .await
            .map_err(|e| Error::ImageResolution {
                image: image.to_string(),
                detail: e.to_string(),
            })
    }

    /// Learn the engine-assigned ephemeral host port for the routable port
    async fn discover_host_port(&self, id: &str, port_key: &str) -> Option<u16> {
        let inspect = self.client.inspect_container(id, None).await.ok()?;
        let ports = inspect.network_settings?.ports?;
        let bindings = ports.get(port_key)?.as_ref()?;

        bindings
            .iter()
            .find_map(|binding| binding.host_port.as_deref()?.parse().ok())
    }

    /// Bounded TCP readiness probe against the assigned host port.
    ///
    /// Stops on the first successful connect. Runs inline in the async call,
    /// so dropping the caller's future cancels it.
    pub async fn probe_ready(&self, host_port: u16) -> bool {
        probe_port(host_port, &self.readiness).await
    }
}

/// Probe loop behind `Orchestrator::probe_ready`.
///
/// Each attempt occupies one interval slot: a connect that fails fast sleeps
/// out the remainder of its slot, a hung connect is cut off at the slot
/// boundary. Total budget is attempts x interval.
async fn probe_port(host_port: u16, readiness: &ReadinessConfig) -> bool {
    let addr = format!("127.0.0.1:{}", host_port);
    let interval = readiness.interval();

    for attempt in 1..=readiness.attempts {
        let slot_end = tokio::time::Instant::now() + interval;

        if let Ok(Ok(_stream)) = tokio::time::timeout_at(slot_end, TcpStream::connect(&addr)).await
        {
            debug!(addr, attempt, "Readiness probe succeeded");
            return true;
        }

        tokio::time::sleep_until(slot_end).await;
    }

    false
}

/// Apply the configured policy to a readiness probe timeout
fn readiness_failure(policy: ReadinessPolicy, id: String) -> Result<(), Error> {
    match policy {
        ReadinessPolicy::BestEffort => Ok(()),
        ReadinessPolicy::Required => Err(Error::ReadinessTimeout { id }),
    }
}

/// Map the engine's stop result; already-stopped is acknowledged, an unknown
/// id is an error.
fn stop_outcome(id: &str, result: Result<(), bollard::errors::Error>) -> Result<(), Error> {
    match result {
        Ok(()) => {
            info!(id, "Stop request acknowledged");
            Ok(())
        }
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        }) => {
            debug!(id, "Container was already stopped");
            Ok(())
        }
        Err(e) => Err(Error::ContainerStop {
            id: id.to_string(),
            detail: e.to_string(),
        }),
    }
}

fn connect_to_host(host: &str) -> anyhow::Result<Docker> {
    if let Some(socket_path) = host.strip_prefix("unix://") {
        Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| anyhow::anyhow!("Cannot connect to Unix socket '{}': {}", socket_path, e))
    } else if host.starts_with("tcp://") || host.starts_with("http://") {
        Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| anyhow::anyhow!("Cannot connect to TCP endpoint '{}': {}", host, e))
    } else {
        anyhow::bail!(
            "Invalid docker_host format: '{}'. Expected 'unix:///path/to/socket' or 'tcp://host:port'",
            host
        )
    }
}

async fn connect_with_defaults() -> anyhow::Result<Docker> {
    let home = std::env::var("HOME").unwrap_or_default();

    let socket_paths = [
        "/var/run/docker.sock".to_string(),
        format!("{}/.docker/run/docker.sock", home),
        format!("{}/.colima/default/docker.sock", home),
    ];

    for path in &socket_paths {
        // Empty HOME leaves a bogus relative path behind
        if !std::path::Path::new(path).is_absolute() || !std::path::Path::new(path).exists() {
            continue;
        }
        if let Ok(client) = Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION) {
            if client.ping().await.is_ok() {
                debug!(path, "Found Docker socket");
                return Ok(client);
            }
        }
    }

    Docker::connect_with_socket_defaults().map_err(|e| {
        anyhow::anyhow!(
            "Cannot connect to Docker daemon. Start dockerd or set DOCKER_HOST. \
             Underlying error: {}",
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerSummaryNetworkSettings, EndpointSettings, Port};

    fn exposed(keys: &[&str]) -> HashMap<String, HashMap<(), ()>> {
        keys.iter()
            .map(|k| (k.to_string(), HashMap::new()))
            .collect()
    }

    #[test]
    fn test_no_declared_ports_defaults_to_8080() {
        let spec = select_routable_port(None);
        assert_eq!(spec.key(), "8080/tcp");
        assert_eq!(spec.host_port, 0);

        let empty = exposed(&[]);
        assert_eq!(select_routable_port(Some(&empty)).key(), "8080/tcp");
    }

    #[test]
    fn test_port_preference_order() {
        let ports = exposed(&["3000/tcp", "80/tcp"]);
        assert_eq!(select_routable_port(Some(&ports)).key(), "80/tcp");

        let ports = exposed(&["9090/tcp", "8080/tcp", "3000/tcp"]);
        assert_eq!(select_routable_port(Some(&ports)).key(), "8080/tcp");

        let ports = exposed(&["3000/tcp", "9090/tcp"]);
        assert_eq!(select_routable_port(Some(&ports)).key(), "3000/tcp");
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let ports = exposed(&["9090/tcp", "5432/tcp", "6379/tcp"]);
        assert_eq!(select_routable_port(Some(&ports)).key(), "5432/tcp");
    }

    #[test]
    fn test_udp_only_preference_is_not_matched() {
        // 80/udp must not satisfy the 80/tcp preference
        let ports = exposed(&["80/udp", "9090/tcp"]);
        assert_eq!(select_routable_port(Some(&ports)).key(), "80/udp");
    }

    #[test]
    fn test_port_spec_parse_key() {
        let spec = PortSpec::parse_key("8080/tcp").unwrap();
        assert_eq!(spec.container_port, 8080);
        assert_eq!(spec.protocol, "tcp");

        let bare = PortSpec::parse_key("443").unwrap();
        assert_eq!(bare.container_port, 443);
        assert_eq!(bare.protocol, "tcp");

        assert!(PortSpec::parse_key("nonsense/tcp").is_none());
    }

    #[test]
    fn test_container_state_parse() {
        assert_eq!(ContainerState::parse("running"), ContainerState::Running);
        assert_eq!(ContainerState::parse("exited"), ContainerState::Exited);
        assert_eq!(ContainerState::parse("created"), ContainerState::Created);
        assert_eq!(ContainerState::parse("paused"), ContainerState::Paused);
        assert_eq!(ContainerState::parse("restarting"), ContainerState::Unknown);
        assert_eq!(ContainerState::parse(""), ContainerState::Unknown);
    }

    #[test]
    fn test_default_container_name() {
        assert_eq!(default_container_name("nginx"), "nginx");
        assert_eq!(default_container_name("nginx:latest"), "nginx");
        assert_eq!(default_container_name("ghcr.io/acme/web-app:1.2"), "web-app");
        assert_eq!(
            default_container_name("redis@sha256:deadbeef"),
            "redis"
        );
        assert_eq!(default_container_name("My App"), "my-app");
        assert_eq!(default_container_name("::"), "app");
    }

    fn running_summary(name: &str, ports: Vec<Port>) -> ContainerSummary {
        ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec![format!("/{}", name)]),
            image: Some("nginx:latest".to_string()),
            status: Some("Up 2 hours".to_string()),
            state: Some("running".to_string()),
            created: Some(1_700_000_000),
            ports: Some(ports),
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_strips_leading_slash_from_name() {
        let snapshot = snapshot_from_summary(running_summary("my-app", vec![]));
        assert_eq!(snapshot.name, "my-app");
        assert_eq!(snapshot.id, "abc123");
        assert_eq!(snapshot.state, ContainerState::Running);
    }

    #[test]
    fn test_backend_address_prefers_published_port() {
        let ports = vec![Port {
            private_port: 80,
            public_port: Some(32768),
            typ: Some(PortTypeEnum::TCP),
            ..Default::default()
        }];
        let snapshot = snapshot_from_summary(running_summary("web", ports));
        assert_eq!(snapshot.backend_address.as_deref(), Some("127.0.0.1:32768"));
    }

    #[test]
    fn test_backend_address_falls_back_to_network_ip() {
        let mut summary = running_summary(
            "web",
            vec![Port {
                private_port: 8080,
                public_port: None,
                typ: Some(PortTypeEnum::TCP),
                ..Default::default()
            }],
        );
        let mut networks = HashMap::new();
        networks.insert(
            "bridge".to_string(),
            EndpointSettings {
                ip_address: Some("172.17.0.2".to_string()),
                ..Default::default()
            },
        );
        summary.network_settings = Some(ContainerSummaryNetworkSettings {
            networks: Some(networks),
        });

        let snapshot = snapshot_from_summary(summary);
        assert_eq!(snapshot.backend_address.as_deref(), Some("172.17.0.2:8080"));
    }

    #[test]
    fn test_snapshot_mapping_is_order_independent() {
        // Two listings of the same containers in different orders must map to
        // set-equal snapshots.
        let first = running_summary("web", vec![]);
        let mut second = running_summary("db", vec![]);
        second.id = Some("def456".to_string());

        let mut forward: Vec<ContainerSnapshot> = vec![first.clone(), second.clone()]
            .into_iter()
            .map(snapshot_from_summary)
            .collect();
        let mut reverse: Vec<ContainerSnapshot> = vec![second, first]
            .into_iter()
            .map(snapshot_from_summary)
            .collect();

        forward.sort_by(|a, b| a.id.cmp(&b.id));
        reverse.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_required_policy_fails_on_probe_timeout() {
        let err = readiness_failure(ReadinessPolicy::Required, "abc123".to_string()).unwrap_err();
        assert!(matches!(err, Error::ReadinessTimeout { id } if id == "abc123"));
    }

    #[test]
    fn test_best_effort_policy_tolerates_probe_timeout() {
        assert!(readiness_failure(ReadinessPolicy::BestEffort, "abc123".to_string()).is_ok());
    }

    #[test]
    fn test_stop_acknowledges_already_stopped() {
        assert!(stop_outcome("abc123", Ok(())).is_ok());

        let already_stopped = bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            message: "container already stopped".to_string(),
        };
        assert!(stop_outcome("abc123", Err(already_stopped)).is_ok());
    }

    #[test]
    fn test_stop_unknown_id_is_an_error() {
        let not_found = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: abc123".to_string(),
        };
        let err = stop_outcome("abc123", Err(not_found)).unwrap_err();
        assert!(matches!(err, Error::ContainerStop { id, .. } if id == "abc123"));
    }

    #[tokio::test]
    async fn test_probe_succeeds_against_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let readiness = ReadinessConfig {
            attempts: 5,
            interval_ms: 100,
            policy: ReadinessPolicy::BestEffort,
        };
        assert!(probe_port(port, &readiness).await);
    }

    #[tokio::test]
    async fn test_probe_budget_is_attempts_times_interval() {
        // Bind then drop to get a local port that refuses connections
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let readiness = ReadinessConfig {
            attempts: 3,
            interval_ms: 50,
            policy: ReadinessPolicy::BestEffort,
        };

        let started = std::time::Instant::now();
        assert!(!probe_port(port, &readiness).await);

        // Fast-refused attempts still occupy exactly one slot each, so the
        // whole loop stays close to 3 x 50ms, not double it.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(400), "{:?}", elapsed);
    }

    #[test]
    fn test_exited_container_has_no_backend_address() {
        let mut summary = running_summary(
            "web",
            vec![Port {
                private_port: 80,
                public_port: Some(32768),
                typ: Some(PortTypeEnum::TCP),
                ..Default::default()
            }],
        );
        summary.state = Some("exited".to_string());
        summary.status = Some("Exited (0) 5 minutes ago".to_string());

        let snapshot = snapshot_from_summary(summary);
        assert_eq!(snapshot.state, ContainerState::Exited);
        assert!(snapshot.backend_address.is_none());
    }
}
