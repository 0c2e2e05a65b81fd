use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Global configuration for the control plane
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Gateway server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Container engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Readiness probe configuration
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port for the gateway (default: 3000)
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Docker daemon endpoint, e.g. "unix:///var/run/docker.sock" or "tcp://host:2375".
    /// Falls back to DOCKER_HOST and then well-known socket paths when unset.
    pub docker_host: Option<String>,

    /// Grace period for container stop before the engine force-kills (default: 10)
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
}

/// What to do when the post-start readiness probe never succeeds
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessPolicy {
    /// Return the container id even if the probe times out (warm-up only)
    #[default]
    BestEffort,
    /// Fail the deployment when the probe times out
    Required,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReadinessConfig {
    /// Maximum number of TCP connect attempts (default: 20)
    #[serde(default = "default_probe_attempts")]
    pub attempts: u32,

    /// Interval between attempts in milliseconds (default: 500)
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,

    /// Probe outcome policy (default: best-effort)
    #[serde(default)]
    pub policy: ReadinessPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_listen_port(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            docker_host: None,
            stop_grace_secs: default_stop_grace_secs(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: default_probe_attempts(),
            interval_ms: default_probe_interval_ms(),
            policy: ReadinessPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error; built-in defaults apply.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    3000
}

fn default_stop_grace_secs() -> u64 {
    10
}

fn default_probe_attempts() -> u32 {
    20
}

fn default_probe_interval_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.engine.stop_grace(), Duration::from_secs(10));
        assert_eq!(config.readiness.attempts, 20);
        assert_eq!(config.readiness.interval(), Duration::from_millis(500));
        assert_eq!(config.readiness.policy, ReadinessPolicy::BestEffort);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            bind = "127.0.0.1"
            port = 8088

            [engine]
            docker_host = "unix:///var/run/docker.sock"
            stop_grace_secs = 5

            [readiness]
            attempts = 10
            interval_ms = 250
            policy = "required"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8088);
        assert_eq!(
            config.engine.docker_host.as_deref(),
            Some("unix:///var/run/docker.sock")
        );
        assert_eq!(config.engine.stop_grace_secs, 5);
        assert_eq!(config.readiness.attempts, 10);
        assert_eq!(config.readiness.policy, ReadinessPolicy::Required);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let toml = r#"
            [server]
            port = 9090
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.readiness.attempts, 20);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/lightship.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
