//! Source-based image builds
//!
//! Clones a git repository into a temporary directory and builds a Docker
//! image from the Dockerfile at its root. A blocking collaborator for the
//! deployment path; build output is surfaced through logging only.

use crate::error::Error;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Image name used when a source deployment does not name one
pub const DEFAULT_BUILT_IMAGE: &str = "lightship-built-image";

/// Number of trailing output lines kept for build error reporting
const ERROR_TAIL_LINES: usize = 20;

/// Builds container images from remote source repositories
pub struct ImageBuilder {
    docker_path: String,
}

impl ImageBuilder {
    pub async fn new() -> anyhow::Result<Self> {
        let docker_path = find_docker_cli().await?;
        Ok(Self { docker_path })
    }

    /// Clone `repo_url` and build it into an image tagged `image_name`.
    ///
    /// The repository must carry a Dockerfile at its root. Returns the image
    /// name on success so the caller can hand it to the orchestrator.
    pub async fn build(&self, repo_url: &str, image_name: &str) -> Result<String, Error> {
        if repo_url.trim().is_empty() {
            return Err(Error::Validation("repo_url is required".to_string()));
        }
        if image_name.trim().is_empty() {
            return Err(Error::Validation("image name is required".to_string()));
        }

        let workdir = tempfile::Builder::new()
            .prefix("lightship-build-")
            .tempdir()
            .map_err(|e| Error::Build {
                repo_url: repo_url.to_string(),
                detail: format!("failed to create build directory: {}", e),
            })?;

        info!(repo_url, path = %workdir.path().display(), "Cloning repository");
        self.clone_repo(repo_url, workdir.path()).await?;

        if !workdir.path().join("Dockerfile").exists() {
            return Err(Error::Build {
                repo_url: repo_url.to_string(),
                detail: "repository has no Dockerfile at its root".to_string(),
            });
        }

        info!(image = image_name, "Building image");
        let mut command = Command::new(&self.docker_path);
        command
            .args(["build", "-t", image_name, "."])
            .current_dir(workdir.path());

        match run_streamed(command, "docker build").await {
            Ok(_) => {
                info!(image = image_name, "Image built");
                Ok(image_name.to_string())
            }
            Err(detail) => Err(Error::Build {
                repo_url: repo_url.to_string(),
                detail,
            }),
        }
    }

    /// Shallow clone for speed; build history is irrelevant here
    async fn clone_repo(&self, repo_url: &str, dest: &Path) -> Result<(), Error> {
        let output = Command::new("git")
            .args(["clone", "--depth", "1", repo_url])
            .arg(dest)
            .output()
            .await
            .map_err(|e| Error::Build {
                repo_url: repo_url.to_string(),
                detail: format!("failed to run git: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Build {
                repo_url: repo_url.to_string(),
                detail: format!("git clone failed: {}", stderr.trim()),
            });
        }

        Ok(())
    }
}

/// Find the docker CLI binary
async fn find_docker_cli() -> anyhow::Result<String> {
    let paths = [
        "docker",
        "/usr/bin/docker",
        "/usr/local/bin/docker",
        "/opt/homebrew/bin/docker",
    ];

    for path in paths {
        if let Ok(output) = Command::new(path)
            .args(["version", "--format", "{{.Client.Version}}"])
            .output()
            .await
        {
            if output.status.success() {
                let version = String::from_utf8_lossy(&output.stdout);
                info!(path, version = version.trim(), "Found Docker CLI");
                return Ok(path.to_string());
            }
        }
    }

    anyhow::bail!(
        "Docker CLI not found. Install Docker Engine or Docker Desktop, \
         or put 'docker' on the PATH."
    )
}

/// Run a command, streaming its output through logging line by line.
///
/// On failure, returns the tail of the combined output as the error detail.
async fn run_streamed(mut command: Command, label: &'static str) -> Result<(), String> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| format!("failed to spawn {}: {}", label, e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| format!("{}: stdout pipe missing", label))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| format!("{}: stderr pipe missing", label))?;

    let (mut lines, err_lines) = tokio::join!(
        read_lines(stdout, label, "stdout"),
        read_lines(stderr, label, "stderr")
    );
    lines.extend(err_lines);

    let status = child
        .wait()
        .await
        .map_err(|e| format!("failed to wait for {}: {}", label, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(format!(
            "{} exited with {}: {}",
            label,
            status,
            output_tail(&lines)
        ))
    }
}

async fn read_lines<R: AsyncRead + Unpin>(
    reader: R,
    label: &'static str,
    stream: &'static str,
) -> Vec<String> {
    let mut lines = BufReader::new(reader).lines();
    let mut collected = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "build", label, stream, "{}", line);
        collected.push(line);
    }

    collected
}

fn output_tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_tail_keeps_last_lines() {
        let lines: Vec<String> = (0..30).map(|i| format!("line {}", i)).collect();
        let tail = output_tail(&lines);

        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[test]
    fn test_output_tail_short_output() {
        let lines = vec!["only line".to_string()];
        assert_eq!(output_tail(&lines), "only line");
        assert_eq!(output_tail(&[]), "");
    }
}
