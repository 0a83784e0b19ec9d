use std::process::Command;
use std::time::Duration;

use crate::error::{RagError, RagResult};

const QDRANT_CONTAINER_NAME: &str = "pdf-rag-qdrant";
const QDRANT_IMAGE: &str = "qdrant/qdrant";
const HEALTH_ENDPOINT: &str = "http://localhost:6333/collections";
const HEALTH_RETRIES: u32 = 10;

/// Makes sure a local Qdrant container is running and answering on 6333/6334.
pub async fn ensure_qdrant_via_docker() -> RagResult<()> {
    tokio::task::spawn_blocking(ensure_qdrant_sync)
        .await
        .map_err(|e| RagError::VectorStore(format!("Failed to execute blocking task: {}", e)))?
}

fn docker(args: &[&str]) -> RagResult<std::process::Output> {
    let output = Command::new("docker")
        .args(args)
        .output()
        .map_err(|e| RagError::VectorStore(format!("Failed to execute docker {}: {}", args[0], e)))?;
    if !output.status.success() {
        return Err(RagError::VectorStore(format!(
            "docker {} failed: {}",
            args[0],
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output)
}

fn ensure_qdrant_sync() -> RagResult<()> {
    docker(&["--version"])?;

    let filter = format!("name={}", QDRANT_CONTAINER_NAME);
    let ps = docker(&["ps", "-a", "--filter", &filter, "--format", "{{.Status}}"])?;
    let status = String::from_utf8_lossy(&ps.stdout).to_string();
    log::debug!("docker ps output: {}", status.trim());

    match container_state(&status) {
        ContainerState::Running => {
            log::info!("Qdrant container '{}' is already running.", QDRANT_CONTAINER_NAME);
        }
        ContainerState::Stopped => {
            log::info!("Starting existing Qdrant container '{}'...", QDRANT_CONTAINER_NAME);
            docker(&["start", QDRANT_CONTAINER_NAME])?;
        }
        ContainerState::Missing => {
            log::info!("Creating Qdrant container '{}'...", QDRANT_CONTAINER_NAME);
            docker(&[
                "run",
                "-d",
                "--name",
                QDRANT_CONTAINER_NAME,
                "-p",
                "6333:6333",
                "-p",
                "6334:6334",
                QDRANT_IMAGE,
            ])?;
        }
    }

    for attempt in 1..=HEALTH_RETRIES {
        match ureq::get(HEALTH_ENDPOINT).timeout(Duration::from_secs(2)).call() {
            Ok(resp) if resp.status() == 200 => {
                log::info!("Qdrant is up.");
                return Ok(());
            }
            Ok(resp) => log::warn!(
                "Qdrant health check returned {} (attempt {}/{})",
                resp.status(),
                attempt,
                HEALTH_RETRIES
            ),
            Err(e) => log::warn!(
                "Qdrant health check failed: {} (attempt {}/{})",
                e,
                attempt,
                HEALTH_RETRIES
            ),
        }
        std::thread::sleep(Duration::from_secs(3));
    }
    Err(RagError::VectorStore(
        "Qdrant did not become healthy; check the container logs".to_string(),
    ))
}

#[derive(Debug, PartialEq, Eq)]
enum ContainerState {
    Running,
    Stopped,
    Missing,
}

fn container_state(ps_status: &str) -> ContainerState {
    let status = ps_status.trim();
    if status.is_empty() {
        ContainerState::Missing
    } else if status.lines().any(|l| l.starts_with("Up")) {
        ContainerState::Running
    } else {
        ContainerState::Stopped
    }
}
