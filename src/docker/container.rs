use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerState, HostConfig, PortBinding};
use bollard::Docker;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::db::instance::{Instance, InstanceStatus};
use crate::error::{AppError, Result};

pub const MANAGED_LABEL: &str = "ldb.managed";
pub const ID_LABEL: &str = "ldb.id";
pub const TYPE_LABEL: &str = "ldb.database_type";

pub struct DockerManager {
    docker: Docker,
}

/// Progress event emitted while an image layer is being downloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullProgress {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetail {
    pub current: Option<i64>,
    pub total: Option<i64>,
}

/// Event stream of an image pull: layer progress, then one terminal event
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PullEvent {
    Progress(PullProgress),
    Error { message: String },
    Complete { image: String },
}

/// Event emitted while tailing container logs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum LogEvent {
    StdOut { message: String },
    StdErr { message: String },
    Error { message: String },
    Eof,
}

/// Map a container state reported by the daemon to an instance status
fn state_to_status(state: &ContainerState) -> InstanceStatus {
    if state.running == Some(true) {
        InstanceStatus::Running
    } else if state.restarting == Some(true) {
        InstanceStatus::Creating
    } else if state.error.as_deref().is_some_and(|e| !e.is_empty()) {
        InstanceStatus::Error
    } else {
        InstanceStatus::Stopped
    }
}

impl DockerManager {
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.docker.ping().await?;
        Ok(true)
    }

    /// Pull an image, discarding progress detail
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        info!("Pulling image: {}", image);

        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(AppError::ImagePullFailed(e.to_string()));
                }
            }
        }

        info!("Image pulled successfully: {}", image);
        Ok(())
    }

    /// Pull an image and forward each layer update as a `PullEvent`.
    ///
    /// The receiver side decides the transport (SSE in the API layer). The
    /// stream always ends with `Complete` or `Error`. A send failure means
    /// the client went away, which stops the forwarding but not the pull
    /// already in flight on the daemon.
    pub async fn pull_image_with_progress(
        &self,
        image: &str,
        tx: mpsc::Sender<PullEvent>,
    ) -> Result<()> {
        info!("Pulling image with progress: {}", image);

        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    let progress = PullProgress {
                        id: info.id.unwrap_or_default(),
                        status: info.status.unwrap_or_default(),
                        progress: info.progress_detail.as_ref().map(|pd| {
                            format!("{}/{}", pd.current.unwrap_or(0), pd.total.unwrap_or(0))
                        }),
                        progress_detail: info.progress_detail.map(|pd| ProgressDetail {
                            current: pd.current,
                            total: pd.total,
                        }),
                    };

                    if tx.send(PullEvent::Progress(progress)).await.is_err() {
                        debug!("Pull progress receiver dropped, stopping forwarding");
                        return Ok(());
                    }
                }
                Err(e) => {
                    let _ = tx
                        .send(PullEvent::Error {
                            message: format!("Pull failed: {}", e),
                        })
                        .await;
                    return Err(AppError::ImagePullFailed(e.to_string()));
                }
            }
        }

        let _ = tx
            .send(PullEvent::Complete {
                image: image.to_string(),
            })
            .await;

        info!("Image pulled successfully: {}", image);
        Ok(())
    }

    /// Create (but do not start) the container backing an instance.
    /// Returns the container id.
    pub async fn create_instance_container(
        &self,
        instance: &Instance,
        volume_host_path: &str,
    ) -> Result<String> {
        let container_name = instance.container_name();
        let image = instance.image_ref();

        // Check if image exists locally, pull if not
        if self.docker.inspect_image(&image).await.is_err() {
            self.pull_image(&image).await?;
        }

        let env: Vec<String> = instance
            .database_type
            .env_vars(&instance.root_password)
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let container_port = instance.database_type.default_port();
        let port_key = format!("{}/tcp", container_port);
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            port_key.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(instance.port.to_string()),
            }]),
        );

        let volume_bind = format!("{}:{}", volume_host_path, instance.database_type.data_dir());

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            binds: Some(vec![volume_bind]),
            ..Default::default()
        };

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(port_key.clone(), HashMap::new());

        // Labels allow reconciling containers with metadata after a restart
        let mut labels = HashMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(ID_LABEL.to_string(), instance.id.to_string());
        labels.insert(
            TYPE_LABEL.to_string(),
            instance.database_type.as_str().to_string(),
        );

        let config = Config {
            image: Some(image),
            env: if env.is_empty() { None } else { Some(env) },
            cmd: instance.database_type.command(&instance.root_password),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            labels: Some(labels),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: &container_name,
            platform: None,
        };

        let response = self.docker.create_container(Some(options), config).await?;
        let container_id = response.id;

        info!("Created container: {} ({})", container_name, container_id);

        Ok(container_id)
    }

    pub async fn start_container(&self, container_name: &str) -> Result<()> {
        info!("Starting container: {}", container_name);

        self.docker
            .start_container(container_name, None::<StartContainerOptions<String>>)
            .await?;

        Ok(())
    }

    pub async fn stop_container(&self, container_name: &str, timeout_secs: i64) -> Result<()> {
        info!("Stopping container: {}", container_name);

        let options = StopContainerOptions { t: timeout_secs };

        match self
            .docker
            .stop_container(container_name, Some(options))
            .await
        {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                // Container already stopped
                warn!("Container {} was already stopped", container_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn restart_container(&self, container_name: &str, timeout_secs: isize) -> Result<()> {
        info!("Restarting container: {}", container_name);

        let options = RestartContainerOptions { t: timeout_secs };

        self.docker
            .restart_container(container_name, Some(options))
            .await?;

        Ok(())
    }

    pub async fn remove_container(&self, container_name: &str) -> Result<()> {
        info!("Removing container: {}", container_name);

        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        self.docker
            .remove_container(container_name, Some(options))
            .await?;

        Ok(())
    }

    /// Check if a container exists (running or not)
    pub async fn container_exists(&self, container_name: &str) -> bool {
        self.docker
            .inspect_container(container_name, None)
            .await
            .is_ok()
    }

    /// Current status of an instance's container
    pub async fn instance_status(&self, container_name: &str) -> Result<InstanceStatus> {
        let inspect = self.docker.inspect_container(container_name, None).await?;
        let state = inspect
            .state
            .ok_or_else(|| AppError::Internal("No container state found".to_string()))?;
        Ok(state_to_status(&state))
    }

    /// Host ports published by running containers, sorted and deduplicated
    pub async fn occupied_ports(&self) -> Result<Vec<u16>> {
        let options = Some(ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await?;

        let mut occupied: Vec<u16> = Vec::new();
        for container in containers {
            if let Some(ports) = container.ports {
                for port in ports {
                    if let Some(public_port) = port.public_port {
                        if !occupied.contains(&public_port) {
                            occupied.push(public_port);
                        }
                    }
                }
            }
        }

        occupied.sort_unstable();
        Ok(occupied)
    }

    /// Instance ids of all managed containers, keyed by container name
    pub async fn list_managed_containers(&self) -> Result<HashMap<String, String>> {
        let mut filters = HashMap::new();
        filters.insert("label", vec!["ldb.managed=true"]);

        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;
        let mut result = HashMap::new();

        for container in containers {
            let name = container
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default();

            let id = container
                .labels
                .as_ref()
                .and_then(|l| l.get(ID_LABEL))
                .cloned()
                .unwrap_or_default();

            if !name.is_empty() {
                result.insert(name, id);
            }
        }

        Ok(result)
    }

    /// Tail container logs and forward them as `LogEvent`s until the stream
    /// ends or the receiver goes away. Always terminated by `LogEvent::Eof`.
    pub async fn stream_logs(
        &self,
        container_name: &str,
        tail: u64,
        tx: mpsc::Sender<LogEvent>,
    ) -> Result<()> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            tail: tail.to_string(),
            timestamps: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(container_name, Some(options));

        while let Some(result) = stream.next().await {
            let event = match result {
                Ok(LogOutput::StdOut { message }) => LogEvent::StdOut {
                    message: String::from_utf8_lossy(&message).to_string(),
                },
                Ok(LogOutput::StdErr { message }) => LogEvent::StdErr {
                    message: String::from_utf8_lossy(&message).to_string(),
                },
                Ok(_) => continue,
                Err(e) => {
                    let _ = tx
                        .send(LogEvent::Error {
                            message: format!("Stream error: {}", e),
                        })
                        .await;
                    break;
                }
            };

            if tx.send(event).await.is_err() {
                debug!("Log receiver dropped, stopping stream");
                return Ok(());
            }
        }

        let _ = tx.send(LogEvent::Eof).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(running: bool, restarting: bool, error: Option<&str>) -> ContainerState {
        ContainerState {
            running: Some(running),
            restarting: Some(restarting),
            error: error.map(|e| e.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn running_state_maps_to_running() {
        assert_eq!(
            state_to_status(&state(true, false, None)),
            InstanceStatus::Running
        );
    }

    #[test]
    fn restarting_state_maps_to_creating() {
        assert_eq!(
            state_to_status(&state(false, true, None)),
            InstanceStatus::Creating
        );
    }

    #[test]
    fn daemon_error_maps_to_error() {
        assert_eq!(
            state_to_status(&state(false, false, Some("oom"))),
            InstanceStatus::Error
        );
        // Empty error string is not an error
        assert_eq!(
            state_to_status(&state(false, false, Some(""))),
            InstanceStatus::Stopped
        );
    }

    #[test]
    fn idle_state_maps_to_stopped() {
        assert_eq!(
            state_to_status(&state(false, false, None)),
            InstanceStatus::Stopped
        );
    }

    #[test]
    fn pull_progress_serializes_optional_fields_sparsely() {
        let progress = PullProgress {
            id: "abc123".to_string(),
            status: "Downloading".to_string(),
            progress: None,
            progress_detail: None,
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert!(json.get("progress").is_none());
        assert!(json.get("progress_detail").is_none());

        let progress = PullProgress {
            id: "abc123".to_string(),
            status: "Downloading".to_string(),
            progress: Some("10/100".to_string()),
            progress_detail: Some(ProgressDetail {
                current: Some(10),
                total: Some(100),
            }),
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["progress_detail"]["current"], 10);
        assert_eq!(json["progress_detail"]["total"], 100);
    }

    #[test]
    fn pull_events_are_tagged_by_type() {
        let json = serde_json::to_value(PullEvent::Complete {
            image: "redis:7".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["data"]["image"], "redis:7");

        let json = serde_json::to_value(PullEvent::Progress(PullProgress {
            id: "layer1".to_string(),
            status: "Extracting".to_string(),
            progress: None,
            progress_detail: None,
        }))
        .unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["data"]["id"], "layer1");
    }

    #[test]
    fn log_events_are_tagged_by_type() {
        let json = serde_json::to_value(LogEvent::StdOut {
            message: "ready".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "StdOut");
        assert_eq!(json["data"]["message"], "ready");

        let json = serde_json::to_value(LogEvent::Eof).unwrap();
        assert_eq!(json["type"], "Eof");
    }
}
