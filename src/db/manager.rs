use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::docker::DockerManager;
use crate::error::{AppError, Result};
use crate::storage::MetadataStore;

use super::instance::{CreateInstanceRequest, Instance, InstanceStatus};
use super::ports::allocate_port;

pub struct InstanceManager {
    /// In-memory cache for fast access
    instances: Arc<RwLock<HashMap<Uuid, Instance>>>,
    /// Persistent metadata store (SQLite)
    metadata: Arc<MetadataStore>,
    docker: Arc<DockerManager>,
    config: Config,
}

impl InstanceManager {
    pub fn new(docker: Arc<DockerManager>, metadata: MetadataStore, config: Config) -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            metadata: Arc::new(metadata),
            docker,
            config,
        }
    }

    pub fn docker(&self) -> Arc<DockerManager> {
        self.docker.clone()
    }

    /// Provision a new database instance.
    ///
    /// The container is created cold; `start_instance` brings it up. A
    /// failure after the metadata row exists leaves the instance in the
    /// Error state rather than silently dropping it.
    pub async fn create_instance(&self, request: CreateInstanceRequest) -> Result<Instance> {
        if self.metadata.get_instance_by_name(&request.name)?.is_some() {
            return Err(AppError::NameConflict(request.name));
        }

        let occupied = self.docker.occupied_ports().await?;
        let port = allocate_port(request.database_type, request.port, &occupied)?;

        let mut instance = Instance::new(
            request.name,
            request.database_type,
            request.image,
            request.tag,
            port,
            request.password,
        );

        // Per-instance volume directory on the host
        let volume_dir = self.config.volume_root.join(instance.id.to_string());
        std::fs::create_dir_all(&volume_dir)
            .map_err(|e| AppError::Storage(format!("Failed to create volume directory: {}", e)))?;
        instance.volume_path = Some(volume_dir.to_string_lossy().into_owned());

        info!(
            "Creating {} instance '{}' ({}) on port {}",
            instance.database_type, instance.name, instance.id, instance.port
        );

        self.metadata.insert_instance(&instance)?;
        {
            let mut instances = self.instances.write().await;
            instances.insert(instance.id, instance.clone());
        }

        let volume_path = instance.volume_path.clone().unwrap_or_default();
        match self
            .docker
            .create_instance_container(&instance, &volume_path)
            .await
        {
            Ok(container_id) => {
                debug!(
                    "Container {} created for instance {}",
                    container_id, instance.id
                );
                instance.status = InstanceStatus::Stopped;
            }
            Err(e) => {
                warn!("Failed to create container for {}: {}", instance.id, e);
                instance.status = InstanceStatus::Error;
                if let Err(pe) = self.persist(&instance).await {
                    warn!("Failed to record error state for {}: {}", instance.id, pe);
                }
                return Err(e);
            }
        }

        self.persist(&instance).await?;
        Ok(instance)
    }

    /// Fetch an instance with its status refreshed from the daemon
    pub async fn get_instance(&self, id: Uuid) -> Result<Instance> {
        let instance = {
            let instances = self.instances.read().await;
            instances.get(&id).cloned()
        };

        let mut instance = match instance {
            Some(i) => i,
            None => self
                .metadata
                .get_instance(id)?
                .ok_or(AppError::InstanceNotFound)?,
        };

        self.refresh_status(&mut instance).await?;
        Ok(instance)
    }

    /// All known instances with refreshed statuses
    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        let mut instances = self.metadata.list_instances()?;
        for instance in &mut instances {
            self.refresh_status(instance).await?;
        }
        Ok(instances)
    }

    pub async fn start_instance(&self, id: Uuid) -> Result<Instance> {
        let mut instance = self.get_instance(id).await?;
        self.docker.start_container(&instance.container_name()).await?;
        self.refresh_status(&mut instance).await?;
        Ok(instance)
    }

    pub async fn stop_instance(&self, id: Uuid) -> Result<Instance> {
        let mut instance = self.get_instance(id).await?;
        self.docker
            .stop_container(
                &instance.container_name(),
                self.config.stop_timeout.as_secs() as i64,
            )
            .await?;
        self.refresh_status(&mut instance).await?;
        Ok(instance)
    }

    pub async fn restart_instance(&self, id: Uuid) -> Result<Instance> {
        let mut instance = self.get_instance(id).await?;
        self.docker
            .restart_container(
                &instance.container_name(),
                self.config.stop_timeout.as_secs() as isize,
            )
            .await?;
        self.refresh_status(&mut instance).await?;
        Ok(instance)
    }

    /// Destroy an instance: container, volume directory, and metadata
    pub async fn delete_instance(&self, id: Uuid) -> Result<()> {
        let instance = self
            .metadata
            .get_instance(id)?
            .ok_or(AppError::InstanceNotFound)?;

        let container_name = instance.container_name();
        if self.docker.container_exists(&container_name).await {
            self.docker.remove_container(&container_name).await?;
        }

        if let Some(volume_path) = &instance.volume_path {
            if let Err(e) = std::fs::remove_dir_all(volume_path) {
                // Volume removal is best effort; the metadata row still goes
                warn!("Failed to remove volume directory {}: {}", volume_path, e);
            }
        }

        self.metadata.delete_instance(id)?;
        {
            let mut instances = self.instances.write().await;
            instances.remove(&id);
        }

        info!("Deleted instance {}", id);
        Ok(())
    }

    /// Connection URI for an instance
    pub async fn connection_string(&self, id: Uuid) -> Result<String> {
        let instance = self.get_instance(id).await?;
        Ok(instance.connection_string())
    }

    /// Reconcile stored instances with the Docker daemon on startup.
    /// Returns the number of instances whose containers are still present.
    pub async fn recover_existing_instances(&self) -> Result<usize> {
        let stored = self.metadata.list_instances()?;
        let mut recovered = 0;

        for mut instance in stored {
            let container_name = instance.container_name();
            if self.docker.container_exists(&container_name).await {
                self.refresh_status(&mut instance).await?;
                info!(
                    "Recovered instance {} ({}) on port {}",
                    instance.id, instance.database_type, instance.port
                );
                let mut instances = self.instances.write().await;
                instances.insert(instance.id, instance);
                recovered += 1;
            } else {
                warn!(
                    "Container for instance {} is gone, marking as error",
                    instance.id
                );
                self.metadata
                    .update_status(instance.id, InstanceStatus::Error)?;
            }
        }

        // Surface managed containers nobody tracks; they are left alone
        let managed = self.docker.list_managed_containers().await?;
        for (name, id) in managed {
            let known = Uuid::parse_str(&id)
                .ok()
                .and_then(|uuid| self.metadata.get_instance(uuid).ok().flatten())
                .is_some();
            if !known {
                warn!("Found untracked managed container: {} ({})", name, id);
            }
        }

        Ok(recovered)
    }

    /// Pull the live container state into the instance, persisting changes.
    /// A missing container maps to the Error status.
    async fn refresh_status(&self, instance: &mut Instance) -> Result<()> {
        let status = match self
            .docker
            .instance_status(&instance.container_name())
            .await
        {
            Ok(status) => status,
            Err(AppError::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            })) => InstanceStatus::Error,
            Err(e) => return Err(e),
        };

        if status != instance.status {
            instance.status = status;
            self.persist(instance).await?;
        }

        Ok(())
    }

    async fn persist(&self, instance: &Instance) -> Result<()> {
        self.metadata.update_instance(instance)?;
        let mut instances = self.instances.write().await;
        instances.insert(instance.id, instance.clone());
        Ok(())
    }
}
