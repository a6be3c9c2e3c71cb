use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::config::Config;
use crate::db::manager::InstanceManager;
use crate::docker::{DockerHubClient, DockerManager};

use super::health::{health_check, HealthState};
use super::images::{get_image_tags, list_supported_images, pull_image, ImagesState};
use super::instances::{
    connection_string, create_instance, delete_instance, get_instance, list_instances,
    restart_instance, start_instance, stop_instance, stream_logs, AppState,
};
use super::ports::{next_port, occupied_ports, PortsState};

pub fn create_router(
    manager: Arc<InstanceManager>,
    docker: Arc<DockerManager>,
    config: &Config,
) -> Router {
    let app_state = Arc::new(AppState {
        manager: manager.clone(),
        log_tail: config.log_tail,
    });

    let images_state = Arc::new(ImagesState {
        hub: DockerHubClient::new(config.hub_timeout, config.hub_page_size),
        docker: docker.clone(),
    });

    let ports_state = Arc::new(PortsState {
        docker: docker.clone(),
    });

    let health_state = Arc::new(HealthState { docker });

    let instance_routes = Router::new()
        .route("/", post(create_instance))
        .route("/", get(list_instances))
        .route("/{id}", get(get_instance))
        .route("/{id}", delete(delete_instance))
        .route("/{id}/start", post(start_instance))
        .route("/{id}/stop", post(stop_instance))
        .route("/{id}/restart", post(restart_instance))
        .route("/{id}/connection-string", get(connection_string))
        .route("/{id}/logs", get(stream_logs))
        .with_state(app_state);

    let image_routes = Router::new()
        .route("/", get(list_supported_images))
        .route("/{id}/tags", get(get_image_tags))
        .route("/pull", post(pull_image))
        .with_state(images_state);

    let port_routes = Router::new()
        .route("/occupied", get(occupied_ports))
        .route("/next", get(next_port))
        .with_state(ports_state);

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .with_state(health_state);

    Router::new()
        .nest("/instances", instance_routes)
        .nest("/images", image_routes)
        .nest("/ports", port_routes)
        .merge(health_routes)
}
