use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use uuid::Uuid;

use crate::db::instance::{CreateInstanceRequest, Instance};
use crate::db::manager::InstanceManager;
use crate::error::Result;

use super::response::{create_sse_response, log_event_to_sse};

pub struct AppState {
    pub manager: Arc<InstanceManager>,
    pub log_tail: u64,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStringResponse {
    pub connection_string: String,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub tail: Option<u64>,
}

pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<Instance>)> {
    let instance = state.manager.create_instance(request).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

pub async fn list_instances(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Instance>>> {
    let instances = state.manager.list_instances().await?;
    Ok(Json(instances))
}

pub async fn get_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Instance>> {
    let instance = state.manager.get_instance(id).await?;
    Ok(Json(instance))
}

pub async fn delete_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.manager.delete_instance(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Instance>> {
    let instance = state.manager.start_instance(id).await?;
    Ok(Json(instance))
}

pub async fn stop_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Instance>> {
    let instance = state.manager.stop_instance(id).await?;
    Ok(Json(instance))
}

pub async fn restart_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Instance>> {
    let instance = state.manager.restart_instance(id).await?;
    Ok(Json(instance))
}

pub async fn connection_string(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConnectionStringResponse>> {
    let connection_string = state.manager.connection_string(id).await?;
    Ok(Json(ConnectionStringResponse { connection_string }))
}

/// Tail an instance's container logs as an SSE stream
pub async fn stream_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> Result<Response> {
    let instance = state.manager.get_instance(id).await?;
    let container_name = instance.container_name();
    let tail = query.tail.unwrap_or(state.log_tail);

    let (tx, rx) = mpsc::channel(64);
    let docker = state.manager.docker();

    tokio::spawn(async move {
        if let Err(e) = docker.stream_logs(&container_name, tail, tx).await {
            warn!("Log stream for {} ended with error: {}", container_name, e);
        }
    });

    Ok(create_sse_response(ReceiverStream::new(rx), log_event_to_sse).into_response())
}
