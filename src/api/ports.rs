use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::catalog::DatabaseType;
use crate::db::ports::allocate_port;
use crate::docker::DockerManager;
use crate::error::Result;

pub struct PortsState {
    pub docker: Arc<DockerManager>,
}

#[derive(Debug, Deserialize)]
pub struct NextPortQuery {
    pub database_type: DatabaseType,
    #[serde(default)]
    pub preferred: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct NextPortResponse {
    pub port: u16,
}

/// Host ports currently published by running containers
pub async fn occupied_ports(State(state): State<Arc<PortsState>>) -> Result<Json<Vec<u16>>> {
    let ports = state.docker.occupied_ports().await?;
    Ok(Json(ports))
}

/// The port a new instance of the given type would receive
pub async fn next_port(
    State(state): State<Arc<PortsState>>,
    Query(query): Query<NextPortQuery>,
) -> Result<Json<NextPortResponse>> {
    let occupied = state.docker.occupied_ports().await?;
    let port = allocate_port(query.database_type, query.preferred, &occupied)?;
    Ok(Json(NextPortResponse { port }))
}
