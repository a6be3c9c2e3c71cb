use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::db::catalog::{get_supported_image, SupportedImage, SUPPORTED_IMAGES};
use crate::docker::hub::ImageTag;
use crate::docker::{DockerHubClient, DockerManager};
use crate::error::Result;

use super::response::{create_sse_response, pull_event_to_sse};

pub struct ImagesState {
    pub hub: DockerHubClient,
    pub docker: Arc<DockerManager>,
}

#[derive(Debug, Deserialize)]
pub struct PullImageRequest {
    pub image: String,
    #[serde(default)]
    pub tag: Option<String>,
}

/// The supported image catalog
pub async fn list_supported_images() -> Json<Vec<SupportedImage>> {
    Json(SUPPORTED_IMAGES.to_vec())
}

/// All Docker Hub tags for a catalog image
pub async fn get_image_tags(
    State(state): State<Arc<ImagesState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ImageTag>>> {
    let image = get_supported_image(&id)?;
    let tags = state.hub.get_all_tags(&image.hub_name).await?;
    Ok(Json(tags))
}

/// Pull an image, streaming progress as SSE
pub async fn pull_image(
    State(state): State<Arc<ImagesState>>,
    Json(request): Json<PullImageRequest>,
) -> Result<Response> {
    let tag = request.tag.as_deref().unwrap_or("latest");
    let image_ref = format!("{}:{}", request.image, tag);

    let (tx, rx) = mpsc::channel(64);
    let docker = state.docker.clone();

    tokio::spawn(async move {
        if let Err(e) = docker.pull_image_with_progress(&image_ref, tx).await {
            warn!("Image pull failed: {}", e);
        }
    });

    Ok(create_sse_response(ReceiverStream::new(rx), pull_event_to_sse).into_response())
}
