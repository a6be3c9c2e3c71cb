use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database instance not found")]
    InstanceNotFound,

    #[error("An instance named '{0}' already exists")]
    NameConflict(String),

    #[error("Unsupported image: {0}")]
    ImageUnsupported(String),

    #[error("Failed to pull Docker image: {0}")]
    ImagePullFailed(String),

    #[error("No available ports found")]
    NoFreePort,

    #[error("Docker Hub API error: {0}")]
    HubApi(String),

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InstanceNotFound => "INSTANCE_NOT_FOUND",
            Self::NameConflict(_) => "NAME_CONFLICT",
            Self::ImageUnsupported(_) => "IMAGE_UNSUPPORTED",
            Self::ImagePullFailed(_) => "IMAGE_PULL_FAILED",
            Self::NoFreePort => "NO_FREE_PORT",
            Self::HubApi(_) => "HUB_API_ERROR",
            Self::Docker(_) => "DOCKER_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InstanceNotFound => StatusCode::NOT_FOUND,
            Self::NameConflict(_) => StatusCode::CONFLICT,
            Self::ImageUnsupported(_) => StatusCode::BAD_REQUEST,
            Self::ImagePullFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NoFreePort => StatusCode::SERVICE_UNAVAILABLE,
            Self::HubApi(_) => StatusCode::BAD_GATEWAY,
            Self::Docker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = match &self {
            Self::ImagePullFailed(msg) => Some(msg.clone()),
            Self::HubApi(msg) => Some(msg.clone()),
            Self::Docker(e) => Some(e.to_string()),
            Self::Storage(msg) => Some(msg.clone()),
            Self::Internal(msg) => Some(msg.clone()),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
                detail,
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_expected_status() {
        assert_eq!(
            AppError::InstanceNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::NameConflict("pg".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ImageUnsupported("oracle".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NoFreePort.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn unsupported_image_names_the_offender() {
        let err = AppError::ImageUnsupported("cassandra".into());
        assert_eq!(err.code(), "IMAGE_UNSUPPORTED");
        assert!(err.to_string().contains("cassandra"));
    }
}
