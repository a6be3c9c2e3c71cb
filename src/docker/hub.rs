use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{AppError, Result};

const DOCKER_HUB_API: &str = "https://hub.docker.com/v2";

/// One page of the Docker Hub tag listing
#[derive(Debug, Deserialize)]
pub struct TagResponse {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
pub struct Tag {
    pub name: String,
    pub digest: Option<String>,
}

/// Tag reference returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTag {
    pub name: String,
}

pub struct DockerHubClient {
    http: Client,
    page_size: u32,
}

impl DockerHubClient {
    pub fn new(timeout: Duration, page_size: u32) -> Self {
        // Timeout keeps a dead Hub from hanging tag listings
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { http, page_size }
    }

    /// Fetch one page of tags for a Docker Hub image (e.g., "library/postgres")
    pub async fn get_tags(&self, image: &str, page: usize) -> Result<TagResponse> {
        let url = format!(
            "{}/repositories/{}/tags?page={}&page_size={}",
            DOCKER_HUB_API, image, page, self.page_size
        );

        debug!("Fetching tags: {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::HubApi(format!("Failed to fetch tags: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::HubApi(format!(
                "Docker Hub returned {}",
                response.status()
            )));
        }

        response
            .json::<TagResponse>()
            .await
            .map_err(|e| AppError::HubApi(format!("Failed to parse tags: {}", e)))
    }

    /// Fetch the complete tag list, walking pages until exhausted
    pub async fn get_all_tags(&self, image: &str) -> Result<Vec<ImageTag>> {
        let mut all_tags = Vec::new();
        let mut page = 1;

        loop {
            let response = self.get_tags(image, page).await?;
            all_tags.extend(
                response
                    .results
                    .into_iter()
                    .map(|t| ImageTag { name: t.name }),
            );

            if response.next.is_none() {
                break;
            }
            page += 1;
        }

        Ok(all_tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_response_parses_hub_payload() {
        let payload = r#"{
            "count": 2,
            "next": "https://hub.docker.com/v2/repositories/library/redis/tags?page=2",
            "previous": null,
            "results": [
                {"name": "latest", "digest": "sha256:abc"},
                {"name": "7.4", "digest": null}
            ]
        }"#;

        let response: TagResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.count, 2);
        assert!(response.next.is_some());
        assert!(response.previous.is_none());
        assert_eq!(response.results[0].name, "latest");
        assert_eq!(response.results[0].digest.as_deref(), Some("sha256:abc"));
        assert!(response.results[1].digest.is_none());
    }

    #[test]
    fn image_tag_round_trips() {
        let tag = ImageTag {
            name: "16-alpine".to_string(),
        };
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, r#"{"name":"16-alpine"}"#);
        let back: ImageTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);
    }
}
