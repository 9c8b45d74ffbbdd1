pub mod dto;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::error::FetchError;
use crate::models::Course;

/// Path of the catalog resource under the configured base URL.
pub const CATALOG_PATH: &str = "/data/";

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn catalog_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), CATALOG_PATH)
    }
}

/// Source of the full remote catalog. One call is one round trip; retrying
/// is up to the caller.
#[async_trait]
pub trait CourseFetcher: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Course>, FetchError>;
}

pub struct HttpCourseFetcher {
    client: Client,
    config: RemoteConfig,
}

impl HttpCourseFetcher {
    pub fn new(config: RemoteConfig) -> Result<Self, FetchError> {
        reqwest::Url::parse(&config.catalog_url())
            .map_err(|e| FetchError::Config(format!("{}: {}", config.base_url, e)))?;

        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CourseFetcher for HttpCourseFetcher {
    async fn fetch_all(&self) -> Result<Vec<Course>, FetchError> {
        let url = self.config.catalog_url();
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body_text = response.text().await?;
        let dtos = serde_json::from_str::<Vec<dto::CourseDto>>(&body_text).map_err(|e| {
            error!("Failed to parse catalog: {}", e);
            FetchError::Decode(e)
        })?;

        Ok(dtos.into_iter().map(Course::from).collect())
    }
}
