use async_trait::async_trait;
use chrono::DateTime;

use super::CResult;
use crate::core::errors::CollaboratorError;

/// **LastModified** (§6): `url -> optional date string, only returned at confidence >= 70`.
#[async_trait]
pub trait LastModified: Send + Sync {
    async fn last_modified(&self, url: &str) -> CResult<Option<String>>;
}

/// Default implementation: a single HTTP HEAD inspecting the `Last-Modified`
/// response header. A present header is confidence 90 (returned); its absence
/// returns `None` rather than guessing from a `Date` header, which reflects
/// response time, not content age.
pub struct HttpLastModified {
    client: reqwest::Client,
}

impl HttpLastModified {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpLastModified {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LastModified for HttpLastModified {
    async fn last_modified(&self, url: &str) -> CResult<Option<String>> {
        let response = tokio::time::timeout(std::time::Duration::from_secs(30), self.client.head(url).send())
            .await
            .map_err(|_| CollaboratorError::Timeout(std::time::Duration::from_secs(30)))?
            .map_err(CollaboratorError::Http)?;

        let header = response
            .headers()
            .get("last-modified")
            .and_then(|v| v.to_str().ok());

        let Some(header) = header else {
            return Ok(None);
        };

        match DateTime::parse_from_rfc2822(header) {
            Ok(dt) => Ok(Some(dt.to_rfc3339())),
            Err(_) => Ok(None),
        }
    }
}
