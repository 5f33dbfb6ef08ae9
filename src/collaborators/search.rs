use async_trait::async_trait;
use serde::Deserialize;

use super::CResult;
use crate::core::errors::CollaboratorError;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub description: String,
    pub date: Option<String>,
    pub content: Option<String>,
}

/// **Search** (§6): `query -> list of {title, url, description, date?, content?}`.
#[async_trait]
pub trait Search: Send + Sync {
    async fn search(&self, query: &str) -> CResult<Vec<SearchHit>>;
}

/// Default implementation against a configurable SERP-style JSON endpoint,
/// grounded in the teacher's `tools::search::service` HTTP collaborator shape
/// (a plain `reqwest` GET returning a results array) but trimmed of the
/// multi-engine aggregation machinery that has no counterpart here. Caches
/// results per query the way the teacher's `AppState.search_cache` does.
pub struct DefaultSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    cache: moka::future::Cache<String, Vec<(String, String, String, Option<String>, Option<String>)>>,
}

impl DefaultSearch {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint,
            api_key,
            cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(std::time::Duration::from_secs(60 * 10))
                .build(),
        }
    }

    fn to_cache_entry(hit: &SearchHit) -> (String, String, String, Option<String>, Option<String>) {
        (hit.title.clone(), hit.url.clone(), hit.description.clone(), hit.date.clone(), hit.content.clone())
    }

    fn from_cache_entry(entry: (String, String, String, Option<String>, Option<String>)) -> SearchHit {
        SearchHit {
            title: entry.0,
            url: entry.1,
            description: entry.2,
            date: entry.3,
            content: entry.4,
        }
    }
}

#[derive(Deserialize)]
struct RawHit {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    results: Vec<RawHit>,
}

#[async_trait]
impl Search for DefaultSearch {
    async fn search(&self, query: &str) -> CResult<Vec<SearchHit>> {
        if let Some(cached) = self.cache.get(query).await {
            return Ok(cached.into_iter().map(Self::from_cache_entry).collect());
        }

        let mut request = self.client.get(&self.endpoint).query(&[("q", query)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = tokio::time::timeout(std::time::Duration::from_secs(60), request.send())
            .await
            .map_err(|_| CollaboratorError::Timeout(std::time::Duration::from_secs(60)))?
            .map_err(CollaboratorError::Http)?;

        let parsed: RawSearchResponse = response.json().await.map_err(CollaboratorError::Http)?;
        if parsed.results.is_empty() {
            return Err(CollaboratorError::Empty);
        }

        let hits: Vec<SearchHit> = parsed
            .results
            .into_iter()
            .map(|h| SearchHit {
                title: h.title,
                url: h.url,
                description: h.description,
                date: h.date,
                content: h.content,
            })
            .collect();

        self.cache
            .insert(query.to_string(), hits.iter().map(Self::to_cache_entry).collect())
            .await;

        Ok(hits)
    }
}
