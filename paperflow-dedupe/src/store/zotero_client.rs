//! Zotero Web API client
//!
//! Implements [`RecordStore`] over the v3 REST API: paginated listing via the
//! `Link: rel="next"` header, and version-guarded writes through
//! `If-Unmodified-Since-Version`.
//!
//! A `429`/`503` answer gets exactly one bounded pause (honouring
//! `Retry-After` or `Backoff`) and one re-issue. Anything beyond that belongs
//! to the caller.

use super::{ListScope, RecordStore};
use crate::error::{DedupeError, Result};
use crate::models::{Collection, Envelope, Record};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const API_VERSION: &str = "3";
const USER_AGENT: &str = concat!("paperflow/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Upper bound on the single rate-limit pause
const MAX_PAUSE_SECS: u64 = 10;
/// Pause when the server asks us to slow down without saying for how long
const DEFAULT_PAUSE_SECS: u64 = 2;

/// Connection settings for one Zotero user library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoteroSettings {
    pub api_base: String,
    pub user_id: String,
    pub api_key: String,
}

/// Zotero Web API client
pub struct ZoteroClient {
    http_client: reqwest::Client,
    library_base: String,
    api_key: String,
}

impl ZoteroClient {
    pub fn new(settings: &ZoteroSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DedupeError::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            library_base: format!(
                "{}/users/{}",
                settings.api_base.trim_end_matches('/'),
                settings.user_id
            ),
            api_key: settings.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Zotero-API-Key", &self.api_key)
            .header("Zotero-API-Version", API_VERSION)
    }

    /// Send, pausing once if the server is rate limiting us
    async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        let retry = builder.try_clone();
        let response = builder.send().await?;

        let throttled = matches!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        );
        match retry {
            Some(again) if throttled => {
                let pause = pause_duration(response.headers());
                tracing::warn!(
                    status = response.status().as_u16(),
                    pause_secs = pause.as_secs(),
                    "Zotero asked us to slow down, pausing once"
                );
                tokio::time::sleep(pause).await;
                again.send().await
            }
            _ => Ok(response),
        }
    }

    /// Follow `Link: rel="next"` until exhausted or `limit` items collected
    async fn fetch_pages<T: DeserializeOwned>(
        &self,
        first_url: String,
        query: Vec<(&'static str, String)>,
        limit: Option<usize>,
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut next = Some(first_url);
        let mut first = true;

        while let Some(url) = next.take() {
            tracing::debug!(url = %url, "Fetching Zotero page");
            let mut builder = self.request(reqwest::Method::GET, &url);
            if first {
                builder = builder.query(&query);
                first = false;
            }

            let response = self
                .send(builder)
                .await
                .map_err(|e| DedupeError::TransientFetch(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DedupeError::TransientFetch(format!(
                    "GET {} returned {}: {}",
                    url,
                    status.as_u16(),
                    body
                )));
            }

            next = response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link);

            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| DedupeError::Parse(e.to_string()))?;

            for item in page {
                results.push(item);
                if limit.is_some_and(|l| results.len() >= l) {
                    return Ok(results);
                }
            }
        }

        Ok(results)
    }

    fn item_query() -> Vec<(&'static str, String)> {
        vec![
            ("format", "json".to_string()),
            ("include", "data".to_string()),
            ("limit", PAGE_SIZE.to_string()),
        ]
    }

    /// Map a write response to the record-level error taxonomy
    async fn check_write(response: Response, key: &str, version: u64) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status {
            StatusCode::PRECONDITION_FAILED => Err(DedupeError::VersionConflict {
                key: key.to_string(),
                version,
            }),
            StatusCode::NOT_FOUND => Err(DedupeError::NotFound(key.to_string())),
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(DedupeError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl RecordStore for ZoteroClient {
    async fn list_top_level(&self, scope: &ListScope) -> Result<Vec<Record>> {
        let url = match &scope.collection {
            Some(collection) => format!(
                "{}/collections/{}/items/top",
                self.library_base, collection
            ),
            None => format!("{}/items/top", self.library_base),
        };
        let mut query = Self::item_query();
        if let Some(tag) = &scope.tag {
            query.push(("tag", tag.clone()));
        }

        let envelopes: Vec<Envelope<Record>> = self.fetch_pages(url, query, scope.limit).await?;
        Ok(envelopes.into_iter().map(Envelope::into_record).collect())
    }

    async fn list_children(&self, parent_key: &str) -> Result<Vec<Record>> {
        let url = format!("{}/items/{}/children", self.library_base, parent_key);
        let envelopes: Vec<Envelope<Record>> =
            self.fetch_pages(url, Self::item_query(), None).await?;
        Ok(envelopes.into_iter().map(Envelope::into_record).collect())
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let url = format!("{}/items/{}", self.library_base, record.key);
        tracing::debug!(key = %record.key, version = record.version, "PUT item");

        let builder = self
            .request(reqwest::Method::PUT, &url)
            .header("If-Unmodified-Since-Version", record.version.to_string())
            .json(record);
        let response = self.send(builder).await.map_err(|e| DedupeError::Api {
            status: 0,
            message: e.to_string(),
        })?;
        Self::check_write(response, &record.key, record.version).await
    }

    async fn delete(&self, key: &str, version: u64) -> Result<()> {
        let url = format!("{}/items/{}", self.library_base, key);
        tracing::debug!(key = %key, version, "DELETE item");

        let builder = self
            .request(reqwest::Method::DELETE, &url)
            .header("If-Unmodified-Since-Version", version.to_string());
        let response = self.send(builder).await.map_err(|e| DedupeError::Api {
            status: 0,
            message: e.to_string(),
        })?;
        Self::check_write(response, key, version).await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let url = format!("{}/collections", self.library_base);
        let envelopes: Vec<Envelope<Collection>> =
            self.fetch_pages(url, Self::item_query(), None).await?;
        Ok(envelopes
            .into_iter()
            .map(|e| Collection {
                key: e.key,
                version: e.version,
                ..e.data
            })
            .collect())
    }
}

/// Extract the `rel="next"` target from a `Link` header
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|chunk| {
        let mut parts = chunk.split(';');
        let url = parts.next()?.trim();
        let is_next = parts.any(|p| p.trim() == r#"rel="next""#);
        is_next.then(|| url.trim_matches(|c| c == '<' || c == '>').to_string())
    })
}

/// Seconds to wait from `Retry-After` or `Backoff`, capped
fn pause_duration(headers: &HeaderMap) -> Duration {
    let secs = ["retry-after", "backoff"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_PAUSE_SECS);
    Duration::from_secs(secs.min(MAX_PAUSE_SECS))
}
