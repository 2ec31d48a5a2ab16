use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{ErrorBody, ImageResult, ImagesResponse, NewsItem, NewsResponse, SearchRequest};
use crate::config::Secret;
use crate::text::truncate_chars;

const API_BASE: &str = "https://google.serper.dev";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const IMAGE_SEARCH_NUM: u8 = 10;

#[derive(Debug, thiserror::Error)]
pub enum SerperError {
    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API quota exhausted or key rejected: {0}")]
    QuotaExhausted(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction over the search API, implemented by `SerperClient` for
/// production; mock implementations used in tests.
pub trait SearchApi {
    async fn search_news(&self, query: &str, limit: u8) -> Result<Vec<NewsItem>, SerperError>;
    async fn search_images(&self, query: &str) -> Result<Vec<ImageResult>, SerperError>;
}

#[derive(Clone)]
pub struct SerperClient {
    http: Client,
    api_key: Secret,
    base_url: String,
}

impl SerperClient {
    pub fn new(http: Client, api_key: Secret) -> Self {
        Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Secret("test-key".to_string()),
            base_url: base_url.to_string(),
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, SerperError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .header("X-API-KEY", &self.api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Serper API rate limited");
            return Err(SerperError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| truncate_chars(&text, 200).to_string());
            let classified = classify_status(status.as_u16(), message);
            warn!(error = %classified, "Serper API error");
            return Err(classified);
        }

        Ok(response.json().await?)
    }

    async fn post_with_retries<B, R>(&self, path: &str, body: &B) -> Result<R, SerperError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.post_json(path, body).await {
                Ok(parsed) => return Ok(parsed),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let delay_ms = jittered_backoff(attempt);
                        debug!(
                            attempt = attempt + 1,
                            delay_ms, "retrying after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(SerperError::RateLimited))
    }
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

impl SearchApi for SerperClient {
    async fn search_news(&self, query: &str, limit: u8) -> Result<Vec<NewsItem>, SerperError> {
        let request = SearchRequest {
            q: query,
            num: limit,
            kind: Some("news"),
        };
        let body: NewsResponse = self.post_with_retries("search", &request).await?;
        let items = body.news.unwrap_or_default();
        debug!(items = items.len(), "news search complete");
        Ok(items)
    }

    async fn search_images(&self, query: &str) -> Result<Vec<ImageResult>, SerperError> {
        let request = SearchRequest {
            q: query,
            num: IMAGE_SEARCH_NUM,
            kind: None,
        };
        let body: ImagesResponse = self.post_with_retries("images", &request).await?;
        let images = body.images.unwrap_or_default();
        debug!(images = images.len(), "image search complete");
        Ok(images)
    }
}

fn is_retriable(e: &SerperError) -> bool {
    matches!(
        e,
        SerperError::RateLimited
            | SerperError::Api {
                code: 500..=599,
                ..
            }
    )
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(attempt: u32) -> u64 {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn classify_status(code: u16, message: String) -> SerperError {
    match code {
        429 => SerperError::RateLimited,
        401 | 403 => SerperError::QuotaExhausted(message),
        _ => SerperError::Api { code, message },
    }
}
