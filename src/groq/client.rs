use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{ApiError, ChatRequest, ChatResponse, Message};
use crate::config::Secret;
use crate::text::truncate_chars;

const API_BASE: &str = "https://api.groq.com";
const COMPLETIONS_PATH: &str = "openai/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.3;
const MAX_COMPLETION_TOKENS: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum GroqError {
    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Model returned an empty completion")]
    EmptyCompletion,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction over the hosted language model. Implemented by `GroqClient`
/// for production; mock implementations used in tests.
pub trait ChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GroqError>;
}

#[derive(Clone)]
pub struct GroqClient {
    http: Client,
    api_key: Secret,
    model: String,
    base_url: String,
}

impl GroqClient {
    pub fn new(http: Client, api_key: Secret, model: &str) -> Self {
        Self {
            http,
            api_key,
            model: model.to_string(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Secret("test-key".to_string()),
            model: "test-model".to_string(),
            base_url: base_url.to_string(),
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<ChatResponse, GroqError> {
        let url = format!("{}/{}", self.base_url, COMPLETIONS_PATH);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Groq API rate limited");
            return Err(GroqError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<ChatResponse>(&text)
                && let Some(err) = &body.error
            {
                let classified = classify_api_error(status.as_u16(), err);
                warn!(error = %classified, "Groq API error");
                return Err(classified);
            }
            let snippet = truncate_chars(&text, 200);
            warn!(status = %status, "Groq API error (no structured body)");
            return Err(GroqError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        let body: ChatResponse = response.json().await?;
        debug!(model = %self.model, "chat completion received");

        if let Some(err) = &body.error {
            let classified = classify_api_error(status.as_u16(), err);
            warn!(error = %classified, "Groq API error in 200 response");
            return Err(classified);
        }

        Ok(body)
    }
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

impl ChatModel for GroqClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GroqError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.chat(system, user).await {
                Ok(response) => return extract_content(response),
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
        Err(last_err.unwrap_or(GroqError::RateLimited))
    }
}

fn extract_content(response: ChatResponse) -> Result<String, GroqError> {
    let content = response
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    content.ok_or(GroqError::EmptyCompletion)
}

fn is_retriable(e: &GroqError) -> bool {
    matches!(
        e,
        GroqError::RateLimited
            | GroqError::Api {
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

fn classify_api_error(status: u16, err: &ApiError) -> GroqError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match status {
        429 => GroqError::RateLimited,
        401 | 403 => GroqError::Auth(message),
        code => GroqError::Api { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groq::types::{Choice, ResponseMessage};

    fn api_error(message: &str) -> ApiError {
        ApiError {
            message: Some(message.into()),
        }
    }

    #[test]
    fn classify_401_as_auth() {
        assert!(matches!(
            classify_api_error(401, &api_error("Invalid API Key")),
            GroqError::Auth(_)
        ));
    }

    #[test]
    fn classify_400_keeps_code_and_message() {
        match classify_api_error(400, &api_error("model_decommissioned")) {
            GroqError::Api { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "model_decommissioned");
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }

    #[test]
    fn extract_content_trims_and_rejects_empty() {
        let ok = ChatResponse {
            choices: Some(vec![Choice {
                message: Some(ResponseMessage {
                    content: Some("  summary  ".into()),
                }),
            }]),
            error: None,
        };
        assert_eq!(extract_content(ok).unwrap(), "summary");

        let empty = ChatResponse {
            choices: Some(vec![]),
            error: None,
        };
        assert!(matches!(
            extract_content(empty),
            Err(GroqError::EmptyCompletion)
        ));
    }
}
