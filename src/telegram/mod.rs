use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Secret;
use crate::text::truncate_chars;

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Bot API hard limit on message text length.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction over the chat platform. Implemented by `TelegramClient` for
/// production; mock implementations used in tests.
pub trait Messenger {
    async fn send_message(&self, text: &str) -> Result<(), TelegramError>;
    async fn send_photo(&self, photo_url: &str) -> Result<(), TelegramError>;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
}

/// Bot API envelope: every call answers `{"ok": bool, ...}` with
/// `error_code`/`description` on failure.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    error_code: Option<u16>,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    bot_token: Secret,
    chat_id: String,
    parse_mode: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(http: Client, bot_token: Secret, chat_id: &str, parse_mode: &str) -> Self {
        Self {
            http,
            bot_token,
            chat_id: chat_id.to_string(),
            parse_mode: parse_mode.to_string(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            bot_token: Secret("test-token".to_string()),
            chat_id: "@test_channel".to_string(),
            parse_mode: "HTML".to_string(),
            base_url: base_url.to_string(),
        }
    }

    async fn call<B: Serialize>(&self, api_method: &str, body: &B) -> Result<(), TelegramError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.bot_token.0, api_method);

        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.call_once(&url, api_method, body).await {
                Ok(()) => return Ok(()),
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
        Err(last_err.unwrap_or(TelegramError::RateLimited))
    }

    async fn call_once<B: Serialize>(
        &self,
        url: &str,
        api_method: &str,
        body: &B,
    ) -> Result<(), TelegramError> {
        let response = self
            .http
            .post(url)
            .header("User-Agent", crate::USER_AGENT)
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        // Failures surface in the envelope (`ok: false`) with the HTTP status
        // mirrored in `error_code`; fall back to the status when the body is
        // not the expected envelope.
        match serde_json::from_str::<ApiEnvelope>(&text) {
            Ok(envelope) if envelope.ok => {
                debug!(method = api_method, "telegram call ok");
                Ok(())
            }
            Ok(envelope) => {
                let classified = classify_envelope(&envelope, status.as_u16());
                warn!(method = api_method, error = %classified, "Telegram API error");
                Err(classified)
            }
            Err(_) => {
                let snippet = truncate_chars(&text, 200);
                warn!(method = api_method, status = %status, "Telegram API error (no envelope)");
                Err(TelegramError::Api {
                    code: status.as_u16(),
                    message: format!("HTTP {status}: {snippet}"),
                })
            }
        }
    }
}

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

impl Messenger for TelegramClient {
    async fn send_message(&self, text: &str) -> Result<(), TelegramError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: truncate_chars(text, MAX_MESSAGE_CHARS),
            parse_mode: &self.parse_mode,
        };
        self.call("sendMessage", &body).await
    }

    async fn send_photo(&self, photo_url: &str) -> Result<(), TelegramError> {
        let body = SendPhoto {
            chat_id: &self.chat_id,
            photo: photo_url,
        };
        self.call("sendPhoto", &body).await
    }
}

fn is_retriable(e: &TelegramError) -> bool {
    matches!(
        e,
        TelegramError::RateLimited
            | TelegramError::Api {
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

fn classify_envelope(envelope: &ApiEnvelope, http_status: u16) -> TelegramError {
    let code = envelope.error_code.unwrap_or(http_status);
    let message = envelope
        .description
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match code {
        429 => TelegramError::RateLimited,
        code => TelegramError::Api { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_429_as_rate_limited() {
        let envelope = ApiEnvelope {
            ok: false,
            error_code: Some(429),
            description: Some("Too Many Requests: retry after 5".into()),
        };
        assert!(matches!(
            classify_envelope(&envelope, 429),
            TelegramError::RateLimited
        ));
    }

    #[test]
    fn classify_keeps_description() {
        let envelope = ApiEnvelope {
            ok: false,
            error_code: Some(400),
            description: Some("Bad Request: chat not found".into()),
        };
        match classify_envelope(&envelope, 400) {
            TelegramError::Api { code, message } => {
                assert_eq!(code, 400);
                assert!(message.contains("chat not found"));
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }

    #[test]
    fn classify_falls_back_to_http_status() {
        let envelope = ApiEnvelope {
            ok: false,
            error_code: None,
            description: None,
        };
        assert!(matches!(
            classify_envelope(&envelope, 502),
            TelegramError::Api { code: 502, .. }
        ));
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn send_message_posts_chat_id_and_parse_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "@test_channel",
                "parse_mode": "HTML"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "result": {}})),
            )
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url(Client::new(), &server.uri());
        client.send_message("<b>Daily brief</b>").await.unwrap();
    }

    #[tokio::test]
    async fn send_message_ok_false_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url(Client::new(), &server.uri());
        let result = client.send_message("hello").await;
        match result {
            Err(TelegramError::Api { code: 400, message }) => {
                assert!(message.contains("chat not found"));
            }
            other => panic!("expected Api(400), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_photo_posts_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendPhoto"))
            .and(body_partial_json(
                serde_json::json!({"photo": "https://img.example.com/spx.png"}),
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "result": {}})),
            )
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url(Client::new(), &server.uri());
        client
            .send_photo("https://img.example.com/spx.png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_message_429_envelope_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 5"
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::with_base_url(Client::new(), &server.uri());
        let result = client.send_message("hello").await;
        assert!(matches!(result, Err(TelegramError::RateLimited)));
    }
}
