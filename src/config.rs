use std::env;
use std::path::PathBuf;

use crate::brief::language::Language;

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_LANGUAGES: &str = "Arabic,Hindi,Hebrew";
pub const DEFAULT_QUERY: &str = "US stock market today";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("TARGET_LANGUAGES must name at least one language")]
    NoLanguages,
}

/// A credential that must never appear in logs or debug output.
#[derive(Clone)]
pub struct Secret(pub String);

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Run configuration, sourced from the environment (`.env` supported) with
/// CLI overrides applied by `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub serper_api_key: Secret,
    pub groq_api_key: Secret,
    pub telegram_bot_token: Secret,
    pub telegram_channel_id: String,

    pub model: String,
    pub output_dir: PathBuf,
    pub search_hours_back: i64,
    pub max_news_items: u8,
    pub max_summary_words: usize,
    pub languages: Vec<Language>,
    pub telegram_parse_mode: String,
}

impl Config {
    /// Load from the process environment. All missing required variables are
    /// reported together so a fresh deployment fails with one actionable
    /// message instead of four consecutive ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut missing = Vec::new();
        let mut required = |name: &str| match env::var(name) {
            Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
            _ => {
                missing.push(name.to_string());
                None
            }
        };

        let serper_api_key = required("SERPER_API_KEY");
        let groq_api_key = required("GROQ_API_KEY");
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN");
        let telegram_channel_id = required("TELEGRAM_CHANNEL_ID");

        let (Some(serper_api_key), Some(groq_api_key), Some(telegram_bot_token), Some(telegram_channel_id)) =
            (serper_api_key, groq_api_key, telegram_bot_token, telegram_channel_id)
        else {
            return Err(ConfigError::MissingVars(missing));
        };

        let languages = Language::parse_list(&optional("TARGET_LANGUAGES", DEFAULT_LANGUAGES));
        if languages.is_empty() {
            return Err(ConfigError::NoLanguages);
        }

        Ok(Self {
            serper_api_key: Secret(serper_api_key),
            groq_api_key: Secret(groq_api_key),
            telegram_bot_token: Secret(telegram_bot_token),
            telegram_channel_id,
            model: optional("GROQ_MODEL", DEFAULT_MODEL),
            output_dir: PathBuf::from(optional("OUTPUT_DIR", DEFAULT_OUTPUT_DIR)),
            search_hours_back: parse_var("SEARCH_HOURS_BACK", 1)?,
            max_news_items: parse_var("MAX_NEWS_ITEMS", 20)?,
            max_summary_words: parse_var("MAX_SUMMARY_WORDS", 500)?,
            languages,
            telegram_parse_mode: optional("TELEGRAM_PARSE_MODE", "HTML"),
        })
    }
}

fn optional(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var: name, value: raw })
        }
        _ => Ok(default),
    }
}
