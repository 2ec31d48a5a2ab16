use chrono::{Duration, Local};
use tracing::{info, warn};

use super::language::Language;
use super::prompts;
use crate::groq::{ChatModel, GroqError};
use crate::serper::{ImageResult, SearchApi, SerperError};
use crate::text;

/// How many located chart images the brief carries.
const MAX_CHARTS: usize = 2;
/// An image qualifies as a chart when its title mentions one of these.
const CHART_KEYWORDS: &[&str] = &["chart", "graph", "market", "stock", "trading"];

#[derive(Debug, Clone)]
pub struct BriefParams {
    pub query: String,
    pub languages: Vec<Language>,
    pub search_hours_back: i64,
    pub max_news_items: u8,
    pub max_summary_words: usize,
}

#[derive(Debug)]
pub struct LanguageBrief {
    pub language: Language,
    pub content: String,
}

#[derive(Debug)]
pub struct SkippedLanguage {
    pub language: Language,
    pub reason: String,
}

/// Everything the pipeline produced up to distribution: the English brief,
/// the surviving translations, what was skipped and why, and the located
/// chart images.
#[derive(Debug)]
pub struct BriefOutcome {
    pub english: LanguageBrief,
    pub translations: Vec<LanguageBrief>,
    pub skipped: Vec<SkippedLanguage>,
    pub charts: Vec<ImageResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    #[error("no news found for query {query:?}")]
    NoNews { query: String },

    #[error("{0}")]
    Search(#[from] SerperError),

    #[error("{0}")]
    Model(#[from] GroqError),
}

/// Run the pipeline stages up to distribution: search, analysis, summary,
/// chart lookup + formatting, and per-language translation.
///
/// Search, summary, and formatting failures abort; the analysis step and the
/// chart lookup degrade gracefully, and a failed translation skips only that
/// language.
pub async fn run<S: SearchApi, M: ChatModel>(
    search: &S,
    model: &M,
    params: &BriefParams,
) -> Result<BriefOutcome, BriefError> {
    let query = build_news_query(&params.query, params.search_hours_back);
    info!(query = %query, "searching financial news");
    let news = search.search_news(&query, params.max_news_items).await?;
    if news.is_empty() {
        return Err(BriefError::NoNews { query });
    }
    info!(items = news.len(), "news search complete");

    let digest = prompts::news_digest(&news);

    let analysis = match model
        .complete(prompts::ANALYST_SYSTEM, &prompts::analysis_prompt(&digest))
        .await
    {
        Ok(insights) => Some(insights),
        Err(e) => {
            warn!(error = %e, "analysis step failed (continuing without insights)");
            None
        }
    };

    let raw_summary = model
        .complete(
            prompts::SUMMARIZER_SYSTEM,
            &prompts::summary_prompt(&digest, analysis.as_deref(), params.max_summary_words),
        )
        .await?;
    let summary = text::enforce_word_cap(&raw_summary, params.max_summary_words);
    info!(words = summary.split_whitespace().count(), "market summary ready");

    let charts = match search.search_images(&prompts::chart_query(&params.query)).await {
        Ok(images) => filter_charts(images),
        Err(e) => {
            warn!(error = %e, "chart search failed (continuing without charts)");
            Vec::new()
        }
    };
    info!(charts = charts.len(), "chart lookup complete");

    let formatted = model
        .complete(
            prompts::FORMATTER_SYSTEM,
            &prompts::format_prompt(&summary, &charts),
        )
        .await?;

    let mut translations = Vec::new();
    let mut skipped = Vec::new();
    for language in &params.languages {
        match model
            .complete(
                prompts::TRANSLATOR_SYSTEM,
                &prompts::translate_prompt(&formatted, language),
            )
            .await
        {
            Ok(content) => {
                info!(language = %language, "translation complete");
                translations.push(LanguageBrief {
                    language: language.clone(),
                    content,
                });
            }
            Err(e) => {
                warn!(language = %language, error = %e, "translation failed (skipping language)");
                skipped.push(SkippedLanguage {
                    language: language.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(BriefOutcome {
        english: LanguageBrief {
            language: Language::english(),
            content: formatted,
        },
        translations,
        skipped,
        charts,
    })
}

/// Augment the topic with a date window and market keywords, matching the
/// search index's `after:` operator.
fn build_news_query(topic: &str, hours_back: i64) -> String {
    let since = Local::now() - Duration::hours(hours_back);
    format!(
        "{topic} after:{} financial markets trading stocks",
        since.format("%Y-%m-%d")
    )
}

fn filter_charts(images: Vec<ImageResult>) -> Vec<ImageResult> {
    images
        .into_iter()
        .filter(|img| !img.image_url.is_empty())
        .filter(|img| {
            let title = img.title.to_lowercase();
            CHART_KEYWORDS.iter().any(|k| title.contains(k))
        })
        .take(MAX_CHARTS)
        .collect()
}
