//! Prompt templates for every LLM call in the pipeline, centralised so the
//! pipeline code stays free of prose and unit tests can inspect prompts
//! without a model call.

use super::language::Language;
use crate::serper::{ImageResult, NewsItem};

pub const ANALYST_SYSTEM: &str =
    "You are a financial analyst. Provide a concise analysis of the given financial news.";

pub const SUMMARIZER_SYSTEM: &str = "You are a seasoned financial market analyst. You distill \
complex market information into clear, structured summaries for traders and investors.";

pub const FORMATTER_SYSTEM: &str = "You are an editor preparing financial reports for \
publication. You arrange content with chart placements for maximum clarity.";

pub const TRANSLATOR_SYSTEM: &str = "You are a professional translator specialised in financial \
content. You translate accurately while preserving meaning, formatting, and financial terms.";

/// Render the news items into the numbered digest block embedded in prompts.
pub fn news_digest(items: &[NewsItem]) -> String {
    let mut digest = String::new();
    for (i, item) in items.iter().enumerate() {
        digest.push_str(&format!("{}. {}\n", i + 1, item.title));
        if !item.snippet.is_empty() {
            digest.push_str(&format!("   {}\n", item.snippet));
        }
        let mut meta = Vec::new();
        if !item.source.is_empty() {
            meta.push(item.source.as_str());
        }
        if !item.date.is_empty() {
            meta.push(item.date.as_str());
        }
        if !meta.is_empty() {
            digest.push_str(&format!("   ({})\n", meta.join(", ")));
        }
        if !item.link.is_empty() {
            digest.push_str(&format!("   {}\n", item.link));
        }
    }
    digest
}

pub fn analysis_prompt(digest: &str) -> String {
    format!("Analyze these financial news items and provide key insights:\n\n{digest}")
}

pub fn summary_prompt(digest: &str, analysis: Option<&str>, max_words: usize) -> String {
    let mut prompt = format!(
        "Based on the following financial news, create a concise market summary \
(under {max_words} words) that includes:\n\
1. Key market movements and closing prices\n\
2. Most significant news events\n\
3. Economic indicators or Fed updates\n\
4. Notable corporate developments\n\
5. Market outlook based on today's events\n\n\
Structure the summary with clear sections and highlight the most important information.\n\n\
News items:\n{digest}"
    );
    if let Some(analysis) = analysis {
        prompt.push_str(&format!("\nAnalyst insights:\n{analysis}\n"));
    }
    prompt
}

/// Image-search query used to locate chart images supporting the brief.
pub fn chart_query(topic: &str) -> String {
    format!("{topic} financial chart graph market trading")
}

pub fn format_prompt(summary: &str, charts: &[ImageResult]) -> String {
    let mut prompt = format!(
        "Format the following market summary for professional presentation. \
Keep the structure clean and readable.\n\nSummary:\n{summary}\n"
    );
    if charts.is_empty() {
        prompt.push_str("\nNo chart images are available for this report.\n");
    } else {
        prompt.push_str(
            "\nPlace each of these chart images where it best supports the narrative, \
marking the position with the image URL on its own line:\n",
        );
        for chart in charts {
            prompt.push_str(&format!("- {} ({})\n", chart.image_url, chart.title));
        }
    }
    prompt.push_str("\nReturn only the formatted report.");
    prompt
}

pub fn translate_prompt(content: &str, language: &Language) -> String {
    format!(
        "Translate the following financial summary to {language}.\n\n\
Requirements:\n\
1. Maintain all financial terms accuracy\n\
2. Preserve formatting and structure\n\
3. Keep chart placement indicators\n\
4. Keep all URLs and numerical data unchanged\n\n\
{content}"
    )
}

/// The channel message: the English brief plus a translations footer and
/// channel hashtags.
pub fn channel_message(brief: &str, translations: &[Language]) -> String {
    let mut message = brief.to_string();
    if !translations.is_empty() {
        let names: Vec<_> = translations.iter().map(Language::name).collect();
        message.push_str(&format!(
            "\n\nPDF reports are also available in: {}",
            names.join(", ")
        ));
    }
    message.push_str("\n\n#markets #stocks #finance");
    message
}
