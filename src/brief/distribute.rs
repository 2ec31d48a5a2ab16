use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use reqwest::Client;
use tracing::{info, warn};

use super::engine::BriefOutcome;
use super::language::Language;
use super::prompts;
use crate::pdf::{self, images};
use crate::telegram::Messenger;

pub struct DistributeParams<'a> {
    pub output_dir: &'a Path,
    pub date: NaiveDate,
    pub send_telegram: bool,
}

#[derive(Debug)]
pub struct FailedReport {
    pub language: Language,
    pub reason: String,
}

/// What distribution actually delivered: written PDFs, per-language render
/// failures, and whether the channel post went out.
#[derive(Debug)]
pub struct DistributionReport {
    pub pdf_paths: Vec<PathBuf>,
    pub failed_reports: Vec<FailedReport>,
    pub telegram_sent: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error("failed to create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render one PDF per language and post the English brief to the channel.
/// A failed render skips that language only; a failed channel post leaves
/// the written PDFs in place and is reported in the outcome.
pub async fn run<M: Messenger>(
    outcome: &BriefOutcome,
    messenger: &M,
    http: &Client,
    params: &DistributeParams<'_>,
) -> Result<DistributionReport, DistributeError> {
    fs::create_dir_all(params.output_dir).map_err(|source| DistributeError::OutputDir {
        path: params.output_dir.to_path_buf(),
        source,
    })?;

    let charts = images::fetch_charts(http, &outcome.charts).await;

    let mut pdf_paths = Vec::new();
    let mut failed_reports = Vec::new();
    for brief in std::iter::once(&outcome.english).chain(outcome.translations.iter()) {
        let filename = format!("financial_summary_{}.pdf", brief.language.slug());
        let path = params.output_dir.join(filename);
        match pdf::render_brief(
            &brief.content,
            &charts,
            brief.language.name(),
            params.date,
            &path,
        ) {
            Ok(()) => {
                info!(language = %brief.language, path = %path.display(), "PDF report written");
                pdf_paths.push(path);
            }
            Err(e) => {
                warn!(language = %brief.language, error = %e, "PDF generation failed (skipping language)");
                failed_reports.push(FailedReport {
                    language: brief.language.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut telegram_sent = false;
    if params.send_telegram {
        let translated: Vec<Language> = outcome
            .translations
            .iter()
            .map(|t| t.language.clone())
            .collect();
        let message = prompts::channel_message(&outcome.english.content, &translated);
        match messenger.send_message(&message).await {
            Ok(()) => {
                telegram_sent = true;
                info!("brief posted to channel");
                for chart in &outcome.charts {
                    if let Err(e) = messenger.send_photo(&chart.image_url).await {
                        warn!(url = %chart.image_url, error = %e, "chart photo post failed");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "channel post failed (PDF reports unaffected)");
            }
        }
    }

    Ok(DistributionReport {
        pdf_paths,
        failed_reports,
        telegram_sent,
    })
}
