mod brief;
mod config;
mod groq;
mod pdf;
mod serper;
mod telegram;
mod text;

pub const USER_AGENT: &str = concat!("finbrief/", env!("CARGO_PKG_VERSION"));

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use reqwest::Client;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use brief::distribute::{self, DistributeParams};
use brief::engine::{self, BriefParams};
use brief::language::Language;
use config::Config;
use groq::GroqClient;
use serper::SerperClient;
use telegram::TelegramClient;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;

#[derive(Parser)]
#[command(
    name = "finbrief",
    version,
    about = "Compile and distribute a daily financial market brief"
)]
struct Cli {
    /// News topic to search for.
    #[arg(long, default_value = config::DEFAULT_QUERY)]
    query: String,

    /// Output directory for PDF reports (overrides OUTPUT_DIR).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Comma-separated target languages (overrides TARGET_LANGUAGES).
    #[arg(long)]
    languages: Option<String>,

    /// Plain-text log file (appended).
    #[arg(long, default_value = "finbrief.log")]
    log_file: PathBuf,

    /// Render PDF reports but do not post to the channel.
    #[arg(long)]
    skip_telegram: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let mut config = Config::from_env().inspect_err(|e| error!("configuration error: {e}"))?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(raw) = &cli.languages {
        let languages = Language::parse_list(raw);
        if languages.is_empty() {
            return Err("--languages must name at least one language".into());
        }
        config.languages = languages;
    }

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;

    let search = SerperClient::new(http.clone(), config.serper_api_key.clone());
    let model = GroqClient::new(http.clone(), config.groq_api_key.clone(), &config.model);
    let messenger = TelegramClient::new(
        http.clone(),
        config.telegram_bot_token.clone(),
        &config.telegram_channel_id,
        &config.telegram_parse_mode,
    );

    info!(query = %cli.query, model = %config.model, "starting financial brief run");

    let params = BriefParams {
        query: cli.query,
        languages: config.languages.clone(),
        search_hours_back: config.search_hours_back,
        max_news_items: config.max_news_items,
        max_summary_words: config.max_summary_words,
    };
    let outcome = engine::run(&search, &model, &params)
        .await
        .inspect_err(|e| error!("brief pipeline failed: {e}"))?;
    info!(
        translations = outcome.translations.len(),
        charts = outcome.charts.len(),
        "brief compiled"
    );
    if !outcome.skipped.is_empty() {
        let detail: Vec<String> = outcome
            .skipped
            .iter()
            .map(|s| format!("{}: {}", s.language, s.reason))
            .collect();
        warn!(skipped = %detail.join("; "), "translations skipped");
    }

    let report = distribute::run(
        &outcome,
        &messenger,
        &http,
        &DistributeParams {
            output_dir: &config.output_dir,
            date: Local::now().date_naive(),
            send_telegram: !cli.skip_telegram,
        },
    )
    .await
    .inspect_err(|e| error!("distribution failed: {e}"))?;

    if !report.failed_reports.is_empty() {
        let detail: Vec<String> = report
            .failed_reports
            .iter()
            .map(|f| format!("{}: {}", f.language, f.reason))
            .collect();
        warn!(failed = %detail.join("; "), "PDF reports skipped");
    }
    if report.pdf_paths.is_empty() {
        error!("no PDF reports were written");
        return Err("no PDF reports were written".into());
    }
    if !report.telegram_sent && !cli.skip_telegram {
        warn!("run finished without a channel post");
    }
    info!(
        pdfs = report.pdf_paths.len(),
        telegram = report.telegram_sent,
        "financial brief run complete"
    );
    Ok(())
}

fn init_logging(log_file: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("finbrief=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .init();
    Ok(())
}
