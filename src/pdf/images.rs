use std::time::Duration;

use futures::stream::{self, StreamExt};
use image::RgbImage;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::serper::ImageResult;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_IMAGE_BYTES: usize = 5_000_000;
const DOWNLOAD_CONCURRENCY: usize = 2;
/// Chart images larger than this on either axis are thumbnailed before
/// embedding; full-resolution screenshots would bloat every PDF.
const MAX_DIMENSION: u32 = 800;

/// A downloaded, decoded chart ready for embedding.
pub struct ChartBitmap {
    pub source_url: String,
    pub rgb: RgbImage,
}

#[derive(Debug, thiserror::Error)]
pub enum ChartFetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("image too large (>{MAX_IMAGE_BYTES} bytes)")]
    TooLarge,

    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Download and decode the located chart images. Failures are logged and
/// skipped; the brief simply ships with fewer charts.
pub async fn fetch_charts(http: &Client, charts: &[ImageResult]) -> Vec<ChartBitmap> {
    let outcomes: Vec<_> = stream::iter(charts.iter().cloned())
        .map(|chart| async move {
            let result = download_chart(http, &chart.image_url).await;
            (chart, result)
        })
        .buffer_unordered(DOWNLOAD_CONCURRENCY)
        .collect()
        .await;

    let mut bitmaps = Vec::new();
    for (chart, outcome) in outcomes {
        match outcome {
            Ok(bitmap) => bitmaps.push(bitmap),
            Err(e) => {
                warn!(url = %chart.image_url, error = %e, "chart download failed (skipping)");
            }
        }
    }
    bitmaps
}

async fn download_chart(http: &Client, raw_url: &str) -> Result<ChartBitmap, ChartFetchError> {
    let parsed = Url::parse(raw_url)?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(ChartFetchError::InvalidScheme),
    }

    let response = http
        .get(parsed)
        .header("User-Agent", crate::USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ChartFetchError::Status(status.as_u16()));
    }

    if let Some(len) = response.content_length()
        && len as usize > MAX_IMAGE_BYTES
    {
        return Err(ChartFetchError::TooLarge);
    }

    let mut body = Vec::new();
    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_IMAGE_BYTES {
            return Err(ChartFetchError::TooLarge);
        }
    }

    let decoded = image::load_from_memory(&body)?;
    let scaled = if decoded.width() > MAX_DIMENSION || decoded.height() > MAX_DIMENSION {
        decoded.thumbnail(MAX_DIMENSION, MAX_DIMENSION)
    } else {
        decoded
    };
    debug!(url = %raw_url, width = scaled.width(), height = scaled.height(), "chart image ready");

    Ok(ChartBitmap {
        source_url: raw_url.to_string(),
        rgb: scaled.to_rgb8(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 90, 200]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        bytes
    }

    fn chart(url: String) -> ImageResult {
        ImageResult {
            title: "chart".into(),
            image_url: url,
        }
    }

    #[tokio::test]
    async fn downloads_and_decodes_chart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spx.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(4, 4)))
            .mount(&server)
            .await;

        let bitmaps = fetch_charts(
            &Client::new(),
            &[chart(format!("{}/spx.png", server.uri()))],
        )
        .await;

        assert_eq!(bitmaps.len(), 1);
        assert_eq!(bitmaps[0].rgb.dimensions(), (4, 4));
    }

    #[tokio::test]
    async fn failed_download_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let bitmaps = fetch_charts(
            &Client::new(),
            &[
                chart(format!("{}/gone.png", server.uri())),
                chart("ftp://example.com/chart.png".into()),
            ],
        )
        .await;

        assert!(bitmaps.is_empty());
    }

    #[tokio::test]
    async fn undecodable_body_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/junk.png"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not an image"))
            .mount(&server)
            .await;

        let bitmaps = fetch_charts(
            &Client::new(),
            &[chart(format!("{}/junk.png", server.uri()))],
        )
        .await;

        assert!(bitmaps.is_empty());
    }

    #[tokio::test]
    async fn oversized_image_is_thumbnailed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(1600, 400)))
            .mount(&server)
            .await;

        let bitmaps = fetch_charts(
            &Client::new(),
            &[chart(format!("{}/big.png", server.uri()))],
        )
        .await;

        assert_eq!(bitmaps.len(), 1);
        let (w, h) = bitmaps[0].rgb.dimensions();
        assert!(w <= MAX_DIMENSION && h <= MAX_DIMENSION, "got {w}x{h}");
    }
}
