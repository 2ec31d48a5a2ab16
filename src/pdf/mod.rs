pub mod images;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, IndirectFontRef, Mm,
    PdfDocument, PdfDocumentReference, PdfLayerReference, Px,
};
use tracing::debug;

use crate::text::clean_markup;
use images::ChartBitmap;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const PARAGRAPH_GAP_MM: f32 = 4.0;
const TITLE_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 11.0;
/// Wrap column for 11pt Helvetica on an A4 text block.
const WRAP_COLS: usize = 95;
const IMAGE_DPI: f32 = 96.0;
const MAX_IMAGE_WIDTH_MM: f32 = 150.0;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("PDF generation failed: {0}")]
    Generation(#[from] printpdf::Error),

    #[error("failed to write PDF file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render one language's brief to an A4 PDF: dated title, wrapped body
/// paragraphs, then the chart images, breaking pages as needed.
pub fn render_brief(
    content: &str,
    charts: &[ChartBitmap],
    language: &str,
    date: NaiveDate,
    path: &Path,
) -> Result<(), PdfError> {
    let title = format!(
        "Financial Market Summary - {} ({language})",
        date.format("%Y-%m-%d")
    );
    let (doc, page, layer) = PdfDocument::new(
        &title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "content",
    );
    let body_font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let title_font = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    let mut writer = PageWriter {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };

    writer.write_line(&title, &title_font, TITLE_SIZE);
    writer.advance(PARAGRAPH_GAP_MM);

    for paragraph in clean_markup(content).split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        for line in wrap_text(paragraph, WRAP_COLS) {
            writer.write_line(&line, &body_font, BODY_SIZE);
        }
        writer.advance(PARAGRAPH_GAP_MM);
    }

    for chart in charts {
        writer.place_image(chart);
        writer.advance(PARAGRAPH_GAP_MM);
    }

    let file = File::create(path).map_err(|source| PdfError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    doc.save(&mut BufWriter::new(file))?;
    debug!(path = %path.display(), "PDF report written");
    Ok(())
}

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    /// Cursor in mm from the page bottom; text is written below it.
    y: f32,
}

impl PageWriter<'_> {
    fn ensure_space(&mut self, needed_mm: f32) {
        if self.y - needed_mm < MARGIN_MM {
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                "content",
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
    }

    fn advance(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn write_line(&mut self, line: &str, font: &IndirectFontRef, size: f32) {
        self.ensure_space(LINE_HEIGHT_MM);
        self.y -= LINE_HEIGHT_MM;
        self.layer
            .use_text(line, size, Mm(MARGIN_MM), Mm(self.y), font);
    }

    fn place_image(&mut self, chart: &ChartBitmap) {
        let (px_w, px_h) = chart.rgb.dimensions();
        let natural_w_mm = px_w as f32 * 25.4 / IMAGE_DPI;
        let natural_h_mm = px_h as f32 * 25.4 / IMAGE_DPI;
        let scale = (MAX_IMAGE_WIDTH_MM / natural_w_mm).min(1.0);
        let height_mm = natural_h_mm * scale;

        self.ensure_space(height_mm);
        self.y -= height_mm;

        let xobject = ImageXObject {
            width: Px(px_w as usize),
            height: Px(px_h as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: chart.rgb.as_raw().clone(),
            image_filter: None,
            smask: None,
            clipping_bbox: None,
        };
        Image::from(xobject).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN_MM)),
                translate_y: Some(Mm(self.y)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        debug!(url = %chart.source_url, height_mm, "chart embedded");
    }
}

/// Greedy word wrap; words longer than `cols` are hard-split on char
/// boundaries so no line ever exceeds `cols` characters.
fn wrap_text(paragraph: &str, cols: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        if word.chars().count() > cols {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut chunk = String::new();
            for c in word.chars() {
                chunk.push(c);
                if chunk.chars().count() == cols {
                    lines.push(std::mem::take(&mut chunk));
                }
            }
            current = chunk;
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > cols && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn wrap_respects_column_limit() {
        let lines = wrap_text("alpha beta gamma delta epsilon", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta", "epsilon"]);
        for line in &lines {
            assert!(line.chars().count() <= 11);
        }
    }

    #[test]
    fn wrap_hard_splits_overlong_words() {
        let lines = wrap_text("aaaaaaaaaa", 4);
        assert_eq!(lines, vec!["aaaa", "aaaa", "aa"]);
    }

    #[test]
    fn wrap_empty_paragraph_is_empty() {
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[test]
    fn renders_text_only_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brief.pdf");

        render_brief(
            "Markets closed higher.\n\nTech led the rally.",
            &[],
            "English",
            date(),
            &path,
        )
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"), "not a PDF header");
    }

    #[test]
    fn renders_report_with_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brief_chart.pdf");

        let chart = ChartBitmap {
            source_url: "https://img.example.com/spx.png".into(),
            rgb: image::RgbImage::from_pixel(8, 8, image::Rgb([200, 30, 30])),
        };

        render_brief("Body text.", &[chart], "English", date(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn long_content_spans_pages_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.pdf");

        let paragraph = "word ".repeat(400);
        let content = vec![paragraph; 12].join("\n\n");
        render_brief(&content, &[], "English", date(), &path).unwrap();

        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }
}
