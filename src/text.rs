use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s<>'\x22)]+\.(?:jpg|jpeg|png|gif|webp)").expect("valid regex")
});

/// Extract image URLs (by file extension) from free-form LLM output.
pub fn extract_image_urls(text: &str) -> Vec<String> {
    IMAGE_URL
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strip the HTML-ish markup LLMs sometimes emit (`<p>`, `<br>`) down to
/// plain paragraphs separated by blank lines.
pub fn clean_markup(text: &str) -> String {
    text.replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<p>", "")
        .replace("</p>", "\n\n")
}

/// Truncate `text` to at most `max_words` words, cutting at a word boundary.
/// Returns the input unchanged when it is already under the cap.
pub fn enforce_word_cap(text: &str, max_words: usize) -> String {
    match text.split_whitespace().nth(max_words) {
        // `split_whitespace` yields subslices of `text`, so the first word
        // past the cap gives us the byte offset to cut at.
        Some(word) => {
            let offset = word.as_ptr() as usize - text.as_ptr() as usize;
            text[..offset].trim_end().to_string()
        }
        None => text.to_string(),
    }
}

/// Truncate to at most `max_bytes`, never splitting a UTF-8 character.
pub fn truncate_chars(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_image_urls_by_extension() {
        let text = "see https://example.com/chart.png and https://a.io/x.jpeg (plus https://a.io/page.html)";
        let urls = extract_image_urls(text);
        assert_eq!(
            urls,
            vec!["https://example.com/chart.png", "https://a.io/x.jpeg"]
        );
    }

    #[test]
    fn extracts_nothing_from_plain_text() {
        assert!(extract_image_urls("no links here").is_empty());
    }

    #[test]
    fn clean_markup_strips_tags() {
        let out = clean_markup("<p>first</p><p>second<br>line</p>");
        assert_eq!(out, "first\n\nsecond\nline\n\n");
    }

    #[test]
    fn word_cap_passthrough_when_under() {
        assert_eq!(enforce_word_cap("one two three", 5), "one two three");
    }

    #[test]
    fn word_cap_truncates_at_boundary() {
        assert_eq!(enforce_word_cap("one two three four", 2), "one two");
    }

    #[test]
    fn word_cap_exact_length_untouched() {
        assert_eq!(enforce_word_cap("one two", 2), "one two");
    }

    #[test]
    fn truncate_chars_respects_boundaries() {
        let s = "日本語テキスト";
        let cut = truncate_chars(s, 4);
        assert!(cut.len() <= 4);
        assert!(s.starts_with(cut));
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
