use std::fmt;

/// A target language, named in configuration (e.g. `Arabic`). The name is
/// passed verbatim to the translation prompt; `slug` derives a filesystem-safe
/// form for output filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    name: String,
}

impl Language {
    pub fn new(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            name: trimmed.to_string(),
        })
    }

    pub fn english() -> Self {
        Self {
            name: "English".to_string(),
        }
    }

    /// Parse a comma-separated list, skipping empty entries.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',').filter_map(Self::new).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased name with non-alphanumeric runs collapsed to `_`, for use
    /// in output filenames.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        let mut last_was_sep = false;
        for c in self.name.chars() {
            if c.is_alphanumeric() {
                slug.extend(c.to_lowercase());
                last_was_sep = false;
            } else if !last_was_sep && !slug.is_empty() {
                slug.push('_');
                last_was_sep = true;
            }
        }
        while slug.ends_with('_') {
            slug.pop();
        }
        slug
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_skips_empty() {
        let langs = Language::parse_list("Arabic, Hindi ,,Hebrew,");
        let names: Vec<_> = langs.iter().map(Language::name).collect();
        assert_eq!(names, vec!["Arabic", "Hindi", "Hebrew"]);
    }

    #[test]
    fn new_rejects_blank() {
        assert!(Language::new("   ").is_none());
    }

    #[test]
    fn slug_is_filesystem_safe() {
        assert_eq!(Language::new("Arabic").unwrap().slug(), "arabic");
        assert_eq!(
            Language::new("Brazilian Portuguese").unwrap().slug(),
            "brazilian_portuguese"
        );
        assert_eq!(Language::new("Chinese (Simplified)").unwrap().slug(), "chinese_simplified");
    }
}
