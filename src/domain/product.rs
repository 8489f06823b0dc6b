use serde::{Deserialize, Serialize};

/// Titles the reseller pages render when the product heading is missing.
pub const PLACEHOLDER_TITLES: [&str; 2] = ["제목 없음", "no title"];

/// A scraped product listing offered for matching against a keyword.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ProductCandidate {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl ProductCandidate {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            image_urls: vec![],
        }
    }

    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }

    /// Whether the title carries real text rather than nothing or a placeholder.
    pub fn has_title(&self) -> bool {
        !is_placeholder_title(&self.title)
    }
}

/// Returns `true` for empty titles and the scraper's "no title" sentinels.
pub fn is_placeholder_title(title: &str) -> bool {
    let trimmed = title.trim();
    trimmed.is_empty()
        || PLACEHOLDER_TITLES
            .iter()
            .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
}
