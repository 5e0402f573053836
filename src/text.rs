//! Page text structuring
//!
//! Groups positioned text tokens into lines and flags probable headings by
//! their rendered height and length. Results are cached per page.
//!
//! Y coordinates grow down the page: a smaller `y` is closer to the top.

use crate::config::TextConfig;
use crate::detection::similarity::word_count;
use crate::error::AnalyticsError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One positioned run of text as produced by the page text provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    #[serde(default)]
    pub x: f64,
    pub y: f64,
    /// Rendered glyph height, a proxy for font size
    #[serde(default)]
    pub height: f64,
}

impl TextToken {
    pub fn new(text: &str, x: f64, y: f64, height: f64) -> Self {
        Self {
            text: text.to_string(),
            x,
            y,
            height,
        }
    }
}

/// A line of text assembled from tokens sharing a Y position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// Height of the tallest token on the line
    pub height: f64,
    pub y: f64,
    pub token_count: usize,
}

/// Structured text for one page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageStructure {
    pub page: u32,
    pub headings: Vec<TextLine>,
    pub all_text: Vec<TextLine>,
}

impl PageStructure {
    /// All line text joined with spaces
    pub fn raw_text(&self) -> String {
        self.all_text
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.all_text.iter().map(|l| word_count(&l.text)).sum()
    }

    /// The heading nearest to `y` that sits above it, or at most `slack` below it
    pub fn closest_heading_above(&self, y: f64, slack: f64) -> Option<&TextLine> {
        self.headings
            .iter()
            .filter(|h| h.y <= y + slack)
            .min_by(|a, b| (y - a.y).abs().total_cmp(&(y - b.y).abs()))
    }
}

/// Supplies positioned text tokens for a page
pub trait PageTextProvider {
    fn page_tokens(&self, page: u32) -> Result<Vec<TextToken>, AnalyticsError>;
}

/// Group tokens into lines and flag heading candidates
pub fn structure_page(page: u32, tokens: &[TextToken], config: &TextConfig) -> PageStructure {
    let mut structure = PageStructure {
        page,
        ..Default::default()
    };

    let mut current: Vec<&TextToken> = Vec::new();
    let mut current_y: Option<f64> = None;

    for token in tokens.iter().filter(|t| !t.text.trim().is_empty()) {
        let same_line = current_y.map_or(true, |y| (token.y - y).abs() < config.line_tolerance);
        if !same_line {
            push_line(&mut structure, &current, config);
            current.clear();
        }
        current.push(token);
        current_y = Some(token.y);
    }
    push_line(&mut structure, &current, config);

    structure
}

fn push_line(structure: &mut PageStructure, tokens: &[&TextToken], config: &TextConfig) {
    let Some(last) = tokens.last() else {
        return;
    };

    let text = tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    let height = tokens.iter().map(|t| t.height).fold(0.0, f64::max);

    let line = TextLine {
        text,
        height,
        y: last.y,
        token_count: tokens.len(),
    };

    if line.height > config.heading_min_height && line.text.chars().count() < config.heading_max_chars
    {
        structure.headings.push(line.clone());
    }
    structure.all_text.push(line);
}

/// Per-page cache of structured text.
///
/// Populating the same page twice simply replaces the earlier entry.
#[derive(Debug, Clone, Default)]
pub struct TextCache {
    config: TextConfig,
    pages: HashMap<u32, PageStructure>,
}

impl TextCache {
    pub fn new(config: TextConfig) -> Self {
        Self {
            config,
            pages: HashMap::new(),
        }
    }

    /// Structure `page` through `provider` unless it is already cached.
    ///
    /// Extraction failures are logged and leave the page uncached.
    pub fn ensure(&mut self, page: u32, provider: &dyn PageTextProvider) -> Option<&PageStructure> {
        if !self.pages.contains_key(&page) {
            match provider.page_tokens(page) {
                Ok(tokens) => {
                    let structure = structure_page(page, &tokens, &self.config);
                    debug!(
                        "Extracted text for page {}: {} lines, {} headings",
                        page,
                        structure.all_text.len(),
                        structure.headings.len()
                    );
                    self.pages.insert(page, structure);
                }
                Err(e) => {
                    warn!("Skipping text for page {}: {}", page, e);
                    return None;
                }
            }
        }
        self.pages.get(&page)
    }

    pub fn insert(&mut self, structure: PageStructure) {
        self.pages.insert(structure.page, structure);
    }

    pub fn get(&self, page: u32) -> Option<&PageStructure> {
        self.pages.get(&page)
    }

    pub fn invalidate(&mut self, page: u32) {
        self.pages.remove(&page);
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Rounded mean word count over cached pages, if any
    pub fn average_words_per_page(&self) -> Option<u32> {
        if self.pages.is_empty() {
            return None;
        }
        let total: usize = self.pages.values().map(PageStructure::word_count).sum();
        Some((total as f64 / self.pages.len() as f64).round() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn sample_tokens() -> Vec<TextToken> {
        vec![
            TextToken::new("Chapter", 72.0, 100.0, 18.0),
            TextToken::new("Two", 140.0, 100.5, 18.0),
            TextToken::new("It was", 72.0, 130.0, 10.0),
            TextToken::new("a dark night.", 110.0, 131.0, 10.0),
            TextToken::new("   ", 72.0, 150.0, 10.0),
            TextToken::new("Footnote", 72.0, 700.0, 8.0),
        ]
    }

    struct CountingProvider {
        calls: Cell<u32>,
    }

    impl PageTextProvider for CountingProvider {
        fn page_tokens(&self, page: u32) -> Result<Vec<TextToken>, AnalyticsError> {
            self.calls.set(self.calls.get() + 1);
            if page == 13 {
                return Err(AnalyticsError::TextExtraction {
                    page,
                    reason: "corrupt stream".to_string(),
                });
            }
            Ok(sample_tokens())
        }
    }

    #[test]
    fn test_groups_tokens_into_lines() {
        let structure = structure_page(1, &sample_tokens(), &TextConfig::default());
        let lines: Vec<&str> = structure.all_text.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(lines, vec!["Chapter Two", "It was a dark night.", "Footnote"]);
        assert_eq!(structure.all_text[1].token_count, 2);
        assert_eq!(structure.raw_text(), "Chapter Two It was a dark night. Footnote");
        assert_eq!(structure.word_count(), 8);
    }

    #[test]
    fn test_flags_tall_short_lines_as_headings() {
        let structure = structure_page(1, &sample_tokens(), &TextConfig::default());
        assert_eq!(structure.headings.len(), 1);
        assert_eq!(structure.headings[0].text, "Chapter Two");
        assert_eq!(structure.headings[0].height, 18.0);
    }

    #[test]
    fn test_long_lines_are_not_headings() {
        let long = "word ".repeat(30);
        let tokens = vec![TextToken::new(&long, 0.0, 10.0, 20.0)];
        let structure = structure_page(1, &tokens, &TextConfig::default());
        assert!(structure.headings.is_empty());
        assert_eq!(structure.all_text.len(), 1);
    }

    #[test]
    fn test_closest_heading_above() {
        let tokens = vec![
            TextToken::new("Intro", 0.0, 50.0, 16.0),
            TextToken::new("body", 0.0, 80.0, 10.0),
            TextToken::new("Setup", 0.0, 300.0, 16.0),
        ];
        let structure = structure_page(2, &tokens, &TextConfig::default());
        assert_eq!(structure.closest_heading_above(200.0, 30.0).unwrap().text, "Intro");
        assert_eq!(structure.closest_heading_above(280.0, 30.0).unwrap().text, "Setup");
        assert!(structure.closest_heading_above(10.0, 30.0).is_none());
    }

    #[test]
    fn test_cache_extracts_once_and_skips_failures() {
        let provider = CountingProvider {
            calls: Cell::new(0),
        };
        let mut cache = TextCache::new(TextConfig::default());

        assert!(cache.ensure(1, &provider).is_some());
        assert!(cache.ensure(1, &provider).is_some());
        assert_eq!(provider.calls.get(), 1);

        assert!(cache.ensure(13, &provider).is_none());
        assert!(cache.get(13).is_none());
        assert_eq!(cache.len(), 1);

        cache.invalidate(1);
        assert!(cache.ensure(1, &provider).is_some());
        assert_eq!(provider.calls.get(), 3);
    }

    #[test]
    fn test_average_words_per_page() {
        let mut cache = TextCache::new(TextConfig::default());
        assert_eq!(cache.average_words_per_page(), None);

        cache.insert(structure_page(1, &sample_tokens(), &TextConfig::default()));
        cache.insert(structure_page(
            2,
            &[TextToken::new("one two three", 0.0, 0.0, 10.0)],
            &TextConfig::default(),
        ));
        // (8 + 3) / 2 = 5.5
        assert_eq!(cache.average_words_per_page(), Some(6));
    }
}
