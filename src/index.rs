//! Section index
//!
//! Holds every known section (configured and dynamic) in one arena keyed by
//! [`SectionId`], plus the lookups the detector needs: which sections cover a
//! page, and a forgiving title matcher per section.

use crate::detection::similarity::tokenize;
use crate::outline::flatten;
use crate::types::{Section, SectionId};
use indexmap::IndexMap;
use log::{debug, warn};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Keywords must be longer than this many characters
const MIN_KEYWORD_CHARS: usize = 2;

/// Title pattern and keyword set for one section
#[derive(Debug, Clone)]
pub struct TitleMatcher {
    pattern: Option<Regex>,
    keywords: Vec<String>,
}

impl TitleMatcher {
    /// Build a case-insensitive pattern that tolerates any whitespace between
    /// the title's words, plus the title's keyword set
    pub fn new(title: &str) -> Self {
        let words: Vec<String> = title.split_whitespace().map(regex::escape).collect();
        let pattern = if words.is_empty() {
            None
        } else {
            match Regex::new(&format!("(?i){}", words.join(r"\s*"))) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Could not build title pattern for {:?}: {}", title, e);
                    None
                }
            }
        };

        let mut keywords: Vec<String> = tokenize(title)
            .into_iter()
            .filter(|w| w.chars().count() > MIN_KEYWORD_CHARS)
            .collect();
        keywords.sort();

        Self { pattern, keywords }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(text))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Fraction of keywords present in `tokens`, 0 for keyword-less titles
    pub fn keyword_fraction(&self, tokens: &HashSet<String>) -> f64 {
        if self.keywords.is_empty() {
            return 0.0;
        }
        let matched = self.keywords.iter().filter(|k| tokens.contains(*k)).count();
        matched as f64 / self.keywords.len() as f64
    }
}

/// Arena of sections with page and title lookups
#[derive(Debug, Clone)]
pub struct SectionIndex {
    total_pages: u32,
    tree: Vec<Section>,
    sections: IndexMap<SectionId, Section>,
    page_map: HashMap<u32, Vec<SectionId>>,
    matchers: HashMap<SectionId, TitleMatcher>,
}

impl SectionIndex {
    /// Index a normalized section tree
    pub fn new(tree: Vec<Section>, total_pages: u32) -> Self {
        let sections = flatten(&tree)
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let mut index = Self {
            total_pages,
            tree,
            sections,
            page_map: HashMap::new(),
            matchers: HashMap::new(),
        };
        index.rebuild();
        index
    }

    /// Recompute the page map and title matchers from the arena
    pub fn rebuild(&mut self) {
        self.page_map.clear();
        self.matchers.clear();

        for section in self.sections.values() {
            for page in section.pages() {
                self.page_map
                    .entry(page)
                    .or_default()
                    .push(section.id.clone());
            }
            self.matchers
                .insert(section.id.clone(), TitleMatcher::new(&section.title));
        }

        debug!(
            "Section index rebuilt: {} sections, {} page mappings",
            self.sections.len(),
            self.page_map.len()
        );
    }

    /// Register a runtime-synthesized section. Returns false if the id is taken.
    pub fn add_dynamic(&mut self, section: Section) -> bool {
        if self.sections.contains_key(&section.id) {
            return false;
        }
        let section = section.without_children();
        self.tree.push(section.clone());
        self.sections.insert(section.id.clone(), section);
        self.rebuild();
        true
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn contains_page(&self, page: u32) -> bool {
        (1..=self.total_pages).contains(&page)
    }

    pub fn get(&self, id: &SectionId) -> Option<&Section> {
        self.sections.get(id)
    }

    pub fn contains(&self, id: &SectionId) -> bool {
        self.sections.contains_key(id)
    }

    /// Sections in outline order (dynamic sections last, in creation order)
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// The nested section tree, dynamic sections appended at the top level
    pub fn tree(&self) -> &[Section] {
        &self.tree
    }

    /// Every section whose page range covers `page`
    pub fn sections_on_page(&self, page: u32) -> Vec<&Section> {
        self.page_map
            .get(&page)
            .map(|ids| ids.iter().filter_map(|id| self.sections.get(id)).collect())
            .unwrap_or_default()
    }

    /// The first section mapped to `page`
    pub fn primary_section(&self, page: u32) -> Option<&Section> {
        self.page_map
            .get(&page)
            .and_then(|ids| ids.first())
            .and_then(|id| self.sections.get(id))
    }

    pub fn matcher(&self, id: &SectionId) -> Option<&TitleMatcher> {
        self.matchers.get(id)
    }

    pub fn dynamic_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values().filter(|s| s.is_dynamic())
    }
}
