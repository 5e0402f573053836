//! Outline normalization
//!
//! Turns a possibly empty, nested document outline into page-bounded sections.
//! Destinations are resolved through a [`DestinationResolver`]; anything that
//! fails to resolve lands on page 1 instead of aborting the whole outline.

use crate::error::AnalyticsError;
use crate::types::{Section, SectionId};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default sections are sized so that a document splits into roughly this many parts
pub const DEFAULT_SECTION_DIVISOR: u32 = 10;

/// One entry of a document outline as delivered by the outline provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlineNode {
    #[serde(default)]
    pub title: Option<String>,
    /// Opaque destination handed to the resolver
    #[serde(default, alias = "dest")]
    pub destination: Option<String>,
    #[serde(default, alias = "items")]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(title: &str, destination: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            destination: Some(destination.to_string()),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }
}

/// Maps an outline destination to a 1-based page number
pub trait DestinationResolver {
    fn resolve(&self, destination: &str) -> Result<u32, AnalyticsError>;
}

/// Resolver backed by a table of named destinations.
///
/// Names not in the table are accepted as explicit page references:
/// `"7"`, `"page=7"` or `"#page=7"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedDestinations {
    #[serde(flatten)]
    names: HashMap<String, u32>,
}

impl NamedDestinations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, page: u32) {
        self.names.insert(name.into(), page);
    }
}

impl DestinationResolver for NamedDestinations {
    fn resolve(&self, destination: &str) -> Result<u32, AnalyticsError> {
        if let Some(page) = self.names.get(destination) {
            return Ok(*page);
        }
        let explicit = destination
            .trim()
            .trim_start_matches('#')
            .trim_start_matches("page=");
        explicit
            .parse::<u32>()
            .map_err(|_| AnalyticsError::DestinationUnresolved(destination.to_string()))
    }
}

/// Normalize an outline into a section tree with resolved, clamped page ranges.
///
/// An empty outline yields evenly sized default sections.
pub fn normalize_outline(
    outline: &[OutlineNode],
    total_pages: u32,
    resolver: &dyn DestinationResolver,
) -> Vec<Section> {
    if total_pages == 0 {
        return Vec::new();
    }
    if outline.is_empty() {
        debug!("No outline found, creating default sections");
        return default_sections(total_pages);
    }

    let mut tree = parse_nodes(outline, 1, "", total_pages, resolver);
    compute_end_pages(&mut tree, total_pages);
    tree
}

fn parse_nodes(
    nodes: &[OutlineNode],
    level: u32,
    path: &str,
    total_pages: u32,
    resolver: &dyn DestinationResolver,
) -> Vec<Section> {
    let mut sections = Vec::with_capacity(nodes.len());

    for (i, node) in nodes.iter().enumerate() {
        let start_page = match node.destination.as_deref() {
            Some(dest) => resolver.resolve(dest).unwrap_or_else(|e| {
                warn!("Falling back to page 1 for outline entry: {}", e);
                1
            }),
            None => 1,
        };

        let title = node
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Section {}", sections.len() + 1));

        let node_path = if path.is_empty() {
            i.to_string()
        } else {
            format!("{}_{}", path, i)
        };

        let start_page = start_page.clamp(1, total_pages);
        let mut section = Section::configured(
            format!("section_{}_{}", level, node_path),
            title,
            start_page,
            start_page,
            level,
        );
        section.children = parse_nodes(&node.children, level + 1, &node_path, total_pages, resolver);
        sections.push(section);
    }

    sections
}

/// Evenly sized sections covering the whole document
pub fn default_sections(total_pages: u32) -> Vec<Section> {
    let pages_per_section = total_pages.div_ceil(DEFAULT_SECTION_DIVISOR).max(1);

    (1..=total_pages)
        .step_by(pages_per_section as usize)
        .enumerate()
        .map(|(i, start_page)| {
            let end_page = (start_page + pages_per_section - 1).min(total_pages);
            Section::configured(
                format!("default_section_{}", i),
                format!("Section {}", i + 1),
                start_page,
                end_page,
                1,
            )
        })
        .collect()
}

/// Compute end pages across every level of the tree.
///
/// All sections are ordered by start page regardless of depth; each ends one
/// page before the next begins and the last one ends at `total_pages`.
pub fn compute_end_pages(tree: &mut [Section], total_pages: u32) {
    let mut flat: Vec<(SectionId, u32)> = flatten(tree)
        .into_iter()
        .map(|s| (s.id, s.start_page))
        .collect();
    flat.sort_by_key(|(_, start)| *start);

    let mut ends: HashMap<SectionId, u32> = HashMap::with_capacity(flat.len());
    for i in 0..flat.len() {
        let start = flat[i].1;
        let end = match flat.get(i + 1) {
            Some((_, next_start)) => next_start.saturating_sub(1),
            None => total_pages,
        };
        ends.insert(flat[i].0.clone(), end.max(start));
    }

    apply_end_pages(tree, &ends);
}

fn apply_end_pages(tree: &mut [Section], ends: &HashMap<SectionId, u32>) {
    for section in tree.iter_mut() {
        if let Some(end) = ends.get(&section.id) {
            section.end_page = *end;
        }
        apply_end_pages(&mut section.children, ends);
    }
}

/// Depth-first copy of every section in the tree, children stripped
pub fn flatten(tree: &[Section]) -> Vec<Section> {
    let mut out = Vec::new();
    flatten_into(tree, &mut out);
    out
}

fn flatten_into(tree: &[Section], out: &mut Vec<Section>) {
    for section in tree {
        out.push(section.without_children());
        flatten_into(&section.children, out);
    }
}
