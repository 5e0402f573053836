//! Section detection
//!
//! Decides which section the viewer is in from a text fragment, the page
//! number, and optional viewport or hover context. Detection only proposes
//! candidates; applying them is up to the caller.
//!
//! Pipeline: primary scorers → arbitration → heading fallback or dynamic
//! synthesis when no text-backed candidate is confident enough.

pub mod scorers;
pub mod similarity;

use crate::config::DetectorConfig;
use crate::geometry::{primary_visible_page, GeometryProvider, VisiblePage};
use crate::index::SectionIndex;
use crate::text::{PageStructure, TextCache};
use crate::types::{DetectionCandidate, DetectionMethod, Section};
use log::{debug, info};
use scorers::{arbitrate, DetectionInput, ScoringContext, FALLBACK_SCORERS, PRIMARY_SCORERS};
use similarity::similarity;

pub use scorers::{score_heading_similarity, score_page_mapping, score_title_match};

/// Characters of heading text used in a dynamic section id
const DYNAMIC_ID_CHARS: usize = 20;

/// Typographic evidence that a fragment is a heading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadingHint {
    /// Rendered font size or glyph height
    pub font_size: f64,
    pub bold: bool,
}

/// Multi-signal section detector
#[derive(Debug, Clone, Default)]
pub struct SectionDetector {
    config: DetectorConfig,
}

impl SectionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect the section for `fragment` observed on `page`.
    ///
    /// With a heading-like `hint` and no confident text match, a dynamic
    /// section may be synthesized and registered in `index`.
    pub fn detect(
        &self,
        index: &mut SectionIndex,
        page_text: Option<&PageStructure>,
        fragment: &str,
        page: u32,
        hint: Option<&HeadingHint>,
    ) -> Option<DetectionCandidate> {
        if !index.contains_page(page) {
            debug!("Detection skipped: page {} outside document", page);
            return None;
        }
        let input = DetectionInput::new(fragment, page);

        {
            let ctx = ScoringContext {
                index: &*index,
                page_text,
                config: &self.config,
            };
            let candidates: Vec<DetectionCandidate> =
                PRIMARY_SCORERS.iter().filter_map(|score| score(&input, &ctx)).collect();
            let text_backed = candidates.iter().any(|c| {
                c.method != DetectionMethod::PageMapping && c.confidence >= self.config.min_confidence
            });
            let best = arbitrate(candidates, self.config.min_confidence);
            if text_backed || !input.has_text() {
                return best;
            }

            let heading_like = hint.is_some_and(|h| self.is_heading_like(input.fragment, h));
            if !heading_like {
                let fallback = arbitrate(
                    FALLBACK_SCORERS.iter().filter_map(|score| score(&input, &ctx)),
                    self.config.min_confidence,
                );
                return fallback.or(best);
            }
        }

        Some(self.match_or_synthesize(index, input.fragment, page))
    }

    /// Heading-likeness of a fragment: large font +2, bold +1, short +1; a
    /// heading scores at least 2 and is either tall or brief
    pub fn is_heading_like(&self, fragment: &str, hint: &HeadingHint) -> bool {
        let chars = fragment.trim().chars().count();
        if chars < 3 {
            return false;
        }
        let large = hint.font_size > self.config.large_font;
        let score = if large { 2 } else { 0 }
            + u32::from(hint.bold)
            + u32::from(chars < self.config.short_heading_chars);

        score >= 2 && (large || chars < self.config.dynamic_max_chars)
    }

    /// Match a heading against the page's sections by title similarity, or
    /// create a dynamic section for it
    fn match_or_synthesize(
        &self,
        index: &mut SectionIndex,
        heading: &str,
        page: u32,
    ) -> DetectionCandidate {
        match self.match_heading(index, heading, page) {
            Some(candidate) => candidate,
            None => self.synthesize(index, heading, page),
        }
    }

    fn match_heading(
        &self,
        index: &SectionIndex,
        heading: &str,
        page: u32,
    ) -> Option<DetectionCandidate> {
        let threshold = self.config.heading_similarity_threshold;
        let matched = index
            .sections_on_page(page)
            .into_iter()
            .map(|s| (s, similarity(heading, &s.title)))
            .filter(|(_, sim)| *sim >= threshold)
            .fold(None, |best: Option<(&Section, f64)>, (s, sim)| match best {
                Some((_, b)) if b >= sim => best,
                _ => Some((s, sim)),
            });
        matched.map(|(section, sim)| DetectionCandidate {
            section: section.clone(),
            confidence: (sim * self.config.heading_similarity_weight).clamp(0.0, 1.0),
            method: DetectionMethod::HeadingSimilarity,
        })
    }

    fn synthesize(&self, index: &mut SectionIndex, heading: &str, page: u32) -> DetectionCandidate {
        let id = dynamic_section_id(page, heading);
        let section = match index.get(&id.as_str().into()) {
            Some(existing) => existing.clone(),
            None => {
                let section = Section::dynamic(id, heading.trim(), page);
                index.add_dynamic(section.clone());
                info!("Created dynamic section: {} (page {})", section.title, page);
                section
            }
        };

        DetectionCandidate {
            section,
            confidence: self.config.dynamic_confidence,
            method: DetectionMethod::DynamicSynthesis,
        }
    }

    /// Detect from what is on screen.
    ///
    /// The most visible page decides. An unambiguous page maps straight to its
    /// section; otherwise the page's visible text is matched, falling back to
    /// the page's first section.
    pub fn detect_from_viewport(
        &self,
        index: &mut SectionIndex,
        texts: &TextCache,
        visible: &[VisiblePage],
        geometry: &dyn GeometryProvider,
    ) -> Option<DetectionCandidate> {
        let primary = primary_visible_page(visible)?;
        let page = primary.page;

        let (first, count) = {
            let sections = index.sections_on_page(page);
            (sections.first().map(|s| (*s).clone())?, sections.len())
        };
        if count == 1 {
            return Some(DetectionCandidate {
                section: first,
                confidence: self.config.page_mapping_confidence,
                method: DetectionMethod::PageMapping,
            });
        }

        if let Some(text) = geometry.text_in_region(page, None) {
            if let Some(candidate) = self.detect(index, texts.get(page), &text, page, None) {
                if candidate.confidence >= self.config.viewport_accept {
                    return Some(candidate);
                }
            }
        }

        debug!("Ambiguous page {} ({} sections), using first", page, count);
        Some(DetectionCandidate {
            section: first,
            confidence: self.config.page_mapping_confidence / count as f64,
            method: DetectionMethod::PageMapping,
        })
    }

    /// Detect from hovered text at vertical position `y`.
    ///
    /// Text-backed matches of the hovered text win; otherwise the closest
    /// heading above the pointer is matched or turned into a dynamic section.
    pub fn detect_from_hover(
        &self,
        index: &mut SectionIndex,
        page_text: Option<&PageStructure>,
        page: u32,
        hover_text: &str,
        y: f64,
    ) -> Option<DetectionCandidate> {
        if let Some(candidate) = self.detect(index, page_text, hover_text, page, None) {
            if candidate.method != DetectionMethod::PageMapping
                && candidate.confidence >= self.config.hover_accept
            {
                return Some(candidate);
            }
        }

        let heading = page_text?.closest_heading_above(y, self.config.hover_slack)?;
        if let Some(candidate) = self.match_heading(index, &heading.text, page) {
            return Some(candidate);
        }
        // structured headings only need to be tall or brief here
        let chars = heading.text.trim().chars().count();
        if heading.height > self.config.large_font || chars < self.config.dynamic_max_chars {
            Some(self.synthesize(index, &heading.text, page))
        } else {
            debug!("Hover heading on page {} too weak to synthesize", page);
            None
        }
    }
}

/// `dynamic_section_{page}_{slug}` where the slug is the first characters of
/// the heading, lowercased, with everything but ASCII alphanumerics replaced
pub fn dynamic_section_id(page: u32, heading: &str) -> String {
    let slug: String = heading
        .trim()
        .chars()
        .take(DYNAMIC_ID_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("dynamic_section_{}_{}", page, slug)
}
