//! Section scorers
//!
//! Each scorer is a pure function of the fragment, the page and the section
//! index. [`arbitrate`] combines their proposals.

use crate::config::DetectorConfig;
use crate::detection::similarity::{similarity, tokenize};
use crate::index::SectionIndex;
use crate::text::PageStructure;
use crate::types::{DetectionCandidate, DetectionMethod};
use std::collections::HashSet;

/// Fragments shorter than this carry no usable text
const MIN_FRAGMENT_CHARS: usize = 2;

/// A text fragment observed on a page
#[derive(Debug, Clone)]
pub struct DetectionInput<'a> {
    pub fragment: &'a str,
    pub page: u32,
    tokens: HashSet<String>,
}

impl<'a> DetectionInput<'a> {
    pub fn new(fragment: &'a str, page: u32) -> Self {
        Self {
            fragment: fragment.trim(),
            page,
            tokens: tokenize(fragment),
        }
    }

    pub fn has_text(&self) -> bool {
        self.fragment.chars().count() >= MIN_FRAGMENT_CHARS
    }

    pub fn tokens(&self) -> &HashSet<String> {
        &self.tokens
    }
}

/// Read-only state a scorer may consult
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub index: &'a SectionIndex,
    pub page_text: Option<&'a PageStructure>,
    pub config: &'a DetectorConfig,
}

pub type ScoreFn = fn(&DetectionInput<'_>, &ScoringContext<'_>) -> Option<DetectionCandidate>;

/// Scorers consulted for every detection, highest priority first
pub const PRIMARY_SCORERS: &[ScoreFn] = &[score_page_mapping, score_title_match];

/// Scorers consulted only when no text-backed candidate clears the threshold
pub const FALLBACK_SCORERS: &[ScoreFn] = &[score_heading_similarity];

/// Highest confidence at or above `threshold`; earlier candidates win ties
pub fn arbitrate(
    candidates: impl IntoIterator<Item = DetectionCandidate>,
    threshold: f64,
) -> Option<DetectionCandidate> {
    candidates
        .into_iter()
        .filter(|c| c.confidence >= threshold)
        .fold(None, |best, c| match best {
            Some(b) if b.confidence >= c.confidence => Some(b),
            _ => Some(c),
        })
}

/// The page's only section, when it has exactly one
pub fn score_page_mapping(
    input: &DetectionInput<'_>,
    ctx: &ScoringContext<'_>,
) -> Option<DetectionCandidate> {
    match ctx.index.sections_on_page(input.page).as_slice() {
        [only] => Some(DetectionCandidate {
            section: (*only).clone(),
            confidence: ctx.config.page_mapping_confidence,
            method: DetectionMethod::PageMapping,
        }),
        _ => None,
    }
}

/// Title pattern match, else keyword overlap, over sections covering the page
pub fn score_title_match(
    input: &DetectionInput<'_>,
    ctx: &ScoringContext<'_>,
) -> Option<DetectionCandidate> {
    if !input.has_text() {
        return None;
    }
    let config = ctx.config;
    let primary_id = ctx.index.primary_section(input.page).map(|s| &s.id);

    let mut best: Option<DetectionCandidate> = None;
    for section in ctx.index.sections_on_page(input.page) {
        let Some(matcher) = ctx.index.matcher(&section.id) else {
            continue;
        };

        let (mut confidence, method) = if matcher.matches(input.fragment) {
            (config.pattern_match_confidence, DetectionMethod::TitlePattern)
        } else {
            (
                matcher.keyword_fraction(input.tokens()) * config.keyword_weight,
                DetectionMethod::KeywordOverlap,
            )
        };
        if confidence <= 0.0 {
            continue;
        }
        if primary_id == Some(&section.id) {
            confidence *= config.agreement_boost;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        if best.as_ref().map_or(true, |b| confidence > b.confidence) {
            best = Some(DetectionCandidate {
                section: section.clone(),
                confidence,
                method,
            });
        }
    }
    best
}

/// Fragment resembles a heading extracted from the page: attribute it to the
/// page's primary section
pub fn score_heading_similarity(
    input: &DetectionInput<'_>,
    ctx: &ScoringContext<'_>,
) -> Option<DetectionCandidate> {
    if !input.has_text() {
        return None;
    }
    let page_text = ctx.page_text?;
    let config = ctx.config;

    let best = page_text
        .headings
        .iter()
        .map(|h| similarity(input.fragment, &h.text))
        .filter(|sim| *sim > config.heading_similarity_threshold)
        .fold(None, |best: Option<f64>, sim| Some(best.map_or(sim, |b| b.max(sim))))?;

    let section = ctx.index.primary_section(input.page)?;
    Some(DetectionCandidate {
        section: section.clone(),
        confidence: (best * config.heading_similarity_weight).clamp(0.0, 1.0),
        method: DetectionMethod::HeadingSimilarity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextConfig;
    use crate::text::{structure_page, TextToken};
    use crate::types::Section;

    fn index() -> SectionIndex {
        SectionIndex::new(
            vec![
                Section::configured("intro", "Introduction", 1, 5, 1),
                Section::configured("methods", "Materials and Methods", 6, 12, 1),
                Section::configured("tools", "Tooling Overview", 12, 12, 2),
                Section::configured("results", "Results", 13, 20, 1),
            ],
            20,
        )
    }

    fn ctx<'a>(index: &'a SectionIndex, config: &'a DetectorConfig) -> ScoringContext<'a> {
        ScoringContext {
            index,
            page_text: None,
            config,
        }
    }

    fn candidate(id: &str, confidence: f64) -> DetectionCandidate {
        DetectionCandidate {
            section: Section::configured(id, id, 1, 1, 1),
            confidence,
            method: DetectionMethod::KeywordOverlap,
        }
    }

    #[test]
    fn test_page_mapping_requires_single_section() {
        let index = index();
        let config = DetectorConfig::default();
        let ctx = ctx(&index, &config);

        let hit = score_page_mapping(&DetectionInput::new("", 7), &ctx).unwrap();
        assert_eq!(hit.section.id.as_str(), "methods");
        assert_eq!(hit.confidence, 0.85);

        // methods and tools both cover page 12
        assert!(score_page_mapping(&DetectionInput::new("", 12), &ctx).is_none());
    }

    #[test]
    fn test_title_pattern_with_agreement_boost() {
        let index = index();
        let config = DetectorConfig::default();
        let ctx = ctx(&index, &config);

        let hit = score_title_match(&DetectionInput::new("2. Materials and  Methods", 12), &ctx)
            .unwrap();
        assert_eq!(hit.section.id.as_str(), "methods");
        assert_eq!(hit.method, DetectionMethod::TitlePattern);
        assert_eq!(hit.confidence, 1.0);

        // tools is not the primary section of page 12, so no boost
        let hit = score_title_match(&DetectionInput::new("tooling overview", 12), &ctx).unwrap();
        assert_eq!(hit.section.id.as_str(), "tools");
        assert!((hit.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_overlap_scaled() {
        let index = index();
        let config = DetectorConfig::default();
        let ctx = ctx(&index, &config);

        // one of {materials, and, methods} on the primary section: 1/3 * 0.7 * 1.2
        let hit = score_title_match(&DetectionInput::new("our methods differ", 8), &ctx).unwrap();
        assert_eq!(hit.method, DetectionMethod::KeywordOverlap);
        assert!((hit.confidence - 0.28).abs() < 1e-9);

        assert!(score_title_match(&DetectionInput::new("unrelated words", 8), &ctx).is_none());
        assert!(score_title_match(&DetectionInput::new("x", 8), &ctx).is_none());
    }

    #[test]
    fn test_heading_similarity_uses_page_headings() {
        let index = index();
        let config = DetectorConfig::default();
        let page_text = structure_page(
            14,
            &[
                TextToken::new("Error Analysis Details", 0.0, 40.0, 16.0),
                TextToken::new("body text", 0.0, 80.0, 10.0),
            ],
            &TextConfig::default(),
        );
        let ctx = ScoringContext {
            index: &index,
            page_text: Some(&page_text),
            config: &config,
        };

        let hit =
            score_heading_similarity(&DetectionInput::new("error analysis details", 14), &ctx)
                .unwrap();
        assert_eq!(hit.section.id.as_str(), "results");
        assert!((hit.confidence - 0.8).abs() < 1e-9);

        // 2/4 overlap is below the similarity threshold
        assert!(
            score_heading_similarity(&DetectionInput::new("error analysis summary", 14), &ctx)
                .is_none()
        );
    }

    #[test]
    fn test_arbitrate_prefers_confidence_then_priority() {
        let best = arbitrate(
            vec![candidate("a", 0.5), candidate("b", 0.7), candidate("c", 0.7)],
            0.3,
        )
        .unwrap();
        assert_eq!(best.section.id.as_str(), "b");

        assert!(arbitrate(vec![candidate("a", 0.29)], 0.3).is_none());
        assert!(arbitrate(Vec::new(), 0.3).is_none());
    }
}
