//! Host geometry abstraction
//!
//! Detection never walks a rendering surface directly. Hosts describe what is
//! on screen through [`GeometryProvider`].

use serde::{Deserialize, Serialize};

/// A page currently (partially) on screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisiblePage {
    pub page: u32,
    /// Fraction of the page's height inside the viewport, 0-1
    pub visibility_ratio: f64,
}

/// A rectangular area of a page, in page coordinates (Y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Queries answered by the host's rendering surface
pub trait GeometryProvider {
    /// Pages at least partially visible, in any order
    fn visible_pages(&self) -> Vec<VisiblePage>;

    /// Text rendered inside `region` of `page`; the visible part of the page when `None`
    fn text_in_region(&self, page: u32, region: Option<Region>) -> Option<String>;

    /// Page under a viewport position, if any
    fn page_number_from_position(&self, x: f64, y: f64) -> Option<u32>;
}

/// The most visible page; the earliest listed wins ties
pub fn primary_visible_page(pages: &[VisiblePage]) -> Option<VisiblePage> {
    pages.iter().copied().fold(None, |best, page| match best {
        Some(b) if b.visibility_ratio >= page.visibility_ratio => Some(b),
        _ => Some(page),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible(page: u32, visibility_ratio: f64) -> VisiblePage {
        VisiblePage {
            page,
            visibility_ratio,
        }
    }

    #[test]
    fn test_primary_visible_page() {
        let pages = vec![visible(4, 0.3), visible(5, 0.7), visible(6, 0.7)];
        assert_eq!(primary_visible_page(&pages).unwrap().page, 5);
        assert!(primary_visible_page(&[]).is_none());
    }

    #[test]
    fn test_region_contains() {
        let region = Region {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        };
        assert!(region.contains(10.0, 20.0));
        assert!(region.contains(110.0, 70.0));
        assert!(!region.contains(5.0, 30.0));
    }
}
