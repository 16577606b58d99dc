//! Page-link window for paginated product listings.
//!
//! Pages are zero-based, matching the catalog API's `number` field; labels
//! shown to users are one-based.

use serde::Serialize;

/// One entry in the page-link bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageLink {
    /// A link to a page (zero-based `index`, one-based `label`).
    Page {
        index: u32,
        label: u32,
        current: bool,
    },
    /// A gap between non-adjacent page links.
    Ellipsis,
}

impl PageLink {
    fn page(index: u32, current: u32) -> Self {
        Self::Page {
            index,
            label: index + 1,
            current: index == current,
        }
    }
}

/// The set of page links to render for a listing.
///
/// Always shows the first and last page, the current page with its
/// immediate neighbours, and an ellipsis for any gap in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub current: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub links: Vec<PageLink>,
}

impl PageWindow {
    /// Build the window for `current` out of `total_pages`.
    ///
    /// Returns an empty window (no links, no navigation) when there is at
    /// most one page.
    #[must_use]
    pub fn new(total_pages: u32, current: u32) -> Self {
        if total_pages <= 1 {
            return Self {
                current,
                total_pages,
                has_previous: false,
                has_next: false,
                links: Vec::new(),
            };
        }

        let last = total_pages - 1;
        let mut links = vec![PageLink::page(0, current)];

        if current > 2 {
            links.push(PageLink::Ellipsis);
        }

        let lo = current.saturating_sub(1).max(1);
        let hi = current.saturating_add(1).min(last.saturating_sub(1));
        links.extend((lo..=hi).map(|i| PageLink::page(i, current)));

        if current.saturating_add(3) < total_pages {
            links.push(PageLink::Ellipsis);
        }

        links.push(PageLink::page(last, current));

        Self {
            current,
            total_pages,
            has_previous: current > 0,
            has_next: current < last,
            links,
        }
    }

    /// Whether there is anything to render.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(window: &PageWindow) -> Vec<String> {
        window
            .links
            .iter()
            .map(|l| match l {
                PageLink::Page { label, current: true, .. } => format!("[{label}]"),
                PageLink::Page { label, .. } => label.to_string(),
                PageLink::Ellipsis => "…".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_single_page_renders_nothing() {
        assert!(PageWindow::new(0, 0).is_empty());
        assert!(PageWindow::new(1, 0).is_empty());
    }

    #[test]
    fn test_two_pages() {
        let w = PageWindow::new(2, 0);
        assert_eq!(labels(&w), ["[1]", "2"]);
        assert!(!w.has_previous);
        assert!(w.has_next);
    }

    #[test]
    fn test_start_of_long_listing() {
        assert_eq!(labels(&PageWindow::new(10, 0)), ["[1]", "2", "…", "10"]);
        assert_eq!(labels(&PageWindow::new(10, 2)), ["1", "2", "[3]", "4", "…", "10"]);
    }

    #[test]
    fn test_middle_of_long_listing() {
        assert_eq!(
            labels(&PageWindow::new(10, 5)),
            ["1", "…", "5", "[6]", "7", "…", "10"]
        );
    }

    #[test]
    fn test_end_of_long_listing() {
        let w = PageWindow::new(10, 9);
        assert_eq!(labels(&w), ["1", "…", "9", "[10]"]);
        assert!(w.has_previous);
        assert!(!w.has_next);
        assert_eq!(labels(&PageWindow::new(10, 6)), ["1", "…", "6", "[7]", "8", "…", "10"]);
        assert_eq!(labels(&PageWindow::new(10, 7)), ["1", "…", "7", "[8]", "9", "10"]);
    }

    #[test]
    fn test_three_pages_middle() {
        assert_eq!(labels(&PageWindow::new(3, 1)), ["1", "[2]", "3"]);
    }
}
