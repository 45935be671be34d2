// ABOUTME: Two-page flip-book viewer over a fixed, ordered list of page images
// ABOUTME: Pages advance two at a time and fall back to a placeholder once on load failure

use crate::errors::{Result, StoryError};
use crate::media::MediaProbe;
use crate::utils;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;

/// One visible page of a spread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    /// 1-based page number
    pub number: usize,
    pub src: String,
    pub fallback: bool,
}

/// The two facing pages on screen, plus the state of the controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spread {
    pub left: PageView,
    /// `None` renders as an empty page.
    pub right: Option<PageView>,
    pub prev_disabled: bool,
    pub next_disabled: bool,
}

#[derive(Debug, Clone)]
pub struct FlipBook {
    pages: Vec<String>,
    placeholder: String,
    current_page: usize,
    fallen_back: HashSet<usize>,
}

impl FlipBook {
    pub fn new(pages: Vec<String>, placeholder: impl Into<String>) -> Self {
        Self {
            pages,
            placeholder: placeholder.into(),
            current_page: 0,
            fallen_back: HashSet::new(),
        }
    }

    /// Build a book from every file matching `pattern`, in natural order.
    pub fn from_glob(pattern: &str, placeholder: impl Into<String>) -> Result<Self> {
        let mut pages: Vec<String> = glob::glob(pattern)
            .map_err(|e| StoryError::ValidationError(format!("Invalid glob pattern: {}", e)))?
            .flatten()
            .map(|path| path.to_string_lossy().to_string())
            .collect();

        if pages.is_empty() {
            return Err(StoryError::NoPagesFoundError(pattern.to_string()));
        }
        pages.sort_by(|a, b| utils::natural_cmp(a, b));
        info!("Found {} pages for {}", pages.len(), pattern);

        Ok(Self::new(pages, placeholder))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Index of the left-hand page.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn can_next(&self) -> bool {
        self.current_page + 2 < self.pages.len()
    }

    pub fn can_prev(&self) -> bool {
        self.current_page >= 2
    }

    pub fn next(&mut self) -> bool {
        if !self.can_next() {
            return false;
        }
        self.current_page += 2;
        true
    }

    pub fn prev(&mut self) -> bool {
        if !self.can_prev() {
            return false;
        }
        self.current_page -= 2;
        true
    }

    /// Swap a page for the placeholder. Happens at most once per page.
    pub fn mark_failed(&mut self, index: usize) -> bool {
        if index >= self.pages.len() {
            return false;
        }
        let first_time = self.fallen_back.insert(index);
        if first_time {
            warn!(
                "Page {} failed to load, showing {}",
                self.pages[index], self.placeholder
            );
        }
        first_time
    }

    /// Probe the visible pages and fall back for any that cannot load.
    pub fn check_visible<P: MediaProbe>(&mut self, probe: &P) {
        let visible = [self.current_page, self.current_page + 1];
        for index in visible {
            if index >= self.pages.len() || self.fallen_back.contains(&index) {
                continue;
            }
            if let Err(e) = probe.probe_image(&self.pages[index]) {
                warn!("Failed to load page {}: {}", index + 1, e);
                self.mark_failed(index);
            }
        }
    }

    fn page_view(&self, index: usize) -> Option<PageView> {
        let src = self.pages.get(index)?;
        let fallback = self.fallen_back.contains(&index);
        Some(PageView {
            number: index + 1,
            src: if fallback {
                self.placeholder.clone()
            } else {
                src.clone()
            },
            fallback,
        })
    }

    /// The spread currently open, or `None` for a book with no pages.
    pub fn spread(&self) -> Option<Spread> {
        Some(Spread {
            left: self.page_view(self.current_page)?,
            right: self.page_view(self.current_page + 1),
            prev_disabled: !self.can_prev(),
            next_disabled: !self.can_next(),
        })
    }
}
