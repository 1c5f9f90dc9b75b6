//! Course catalog scraping.
//!
//! Turns UT course schedule pages into [`Course`](crate::types::Course)
//! values:
//! 1. [`extract_rows`] walks the results table and produces [`RowRecord`]s
//! 2. [`CourseCatalogScraper`] interprets rows into courses
//! 3. [`CatalogClient`] fetches pages, with caching and a circuit breaker

pub mod cache;
pub mod client;
pub mod scraper;
pub mod table;

pub use client::{CatalogClient, CatalogFetcher};
pub use scraper::{CourseCatalogScraper, ScrapedRow, UnresolvedReason};
pub use table::{extract_rows, Cell, ColumnRole, RowRecord};

use serde::{Deserialize, Serialize};

/// Which catalog page layout a document follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteSupport {
    /// Search results: many courses, each introduced by a `course_header` row
    CourseCatalogList,
    /// A single section's page; the course name lives in the `#details` heading
    CourseCatalogDetails,
}

impl SiteSupport {
    /// Guesses the page layout from its URL.
    ///
    /// Returns `None` for URLs that are not course schedule pages at all.
    pub fn detect(link: &str) -> Option<Self> {
        let url = url::Url::parse(link).ok()?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let pos = segments.iter().position(|s| *s == "course_schedule")?;
        match &segments[pos + 1..] {
            [_semester, "results", ..] => Some(SiteSupport::CourseCatalogList),
            [_semester, unique] if unique.chars().all(|c| c.is_ascii_digit()) => {
                Some(SiteSupport::CourseCatalogDetails)
            }
            _ => None,
        }
    }
}
