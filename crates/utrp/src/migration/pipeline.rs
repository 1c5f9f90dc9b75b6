//! Link → course: the fetch, extract, scrape and enrich steps shared by
//! migration and single-link imports.

use crate::catalog::scraper::resolved_courses;
use crate::catalog::{
    extract_rows, CatalogFetcher, CourseCatalogScraper, ScrapedRow, SiteSupport, UnresolvedReason,
};
use crate::error::{CatalogError, StoreError};
use crate::store::{AddOutcome, ScheduleStore};
use crate::types::{Course, CourseId, ScheduleId};
use scraper::Html;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Why a link did not produce a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason")]
pub enum UnmigratedReason {
    /// The page held no resolvable course
    NoMatch,
    /// The page resolved to more than one course
    Ambiguous { candidates: usize },
    /// Fetch error or timeout
    FetchFailed { message: String },
    /// The run was cancelled before this link finished
    Cancelled,
}

/// Fetches `link` and scrapes it into exactly one course.
pub async fn fetch_course<F>(fetcher: &F, link: &str, timeout: Duration) -> Result<Course, UnmigratedReason>
where
    F: CatalogFetcher + ?Sized,
{
    let start = Instant::now();
    let html = match tokio::time::timeout(timeout, fetcher.fetch(link)).await {
        Ok(Ok(html)) => html,
        Ok(Err(e)) => {
            warn!(link, error = %e, "Fetch failed");
            return Err(UnmigratedReason::FetchFailed {
                message: e.to_string(),
            });
        }
        Err(_) => {
            let e = CatalogError::Timeout {
                elapsed_secs: start.elapsed().as_secs_f64(),
            };
            warn!(link, error = %e, "Fetch timed out");
            return Err(UnmigratedReason::FetchFailed {
                message: e.to_string(),
            });
        }
    };

    scrape_single(&html, link)
}

/// Scrapes a page that should describe one course and attaches its description.
///
/// The description is only read when the page resolved to exactly one course.
pub fn scrape_single(html: &str, link: &str) -> Result<Course, UnmigratedReason> {
    let document = Html::parse_document(html);
    let support = SiteSupport::detect(link).unwrap_or(SiteSupport::CourseCatalogDetails);
    let rows = extract_rows(&document, support);

    let scraper = CourseCatalogScraper::new(support, &document, link);
    let results = scraper.scrape(&rows, false);
    let ambiguous = results
        .iter()
        .filter_map(|row| match row {
            ScrapedRow::Unresolved {
                reason: UnresolvedReason::Ambiguous { candidates },
                ..
            } => Some(*candidates),
            _ => None,
        })
        .max();
    let courses = resolved_courses(results);

    match courses.len() {
        // a row listing several sections is not a missing course
        0 => match ambiguous {
            Some(candidates) => {
                info!(link, candidates, "Page row lists several sections");
                Err(UnmigratedReason::Ambiguous { candidates })
            }
            None => {
                info!(link, rows = rows.len(), "No course resolved from page");
                Err(UnmigratedReason::NoMatch)
            }
        },
        1 => {
            let description = scraper
                .description(&courses)
                .map_err(|e| UnmigratedReason::Ambiguous { candidates: e.found })?;
            let mut course = courses.into_iter().next().ok_or(UnmigratedReason::NoMatch)?;
            course.description = description;
            Ok(course)
        }
        n => {
            info!(link, candidates = n, "Page resolved to several courses");
            Err(UnmigratedReason::Ambiguous { candidates: n })
        }
    }
}

/// Outcome of adding a single course by link.
#[derive(Debug, Clone, Serialize)]
pub enum ImportOutcome {
    Added(Course),
    AlreadyPresent(CourseId),
    Unresolved(UnmigratedReason),
}

/// Fetches one catalog link and adds its course to `schedule_id`.
///
/// Fails only when the schedule does not exist; every catalog problem is
/// reported through [`ImportOutcome::Unresolved`].
pub async fn import_link<F>(
    store: &ScheduleStore,
    fetcher: &F,
    schedule_id: &ScheduleId,
    link: &str,
    timeout: Duration,
) -> Result<ImportOutcome, StoreError>
where
    F: CatalogFetcher + ?Sized,
{
    if !store.contains(schedule_id) {
        return Err(StoreError::NotFound {
            what: format!("id '{schedule_id}'"),
        });
    }

    let course = match fetch_course(fetcher, link, timeout).await {
        Ok(course) => course,
        Err(reason) => return Ok(ImportOutcome::Unresolved(reason)),
    };

    let unique_id = course.unique_id.clone();
    match store.add_course(schedule_id, course.clone())? {
        AddOutcome::Added => {
            info!(schedule_id = %schedule_id, course = %unique_id, "Imported course");
            Ok(ImportOutcome::Added(course))
        }
        AddOutcome::AlreadyPresent => {
            info!(schedule_id = %schedule_id, course = %unique_id, "Course already exists");
            Ok(ImportOutcome::AlreadyPresent(unique_id))
        }
    }
}
