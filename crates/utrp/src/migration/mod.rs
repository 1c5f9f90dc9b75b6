//! v1 → v2 schedule migration.
//!
//! A v1 schedule is only a list of catalog links. Migration re-scrapes every
//! link and collects the results into a brand-new schedule:
//! 1. CollectLinks - read the legacy list (an empty list is fine)
//! 2. CreateTarget - create the migration schedule
//! 3. Activate - make it the active schedule
//! 4. PerRecord - fetch + scrape each link concurrently, insert one at a time
//! 5. Complete - report what moved and what did not
//!
//! Inserts always target the id returned in step 2, never whatever the store
//! reports as active at insert time.

pub mod legacy;
pub mod pipeline;

pub use legacy::{load_saved_courses, parse_saved_courses, LegacyCourse};
pub use pipeline::{fetch_course, import_link, scrape_single, ImportOutcome, UnmigratedReason};

use crate::catalog::CatalogFetcher;
use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::store::{AddOutcome, NamePolicy, ScheduleStore};
use crate::types::{generate_id, CourseId, ScheduleId};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MigrationPhase {
    CollectLinks,
    CreateTarget,
    Activate,
    PerRecord,
    Complete,
}

/// A legacy link that did not make it into the new schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmigratedLink {
    pub link: String,
    #[serde(flatten)]
    pub reason: UnmigratedReason,
}

/// Final report of a migration run.
///
/// `migrated_count + unmigrated.len()` always equals the number of input links.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub schedule_id: ScheduleId,
    pub schedule_name: String,
    pub migrated_count: usize,
    /// Course ids in input order; a course listed twice in v1 appears twice
    pub migrated: Vec<CourseId>,
    /// In input order
    pub unmigrated: Vec<UnmigratedLink>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    pub fn total_links(&self) -> usize {
        self.migrated_count + self.unmigrated.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.unmigrated.is_empty()
    }
}

/// Runs v1 migrations against a store.
pub struct Migrator<F: ?Sized> {
    store: Arc<ScheduleStore>,
    fetcher: Arc<F>,
    config: MigrationConfig,
}

impl<F> Migrator<F>
where
    F: CatalogFetcher + ?Sized,
{
    pub fn new(store: Arc<ScheduleStore>, fetcher: Arc<F>, config: MigrationConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Migrates `legacy` into a new schedule.
    pub async fn migrate(&self, legacy: &[LegacyCourse]) -> Result<MigrationReport, MigrationError> {
        self.migrate_with_cancel(legacy, CancellationToken::new()).await
    }

    /// Like [`migrate`](Self::migrate), stopping early when `cancel` fires.
    ///
    /// Courses inserted before cancellation stay in the schedule; links that
    /// had not finished are reported as [`UnmigratedReason::Cancelled`].
    pub async fn migrate_with_cancel(
        &self,
        legacy: &[LegacyCourse],
        cancel: CancellationToken,
    ) -> Result<MigrationReport, MigrationError> {
        let run_id = generate_id();
        let started_at = Utc::now();

        let links: Vec<&str> = legacy.iter().map(|c| c.link.trim()).collect();
        info!(run_id = %run_id, phase = ?MigrationPhase::CollectLinks, links = links.len(), "Starting v1 migration");

        let schedule_name = self.config.schedule_name.clone();
        let target = self
            .store
            .create_schedule(&schedule_name, NamePolicy::AllowDuplicates)
            .map_err(MigrationError::CreateTarget)?;
        info!(run_id = %run_id, phase = ?MigrationPhase::CreateTarget, schedule_id = %target, "Created migration schedule");

        self.store.switch_to(&target).map_err(MigrationError::Activate)?;
        info!(run_id = %run_id, phase = ?MigrationPhase::Activate, schedule_id = %target, "Activated migration schedule");

        let mut outcomes: Vec<Option<Result<CourseId, UnmigratedReason>>> = vec![None; links.len()];
        let cancelled = self
            .run_per_record(&run_id, &target, &links, &mut outcomes, &cancel)
            .await?;

        let mut migrated = Vec::new();
        let mut unmigrated = Vec::new();
        for (link, outcome) in links.iter().zip(outcomes) {
            match outcome {
                Some(Ok(unique_id)) => migrated.push(unique_id),
                Some(Err(reason)) => unmigrated.push(UnmigratedLink {
                    link: link.to_string(),
                    reason,
                }),
                None => unmigrated.push(UnmigratedLink {
                    link: link.to_string(),
                    reason: UnmigratedReason::Cancelled,
                }),
            }
        }

        let report = MigrationReport {
            run_id,
            schedule_id: target,
            schedule_name,
            migrated_count: migrated.len(),
            migrated,
            unmigrated,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            run_id = %report.run_id,
            phase = ?MigrationPhase::Complete,
            migrated = report.migrated_count,
            unmigrated = report.unmigrated.len(),
            cancelled = report.cancelled,
            duration_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Migration finished"
        );

        Ok(report)
    }

    /// Fetches concurrently and inserts from this loop only. Returns whether
    /// the run was cancelled.
    async fn run_per_record(
        &self,
        run_id: &str,
        target: &ScheduleId,
        links: &[&str],
        outcomes: &mut [Option<Result<CourseId, UnmigratedReason>>],
        cancel: &CancellationToken,
    ) -> Result<bool, MigrationError> {
        debug!(
            run_id,
            phase = ?MigrationPhase::PerRecord,
            concurrency = self.config.max_concurrency,
            "Fetching legacy links"
        );

        let fetcher: &F = &self.fetcher;
        let timeout = self.config.link_timeout();
        let results = stream::iter(links.iter().copied().enumerate())
            .map(|(index, link)| async move { (index, pipeline::fetch_course(fetcher, link, timeout).await) })
            .buffer_unordered(self.config.max_concurrency.max(1));
        let mut results = std::pin::pin!(results);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(run_id, "Migration cancelled");
                    return Ok(true);
                }
                next = results.next() => {
                    let Some((index, outcome)) = next else {
                        return Ok(false);
                    };
                    let link = links[index];
                    outcomes[index] = Some(match outcome {
                        Ok(course) => {
                            let unique_id = course.unique_id.clone();
                            match self.store.add_course(target, course).map_err(MigrationError::TargetLost)? {
                                AddOutcome::Added => info!(run_id, link, course = %unique_id, "Migrated course"),
                                AddOutcome::AlreadyPresent => {
                                    info!(run_id, link, course = %unique_id, "Course already migrated")
                                }
                            }
                            Ok(unique_id)
                        }
                        Err(reason) => {
                            warn!(run_id, link, ?reason, "Link not migrated");
                            Err(reason)
                        }
                    });
                }
            }
        }
    }
}
