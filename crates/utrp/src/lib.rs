//! Course catalog scraping and schedule migration for UT Registration Plus.
//!
//! The crate turns UT course schedule pages into typed [`Course`]s, keeps
//! them in an in-memory [`ScheduleStore`], and migrates v1 saved-course
//! lists (plain catalog links) into v2 schedules with [`Migrator`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod migration;
pub mod store;
pub mod types;

pub use catalog::{CatalogClient, CatalogFetcher, CourseCatalogScraper, SiteSupport};
pub use config::EngineConfig;
pub use error::{AmbiguousResult, CatalogError, ConfigError, MigrationError, StoreError};
pub use migration::{LegacyCourse, MigrationReport, Migrator, UnmigratedLink, UnmigratedReason};
pub use store::{AddOutcome, NamePolicy, ScheduleStore};
pub use types::{Course, CourseId, Schedule, ScheduleId, Semester};
