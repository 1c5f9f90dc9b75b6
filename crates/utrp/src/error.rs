//! Error types for the catalog, store and migration subsystems.

use thiserror::Error;

/// Errors that can occur while fetching a catalog page.
#[derive(Debug, Error, Clone)]
pub enum CatalogError {
    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// The request did not finish within the configured timeout
    #[error("Request timed out after {elapsed_secs:.1}s")]
    Timeout { elapsed_secs: f64 },

    /// The catalog answered with a non-success status
    #[error("Catalog returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Session has expired - the catalog redirected to the UT login page
    #[error("Session expired, redirected to: {redirect_url}")]
    SessionExpired { redirect_url: String },

    /// Circuit breaker is open due to repeated failures
    #[error("Circuit breaker open - too many recent failures")]
    CircuitBreakerOpen,

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },
}

impl CatalogError {
    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Network { .. } | CatalogError::Timeout { .. } => true,
            CatalogError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report how long it waited
            CatalogError::Timeout { elapsed_secs: 0.0 }
        } else {
            CatalogError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for CatalogError {
    fn from(err: url::ParseError) -> Self {
        CatalogError::UrlError {
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the schedule store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No schedule matches the given id or name
    #[error("Schedule not found: {what}")]
    NotFound { what: String },

    /// A schedule with this name already exists and the caller asked for unique names
    #[error("A schedule named '{name}' already exists")]
    DuplicateName { name: String },
}

/// Description enrichment was requested for something other than exactly one course.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Expected exactly one resolved course, found {found}")]
pub struct AmbiguousResult {
    pub found: usize,
}

/// Fatal errors of a migration run.
///
/// Everything else that can go wrong during a migration is recorded per link
/// in the report instead.
#[derive(Debug, Error, Clone)]
pub enum MigrationError {
    #[error("Failed to create migration schedule: {0}")]
    CreateTarget(#[source] StoreError),

    #[error("Failed to activate migration schedule: {0}")]
    Activate(#[source] StoreError),

    #[error("Migration schedule disappeared during the run: {0}")]
    TargetLost(#[source] StoreError),
}

/// Errors loading configuration or legacy course files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
