//! HTTP client for the UT course schedule.
//!
//! Catalog pages are plain server-rendered HTML; a fetch is a single GET
//! guarded by:
//! 1. a page cache, so a link scraped twice is downloaded once
//! 2. a circuit breaker, so a catalog outage fails fast instead of stalling
//! 3. a login-redirect check, since an expired session serves the login page

use super::cache::{CircuitBreaker, PageCache, PageKey};
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// URL fragments that mean we were bounced to UT's login flow.
const LOGIN_INDICATORS: [&str; 5] = [
    "login.utexas.edu",
    "enterprise.login",
    "shibboleth",
    "saml",
    "/login",
];

/// Anything that can turn a catalog link into page HTML.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, CatalogError>;
}

/// Fetches course schedule pages over HTTP.
pub struct CatalogClient {
    client: Client,
    config: CatalogConfig,
    cache: PageCache,
    circuit_breaker: CircuitBreaker,
}

impl CatalogClient {
    /// Creates a client with default configuration.
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_config(CatalogConfig::default())
    }

    pub fn with_config(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .redirect(Policy::limited(10))
            .cookie_store(true)
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CatalogError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            cache: PageCache::new(config.cache_ttl()),
            circuit_breaker: CircuitBreaker::new(
                config.breaker_threshold,
                config.breaker_recovery(),
            ),
            config,
        })
    }

    /// Resolves a possibly relative catalog link against the configured base URL.
    pub fn resolve_link(&self, link: &str) -> Result<Url, CatalogError> {
        match Url::parse(link) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(&format!("{}/", self.config.base_url.trim_end_matches('/')))?;
                Ok(base.join(link.trim_start_matches('/'))?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_uncached(&self, url: &Url) -> Result<String, CatalogError> {
        let start = Instant::now();
        let response = self.client.get(url.as_str()).send().await?;

        check_session_valid(response.url())?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await?;
        debug!(
            url = %url,
            bytes = html.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched catalog page"
        );
        Ok(html)
    }
}

#[async_trait]
impl CatalogFetcher for CatalogClient {
    async fn fetch(&self, link: &str) -> Result<String, CatalogError> {
        let url = self.resolve_link(link)?;
        let key = PageKey::from_link(url.as_str());

        if let Some(html) = self.cache.get(&key) {
            debug!(url = %url, "Returning cached catalog page");
            return Ok(html);
        }

        if self.circuit_breaker.is_open() {
            warn!(url = %url, "Circuit breaker is open, rejecting request");
            return Err(CatalogError::CircuitBreakerOpen);
        }

        match self.fetch_uncached(&url).await {
            Ok(html) => {
                self.circuit_breaker.record_success();
                self.cache.insert(key, html.clone());
                Ok(html)
            }
            Err(e) => {
                if e.is_retryable() {
                    self.circuit_breaker.record_failure();
                }
                info!(url = %url, error = %e, "Catalog fetch failed");
                Err(e)
            }
        }
    }
}

/// Returns an error if the final URL is a login page.
fn check_session_valid(final_url: &Url) -> Result<(), CatalogError> {
    let url = final_url.as_str().to_lowercase();

    if LOGIN_INDICATORS.iter().any(|indicator| url.contains(indicator)) {
        warn!(url = %final_url, "Session expired - redirected to login");
        return Err(CatalogError::SessionExpired {
            redirect_url: final_url.to_string(),
        });
    }

    Ok(())
}
