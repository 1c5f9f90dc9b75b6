//! TTL page cache and circuit breaker for catalog fetches.

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

/// Cache key for a catalog page: the URL with its fragment dropped.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct PageKey(String);

impl PageKey {
    pub fn from_link(link: &str) -> Self {
        match Url::parse(link.trim()) {
            Ok(mut url) => {
                url.set_fragment(None);
                Self(url.into())
            }
            Err(_) => Self(link.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CachedPage {
    html: String,
    fetched_at: Instant,
}

/// Thread-safe cache of fetched catalog pages.
pub struct PageCache {
    entries: DashMap<PageKey, CachedPage>,
    ttl: Duration,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Gets a cached page if it exists and hasn't expired.
    pub fn get(&self, key: &PageKey) -> Option<String> {
        {
            let entry = self.entries.get(key)?;
            if entry.fetched_at.elapsed() < self.ttl {
                return Some(entry.html.clone());
            }
        }

        // expired; the read guard must be gone before removing
        self.entries.remove(key);
        None
    }

    /// Inserts a page, first evicting every expired entry so the map only
    /// holds pages fetched within the TTL.
    pub fn insert(&self, key: PageKey, html: String) {
        self.evict_expired();
        self.entries.insert(
            key,
            CachedPage {
                html,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, page| page.fetched_at.elapsed() < ttl);
    }
}

#[derive(Debug, Clone, Copy)]
enum BreakerState {
    Closed { failures: u32 },
    Open { since: Instant },
}

/// Stops hitting the catalog after a run of consecutive failures.
///
/// Once open, requests are rejected until `recovery_time` has passed. The
/// breaker then half-opens: every caller is let through until one of them
/// records a failure, which re-opens it, or a success, which closes it.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
            threshold: threshold.max(1),
            recovery_time,
        }
    }

    /// Returns true if requests should currently be rejected.
    pub fn is_open(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        match *state {
            BreakerState::Closed { .. } => false,
            BreakerState::Open { since } if since.elapsed() >= self.recovery_time => {
                // half-open: one more failure re-opens immediately
                *state = BreakerState::Closed {
                    failures: self.threshold - 1,
                };
                false
            }
            BreakerState::Open { .. } => true,
        }
    }

    pub fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = BreakerState::Closed { failures: 0 };
        }
    }

    pub fn record_failure(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = match *state {
                BreakerState::Closed { failures } if failures + 1 >= self.threshold => {
                    BreakerState::Open {
                        since: Instant::now(),
                    }
                }
                BreakerState::Closed { failures } => BreakerState::Closed {
                    failures: failures + 1,
                },
                open @ BreakerState::Open { .. } => open,
            };
        }
    }

    /// Consecutive failures while closed; `threshold` while open.
    pub fn failure_count(&self) -> u32 {
        match self.state.lock().map(|s| *s) {
            Ok(BreakerState::Closed { failures }) => failures,
            Ok(BreakerState::Open { .. }) => self.threshold,
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_key_ignores_fragment() {
        let a = PageKey::from_link("https://utdirect.utexas.edu/apps/registrar/course_schedule/20239/52625/#top");
        let b = PageKey::from_link(" https://utdirect.utexas.edu/apps/registrar/course_schedule/20239/52625/");
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = PageCache::new(Duration::from_millis(0));
        let key = PageKey::from_link("https://example.test/a");
        cache.insert(key.clone(), "<html></html>".into());
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());

        let cache = PageCache::new(Duration::from_secs(60));
        cache.insert(key.clone(), "<html></html>".into());
        assert_eq!(cache.get(&key).as_deref(), Some("<html></html>"));
    }

    #[test]
    fn test_insert_evicts_expired_pages() {
        let cache = PageCache::new(Duration::from_millis(0));
        for i in 0..5 {
            cache.insert(PageKey::from_link(&format!("https://example.test/{i}")), String::new());
        }
        // every earlier page had already expired when the last one went in
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_circuit_breaker_threshold() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(!cb.is_open());
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 2);
        cb.record_failure();
        assert!(cb.is_open());

        cb.record_success();
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_circuit_breaker_recovers() {
        let cb = CircuitBreaker::new(2, Duration::from_millis(0));
        cb.record_failure();
        cb.record_failure();
        // recovery time already elapsed: half-open, and concurrent callers all pass
        assert!(!cb.is_open());
        assert!(!cb.is_open());
        cb.record_failure();
        assert_eq!(cb.failure_count(), 2);
    }
}
