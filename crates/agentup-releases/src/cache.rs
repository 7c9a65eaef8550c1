//! File-backed release cache with a 15-minute TTL.
//!
//! TTL decisions take `now` as a parameter so tests need no mock clock; the
//! runtime passes `Utc::now()`. The cache file is a JSON envelope
//! `{updated, data}` under the configured cache directory.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use agentup_core::types::AgentRelease;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ReleaseError;
use crate::fetch::ReleaseFetcher;

/// Cached release data is reused for this long before re-fetching.
pub const RELEASE_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Last-resort version when there is no cache and the network is
/// unreachable. Install is never offered from this fallback (empty assets).
pub const DEFAULT_AGENT_VERSION: &str = "15.1.9";

const CACHE_FILE_NAME: &str = "agent_release.json";

/// Cache location and TTL, passed in at construction.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("agentup");
        Self {
            cache_dir,
            ttl: RELEASE_CACHE_TTL,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    /// Unix seconds of the last successful fetch.
    updated: i64,
    data: AgentRelease,
}

pub struct ReleaseCache<F> {
    fetcher: F,
    config: CacheConfig,
}

impl<F: ReleaseFetcher> ReleaseCache<F> {
    pub fn new(fetcher: F, config: CacheConfig) -> Self {
        Self { fetcher, config }
    }

    /// Resolve the latest known release.
    ///
    /// - cache younger than the TTL → cached data, no network call;
    /// - otherwise fetch; success rewrites the cache;
    /// - fetch failure → stale cached value unchanged; with no cache at all,
    ///   a network failure degrades to [`DEFAULT_AGENT_VERSION`] with no
    ///   assets, while a malformed payload yields `None`.
    pub fn get_latest(&self, now: DateTime<Utc>) -> Option<AgentRelease> {
        let cached = self.read_cache();
        if let Some(ref envelope) = cached
            && now.timestamp().saturating_sub(envelope.updated) < self.config.ttl.as_secs() as i64
        {
            return Some(envelope.data.clone());
        }

        match self.fetcher.fetch_latest() {
            Ok(release) => {
                self.write_cache(now, &release);
                Some(release)
            }
            Err(err) => {
                warn!(%err, "release fetch failed, falling back to cache");
                match cached {
                    Some(envelope) => Some(envelope.data),
                    None => match err {
                        ReleaseError::Malformed(_) => None,
                        _ => Some(AgentRelease {
                            version: DEFAULT_AGENT_VERSION.to_string(),
                            assets: Default::default(),
                        }),
                    },
                }
            }
        }
    }

    fn cache_path(&self) -> PathBuf {
        self.config.cache_dir.join(CACHE_FILE_NAME)
    }

    fn read_cache(&self) -> Option<CacheEnvelope> {
        let path = self.cache_path();
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                debug!(%err, path = %path.display(), "discarding unreadable release cache");
                None
            }
        }
    }

    fn write_cache(&self, now: DateTime<Utc>, release: &AgentRelease) {
        let envelope = CacheEnvelope {
            updated: now.timestamp(),
            data: release.clone(),
        };
        let path = self.cache_path();
        let result = fs::create_dir_all(&self.config.cache_dir)
            .and_then(|()| fs::write(&path, serde_json::to_string(&envelope).unwrap_or_default()));
        if let Err(err) = result {
            warn!(%err, path = %path.display(), "failed to write release cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use agentup_core::arch::ArchBucket;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339 timestamp")
            .with_timezone(&Utc)
    }

    fn release(version: &str) -> AgentRelease {
        let mut assets = BTreeMap::new();
        assets.insert(
            ArchBucket::normalize("arm64"),
            format!("https://example.invalid/{version}/arm64.xz"),
        );
        AgentRelease {
            version: version.to_string(),
            assets,
        }
    }

    /// Counts fetches; responses are scripted per call index.
    struct ScriptedFetcher {
        calls: AtomicUsize,
        script: Vec<Result<AgentRelease, String>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<AgentRelease, String>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReleaseFetcher for ScriptedFetcher {
        fn fetch_latest(&self) -> Result<AgentRelease, ReleaseError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(index.min(self.script.len().saturating_sub(1))) {
                Some(Ok(release)) => Ok(release.clone()),
                Some(Err(msg)) => Err(ReleaseError::Malformed(msg.clone())),
                None => Err(ReleaseError::Malformed("script exhausted".to_string())),
            }
        }
    }

    /// Network-style failure (not malformed): connection refused etc.
    struct OfflineFetcher;

    impl ReleaseFetcher for OfflineFetcher {
        fn fetch_latest(&self) -> Result<AgentRelease, ReleaseError> {
            Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "offline").into())
        }
    }

    fn cache_in(dir: &tempfile::TempDir, fetcher: ScriptedFetcher) -> ReleaseCache<ScriptedFetcher> {
        ReleaseCache::new(
            fetcher,
            CacheConfig {
                cache_dir: dir.path().to_path_buf(),
                ttl: RELEASE_CACHE_TTL,
            },
        )
    }

    #[test]
    fn second_call_within_ttl_skips_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_in(&dir, ScriptedFetcher::new(vec![Ok(release("16.2.1"))]));

        let t0 = ts("2026-08-01T10:00:00Z");
        let first = cache.get_latest(t0).expect("first fetch");
        // 14 minutes later: still inside the TTL.
        let second = cache
            .get_latest(ts("2026-08-01T10:14:00Z"))
            .expect("cached value");

        assert_eq!(first, second);
        assert_eq!(cache.fetcher.call_count(), 1, "no second network call inside TTL");
    }

    #[test]
    fn call_after_ttl_refetches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_in(
            &dir,
            ScriptedFetcher::new(vec![Ok(release("16.2.1")), Ok(release("16.3.0"))]),
        );

        cache.get_latest(ts("2026-08-01T10:00:00Z")).expect("first");
        // 16 minutes later: TTL expired, re-fetch happens.
        let refreshed = cache
            .get_latest(ts("2026-08-01T10:16:00Z"))
            .expect("refetched");

        assert_eq!(refreshed.version, "16.3.0");
        assert_eq!(cache.fetcher.call_count(), 2);
    }

    #[test]
    fn failed_refetch_returns_previous_value_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_in(
            &dir,
            ScriptedFetcher::new(vec![Ok(release("16.2.1")), Err("boom".to_string())]),
        );

        let first = cache.get_latest(ts("2026-08-01T10:00:00Z")).expect("first");
        let after_failure = cache
            .get_latest(ts("2026-08-01T10:20:00Z"))
            .expect("stale cached value");

        assert_eq!(first, after_failure);
        assert_eq!(cache.fetcher.call_count(), 2, "re-fetch was attempted");
    }

    #[test]
    fn cold_cache_offline_falls_back_to_default_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ReleaseCache::new(
            OfflineFetcher,
            CacheConfig {
                cache_dir: dir.path().to_path_buf(),
                ttl: RELEASE_CACHE_TTL,
            },
        );

        let fallback = cache
            .get_latest(ts("2026-08-01T10:00:00Z"))
            .expect("default fallback");
        assert_eq!(fallback.version, DEFAULT_AGENT_VERSION);
        assert!(fallback.assets.is_empty(), "fallback offers no install assets");
    }

    #[test]
    fn cold_cache_malformed_payload_yields_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_in(&dir, ScriptedFetcher::new(vec![Err("bad json".to_string())]));
        assert!(cache.get_latest(ts("2026-08-01T10:00:00Z")).is_none());
    }

    #[test]
    fn cache_survives_process_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let cache = cache_in(&dir, ScriptedFetcher::new(vec![Ok(release("16.2.1"))]));
            cache.get_latest(ts("2026-08-01T10:00:00Z")).expect("first");
        }
        // New cache instance over the same directory: fresh-enough file wins.
        let cache = cache_in(&dir, ScriptedFetcher::new(vec![Err("unused".to_string())]));
        let cached = cache
            .get_latest(ts("2026-08-01T10:05:00Z"))
            .expect("cached across restart");
        assert_eq!(cached.version, "16.2.1");
        assert_eq!(cache.fetcher.call_count(), 0);
    }

    #[test]
    fn corrupt_cache_file_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CACHE_FILE_NAME), "not json").expect("write");

        let cache = cache_in(&dir, ScriptedFetcher::new(vec![Ok(release("16.2.1"))]));
        let fetched = cache
            .get_latest(ts("2026-08-01T10:00:00Z"))
            .expect("fetches fresh");
        assert_eq!(fetched.version, "16.2.1");
        assert_eq!(cache.fetcher.call_count(), 1);
    }

    #[test]
    fn default_config_uses_per_app_cache_dir() {
        let config = CacheConfig::default();
        assert!(config.cache_dir.ends_with("agentup"));
        assert_eq!(config.ttl, RELEASE_CACHE_TTL);
    }
}
