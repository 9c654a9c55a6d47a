//! Storage of CRLs keyed by distribution point URL
//!
//! Three implementations of [`CrlCache`] are provided:
//!
//! - [`SimpleCrlCache`] holds whatever is stored in it and never refreshes.
//! - [`DirectoryCrlCache`](crate::DirectoryCrlCache) adds a folder that is read on a miss and
//!   written through on every store.
//! - [`RefreshingCrlCache`](crate::RefreshingCrlCache) periodically re-fetches a fixed set of
//!   distribution points on a background task.
//!
//! Lookups never perform network I/O. They return the last value stored, if any.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, info};

use crate::environment::seid_environment::Environment;
use crate::revocation::crl::CachedCrl;
use crate::source::snapshot_source::SnapshotSource;
use crate::util::error::{Error, Result};

/// Keyed store of the most recently known CRL for each distribution point.
pub trait CrlCache: Send + Sync {
    /// Returns the cached CRL for `url`, if any.
    fn get(&self, url: &str) -> Option<Arc<CachedCrl>>;

    /// Stores `crl` for `url`, replacing any previous entry.
    fn set(&self, url: &str, crl: Arc<CachedCrl>) -> Result<()>;

    /// Starts background activity, if the implementation has any. Called once when a validator is
    /// built.
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Stops background activity. Safe to call more than once. Lookups continue to be served.
    fn stop(&self) {}

    /// True when entries are kept current by the cache itself, in which case callers should not
    /// fetch on a stale entry.
    fn refreshes_in_background(&self) -> bool {
        false
    }
}

/// [`SimpleCrlCache`] is an in-memory [`CrlCache`] that is never refreshed.
#[derive(Debug, Default)]
pub struct SimpleCrlCache {
    entries: RwLock<HashMap<String, Arc<CachedCrl>>>,
}

impl SimpleCrlCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(g) => g.len(),
            Err(p) => p.into_inner().len(),
        }
    }

    /// True when no entries are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CrlCache for SimpleCrlCache {
    fn get(&self, url: &str) -> Option<Arc<CachedCrl>> {
        // a poisoned lock still holds the last completed write
        match self.entries.read() {
            Ok(g) => g.get(url).cloned(),
            Err(p) => p.into_inner().get(url).cloned(),
        }
    }

    fn set(&self, url: &str, crl: Arc<CachedCrl>) -> Result<()> {
        let mut g = self.entries.write().map_err(|_| Error::Poisoned)?;
        g.insert(url.to_string(), crl);
        Ok(())
    }
}

/// preload_crls inserts a snapshot for every URL in `urls` into `cache`. A URL with no snapshot, or
/// with a snapshot that cannot be parsed, fails the preload.
pub fn preload_crls<'a>(
    cache: &dyn CrlCache,
    source: &dyn SnapshotSource,
    environment: Environment,
    urls: impl IntoIterator<Item = &'a String>,
) -> Result<usize> {
    let mut count = 0;
    for url in urls {
        let crl_buf = source.load(environment, url)?;
        let crl = CachedCrl::parse(&crl_buf).map_err(|e| {
            Error::CrlParse(format!("snapshot for {url} could not be parsed: {e}"))
        })?;
        debug!("Preloaded CRL for {url} with {} entries", crl.revoked_count());
        cache.set(url, Arc::new(crl))?;
        count += 1;
    }
    info!("Preloaded {count} CRLs for {environment}");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::snapshot_source::{BundledSnapshots, DirectorySnapshots};

    #[test]
    fn simple_cache() {
        let cache = SimpleCrlCache::new();
        assert!(cache.get("http://crl.example.no/a.crl").is_none());
        let crl = Arc::new(
            CachedCrl::parse(include_bytes!("../../tests/examples/test_business_empty.crl"))
                .unwrap(),
        );
        cache.set("http://crl.example.no/a.crl", crl.clone()).unwrap();
        assert_eq!(cache.get("http://crl.example.no/a.crl"), Some(crl));
        assert_eq!(cache.len(), 1);
        assert!(cache.start().is_ok());
        cache.stop();
        cache.stop();
        assert!(!cache.refreshes_in_background());
    }

    #[test]
    fn preload_missing_snapshot_fails() {
        let cache = SimpleCrlCache::new();
        let urls = vec!["http://crl.example.no/unknown.crl".to_string()];
        let err = preload_crls(&cache, &BundledSnapshots, Environment::Test, &urls).unwrap_err();
        assert_eq!(
            err,
            Error::MissingSnapshot("http://crl.example.no/unknown.crl".to_string())
        );

        let dir = tempfile::tempdir().unwrap();
        let err = preload_crls(
            &cache,
            &DirectorySnapshots::new(dir.path()),
            Environment::Test,
            &urls,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingSnapshot(_)));
        assert!(cache.is_empty());
    }
}
