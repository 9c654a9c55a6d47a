//! Retrieval of CRLs from distribution points

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::environment::seid_environment::Environment;
use crate::revocation::crl::CachedCrl;
use crate::revocation::crl_cache::CrlCache;
use crate::source::snapshot_source::snapshot_path;
use crate::util::error::{Error, Result};
use crate::util::time_of_interest::TimeOfInterest;

/// Default timeout applied to CRL downloads
pub const DEFAULT_CRL_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves the DER-encoded CRL published at a distribution point.
pub trait CrlFetcher: Send + Sync {
    /// Returns the bytes published at `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`HttpCrlFetcher`] retrieves CRLs over HTTP using a blocking client. When called from within a
/// tokio runtime the request is performed on a separate scoped thread, since the blocking client
/// may neither run nor be dropped on a runtime thread.
#[derive(Clone, Debug)]
pub struct HttpCrlFetcher {
    timeout: Duration,
}

impl Default for HttpCrlFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_CRL_TIMEOUT)
    }
}

impl HttpCrlFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        HttpCrlFetcher { timeout }
    }

    fn fetch_blocking(&self, url: &str) -> Result<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| {
                Error::NetworkError(format!("failed to prepare HTTP client to retrieve CRL: {e}"))
            })?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| Error::NetworkError(format!("failed to retrieve {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "{url} returned status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| Error::NetworkError(format!("failed to read body from {url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl CrlFetcher for HttpCrlFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if !url.starts_with("http") {
            debug!("Ignored non-HTTP URI presented for CRL retrieval: {url}");
            return Err(Error::NetworkError(format!("unsupported URI scheme: {url}")));
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return self.fetch_blocking(url);
        }
        debug!("Retrieving {url} off the async runtime");
        thread::scope(|s| match s.spawn(|| self.fetch_blocking(url)).join() {
            Ok(r) => r,
            Err(_) => Err(Error::NetworkError(format!(
                "thread retrieving {url} panicked"
            ))),
        })
    }
}

/// fetch_and_parse retrieves and parses the CRL at `url`.
pub fn fetch_and_parse(fetcher: &dyn CrlFetcher, url: &str) -> Result<CachedCrl> {
    let crl_buf = fetcher.fetch(url)?;
    CachedCrl::parse(&crl_buf)
}

/// [`CachingCrlFetcher`] consults a [`CrlCache`] before the network.
///
/// A fresh cached entry is returned as is. Otherwise the CRL is fetched, stored and returned, with
/// the stale entry (if any) as the fallback when the fetch fails. Caches that refresh in the
/// background are never fetched through, so lookups against them do not block on the network.
#[derive(Clone)]
pub struct CachingCrlFetcher {
    cache: Arc<dyn CrlCache>,
    fetcher: Arc<dyn CrlFetcher>,
}

impl CachingCrlFetcher {
    /// Creates an adapter over `cache` that uses `fetcher` on a miss.
    pub fn new(cache: Arc<dyn CrlCache>, fetcher: Arc<dyn CrlFetcher>) -> Self {
        CachingCrlFetcher { cache, fetcher }
    }

    /// The underlying cache
    pub fn cache(&self) -> &Arc<dyn CrlCache> {
        &self.cache
    }

    /// get_crl returns the best available CRL for `url` as of `toi`, or None if none is known and
    /// none could be retrieved.
    pub fn get_crl(&self, url: &str, toi: TimeOfInterest) -> Option<Arc<CachedCrl>> {
        let cached = self.cache.get(url);
        if self.cache.refreshes_in_background() {
            if cached.is_none() {
                debug!("No CRL cached for {url}");
            }
            return cached;
        }
        if let Some(crl) = &cached {
            if crl.is_fresh(toi) {
                return cached;
            }
        }

        match fetch_and_parse(self.fetcher.as_ref(), url) {
            Ok(crl) => {
                let crl = Arc::new(crl);
                if let Err(e) = self.cache.set(url, crl.clone()) {
                    warn!("Failed to cache CRL from {url}: {e}");
                }
                Some(crl)
            }
            Err(e) => {
                warn!("Failed to fetch CRL from {url}: {e}");
                cached
            }
        }
    }
}

/// download_crls fetches each URL in `urls` and saves it under
/// `<folder>/<ENVIRONMENT>/<encoded url>`, the layout read by
/// [`DirectorySnapshots`](crate::DirectorySnapshots). Returns the paths written.
pub fn download_crls<'a>(
    fetcher: &dyn CrlFetcher,
    environment: Environment,
    urls: impl IntoIterator<Item = &'a String>,
    folder: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = vec![];
    for url in urls {
        let crl_buf = fetcher.fetch(url)?;
        CachedCrl::parse(&crl_buf)?;
        let path = snapshot_path(folder, environment, url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &crl_buf)?;
        info!("Saved CRL from {url} to {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revocation::crl_cache::SimpleCrlCache;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "http://crl.test.seid2.example.no/business-ca-g1.crl";
    const EMPTY: &[u8] = include_bytes!("../../tests/examples/test_business_empty.crl");
    const REVOKED: &[u8] = include_bytes!("../../tests/examples/test_business_revoked.crl");

    struct MapFetcher {
        crls: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
    }

    impl CrlFetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.crls
                .get(url)
                .cloned()
                .ok_or_else(|| Error::NetworkError(format!("no route to {url}")))
        }
    }

    fn fetcher(crls: &[(&str, &[u8])]) -> Arc<MapFetcher> {
        Arc::new(MapFetcher {
            crls: crls
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_vec()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn fresh_entry_is_not_refetched() {
        let cache = Arc::new(SimpleCrlCache::new());
        cache
            .set(URL, Arc::new(CachedCrl::parse(EMPTY).unwrap()))
            .unwrap();
        let f = fetcher(&[(URL, REVOKED)]);
        let cf = CachingCrlFetcher::new(cache, f.clone());
        let crl = cf.get_crl(URL, TimeOfInterest::now().unwrap()).unwrap();
        assert_eq!(crl.revoked_count(), 0);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn miss_fetches_and_stores() {
        let cache = Arc::new(SimpleCrlCache::new());
        let f = fetcher(&[(URL, REVOKED)]);
        let cf = CachingCrlFetcher::new(cache.clone(), f.clone());
        assert_eq!(cf.get_crl(URL, TimeOfInterest::now().unwrap()).unwrap().revoked_count(), 1);
        assert!(cache.get(URL).is_some());
        assert!(cf.get_crl(URL, TimeOfInterest::now().unwrap()).is_some());
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_entry_is_fallback() {
        let cache = Arc::new(SimpleCrlCache::new());
        cache
            .set(URL, Arc::new(CachedCrl::parse(EMPTY).unwrap()))
            .unwrap();
        let f = fetcher(&[]);
        let cf = CachingCrlFetcher::new(cache, f.clone());
        // far beyond nextUpdate, so the entry is stale
        let later = TimeOfInterest::parse("2200-01-01T00:00:00Z").unwrap();
        assert!(cf.get_crl(URL, later).is_some());
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        assert!(cf
            .get_crl("http://crl.example.no/none.crl", later)
            .is_none());
    }

    #[test]
    fn download_layout() {
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(&[(URL, EMPTY)]);
        let urls = vec![URL.to_string()];
        let written = download_crls(f.as_ref(), Environment::Test, &urls, dir.path()).unwrap();
        assert_eq!(
            written,
            vec![snapshot_path(dir.path(), Environment::Test, URL)]
        );
        assert_eq!(fs::read(&written[0]).unwrap(), EMPTY);

        let missing = vec!["http://crl.example.no/none.crl".to_string()];
        assert!(download_crls(f.as_ref(), Environment::Test, &missing, dir.path()).is_err());
    }

    #[test]
    fn non_http_uri_rejected() {
        let f = HttpCrlFetcher::default();
        assert!(matches!(
            f.fetch("ldap://ldap.example.no/cn=CA"),
            Err(Error::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn fetch_inside_runtime_reports_error() {
        // nothing listens on the discard port, so the request fails instead of blocking the runtime
        let f = HttpCrlFetcher::new(Duration::from_secs(2));
        assert!(matches!(
            f.fetch("http://127.0.0.1:9/business-ca-g1.crl"),
            Err(Error::NetworkError(_))
        ));
    }
}
