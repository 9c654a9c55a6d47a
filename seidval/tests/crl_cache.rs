use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hex_literal::hex;
use seidval::*;

const EMPTY: &[u8] = include_bytes!("examples/test_business_empty.crl");
const REVOKED: &[u8] = include_bytes!("examples/test_business_revoked.crl");

/// Serves whatever bytes are currently configured, or fails when none are.
struct SwitchableFetcher {
    crl: Mutex<Option<Vec<u8>>>,
    calls: AtomicUsize,
}

impl SwitchableFetcher {
    fn new(crl: Option<&[u8]>) -> Arc<Self> {
        Arc::new(SwitchableFetcher {
            crl: Mutex::new(crl.map(|c| c.to_vec())),
            calls: AtomicUsize::new(0),
        })
    }

    fn serve(&self, crl: Option<&[u8]>) {
        *self.crl.lock().unwrap() = crl.map(|c| c.to_vec());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CrlFetcher for SwitchableFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.crl
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::NetworkError(format!("unreachable: {url}")))
    }
}

fn wait_for(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}

fn business_cache(fetcher: Arc<SwitchableFetcher>, interval: Duration) -> RefreshingCrlCache {
    let cache = RefreshingCrlCache::new(
        vec![TEST_BUSINESS_CA_CRL.to_string()],
        fetcher,
        interval,
    );
    assert_eq!(cache.preload(&BundledSnapshots, Environment::Test).unwrap(), 1);
    cache
}

#[test]
fn background_refresh_replaces_entries() {
    let fetcher = SwitchableFetcher::new(Some(EMPTY));
    let cache = business_cache(fetcher.clone(), Duration::from_millis(50));
    assert_eq!(cache.state(), CacheState::Ready);
    assert!(cache.get(TEST_BUSINESS_CA_CRL).unwrap().is_revoked(&hex!("1002")));

    cache.start().unwrap();
    assert_eq!(cache.state(), CacheState::Running);
    assert!(wait_for(Duration::from_secs(5), || {
        !cache.get(TEST_BUSINESS_CA_CRL).unwrap().is_revoked(&hex!("1002"))
    }));

    fetcher.serve(Some(REVOKED));
    assert!(wait_for(Duration::from_secs(5), || {
        cache.get(TEST_BUSINESS_CA_CRL).unwrap().is_revoked(&hex!("1002"))
    }));
    cache.stop();
}

#[test]
fn failed_refresh_keeps_entry() {
    let fetcher = SwitchableFetcher::new(None);
    let cache = business_cache(fetcher.clone(), Duration::from_millis(30));
    let before = cache.get(TEST_BUSINESS_CA_CRL).unwrap();
    cache.start().unwrap();
    assert!(wait_for(Duration::from_secs(5), || fetcher.calls() >= 2));

    let after = cache.get(TEST_BUSINESS_CA_CRL).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(cache.state(), CacheState::Running);
    cache.stop();
}

#[test]
fn stop_halts_refresh() {
    let fetcher = SwitchableFetcher::new(Some(EMPTY));
    let cache = business_cache(fetcher.clone(), Duration::from_millis(20));
    cache.start().unwrap();
    assert!(wait_for(Duration::from_secs(5), || fetcher.calls() >= 1));

    cache.stop();
    cache.stop();
    assert_eq!(cache.state(), CacheState::Stopped);
    assert_eq!(cache.start(), Err(Error::CacheStopped));

    let calls = fetcher.calls();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(fetcher.calls(), calls);

    // entries stay readable after stopping
    assert!(cache.get(TEST_BUSINESS_CA_CRL).is_some());
}

#[test]
fn validator_sees_refreshed_crl() {
    let fetcher = SwitchableFetcher::new(Some(EMPTY));
    let validator = CertificateValidatorBuilder::new(Environment::Test)
        .with_refreshing_crl_cache(Duration::from_millis(50))
        .with_fetcher(fetcher)
        .build()
        .unwrap();
    let revoked = include_str!("examples/test_revoked.pem");
    assert!(wait_for(Duration::from_secs(5), || validator.is_valid(revoked)));
    validator.crl_cache().stop();
}

#[test]
fn download_then_load_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = SwitchableFetcher::new(Some(EMPTY));
    let urls = vec![TEST_BUSINESS_CA_CRL.to_string()];
    let written = download_crls(fetcher.as_ref(), Environment::Test, &urls, dir.path()).unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with(dir.path().join("TEST")));

    let cache = SimpleCrlCache::new();
    let source = DirectorySnapshots::new(dir.path());
    assert_eq!(
        preload_crls(&cache, &source, Environment::Test, &urls).unwrap(),
        1
    );
    assert!(!cache.get(TEST_BUSINESS_CA_CRL).unwrap().is_revoked(&hex!("1002")));

    fetcher.serve(None);
    assert!(download_crls(fetcher.as_ref(), Environment::Test, &urls, dir.path()).is_err());
}
