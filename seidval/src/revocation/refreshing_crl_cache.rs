//! CRL cache kept current by a periodic background task
//!
//! The cache moves through the states of [`CacheState`]:
//!
//! ```text
//! Empty -> Preloading -> Ready -> Running -> Stopped
//! ```
//!
//! [`RefreshingCrlCache::preload`] fills the cache from snapshots. [`CrlCache::start`] spawns a
//! thread driving a single threaded tokio runtime that re-fetches every configured distribution
//! point each interval. A successful fetch replaces the entry for that URL, a failed one leaves the
//! previous entry in place. [`CrlCache::stop`] signals the task and waits for any pass in progress
//! to finish. Lookups keep working after a stop.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::environment::seid_environment::Environment;
use crate::revocation::crl::CachedCrl;
use crate::revocation::crl_cache::{preload_crls, CrlCache, SimpleCrlCache};
use crate::revocation::crl_fetcher::{fetch_and_parse, CrlFetcher};
use crate::source::snapshot_source::SnapshotSource;
use crate::util::error::{Error, Result};

/// Default interval between refresh passes
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Lifecycle states of a [`RefreshingCrlCache`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheState {
    /// Nothing has been loaded
    Empty,
    /// A preload is in progress
    Preloading,
    /// Every configured distribution point has an entry
    Ready,
    /// The background task is running
    Running,
    /// The background task has been stopped
    Stopped,
}

struct Worker {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

/// [`RefreshingCrlCache`] is a [`CrlCache`] that refreshes a fixed set of distribution points on a
/// background task.
pub struct RefreshingCrlCache {
    entries: Arc<SimpleCrlCache>,
    urls: Arc<BTreeSet<String>>,
    fetcher: Arc<dyn CrlFetcher>,
    interval: Duration,
    state: Mutex<CacheState>,
    worker: Mutex<Worker>,
}

/// refresh_urls performs one refresh pass, returning the number of entries replaced. The entry map
/// is only locked to insert a CRL that has already been fetched and parsed.
fn refresh_urls(
    entries: &SimpleCrlCache,
    urls: &BTreeSet<String>,
    fetcher: &dyn CrlFetcher,
) -> usize {
    let mut refreshed = 0;
    for url in urls {
        match fetch_and_parse(fetcher, url) {
            Ok(crl) => match entries.set(url, Arc::new(crl)) {
                Ok(()) => {
                    debug!("Refreshed CRL for {url}");
                    refreshed += 1;
                }
                Err(e) => error!("Failed to store refreshed CRL for {url}: {e}"),
            },
            Err(e) => warn!("Failed to refresh CRL for {url}, keeping previous entry: {e}"),
        }
    }
    refreshed
}

async fn refresh_loop(
    entries: Arc<SimpleCrlCache>,
    urls: Arc<BTreeSet<String>>,
    fetcher: Arc<dyn CrlFetcher>,
    interval: Duration,
    refresh_now: bool,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let first = if refresh_now {
        Instant::now()
    } else {
        Instant::now() + interval
    };
    let mut ticker = interval_at(first, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                let total = urls.len();
                let (entries, urls, fetcher) = (entries.clone(), urls.clone(), fetcher.clone());
                let pass = tokio::task::spawn_blocking(move || {
                    refresh_urls(&entries, &urls, fetcher.as_ref())
                });
                match pass.await {
                    Ok(n) => debug!("Refresh pass replaced {n} of {total} CRLs"),
                    Err(e) => error!("CRL refresh pass failed: {e}"),
                }
            }
        }
    }
    info!("CRL refresh task stopped");
}

impl RefreshingCrlCache {
    /// Creates a cache that refreshes `urls` using `fetcher` every `interval` once started.
    pub fn new(
        urls: impl IntoIterator<Item = String>,
        fetcher: Arc<dyn CrlFetcher>,
        interval: Duration,
    ) -> Self {
        RefreshingCrlCache {
            entries: Arc::new(SimpleCrlCache::new()),
            urls: Arc::new(urls.into_iter().collect()),
            fetcher,
            interval,
            state: Mutex::new(CacheState::Empty),
            worker: Mutex::new(Worker {
                stop_tx: None,
                handle: None,
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> CacheState {
        match self.state.lock() {
            Ok(g) => *g,
            Err(p) => *p.into_inner(),
        }
    }

    fn set_state(&self, state: CacheState) -> Result<()> {
        let mut g = self.state.lock().map_err(|_| Error::Poisoned)?;
        debug!("CRL cache state {:?} -> {:?}", *g, state);
        *g = state;
        Ok(())
    }

    /// Distribution points refreshed by this cache
    pub fn urls(&self) -> &BTreeSet<String> {
        &self.urls
    }

    /// Refresh interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// preload inserts a snapshot from `source` for every configured distribution point. A
    /// missing or unparseable snapshot fails the preload and returns the cache to its prior state.
    pub fn preload(&self, source: &dyn SnapshotSource, environment: Environment) -> Result<usize> {
        let prior = self.state();
        self.set_state(CacheState::Preloading)?;
        match preload_crls(self.entries.as_ref(), source, environment, self.urls.iter()) {
            Ok(n) => {
                let next = match prior {
                    CacheState::Running | CacheState::Stopped => prior,
                    _ => CacheState::Ready,
                };
                self.set_state(next)?;
                Ok(n)
            }
            Err(e) => {
                self.set_state(prior)?;
                Err(e)
            }
        }
    }

    /// refresh_all performs one refresh pass on the calling thread, returning the number of
    /// entries replaced.
    pub fn refresh_all(&self) -> usize {
        refresh_urls(&self.entries, &self.urls, self.fetcher.as_ref())
    }

    fn all_cached(&self) -> bool {
        self.urls.iter().all(|u| self.entries.get(u).is_some())
    }
}

impl CrlCache for RefreshingCrlCache {
    fn get(&self, url: &str) -> Option<Arc<CachedCrl>> {
        self.entries.get(url)
    }

    fn set(&self, url: &str, crl: Arc<CachedCrl>) -> Result<()> {
        self.entries.set(url, crl)
    }

    fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().map_err(|_| Error::Poisoned)?;
        match self.state() {
            CacheState::Running => {
                debug!("CRL refresh task already running");
                return Ok(());
            }
            CacheState::Stopped => return Err(Error::CacheStopped),
            _ => {}
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let entries = self.entries.clone();
        let urls = self.urls.clone();
        let fetcher = self.fetcher.clone();
        let interval = self.interval;
        let refresh_now = !self.all_cached();
        let handle = thread::Builder::new()
            .name("crl-refresh".to_string())
            .spawn(move || {
                runtime.block_on(refresh_loop(
                    entries,
                    urls,
                    fetcher.clone(),
                    interval,
                    refresh_now,
                    stop_rx,
                ));
                // a blocking HTTP client may not be dropped while the runtime is active
                drop(runtime);
                drop(fetcher);
            })?;

        worker.stop_tx = Some(stop_tx);
        worker.handle = Some(handle);
        self.set_state(CacheState::Running)?;
        info!(
            "Started CRL refresh task for {} distribution points every {}s",
            self.urls.len(),
            self.interval.as_secs()
        );
        Ok(())
    }

    fn stop(&self) {
        let mut worker = match self.worker.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        if let Some(stop_tx) = worker.stop_tx.take() {
            info!("Stopping CRL refresh task");
            // the task may already be gone, in which case there is nothing to stop
            let _ = stop_tx.send(());
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    error!("CRL refresh thread panicked");
                }
            }
        }
        if let Err(e) = self.set_state(CacheState::Stopped) {
            error!("Failed to record stopped CRL cache state: {e}");
        }
    }

    fn refreshes_in_background(&self) -> bool {
        true
    }
}

impl Drop for RefreshingCrlCache {
    fn drop(&mut self) {
        if let Ok(worker) = self.worker.get_mut() {
            if let Some(stop_tx) = worker.stop_tx.take() {
                let _ = stop_tx.send(());
            }
        }
    }
}
