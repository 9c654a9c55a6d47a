//! CRL cache backed by a folder

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::revocation::crl::CachedCrl;
use crate::revocation::crl_cache::{CrlCache, SimpleCrlCache};
use crate::source::snapshot_source::crl_filename;
use crate::util::error::Result;

/// Default interval during which a URL with no usable file is not looked up on disk again
pub const DEFAULT_MISS_RETRY: Duration = Duration::from_secs(30);

/// [`DirectoryCrlCache`] serves lookups from memory, falls back to reading `<folder>/<encoded url>`
/// on a miss and writes every stored CRL through to the folder. A URL whose file is absent or
/// unparseable is remembered as a miss for a short interval so repeated lookups skip the disk.
#[derive(Debug)]
pub struct DirectoryCrlCache {
    folder: PathBuf,
    memory: SimpleCrlCache,
    misses: RwLock<HashMap<String, Instant>>,
    miss_retry: Duration,
}

impl DirectoryCrlCache {
    /// Instantiates a new DirectoryCrlCache that uses the indicated folder for storage and
    /// retrieval of CRLs. The folder is created if necessary.
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        fs::create_dir_all(&folder)?;
        Ok(DirectoryCrlCache {
            folder,
            memory: SimpleCrlCache::new(),
            misses: RwLock::new(HashMap::new()),
            miss_retry: DEFAULT_MISS_RETRY,
        })
    }

    /// Sets how long a URL with no usable file is treated as a miss without reading the folder.
    pub fn with_miss_retry(mut self, miss_retry: Duration) -> Self {
        self.miss_retry = miss_retry;
        self
    }

    /// Folder used for storage
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.folder.join(crl_filename(url))
    }

    fn recent_miss(&self, url: &str) -> bool {
        match self.misses.read() {
            Ok(misses) => misses
                .get(url)
                .map_or(false, |at| at.elapsed() < self.miss_retry),
            Err(_) => false,
        }
    }

    fn note_miss(&self, url: &str) {
        if let Ok(mut misses) = self.misses.write() {
            misses.insert(url.to_string(), Instant::now());
        }
    }

    fn clear_miss(&self, url: &str) {
        if let Ok(mut misses) = self.misses.write() {
            misses.remove(url);
        }
    }

    fn read_from_disk(&self, url: &str) -> Option<CachedCrl> {
        let path = self.path_for(url);
        let crl_buf = match fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                debug!("No saved CRL for {url} at {}: {e}", path.display());
                return None;
            }
        };
        match CachedCrl::parse(&crl_buf) {
            Ok(crl) => Some(crl),
            Err(e) => {
                warn!("Ignoring unparseable CRL at {}: {e}", path.display());
                None
            }
        }
    }
}

impl CrlCache for DirectoryCrlCache {
    fn get(&self, url: &str) -> Option<Arc<CachedCrl>> {
        if let Some(crl) = self.memory.get(url) {
            return Some(crl);
        }
        if self.recent_miss(url) {
            return None;
        }
        let crl = match self.read_from_disk(url) {
            Some(crl) => Arc::new(crl),
            None => {
                self.note_miss(url);
                return None;
            }
        };
        self.clear_miss(url);
        if let Err(e) = self.memory.set(url, crl.clone()) {
            warn!("Failed to cache CRL read from disk for {url}: {e}");
        }
        Some(crl)
    }

    fn set(&self, url: &str, crl: Arc<CachedCrl>) -> Result<()> {
        fs::write(self.path_for(url), &crl.encoded)?;
        self.clear_miss(url);
        self.memory.set(url, crl)
    }
}
