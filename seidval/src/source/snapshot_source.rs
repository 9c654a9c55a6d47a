//! CRL snapshots used to populate a cache before the first refresh
//!
//! Snapshots are addressed by environment and distribution point URL. On disk, each lives at
//! `<folder>/<ENVIRONMENT>/<url-encoded distribution point>`.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::environment::seid_environment::Environment;
use crate::environment::trust_properties::{
    PROD_BUSINESS_CA_CRL, TEST_ALTERNATE_CA_CRL, TEST_BUSINESS_CA_CRL,
};
use crate::util::error::{Error, Result};

/// crl_filename returns a file system safe name for a distribution point URL.
pub fn crl_filename(url: &str) -> String {
    urlencoding::encode(url).into_owned()
}

/// snapshot_path returns the location of the snapshot for `url` under `folder`.
pub fn snapshot_path(folder: &Path, environment: Environment, url: &str) -> PathBuf {
    folder.join(environment.name()).join(crl_filename(url))
}

/// Supplies DER-encoded CRL snapshots by environment and distribution point.
pub trait SnapshotSource: Send + Sync {
    /// Returns the snapshot for `url`, or [`Error::MissingSnapshot`] if none is available.
    fn load(&self, environment: Environment, url: &str) -> Result<Vec<u8>>;
}

static BUNDLED: &[(Environment, &str, &[u8])] = &[
    (
        Environment::Test,
        TEST_BUSINESS_CA_CRL,
        include_bytes!(
            "../../resources/crl/TEST/http%3A%2F%2Fcrl.test.seid2.example.no%2Fbusiness-ca-g1.crl"
        ),
    ),
    (
        Environment::Test,
        TEST_ALTERNATE_CA_CRL,
        include_bytes!(
            "../../resources/crl/TEST/http%3A%2F%2Fcrl.test.alternate.example.no%2Fenterprise-ca.crl"
        ),
    ),
    (
        Environment::Prod,
        PROD_BUSINESS_CA_CRL,
        include_bytes!(
            "../../resources/crl/PROD/http%3A%2F%2Fcrl.seid2.example.no%2Fbusiness-ca-g1.crl"
        ),
    ),
];

/// CRL snapshots compiled into the library for the built-in distribution points.
#[derive(Copy, Clone, Debug, Default)]
pub struct BundledSnapshots;

impl SnapshotSource for BundledSnapshots {
    fn load(&self, environment: Environment, url: &str) -> Result<Vec<u8>> {
        BUNDLED
            .iter()
            .find(|(e, u, _)| *e == environment && *u == url)
            .map(|(_, _, bytes)| bytes.to_vec())
            .ok_or_else(|| Error::MissingSnapshot(url.to_string()))
    }
}

/// CRL snapshots read from a folder laid out as `<folder>/<ENVIRONMENT>/<encoded url>`.
#[derive(Clone, Debug)]
pub struct DirectorySnapshots {
    folder: PathBuf,
}

impl DirectorySnapshots {
    /// Instantiates a new DirectorySnapshots instance that reads from `folder`.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        DirectorySnapshots {
            folder: folder.into(),
        }
    }
}

impl SnapshotSource for DirectorySnapshots {
    fn load(&self, environment: Environment, url: &str) -> Result<Vec<u8>> {
        let path = snapshot_path(&self.folder, environment, url);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                debug!("Failed to read snapshot {}: {e}", path.display());
                Err(Error::MissingSnapshot(url.to_string()))
            }
        }
    }
}
