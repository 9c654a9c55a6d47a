//! Assembly of the rule pipeline and the builder used to obtain a [`CertificateValidator`]
//!
//! ```no_run
//! use seidval::{CertificateValidatorBuilder, Environment};
//!
//! let validator = CertificateValidatorBuilder::new(Environment::Test)
//!     .with_defaults()
//!     .build()?;
//! let pem = std::fs::read_to_string("certificate.pem").unwrap();
//! if validator.is_valid(pem.as_str()) {
//!     println!("accepted");
//! }
//! # Ok::<(), seidval::Error>(())
//! ```
//!
//! The pipeline is, in order: expiration, signing (publicly signed only), critical extensions
//! recognized, critical extensions required, chain of trust, CRL. The chain of trust is a
//! [`RuleExpr`]. With no policy exempt issuers configured it is a single [`ChainRule`] carrying
//! the configured policies. Otherwise each exempt issuer contributes an
//! `issuer AND chain-without-policy` alternative, ORed ahead of the policy-checking chain rule.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::environment::seid_environment::Environment;
use crate::environment::trust_properties::{default_properties, merge, TrustProperties};
use crate::revocation::crl_cache::{preload_crls, CrlCache, SimpleCrlCache};
use crate::revocation::crl_fetcher::{CachingCrlFetcher, CrlFetcher, HttpCrlFetcher};
use crate::revocation::directory_crl_cache::DirectoryCrlCache;
use crate::revocation::refreshing_crl_cache::{RefreshingCrlCache, DEFAULT_REFRESH_INTERVAL};
use crate::source::certificate_bucket::CertificateBucket;
use crate::source::snapshot_source::{BundledSnapshots, SnapshotSource};
use crate::util::error::{Error, Result};
use crate::validator::certificate_rules::{
    parse_oids, CriticalExtensionRecognizedRule, CriticalExtensionRequiredRule, ExpirationRule,
    IssuerAttributeRule, SigningKind, SigningRule,
};
use crate::validator::certificate_validator::CertificateValidator;
use crate::validator::chain_rule::ChainRule;
use crate::validator::crl_rule::{CrlRule, UnknownRevocationStatus};
use crate::validator::validator_rule::{RuleExpr, ValidatorRule};

/// chain_of_trust_rule builds the chain of trust expression for `properties`.
pub fn chain_of_trust_rule(
    properties: &TrustProperties,
    bucket: Arc<CertificateBucket>,
) -> Result<RuleExpr> {
    let with_policy = RuleExpr::leaf(ChainRule::new(
        bucket.clone(),
        parse_oids(&properties.policies)?,
    ));
    if properties.policy_exempt_issuers.is_empty() {
        return Ok(with_policy);
    }

    let mut alternatives = vec![];
    for issuer in &properties.policy_exempt_issuers {
        alternatives.push(RuleExpr::And(vec![
            RuleExpr::leaf(IssuerAttributeRule::parse(issuer)?),
            RuleExpr::leaf(ChainRule::new(bucket.clone(), BTreeSet::new())),
        ]));
    }
    alternatives.push(with_policy);
    Ok(RuleExpr::Or(alternatives))
}

/// assemble_rules returns the ordered rule pipeline for `properties`, with revocation checking
/// backed by `crl_fetcher`.
pub fn assemble_rules(
    properties: &TrustProperties,
    bucket: Arc<CertificateBucket>,
    crl_fetcher: CachingCrlFetcher,
    unknown: UnknownRevocationStatus,
) -> Result<Vec<Box<dyn ValidatorRule>>> {
    let chain = chain_of_trust_rule(properties, bucket.clone())?;
    info!("Chain of trust rule: {}", chain.describe());
    Ok(vec![
        Box::new(ExpirationRule),
        Box::new(SigningRule(SigningKind::PublicSignedOnly)),
        Box::new(CriticalExtensionRecognizedRule::new(parse_oids(
            &properties.critical_extensions_recognized,
        )?)),
        Box::new(CriticalExtensionRequiredRule::new(parse_oids(
            &properties.critical_extensions_required,
        )?)),
        Box::new(chain),
        Box::new(CrlRule::new(crl_fetcher, bucket, unknown)),
    ])
}

/// How the CRL cache backing the revocation rule is obtained
#[derive(Clone)]
pub enum CrlCacheStrategy {
    /// [`SimpleCrlCache`], populated on demand
    InMemory,
    /// [`DirectoryCrlCache`] rooted at the given folder
    OnDisk(PathBuf),
    /// [`RefreshingCrlCache`] refreshing at the given interval, preloaded from snapshots
    Refreshing(Duration),
    /// A cache supplied by the caller
    Custom(Arc<dyn CrlCache>),
}

/// Builder for [`CertificateValidator`].
///
/// Starts from the built-in [`TrustProperties`] for the environment. A CRL cache strategy must be
/// chosen, either explicitly or via [`with_defaults`](Self::with_defaults).
pub struct CertificateValidatorBuilder {
    environment: Environment,
    properties: TrustProperties,
    cache: Option<CrlCacheStrategy>,
    snapshots: Option<Arc<dyn SnapshotSource>>,
    fetcher: Option<Arc<dyn CrlFetcher>>,
    unknown: UnknownRevocationStatus,
}

impl CertificateValidatorBuilder {
    /// Creates a builder for `environment` with no CRL cache selected.
    pub fn new(environment: Environment) -> Self {
        CertificateValidatorBuilder {
            environment,
            properties: default_properties(environment),
            cache: None,
            snapshots: None,
            fetcher: None,
            unknown: UnknownRevocationStatus::default(),
        }
    }

    /// Resets to the built-in properties and a refreshing CRL cache preloaded from bundled
    /// snapshots, refreshed every fifteen minutes.
    pub fn with_defaults(mut self) -> Self {
        self.properties = default_properties(self.environment);
        self.cache = Some(CrlCacheStrategy::Refreshing(DEFAULT_REFRESH_INTERVAL));
        self
    }

    /// Merges `overrides` onto the current properties. Empty fields are ignored.
    pub fn with_properties(mut self, overrides: &TrustProperties) -> Self {
        self.properties = merge(&self.properties, overrides);
        self
    }

    /// Replaces the issuers for which the policy requirement is waived. Unlike
    /// [`with_properties`](Self::with_properties), an empty set clears the exemption.
    pub fn with_policy_exempt_issuers(mut self, issuers: impl IntoIterator<Item = String>) -> Self {
        self.properties.policy_exempt_issuers = issuers.into_iter().collect();
        self
    }

    /// Uses an in-memory cache filled on demand.
    pub fn with_crl_cache_in_memory(mut self) -> Self {
        self.cache = Some(CrlCacheStrategy::InMemory);
        self
    }

    /// Uses a cache that persists CRLs in `folder`.
    pub fn with_crl_cache_on_disk(mut self, folder: impl Into<PathBuf>) -> Self {
        self.cache = Some(CrlCacheStrategy::OnDisk(folder.into()));
        self
    }

    /// Uses a cache refreshed in the background every `interval`.
    pub fn with_refreshing_crl_cache(mut self, interval: Duration) -> Self {
        self.cache = Some(CrlCacheStrategy::Refreshing(interval));
        self
    }

    /// Uses a caller supplied cache. It is started when the validator is built.
    pub fn with_crl_cache(mut self, cache: Arc<dyn CrlCache>) -> Self {
        self.cache = Some(CrlCacheStrategy::Custom(cache));
        self
    }

    /// Preloads the cache from `snapshots`. Refreshing caches otherwise preload from
    /// [`BundledSnapshots`]; other caches start empty.
    pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotSource>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Uses `fetcher` to retrieve CRLs in place of an [`HttpCrlFetcher`].
    pub fn with_fetcher(mut self, fetcher: Arc<dyn CrlFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the outcome when no usable CRL is available. Defaults to reject.
    pub fn with_unknown_revocation_status(mut self, unknown: UnknownRevocationStatus) -> Self {
        self.unknown = unknown;
        self
    }

    /// Current properties, after defaults and merges
    pub fn properties(&self) -> &TrustProperties {
        &self.properties
    }

    /// build parses the trust material, prepares and starts the CRL cache and assembles the rule
    /// pipeline.
    pub fn build(self) -> Result<CertificateValidator> {
        let strategy = self.cache.ok_or(Error::MissingCrlCache)?;
        let bucket = Arc::new(CertificateBucket::from_pem_sets(
            &self.properties.root_certificates,
            &self.properties.intermediate_certificates,
        )?);
        let fetcher: Arc<dyn CrlFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpCrlFetcher::default()),
        };
        let urls = &self.properties.crl_distribution_points;

        let refreshing = matches!(strategy, CrlCacheStrategy::Refreshing(_));
        let cache: Arc<dyn CrlCache> = match strategy {
            CrlCacheStrategy::InMemory => Arc::new(SimpleCrlCache::new()),
            CrlCacheStrategy::OnDisk(folder) => Arc::new(DirectoryCrlCache::new(folder)?),
            CrlCacheStrategy::Refreshing(interval) => {
                let cache =
                    RefreshingCrlCache::new(urls.iter().cloned(), fetcher.clone(), interval);
                match &self.snapshots {
                    Some(snapshots) => cache.preload(snapshots.as_ref(), self.environment)?,
                    None => cache.preload(&BundledSnapshots, self.environment)?,
                };
                Arc::new(cache)
            }
            CrlCacheStrategy::Custom(cache) => cache,
        };
        if let (Some(snapshots), false) = (&self.snapshots, refreshing) {
            preload_crls(cache.as_ref(), snapshots.as_ref(), self.environment, urls)?;
        }

        let rules = assemble_rules(
            &self.properties,
            bucket,
            CachingCrlFetcher::new(cache.clone(), fetcher),
            self.unknown,
        )?;
        cache.start()?;
        info!(
            "Built {} certificate validator with {} rules",
            self.environment,
            rules.len()
        );
        Ok(CertificateValidator::new(self.environment, rules, cache))
    }
}
