//! Revocation checking against CRLs published at the target's distribution points

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::revocation::crl_fetcher::CachingCrlFetcher;
use crate::source::certificate_bucket::CertificateBucket;
use crate::util::cert_utilities::{compare_names, name_to_string};
use crate::util::error::{Error, Result, ValidationFailure};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::validator_rule::ValidatorRule;

/// Outcome applied when no usable CRL is available for a certificate
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRevocationStatus {
    /// Fail with [`ValidationFailure::RevocationStatusUnknown`]
    #[default]
    Reject,
    /// Treat the certificate as not revoked
    Accept,
}

/// Checks the target against the CRL for each of its distribution points.
///
/// A CRL is used only if its issuer name matches the target's issuer and its signature verifies
/// with the key of the configured CA that issued the target. The first usable CRL decides the
/// outcome. Targets without distribution points pass.
#[derive(Clone)]
pub struct CrlRule {
    fetcher: CachingCrlFetcher,
    bucket: Arc<CertificateBucket>,
    unknown: UnknownRevocationStatus,
}

impl CrlRule {
    /// Creates a rule obtaining CRLs through `fetcher` and CA keys from `bucket`.
    pub fn new(
        fetcher: CachingCrlFetcher,
        bucket: Arc<CertificateBucket>,
        unknown: UnknownRevocationStatus,
    ) -> Self {
        CrlRule {
            fetcher,
            bucket,
            unknown,
        }
    }
}

impl ValidatorRule for CrlRule {
    fn validate(&self, cert: &ParsedCertificate, toi: TimeOfInterest) -> Result<()> {
        let dps = cert.crl_distribution_points();
        if dps.is_empty() {
            debug!(
                "No CRL distribution points in certificate issued to {}",
                name_to_string(cert.subject())
            );
            return Ok(());
        }

        let signer = self.bucket.find_signer(cert);
        for url in &dps {
            let crl = match self.fetcher.get_crl(url, toi) {
                Some(crl) => crl,
                None => continue,
            };
            if !compare_names(&crl.issuer, cert.issuer()) {
                debug!(
                    "CRL from {url} issued by {} does not cover certificates issued by {}",
                    name_to_string(&crl.issuer),
                    name_to_string(cert.issuer())
                );
                continue;
            }
            match signer {
                Some(signer) => {
                    if crl.verify(signer).is_err() {
                        continue;
                    }
                }
                None => {
                    debug!("No configured CA certificate to verify CRL from {url}");
                    continue;
                }
            }
            if crl.is_revoked(cert.serial_number()) {
                return Err(Error::Validation(ValidationFailure::Revoked));
            }
            return Ok(());
        }

        match self.unknown {
            UnknownRevocationStatus::Reject => Err(Error::Validation(
                ValidationFailure::RevocationStatusUnknown,
            )),
            UnknownRevocationStatus::Accept => {
                warn!(
                    "Revocation status unknown for certificate issued to {}, accepting",
                    name_to_string(cert.subject())
                );
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "crl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{default_properties, Environment, TEST_BUSINESS_CA_CRL};
    use crate::revocation::crl::CachedCrl;
    use crate::revocation::crl_cache::{CrlCache, SimpleCrlCache};
    use crate::revocation::crl_fetcher::CrlFetcher;

    struct Offline;

    impl CrlFetcher for Offline {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(Error::NetworkError(format!("offline: {url}")))
        }
    }

    fn rule(crl: Option<&[u8]>, unknown: UnknownRevocationStatus) -> CrlRule {
        let props = default_properties(Environment::Test);
        let bucket = Arc::new(
            CertificateBucket::from_pem_sets(
                &props.root_certificates,
                &props.intermediate_certificates,
            )
            .unwrap(),
        );
        let cache = Arc::new(SimpleCrlCache::new());
        if let Some(crl) = crl {
            cache
                .set(TEST_BUSINESS_CA_CRL, Arc::new(CachedCrl::parse(crl).unwrap()))
                .unwrap();
        }
        CrlRule::new(
            CachingCrlFetcher::new(cache, Arc::new(Offline)),
            bucket,
            unknown,
        )
    }

    fn load(text: &str) -> ParsedCertificate {
        ParsedCertificate::from_pem(text).unwrap()
    }

    #[test]
    fn revoked_and_good() {
        let r = rule(
            Some(include_bytes!("../../tests/examples/test_business_revoked.crl")),
            UnknownRevocationStatus::Reject,
        );
        let now = TimeOfInterest::now().unwrap();
        assert!(r
            .validate(&load(include_str!("../../tests/examples/test_valid.pem")), now)
            .is_ok());
        assert_eq!(
            r.validate(&load(include_str!("../../tests/examples/test_revoked.pem")), now),
            Err(Error::Validation(ValidationFailure::Revoked))
        );
    }

    #[test]
    fn unknown_status() {
        let valid = load(include_str!("../../tests/examples/test_valid.pem"));
        let now = TimeOfInterest::now().unwrap();
        assert_eq!(
            rule(None, UnknownRevocationStatus::Reject).validate(&valid, now),
            Err(Error::Validation(ValidationFailure::RevocationStatusUnknown))
        );
        assert!(rule(None, UnknownRevocationStatus::Accept)
            .validate(&valid, now)
            .is_ok());
    }

    #[test]
    fn crl_from_other_issuer_is_ignored() {
        // the PROD CRL is cached under the TEST distribution point
        let r = rule(
            Some(include_bytes!("../../tests/examples/prod_business_empty.crl")),
            UnknownRevocationStatus::Reject,
        );
        assert_eq!(
            r.validate(
                &load(include_str!("../../tests/examples/test_valid.pem")),
                TimeOfInterest::now().unwrap()
            ),
            Err(Error::Validation(ValidationFailure::RevocationStatusUnknown))
        );
    }

    #[test]
    fn no_distribution_points() {
        let r = rule(None, UnknownRevocationStatus::Reject);
        assert!(r
            .validate(
                &load(include_str!("../../tests/examples/self_signed.pem")),
                TimeOfInterest::now().unwrap()
            )
            .is_ok());
    }
}
