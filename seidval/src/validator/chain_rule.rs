//! Chain of trust from the target certificate to a configured root
//!
//! Paths are built by matching issuer and subject names and verifying each signature with the
//! superior certificate's key. Intermediate CA certificates must assert cA in basicConstraints and
//! be valid at the time of interest. Trust anchors are accepted as configured.
//!
//! When policies are configured, the target must assert one of them and each intermediate on the
//! path must assert the same policy or anyPolicy.

use std::collections::BTreeSet;
use std::sync::Arc;

use der::asn1::ObjectIdentifier;
use log::debug;

use crate::source::certificate_bucket::{CertificateBucket, CertificateRole};
use crate::util::cert_utilities::{asserts_policy, get_policies, name_to_string};
use crate::util::error::{Error, Result, ValidationFailure};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::validator_rule::ValidatorRule;

/// Default maximum number of intermediate CA certificates in a path
pub const DEFAULT_MAX_INTERMEDIATES: usize = 5;

/// Verifies that the target chains to a configured root and, optionally, carries an accepted
/// policy.
#[derive(Clone, Debug)]
pub struct ChainRule {
    bucket: Arc<CertificateBucket>,
    policies: BTreeSet<ObjectIdentifier>,
    max_intermediates: usize,
}

#[derive(Default)]
struct SearchOutcome {
    policy_failed: bool,
}

impl ChainRule {
    /// Creates a rule over `bucket`. An empty `policies` set disables the policy check.
    pub fn new(bucket: Arc<CertificateBucket>, policies: BTreeSet<ObjectIdentifier>) -> Self {
        ChainRule {
            bucket,
            policies,
            max_intermediates: DEFAULT_MAX_INTERMEDIATES,
        }
    }

    /// Sets the maximum number of intermediates permitted in a path.
    pub fn with_max_intermediates(mut self, max_intermediates: usize) -> Self {
        self.max_intermediates = max_intermediates;
        self
    }

    fn valid_at(cert: &ParsedCertificate, toi: TimeOfInterest) -> bool {
        let validity = &cert.decoded_cert.tbs_certificate.validity;
        toi >= validity.not_before && toi <= validity.not_after
    }

    fn policy_carried(&self, target: &ParsedCertificate, path: &[&ParsedCertificate]) -> bool {
        if self.policies.is_empty() {
            return true;
        }
        get_policies(&target.decoded_cert)
            .iter()
            .filter(|p| self.policies.contains(*p))
            .any(|p| path.iter().all(|ca| asserts_policy(&ca.decoded_cert, p)))
    }

    fn search<'a>(
        &'a self,
        target: &ParsedCertificate,
        current: &ParsedCertificate,
        toi: TimeOfInterest,
        path: &mut Vec<&'a ParsedCertificate>,
        outcome: &mut SearchOutcome,
    ) -> bool {
        for (role, issuer) in self.bucket.find_issuers(current) {
            if path.iter().any(|c| c.encoded_cert == issuer.encoded_cert) {
                continue;
            }
            if current.verify_issued_by(issuer).is_err() {
                debug!(
                    "Signature on {} not verified by {}",
                    name_to_string(current.subject()),
                    name_to_string(issuer.subject())
                );
                continue;
            }
            match role {
                CertificateRole::Root => {
                    if self.policy_carried(target, path) {
                        return true;
                    }
                    outcome.policy_failed = true;
                }
                CertificateRole::Intermediate => {
                    if !issuer.is_ca() || !Self::valid_at(issuer, toi) {
                        debug!(
                            "Skipping intermediate {}: not a CA or not valid",
                            name_to_string(issuer.subject())
                        );
                        continue;
                    }
                    if path.len() >= self.max_intermediates {
                        continue;
                    }
                    path.push(issuer);
                    if self.search(target, issuer, toi, path, outcome) {
                        return true;
                    }
                    path.pop();
                }
            }
        }
        false
    }
}

impl ValidatorRule for ChainRule {
    fn validate(&self, cert: &ParsedCertificate, toi: TimeOfInterest) -> Result<()> {
        let mut path = vec![];
        let mut outcome = SearchOutcome::default();
        if self.search(cert, cert, toi, &mut path, &mut outcome) {
            return Ok(());
        }
        if outcome.policy_failed {
            Err(Error::Validation(ValidationFailure::PolicyAbsent))
        } else {
            Err(Error::Validation(ValidationFailure::ChainNotTrusted))
        }
    }

    fn name(&self) -> &'static str {
        if self.policies.is_empty() {
            "chain"
        } else {
            "chain-with-policy"
        }
    }
}
