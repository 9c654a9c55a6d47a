//! In-memory store of the trust anchors and intermediate CA certificates configured for an
//! environment, with issuer lookup in support of path building.

use std::collections::BTreeSet;

use log::debug;

use crate::util::cert_utilities::{compare_names, name_to_string};
use crate::util::error::{Error, Result};
use crate::validator::parsed_certificate::ParsedCertificate;

/// Whether a certificate in a [`CertificateBucket`] is a trust anchor or an intermediate CA.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CertificateRole {
    /// Self-signed trust anchor
    Root,
    /// CA certificate that chains to a root
    Intermediate,
}

/// [`CertificateBucket`] holds the parsed root and intermediate certificates used by chain and CRL
/// rules.
#[derive(Clone, Debug, Default)]
pub struct CertificateBucket {
    roots: Vec<ParsedCertificate>,
    intermediates: Vec<ParsedCertificate>,
}

fn snippet(pem: &str) -> String {
    let body: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect::<Vec<&str>>()
        .concat();
    body.chars().take(32).collect()
}

fn parse_set(pems: &BTreeSet<String>, what: &'static str) -> Result<Vec<ParsedCertificate>> {
    if pems.is_empty() {
        return Err(Error::MissingTrustMaterial(what));
    }
    pems.iter()
        .enumerate()
        .map(|(i, pem)| {
            ParsedCertificate::from_pem(pem).map_err(|e| {
                Error::MalformedCertificate(format!(
                    "{what} #{} ({}...): {e}",
                    i + 1,
                    snippet(pem)
                ))
            })
        })
        .collect()
}

impl CertificateBucket {
    /// Creates a bucket from already parsed certificates.
    pub fn new(roots: Vec<ParsedCertificate>, intermediates: Vec<ParsedCertificate>) -> Self {
        CertificateBucket {
            roots,
            intermediates,
        }
    }

    /// Parses PEM-encoded roots and intermediates. Fails when either set is empty or contains a
    /// value that cannot be parsed.
    pub fn from_pem_sets(
        roots: &BTreeSet<String>,
        intermediates: &BTreeSet<String>,
    ) -> Result<Self> {
        let bucket = CertificateBucket {
            roots: parse_set(roots, "root certificates")?,
            intermediates: parse_set(intermediates, "intermediate certificates")?,
        };
        for root in &bucket.roots {
            if !root.is_self_signed() {
                debug!(
                    "Configured root {} is not self-signed",
                    name_to_string(root.subject())
                );
            }
        }
        Ok(bucket)
    }

    /// Trust anchors
    pub fn roots(&self) -> &[ParsedCertificate] {
        &self.roots
    }

    /// Intermediate CA certificates
    pub fn intermediates(&self) -> &[ParsedCertificate] {
        &self.intermediates
    }

    /// find_issuers returns the configured certificates whose subject matches the issuer name of
    /// `cert`, roots first.
    pub fn find_issuers<'a>(
        &'a self,
        cert: &ParsedCertificate,
    ) -> Vec<(CertificateRole, &'a ParsedCertificate)> {
        let roots = self
            .roots
            .iter()
            .filter(|c| compare_names(c.subject(), cert.issuer()))
            .map(|c| (CertificateRole::Root, c));
        let intermediates = self
            .intermediates
            .iter()
            .filter(|c| compare_names(c.subject(), cert.issuer()))
            .filter(|c| c.encoded_cert != cert.encoded_cert)
            .map(|c| (CertificateRole::Intermediate, c));
        roots.chain(intermediates).collect()
    }

    /// find_signer returns the configured certificate whose key verifies the signature on `cert`.
    pub fn find_signer(&self, cert: &ParsedCertificate) -> Option<&ParsedCertificate> {
        self.find_issuers(cert)
            .into_iter()
            .map(|(_, c)| c)
            .find(|c| cert.verify_issued_by(c).is_ok())
    }
}
