//! The validator handed to callers once assembly is complete

use std::sync::Arc;

use log::{debug, error};
use x509_cert::Certificate;

use crate::environment::seid_environment::Environment;
use crate::revocation::crl_cache::CrlCache;
use crate::util::error::{Error, Result};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::validator_rule::ValidatorRule;

/// Forms in which a certificate may be presented for validation.
pub trait CertificateInput {
    /// Decodes the input into a [`ParsedCertificate`], failing with [`Error::Decode`].
    fn to_parsed_certificate(&self) -> Result<ParsedCertificate>;
}

impl CertificateInput for str {
    fn to_parsed_certificate(&self) -> Result<ParsedCertificate> {
        ParsedCertificate::from_pem(self)
    }
}

impl CertificateInput for String {
    fn to_parsed_certificate(&self) -> Result<ParsedCertificate> {
        self.as_str().to_parsed_certificate()
    }
}

/// Bytes beginning with a SEQUENCE tag are treated as DER, anything else as PEM text.
impl CertificateInput for [u8] {
    fn to_parsed_certificate(&self) -> Result<ParsedCertificate> {
        if self.first() == Some(&0x30) {
            return ParsedCertificate::try_from(self)
                .map_err(|e| Error::Decode(format!("invalid DER: {e}")));
        }
        match std::str::from_utf8(self) {
            Ok(text) => text.to_parsed_certificate(),
            Err(_) => Err(Error::Decode("neither DER nor PEM".to_string())),
        }
    }
}

impl CertificateInput for Vec<u8> {
    fn to_parsed_certificate(&self) -> Result<ParsedCertificate> {
        self.as_slice().to_parsed_certificate()
    }
}

impl CertificateInput for Certificate {
    fn to_parsed_certificate(&self) -> Result<ParsedCertificate> {
        ParsedCertificate::try_from(self.clone())
            .map_err(|e| Error::Decode(format!("unable to encode certificate: {e}")))
    }
}

impl CertificateInput for ParsedCertificate {
    fn to_parsed_certificate(&self) -> Result<ParsedCertificate> {
        Ok(self.clone())
    }
}

/// [`CertificateValidator`] runs a fixed, ordered list of rules against certificates. It is
/// immutable once built and may be shared across threads.
pub struct CertificateValidator {
    environment: Environment,
    rules: Vec<Box<dyn ValidatorRule>>,
    crl_cache: Arc<dyn CrlCache>,
}

impl CertificateValidator {
    pub(crate) fn new(
        environment: Environment,
        rules: Vec<Box<dyn ValidatorRule>>,
        crl_cache: Arc<dyn CrlCache>,
    ) -> Self {
        CertificateValidator {
            environment,
            rules,
            crl_cache,
        }
    }

    /// Environment the validator was built for
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// The CRL cache backing the revocation rule
    pub fn crl_cache(&self) -> &Arc<dyn CrlCache> {
        &self.crl_cache
    }

    /// Names of the rules in evaluation order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// validate runs every rule against `cert` as of now and returns the first failure.
    pub fn validate<C: CertificateInput + ?Sized>(&self, cert: &C) -> Result<()> {
        self.validate_at(cert, TimeOfInterest::now()?)
    }

    /// validate_at runs every rule against `cert` as of `toi` and returns the first failure.
    /// Input that cannot be decoded fails with [`Error::Decode`] before any rule runs.
    pub fn validate_at<C: CertificateInput + ?Sized>(
        &self,
        cert: &C,
        toi: TimeOfInterest,
    ) -> Result<()> {
        let parsed = cert.to_parsed_certificate()?;
        for rule in &self.rules {
            if let Err(e) = rule.validate(&parsed, toi) {
                debug!("Rule {} failed: {e}", rule.name());
                return Err(e);
            }
        }
        Ok(())
    }

    /// is_valid returns true when [`validate`](Self::validate) succeeds. Failures are logged and
    /// not returned.
    pub fn is_valid<C: CertificateInput + ?Sized>(&self, cert: &C) -> bool {
        match self.validate(cert) {
            Ok(()) => true,
            Err(e) => {
                error!("Invalid certificate: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::pem::decode_certificate;

    const TEST_VALID: &str = include_str!("../../tests/examples/test_valid.pem");

    #[test]
    fn input_forms() {
        let from_pem = TEST_VALID.to_parsed_certificate().unwrap();
        let der = from_pem.encoded_cert.clone();
        assert_eq!(der.to_parsed_certificate().unwrap(), from_pem);
        assert_eq!(
            TEST_VALID.as_bytes().to_parsed_certificate().unwrap(),
            from_pem
        );
        assert_eq!(
            decode_certificate(TEST_VALID)
                .unwrap()
                .to_parsed_certificate()
                .unwrap(),
            from_pem
        );
        assert!(matches!(
            vec![0x30u8, 0x01].to_parsed_certificate(),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            vec![0xffu8, 0xfe].to_parsed_certificate(),
            Err(Error::Decode(_))
        ));
    }
}
