//! Rules that inspect the target certificate on its own

use std::collections::BTreeSet;

use der::asn1::ObjectIdentifier;
use log::debug;

use crate::util::cert_utilities::{name_has_attribute, name_to_string, parse_attribute_list};
use crate::util::error::{Error, Result, ValidationFailure};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::parsed_certificate::ParsedCertificate;
use crate::validator::validator_rule::ValidatorRule;

/// parse_oids converts dotted OID strings, failing with [`Error::Config`] on the first that does not
/// parse.
pub fn parse_oids(oids: &BTreeSet<String>) -> Result<BTreeSet<ObjectIdentifier>> {
    oids.iter()
        .map(|s| {
            ObjectIdentifier::new(s.trim())
                .map_err(|e| Error::Config(format!("invalid object identifier '{s}': {e}")))
        })
        .collect()
}

/// Rejects certificates outside their validity period.
#[derive(Clone, Debug, Default)]
pub struct ExpirationRule;

impl ValidatorRule for ExpirationRule {
    fn validate(&self, cert: &ParsedCertificate, toi: TimeOfInterest) -> Result<()> {
        let validity = &cert.decoded_cert.tbs_certificate.validity;
        if toi < validity.not_before {
            return Err(Error::Validation(ValidationFailure::NotYetValid));
        }
        if toi > validity.not_after {
            return Err(Error::Validation(ValidationFailure::Expired));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "expiration"
    }
}

/// Which kind of signature a [`SigningRule`] accepts
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SigningKind {
    /// Only certificates issued by another party
    PublicSignedOnly,
    /// Only self-signed certificates
    SelfSignedOnly,
}

/// Accepts either self-signed or publicly signed certificates.
#[derive(Clone, Debug)]
pub struct SigningRule(pub SigningKind);

impl ValidatorRule for SigningRule {
    fn validate(&self, cert: &ParsedCertificate, _toi: TimeOfInterest) -> Result<()> {
        let self_signed = cert.is_self_signed();
        match (self.0, self_signed) {
            (SigningKind::PublicSignedOnly, true) => {
                Err(Error::Validation(ValidationFailure::SelfSigned))
            }
            (SigningKind::SelfSignedOnly, false) => {
                Err(Error::Validation(ValidationFailure::NotSelfSigned))
            }
            _ => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "signing"
    }
}

/// Rejects certificates with a critical extension outside the recognized set.
#[derive(Clone, Debug)]
pub struct CriticalExtensionRecognizedRule {
    recognized: BTreeSet<ObjectIdentifier>,
}

impl CriticalExtensionRecognizedRule {
    /// Creates a rule permitting the given extensions to be critical.
    pub fn new(recognized: BTreeSet<ObjectIdentifier>) -> Self {
        CriticalExtensionRecognizedRule { recognized }
    }
}

impl ValidatorRule for CriticalExtensionRecognizedRule {
    fn validate(&self, cert: &ParsedCertificate, _toi: TimeOfInterest) -> Result<()> {
        if let Some(exts) = &cert.decoded_cert.tbs_certificate.extensions {
            for ext in exts.iter().filter(|e| e.critical) {
                if !self.recognized.contains(&ext.extn_id) {
                    return Err(Error::Validation(
                        ValidationFailure::UnrecognizedCriticalExtension(ext.extn_id.to_string()),
                    ));
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "critical-extension-recognized"
    }
}

/// Rejects certificates that lack one of the required extensions or carry it as non-critical.
#[derive(Clone, Debug)]
pub struct CriticalExtensionRequiredRule {
    required: BTreeSet<ObjectIdentifier>,
}

impl CriticalExtensionRequiredRule {
    /// Creates a rule requiring the given extensions to be present and critical.
    pub fn new(required: BTreeSet<ObjectIdentifier>) -> Self {
        CriticalExtensionRequiredRule { required }
    }
}

impl ValidatorRule for CriticalExtensionRequiredRule {
    fn validate(&self, cert: &ParsedCertificate, _toi: TimeOfInterest) -> Result<()> {
        let exts = cert
            .decoded_cert
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default();
        for oid in &self.required {
            if !exts.iter().any(|e| e.extn_id == *oid && e.critical) {
                return Err(Error::Validation(
                    ValidationFailure::MissingCriticalExtension(oid.to_string()),
                ));
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "critical-extension-required"
    }
}

/// Passes when the issuer name carries every configured attribute value.
#[derive(Clone, Debug)]
pub struct IssuerAttributeRule {
    attributes: Vec<(ObjectIdentifier, String)>,
}

impl IssuerAttributeRule {
    /// Creates a rule from attribute type and value pairs.
    pub fn new(attributes: Vec<(ObjectIdentifier, String)>) -> Self {
        IssuerAttributeRule { attributes }
    }

    /// Creates a rule from a string like `O=Alternate Trust AS - TEST`.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self::new(parse_attribute_list(s)?))
    }
}

impl ValidatorRule for IssuerAttributeRule {
    fn validate(&self, cert: &ParsedCertificate, _toi: TimeOfInterest) -> Result<()> {
        for (oid, value) in &self.attributes {
            if !name_has_attribute(cert.issuer(), oid, value) {
                debug!(
                    "Issuer {} lacks {oid}={value}",
                    name_to_string(cert.issuer())
                );
                return Err(Error::Validation(ValidationFailure::IssuerMismatch));
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "issuer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> ParsedCertificate {
        ParsedCertificate::from_pem(text).unwrap()
    }

    fn oids(items: &[&str]) -> BTreeSet<ObjectIdentifier> {
        parse_oids(&items.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn expiration() {
        let now = TimeOfInterest::now().unwrap();
        let valid = load(include_str!("../../tests/examples/test_valid.pem"));
        let expired = load(include_str!("../../tests/examples/test_expired.pem"));
        assert!(ExpirationRule.validate(&valid, now).is_ok());
        assert_eq!(
            ExpirationRule.validate(&expired, now),
            Err(Error::Validation(ValidationFailure::Expired))
        );
        let early = TimeOfInterest::parse("2000-01-01T00:00:00Z").unwrap();
        assert_eq!(
            ExpirationRule.validate(&valid, early),
            Err(Error::Validation(ValidationFailure::NotYetValid))
        );
    }

    #[test]
    fn signing() {
        let now = TimeOfInterest::now().unwrap();
        let valid = load(include_str!("../../tests/examples/test_valid.pem"));
        let self_signed = load(include_str!("../../tests/examples/self_signed.pem"));
        let public_only = SigningRule(SigningKind::PublicSignedOnly);
        assert!(public_only.validate(&valid, now).is_ok());
        assert_eq!(
            public_only.validate(&self_signed, now),
            Err(Error::Validation(ValidationFailure::SelfSigned))
        );
        let self_only = SigningRule(SigningKind::SelfSignedOnly);
        assert!(self_only.validate(&self_signed, now).is_ok());
        assert_eq!(
            self_only.validate(&valid, now),
            Err(Error::Validation(ValidationFailure::NotSelfSigned))
        );
    }

    #[test]
    fn critical_extensions() {
        let now = TimeOfInterest::now().unwrap();
        let valid = load(include_str!("../../tests/examples/test_valid.pem"));
        let unknown = load(include_str!("../../tests/examples/test_unknown_critical.pem"));
        let noncritical = load(include_str!("../../tests/examples/test_noncritical_ku.pem"));

        let recognized = CriticalExtensionRecognizedRule::new(oids(&["2.5.29.15", "2.5.29.19"]));
        assert!(recognized.validate(&valid, now).is_ok());
        assert_eq!(
            recognized.validate(&unknown, now),
            Err(Error::Validation(
                ValidationFailure::UnrecognizedCriticalExtension("1.3.6.1.4.1.55555.1.1".to_string())
            ))
        );

        let required = CriticalExtensionRequiredRule::new(oids(&["2.5.29.15"]));
        assert!(required.validate(&valid, now).is_ok());
        assert_eq!(
            required.validate(&noncritical, now),
            Err(Error::Validation(ValidationFailure::MissingCriticalExtension(
                "2.5.29.15".to_string()
            )))
        );
    }

    #[test]
    fn issuer_attributes() {
        let now = TimeOfInterest::now().unwrap();
        let alternate = load(include_str!("../../tests/examples/test_alternate.pem"));
        let valid = load(include_str!("../../tests/examples/test_valid.pem"));
        let rule = IssuerAttributeRule::parse("O=Alternate Trust AS - TEST").unwrap();
        assert!(rule.validate(&alternate, now).is_ok());
        assert_eq!(
            rule.validate(&valid, now),
            Err(Error::Validation(ValidationFailure::IssuerMismatch))
        );
        assert!(parse_oids(&["not.an.oid".to_string()].into_iter().collect()).is_err());
    }
}
