//! Error types

use core::fmt;

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// Reasons a certificate failed one of the validation rules.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum ValidationFailure {
    /// Expired occurs when the notAfter date of the certificate is before the time of interest.
    Expired,
    /// NotYetValid occurs when the notBefore date of the certificate is after the time of interest.
    NotYetValid,
    /// SelfSigned occurs when a publicly signed certificate was required but a self-signed one was presented.
    SelfSigned,
    /// NotSelfSigned occurs when a self-signed certificate was required but the certificate was issued
    /// by another party.
    NotSelfSigned,
    /// A critical extension that is not in the recognized set was found. Carries the dotted OID.
    UnrecognizedCriticalExtension(String),
    /// An extension in the required set was absent or not marked critical. Carries the dotted OID.
    MissingCriticalExtension(String),
    /// No path from the certificate to a configured root could be built.
    ChainNotTrusted,
    /// A path was built but neither the certificate nor the path carries an accepted policy.
    PolicyAbsent,
    /// The issuer name lacks an attribute required by an issuer rule.
    IssuerMismatch,
    /// The serial number of the certificate appears on a CRL published by its issuer.
    Revoked,
    /// Revocation status could not be determined from any distribution point.
    RevocationStatusUnknown,
    /// A signature on the certificate or a CRL did not verify.
    SignatureVerificationFailure,
}

/// Coarse grouping of [`Error`] values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// The validator could not be built.
    Construction,
    /// A certificate was evaluated and rejected.
    Validation,
    /// The input could not be decoded into a certificate.
    Decode,
    /// A CRL could not be retrieved or parsed.
    CacheFetch,
    /// A file system operation failed.
    Io,
}

/// Error type
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A certificate was rejected by a validation rule
    Validation(ValidationFailure),
    /// An environment name other than TEST or PROD (case-insensitive) was presented.
    UnknownEnvironment(String),
    /// A required set of trust material (named by the payload) was empty.
    MissingTrustMaterial(&'static str),
    /// Configured trust material could not be parsed. Carries a description of the offending value.
    MalformedCertificate(String),
    /// The validator was built without a CRL cache.
    MissingCrlCache,
    /// Certificate text or bytes could not be decoded.
    Decode(String),
    /// A networking issue occurred.
    NetworkError(String),
    /// A CRL was retrieved but could not be parsed or verified.
    CrlParse(String),
    /// No snapshot exists for the given distribution point.
    MissingSnapshot(String),
    /// A background refresh was started after the cache was stopped.
    CacheStopped,
    /// A configuration file could not be parsed.
    Config(String),
    /// A lock guarding shared state was poisoned.
    Poisoned,
    /// Asn1Error is used to propagate error information from the der crate.
    Asn1Error(der::Error),
    /// Error encapsulates an error derived from [std::io::ErrorKind]
    StdIoError(std::io::ErrorKind),
}

impl Error {
    /// Returns the [`ErrorCategory`] for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::Validation,
            Error::UnknownEnvironment(_)
            | Error::MissingTrustMaterial(_)
            | Error::MalformedCertificate(_)
            | Error::MissingCrlCache
            | Error::Config(_) => ErrorCategory::Construction,
            Error::Decode(_) | Error::Asn1Error(_) => ErrorCategory::Decode,
            Error::NetworkError(_)
            | Error::CrlParse(_)
            | Error::MissingSnapshot(_)
            | Error::CacheStopped
            | Error::Poisoned => ErrorCategory::CacheFetch,
            Error::StdIoError(_) => ErrorCategory::Io,
        }
    }

    /// Returns the [`ValidationFailure`] carried by this error, if any.
    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            Error::Validation(vf) => Some(vf),
            _ => None,
        }
    }
}

impl From<ValidationFailure> for Error {
    fn from(vf: ValidationFailure) -> Error {
        Error::Validation(vf)
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::StdIoError(err.kind())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Config(err.to_string())
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::Expired => write!(f, "Certificate has expired"),
            ValidationFailure::NotYetValid => write!(f, "Certificate is not yet valid"),
            ValidationFailure::SelfSigned => write!(f, "Certificate is self-signed"),
            ValidationFailure::NotSelfSigned => write!(f, "Certificate is not self-signed"),
            ValidationFailure::UnrecognizedCriticalExtension(oid) => {
                write!(f, "Unrecognized critical extension: {oid}")
            }
            ValidationFailure::MissingCriticalExtension(oid) => {
                write!(f, "Missing critical extension: {oid}")
            }
            ValidationFailure::ChainNotTrusted => write!(f, "Certificate chain is not trusted"),
            ValidationFailure::PolicyAbsent => write!(f, "No accepted certificate policy"),
            ValidationFailure::IssuerMismatch => write!(f, "Issuer does not match"),
            ValidationFailure::Revoked => write!(f, "Certificate is revoked"),
            ValidationFailure::RevocationStatusUnknown => {
                write!(f, "Revocation status could not be determined")
            }
            ValidationFailure::SignatureVerificationFailure => {
                write!(f, "Signature verification failure")
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(vf) => write!(f, "Validation failed: {vf}"),
            Error::UnknownEnvironment(name) => write!(f, "Unknown environment: '{name}'"),
            Error::MissingTrustMaterial(what) => write!(f, "No {what} configured"),
            Error::MalformedCertificate(what) => write!(f, "Malformed certificate: {what}"),
            Error::MissingCrlCache => write!(f, "No CRL cache configured"),
            Error::Decode(e) => write!(f, "Unable to decode certificate: {e}"),
            Error::NetworkError(e) => write!(f, "NetworkError: {e}"),
            Error::CrlParse(e) => write!(f, "Unable to parse CRL: {e}"),
            Error::MissingSnapshot(url) => write!(f, "No CRL snapshot available for {url}"),
            Error::CacheStopped => write!(f, "CRL cache has been stopped"),
            Error::Config(e) => write!(f, "Configuration error: {e}"),
            Error::Poisoned => write!(f, "Lock poisoned"),
            Error::Asn1Error(e) => write!(f, "Asn1Error: {e}"),
            Error::StdIoError(e) => write!(f, "StdIoError: {e:?}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            Error::Validation(ValidationFailure::Revoked).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::UnknownEnvironment("STAGING".to_string()).category(),
            ErrorCategory::Construction
        );
        assert_eq!(Error::MissingCrlCache.category(), ErrorCategory::Construction);
        assert_eq!(Error::Decode("x".to_string()).category(), ErrorCategory::Decode);
        assert_eq!(
            Error::NetworkError("timeout".to_string()).category(),
            ErrorCategory::CacheFetch
        );
        let e: Error = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(e.category(), ErrorCategory::Io);
    }

    #[test]
    fn display() {
        let e = Error::Validation(ValidationFailure::UnrecognizedCriticalExtension(
            "1.3.6.1.4.1.55555.1.1".to_string(),
        ));
        assert_eq!(
            e.to_string(),
            "Validation failed: Unrecognized critical extension: 1.3.6.1.4.1.55555.1.1"
        );
        assert_eq!(
            Error::UnknownEnvironment("dev".to_string()).to_string(),
            "Unknown environment: 'dev'"
        );
    }
}
