//! Certificate wrapper retaining the encoded form alongside the decoded structure

use der::asn1::BitString;
use der::{Decode, Encode};
use spki::AlgorithmIdentifierOwned;
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::util::cert_utilities::{compare_names, get_crl_dps, is_ca, is_self_issued};
use crate::util::crypto::verify_signature_message;
use crate::util::error::{Error, Result};

/// [`ParsedCertificate`] aggregates a binary, DER-encoded certificate, the decoded certificate and
/// the exact bytes of the to-be-signed portion as they appeared in the encoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedCertificate {
    /// Binary, encoded Certificate object
    pub encoded_cert: Vec<u8>,
    /// Decoded Certificate object
    pub decoded_cert: Certificate,
    /// Encoded tbsCertificate field
    pub tbs_field: Vec<u8>,
}

impl TryFrom<&[u8]> for ParsedCertificate {
    type Error = der::Error;

    fn try_from(enc_cert: &[u8]) -> der::Result<Self> {
        let decoded_cert = Certificate::from_der(enc_cert)?;
        let deferred = DeferDecodeSigned::from_der(enc_cert)?;
        Ok(ParsedCertificate {
            encoded_cert: enc_cert.to_vec(),
            decoded_cert,
            tbs_field: deferred.tbs_field,
        })
    }
}

impl TryFrom<Certificate> for ParsedCertificate {
    type Error = der::Error;

    fn try_from(cert: Certificate) -> der::Result<Self> {
        let encoded_cert = cert.to_der()?;
        let deferred = DeferDecodeSigned::from_der(&encoded_cert)?;
        Ok(ParsedCertificate {
            encoded_cert,
            decoded_cert: cert,
            tbs_field: deferred.tbs_field,
        })
    }
}

impl ParsedCertificate {
    /// Parses PEM text (armor optional) into a [`ParsedCertificate`].
    pub fn from_pem(text: &str) -> Result<Self> {
        let der_bytes = crate::util::pem::decode_pem_certificate(text)?;
        ParsedCertificate::try_from(der_bytes.as_slice())
            .map_err(|e| Error::Decode(format!("invalid DER: {e}")))
    }

    /// Subject name
    pub fn subject(&self) -> &Name {
        &self.decoded_cert.tbs_certificate.subject
    }

    /// Issuer name
    pub fn issuer(&self) -> &Name {
        &self.decoded_cert.tbs_certificate.issuer
    }

    /// Serial number bytes as encoded
    pub fn serial_number(&self) -> &[u8] {
        self.decoded_cert.tbs_certificate.serial_number.as_bytes()
    }

    /// HTTP and other URIs from the CRL distribution points extension
    pub fn crl_distribution_points(&self) -> Vec<String> {
        get_crl_dps(&self.decoded_cert)
    }

    /// True when basicConstraints asserts cA
    pub fn is_ca(&self) -> bool {
        is_ca(&self.decoded_cert)
    }

    /// verify_issued_by checks that `issuer`'s subject matches this certificate's issuer name and
    /// that `issuer`'s public key verifies this certificate's signature.
    pub fn verify_issued_by(&self, issuer: &ParsedCertificate) -> Result<()> {
        if !compare_names(self.issuer(), issuer.subject()) {
            return Err(Error::Validation(
                crate::util::error::ValidationFailure::SignatureVerificationFailure,
            ));
        }
        verify_signature_message(
            &self.tbs_field,
            &self.decoded_cert.signature_algorithm,
            self.decoded_cert.signature.raw_bytes(),
            &issuer.decoded_cert.tbs_certificate.subject_public_key_info,
        )
    }

    /// True when the certificate is self-issued and verifies under its own public key.
    pub fn is_self_signed(&self) -> bool {
        is_self_issued(&self.decoded_cert) && self.verify_issued_by(self).is_ok()
    }
}

/// Structure supporting deferred decoding of fields of a signed structure (i.e., a Certificate or
/// CertificateList) so the signed bytes can be verified exactly as encoded.
///
/// ```text
/// Certificate  ::=  SEQUENCE  {
///      tbsCertificate       TBSCertificate,
///      signatureAlgorithm   AlgorithmIdentifier,
///      signature            BIT STRING  }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeferDecodeSigned {
    /// to-be-signed field
    pub tbs_field: Vec<u8>,
    /// signatureAlgorithm   AlgorithmIdentifier,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// signature            BIT STRING
    pub signature: BitString,
}

impl ::der::FixedTag for DeferDecodeSigned {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeSigned {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_field = reader.tlv_bytes()?;
            let signature_algorithm = reader.decode()?;
            let signature = reader.decode()?;
            Ok(Self {
                tbs_field: tbs_field.to_vec(),
                signature_algorithm,
                signature,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::pem::decode_pem_certificate;

    fn load(text: &str) -> ParsedCertificate {
        ParsedCertificate::try_from(decode_pem_certificate(text).unwrap().as_slice()).unwrap()
    }

    #[test]
    fn issued_by() {
        let ee = load(include_str!("../../tests/examples/test_valid.pem"));
        let ca = load(include_str!("../../resources/trust/TEST/business-ca-g1.pem"));
        let root = load(include_str!("../../resources/trust/TEST/root-ca-g1.pem"));
        assert!(ee.verify_issued_by(&ca).is_ok());
        assert!(ca.verify_issued_by(&root).is_ok());
        assert!(ee.verify_issued_by(&root).is_err());
        assert!(root.is_self_signed());
        assert!(!ee.is_self_signed());
        assert!(ca.is_ca());
        assert!(!ee.is_ca());
        assert_eq!(ee.serial_number(), &[0x10, 0x01]);
        assert_eq!(
            ee.crl_distribution_points(),
            vec!["http://crl.test.seid2.example.no/business-ca-g1.crl".to_string()]
        );
    }

    #[test]
    fn from_certificate() {
        let ee = load(include_str!("../../tests/examples/self_signed.pem"));
        let again = ParsedCertificate::try_from(ee.decoded_cert.clone()).unwrap();
        assert_eq!(ee, again);
        assert!(again.is_self_signed());
    }
}
