//! Parsed CRLs as held by the revocation caches

use std::collections::BTreeSet;

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_CRL_NUMBER, ID_CE_CRL_REASONS,
    ID_CE_DELTA_CRL_INDICATOR, ID_CE_FRESHEST_CRL, ID_CE_HOLD_INSTRUCTION_CODE,
    ID_CE_INVALIDITY_DATE, ID_CE_ISSUING_DISTRIBUTION_POINT, ID_CE_KEY_USAGE,
};
use der::Decode;
use log::error;
use x509_cert::crl::CertificateList;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages};
use x509_cert::ext::Extensions;
use x509_cert::name::Name;

use crate::util::cert_utilities::{get_extension, name_to_string};
use crate::util::crypto::verify_signature_message;
use crate::util::error::{Error, Result, ValidationFailure};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::parsed_certificate::{DeferDecodeSigned, ParsedCertificate};

/// [`CachedCrl`] is a decoded CRL reduced to what revocation checking needs: the issuer, the
/// validity window, the set of revoked serial numbers and the signed bytes for verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CachedCrl {
    /// CRL issuer
    pub issuer: Name,
    /// thisUpdate as seconds since the Unix epoch
    pub this_update: u64,
    /// nextUpdate as seconds since the Unix epoch, if present
    pub next_update: Option<u64>,
    /// Binary, DER-encoded CRL
    pub encoded: Vec<u8>,
    revoked: BTreeSet<Vec<u8>>,
    signed: DeferDecodeSigned,
}

fn check_crl_extensions(exts: &Extensions) -> Result<()> {
    let exts_to_ignore = [
        ID_CE_ISSUING_DISTRIBUTION_POINT,
        ID_CE_DELTA_CRL_INDICATOR,
        ID_CE_FRESHEST_CRL,
        ID_CE_CRL_NUMBER,
        ID_CE_AUTHORITY_KEY_IDENTIFIER,
    ];
    for e in exts {
        if e.critical && !exts_to_ignore.contains(&e.extn_id) {
            return Err(Error::CrlParse(format!(
                "unsupported critical CRL extension {}",
                e.extn_id
            )));
        }
        if e.extn_id == ID_CE_DELTA_CRL_INDICATOR {
            return Err(Error::CrlParse("delta CRLs are not supported".to_string()));
        }
    }
    Ok(())
}

fn check_entry_extensions(exts: &Extensions) -> Result<()> {
    let exts_to_ignore = [
        ID_CE_INVALIDITY_DATE,
        ID_CE_CRL_REASONS,
        ID_CE_HOLD_INSTRUCTION_CODE,
    ];
    for e in exts {
        if e.critical && !exts_to_ignore.contains(&e.extn_id) {
            return Err(Error::CrlParse(format!(
                "unsupported critical CRL entry extension {}",
                e.extn_id
            )));
        }
    }
    Ok(())
}

impl CachedCrl {
    /// Parses a DER-encoded CRL. Delta CRLs and CRLs carrying unrecognized critical extensions are
    /// rejected with [`Error::CrlParse`].
    pub fn parse(crl_buf: &[u8]) -> Result<Self> {
        let crl = CertificateList::from_der(crl_buf).map_err(|e| Error::CrlParse(e.to_string()))?;
        let signed =
            DeferDecodeSigned::from_der(crl_buf).map_err(|e| Error::CrlParse(e.to_string()))?;

        let tbs = &crl.tbs_cert_list;
        if let Some(exts) = &tbs.crl_extensions {
            check_crl_extensions(exts)?;
        }

        let mut revoked = BTreeSet::new();
        if let Some(rcs) = &tbs.revoked_certificates {
            for rc in rcs {
                if let Some(exts) = &rc.crl_entry_extensions {
                    check_entry_extensions(exts)?;
                }
                revoked.insert(rc.serial_number.as_bytes().to_vec());
            }
        }

        Ok(CachedCrl {
            issuer: tbs.issuer.clone(),
            this_update: tbs.this_update.to_unix_duration().as_secs(),
            next_update: tbs
                .next_update
                .as_ref()
                .map(|nu| nu.to_unix_duration().as_secs()),
            encoded: crl_buf.to_vec(),
            revoked,
            signed,
        })
    }

    /// True when `serial` (as encoded in the certificate) is listed.
    pub fn is_revoked(&self, serial: &[u8]) -> bool {
        self.revoked.contains(serial)
    }

    /// Number of revoked entries
    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    /// is_fresh returns true when `toi` falls between thisUpdate and nextUpdate. A CRL without a
    /// nextUpdate is never considered fresh.
    pub fn is_fresh(&self, toi: TimeOfInterest) -> bool {
        let toi = toi.as_unix_secs();
        match self.next_update {
            Some(nu) => self.this_update <= toi && toi <= nu,
            None => false,
        }
    }

    /// verify checks that `issuer` may sign CRLs and that its key verifies this CRL.
    pub fn verify(&self, issuer: &ParsedCertificate) -> Result<()> {
        check_crl_sign(issuer)?;
        let r = verify_signature_message(
            &self.signed.tbs_field,
            &self.signed.signature_algorithm,
            self.signed.signature.raw_bytes(),
            &issuer.decoded_cert.tbs_certificate.subject_public_key_info,
        );
        if let Err(e) = r {
            error!(
                "CRL signature verification error for CRL issued by {}: {e}",
                name_to_string(&self.issuer)
            );
            return Err(Error::Validation(
                ValidationFailure::SignatureVerificationFailure,
            ));
        }
        Ok(())
    }
}

fn check_crl_sign(issuer: &ParsedCertificate) -> Result<()> {
    if let Some(ext) = get_extension(&issuer.decoded_cert, &ID_CE_KEY_USAGE) {
        match KeyUsage::from_der(ext.extn_value.as_bytes()) {
            Ok(ku) if ku.0.contains(KeyUsages::CRLSign) => return Ok(()),
            Ok(_) => error!("cRLSign is not set in key usage extension"),
            Err(_) => error!("key usage extension could not be parsed"),
        }
        return Err(Error::Validation(
            ValidationFailure::SignatureVerificationFailure,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const REVOKED_CRL: &[u8] = include_bytes!("../../tests/examples/test_business_revoked.crl");
    const EMPTY_CRL: &[u8] = include_bytes!("../../tests/examples/test_business_empty.crl");

    #[test]
    fn parse_and_lookup() {
        let crl = CachedCrl::parse(REVOKED_CRL).unwrap();
        assert!(crl.is_revoked(&hex!("1002")));
        assert!(!crl.is_revoked(&hex!("1001")));
        assert_eq!(crl.revoked_count(), 1);
        assert!(crl.is_fresh(TimeOfInterest::now().unwrap()));
        assert!(!crl.is_fresh(TimeOfInterest::from_unix_secs(0).unwrap()));

        let empty = CachedCrl::parse(EMPTY_CRL).unwrap();
        assert_eq!(empty.revoked_count(), 0);
        assert_eq!(empty.issuer, crl.issuer);
    }

    #[test]
    fn verify_signature() {
        let crl = CachedCrl::parse(REVOKED_CRL).unwrap();
        let ca = ParsedCertificate::from_pem(include_str!(
            "../../resources/trust/TEST/business-ca-g1.pem"
        ))
        .unwrap();
        let root =
            ParsedCertificate::from_pem(include_str!("../../resources/trust/TEST/root-ca-g1.pem"))
                .unwrap();
        assert!(crl.verify(&ca).is_ok());
        assert!(crl.verify(&root).is_err());
    }

    #[test]
    fn garbage() {
        assert!(matches!(
            CachedCrl::parse(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(Error::CrlParse(_))
        ));
    }
}
