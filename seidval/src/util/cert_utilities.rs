//! Helpers for names and extensions of certificates

use const_oid::db::rfc2256::STATE_OR_PROVINCE_NAME;
use const_oid::db::rfc4519::{
    COMMON_NAME, COUNTRY_NAME, LOCALITY_NAME, ORGANIZATIONAL_UNIT_NAME, ORGANIZATION_NAME,
    SERIAL_NUMBER,
};
use const_oid::db::rfc5280::ANY_POLICY;
use const_oid::db::rfc5912::{
    ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES, ID_CE_CRL_DISTRIBUTION_POINTS,
};
use der::asn1::{Ia5String, ObjectIdentifier, PrintableString, Utf8StringRef};
use der::{Decode, Tag, Tagged};
use log::debug;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{BasicConstraints, CertificatePolicies, CrlDistributionPoints};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::util::error::{Error, Result};

/// organizationIdentifier attribute type (X.520), used by Norwegian enterprise certificates
pub const ID_ORGANIZATION_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.97");

/// `name_to_string` returns the RFC 4514 string form of a [`Name`].
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// get_value_from_atav returns the value of a PrintableString, UTF8String or IA5String attribute
/// as a String, or None for other string types.
pub fn get_value_from_atav(atav: &AttributeTypeAndValue) -> Option<String> {
    match atav.value.tag() {
        Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        _ => None,
    }
}

/// compare_names returns true when both names have the same RDNs in the same order. Attribute
/// values are compared ignoring case and surrounding whitespace when the encodings differ.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    if left == right {
        return true;
    }
    if left.0.len() != right.0.len() {
        return false;
    }

    for (lrdn, rrdn) in left.0.iter().zip(right.0.iter()) {
        if lrdn.0.len() != rrdn.0.len() {
            return false;
        }
        for (l, r) in lrdn.0.iter().zip(rrdn.0.iter()) {
            if l.oid != r.oid {
                return false;
            }
            match (get_value_from_atav(l), get_value_from_atav(r)) {
                (Some(lv), Some(rv)) => {
                    if !lv.trim().eq_ignore_ascii_case(rv.trim()) {
                        return false;
                    }
                }
                _ => {
                    if l.value != r.value {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// attribute_oid_lookup maps a short attribute name (C, O, OU, CN, L, ST, SERIALNUMBER,
/// ORGANIZATIONIDENTIFIER) or a dotted OID string to an [`ObjectIdentifier`].
pub fn attribute_oid_lookup(name: &str) -> Result<ObjectIdentifier> {
    match name.trim().to_ascii_lowercase().as_str() {
        "c" => Ok(COUNTRY_NAME),
        "o" => Ok(ORGANIZATION_NAME),
        "ou" => Ok(ORGANIZATIONAL_UNIT_NAME),
        "cn" => Ok(COMMON_NAME),
        "l" => Ok(LOCALITY_NAME),
        "st" => Ok(STATE_OR_PROVINCE_NAME),
        "serialnumber" => Ok(SERIAL_NUMBER),
        "organizationidentifier" => Ok(ID_ORGANIZATION_IDENTIFIER),
        other => ObjectIdentifier::new(other)
            .map_err(|_| Error::Config(format!("unrecognized attribute type: {name}"))),
    }
}

/// parse_attribute_list parses strings like `O=Example AS, C=NO` into attribute type and value
/// pairs. Values may not contain commas.
pub fn parse_attribute_list(s: &str) -> Result<Vec<(ObjectIdentifier, String)>> {
    let mut retval = vec![];
    for part in s.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let (k, v) = part
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("expected TYPE=value, found '{part}'")))?;
        retval.push((attribute_oid_lookup(k)?, v.trim().to_string()));
    }
    if retval.is_empty() {
        return Err(Error::Config(format!("no attributes in '{s}'")));
    }
    Ok(retval)
}

/// name_has_attribute returns true if any RDN in `name` carries an attribute of type `oid` whose
/// string value equals `value` exactly.
pub fn name_has_attribute(name: &Name, oid: &ObjectIdentifier, value: &str) -> bool {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter(|atav| atav.oid == *oid)
        .any(|atav| get_value_from_atav(atav).as_deref() == Some(value))
}

/// get_extension returns the extension of type `oid`, if present.
pub fn get_extension<'a>(cert: &'a Certificate, oid: &ObjectIdentifier) -> Option<&'a Extension> {
    cert.tbs_certificate
        .extensions
        .as_ref()
        .and_then(|exts| exts.iter().find(|e| e.extn_id == *oid))
}

/// get_crl_dps returns the unique URIs from the fullName field of each distribution point in the
/// CRL distribution points extension.
pub fn get_crl_dps(cert: &Certificate) -> Vec<String> {
    let mut retval: Vec<String> = vec![];
    let ext = match get_extension(cert, &ID_CE_CRL_DISTRIBUTION_POINTS) {
        Some(ext) => ext,
        None => return retval,
    };
    let crl_dps = match CrlDistributionPoints::from_der(ext.extn_value.as_bytes()) {
        Ok(crl_dps) => crl_dps,
        Err(e) => {
            debug!("Failed to parse CRL distribution points: {e}");
            return retval;
        }
    };
    for crl_dp in &crl_dps.0 {
        if let Some(DistributionPointName::FullName(gns)) = &crl_dp.distribution_point {
            for gn in gns {
                if let GeneralName::UniformResourceIdentifier(uri) = gn {
                    let s = uri.to_string();
                    if !retval.contains(&s) {
                        retval.push(s);
                    }
                }
            }
        }
    }
    retval
}

/// get_policies returns the policy identifiers asserted in the certificate policies extension.
pub fn get_policies(cert: &Certificate) -> Vec<ObjectIdentifier> {
    match get_extension(cert, &ID_CE_CERTIFICATE_POLICIES) {
        Some(ext) => match CertificatePolicies::from_der(ext.extn_value.as_bytes()) {
            Ok(cps) => cps.0.iter().map(|pi| pi.policy_identifier).collect(),
            Err(e) => {
                debug!("Failed to parse certificate policies: {e}");
                vec![]
            }
        },
        None => vec![],
    }
}

/// asserts_policy returns true if the certificate asserts `policy` or anyPolicy.
pub fn asserts_policy(cert: &Certificate, policy: &ObjectIdentifier) -> bool {
    get_policies(cert)
        .iter()
        .any(|p| p == policy || *p == ANY_POLICY)
}

/// is_ca returns true when a basicConstraints extension is present with the cA field set.
pub fn is_ca(cert: &Certificate) -> bool {
    match get_extension(cert, &ID_CE_BASIC_CONSTRAINTS) {
        Some(ext) => BasicConstraints::from_der(ext.extn_value.as_bytes())
            .map(|bc| bc.ca)
            .unwrap_or(false),
        None => false,
    }
}

/// is_self_issued returns true when subject and issuer names match.
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(&cert.tbs_certificate.issuer, &cert.tbs_certificate.subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lookup() {
        assert_eq!(attribute_oid_lookup("O").unwrap(), ORGANIZATION_NAME);
        assert_eq!(attribute_oid_lookup(" cn ").unwrap(), COMMON_NAME);
        assert_eq!(
            attribute_oid_lookup("2.5.4.97").unwrap(),
            ID_ORGANIZATION_IDENTIFIER
        );
        assert!(attribute_oid_lookup("nickname").is_err());
    }

    #[test]
    fn attribute_list() {
        let attrs = parse_attribute_list("O=Alternate Trust AS - TEST, C=NO").unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0], (ORGANIZATION_NAME, "Alternate Trust AS - TEST".to_string()));
        assert_eq!(attrs[1], (COUNTRY_NAME, "NO".to_string()));
        assert!(parse_attribute_list("Alternate Trust AS").is_err());
        assert!(parse_attribute_list(" , ").is_err());
    }

    #[test]
    fn names() {
        let a = Name::from_str("CN=Business CA,O=Example AS,C=NO").unwrap();
        let b = Name::from_str("CN=business ca,O=Example AS,C=NO").unwrap();
        let c = Name::from_str("CN=Business CA,O=Other AS,C=NO").unwrap();
        assert!(compare_names(&a, &b));
        assert!(!compare_names(&a, &c));
        assert!(name_has_attribute(&a, &ORGANIZATION_NAME, "Example AS"));
        assert!(!name_has_attribute(&a, &ORGANIZATION_NAME, "Example"));
    }
}
