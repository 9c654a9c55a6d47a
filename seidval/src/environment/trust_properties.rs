//! Trust anchors, intermediate CA certificates, accepted policies and extension rules for one
//! environment.
//!
//! Two built-in instances are available via [`default_properties`]. Deployments adjust them with
//! [`merge`], typically using overrides read from a JSON file:
//!
//! ```json
//! {
//!   "policies": ["2.16.578.1.1.1.1.100", "2.16.578.1.1.1.1.101"],
//!   "policy_exempt_issuers": []
//! }
//! ```
//!
//! Fields absent from the JSON deserialize as empty sets, which leave the base value in place when
//! merged.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::environment::seid_environment::Environment;
use crate::util::error::Result;

const TEST_ROOT_CA_G1: &str = include_str!("../../resources/trust/TEST/root-ca-g1.pem");
const TEST_BUSINESS_CA_G1: &str = include_str!("../../resources/trust/TEST/business-ca-g1.pem");
const TEST_ALTERNATE_ROOT_CA: &str =
    include_str!("../../resources/trust/TEST/alternate-root-ca.pem");
const TEST_ALTERNATE_ENTERPRISE_CA: &str =
    include_str!("../../resources/trust/TEST/alternate-enterprise-ca.pem");
const PROD_ROOT_CA_G1: &str = include_str!("../../resources/trust/PROD/root-ca-g1.pem");
const PROD_BUSINESS_CA_G1: &str = include_str!("../../resources/trust/PROD/business-ca-g1.pem");

/// Policy asserted by TEST enterprise certificates
pub const TEST_ENTERPRISE_POLICY: &str = "2.16.578.1.1.1.1.100";
/// Policy asserted by PROD enterprise certificates
pub const PROD_ENTERPRISE_POLICY: &str = "2.16.578.1.1.1.1.1";

/// keyUsage
pub const KEY_USAGE: &str = "2.5.29.15";
/// basicConstraints
pub const BASIC_CONSTRAINTS: &str = "2.5.29.19";

/// Distribution point of the TEST business CA
pub const TEST_BUSINESS_CA_CRL: &str = "http://crl.test.seid2.example.no/business-ca-g1.crl";
/// Distribution point of the TEST alternate enterprise CA
pub const TEST_ALTERNATE_CA_CRL: &str = "http://crl.test.alternate.example.no/enterprise-ca.crl";
/// Distribution point of the PROD business CA
pub const PROD_BUSINESS_CA_CRL: &str = "http://crl.seid2.example.no/business-ca-g1.crl";

/// Issuer attribute identifying the TEST alternate CA, whose chain carries no enterprise policy
pub const TEST_ALTERNATE_ISSUER: &str = "O=Alternate Trust AS - TEST";

/// Trust material and extension rules for one environment.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustProperties {
    /// PEM-encoded self-signed trust anchors
    pub root_certificates: BTreeSet<String>,
    /// PEM-encoded CA certificates that chain to a root
    pub intermediate_certificates: BTreeSet<String>,
    /// Dotted policy OIDs, one of which must be carried by the chain. Empty disables the check.
    pub policies: BTreeSet<String>,
    /// Dotted extension OIDs permitted to be marked critical
    pub critical_extensions_recognized: BTreeSet<String>,
    /// Dotted extension OIDs that must be present and marked critical
    pub critical_extensions_required: BTreeSet<String>,
    /// CRL distribution points of the configured CAs
    pub crl_distribution_points: BTreeSet<String>,
    /// Issuer attribute lists (i.e., `O=Alternate Trust AS - TEST`) for which the policy
    /// requirement is waived
    pub policy_exempt_issuers: BTreeSet<String>,
}

fn set_of(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.trim().to_string()).collect()
}

/// default_properties returns the built-in [`TrustProperties`] for `environment`.
pub fn default_properties(environment: Environment) -> TrustProperties {
    match environment {
        Environment::Test => TrustProperties {
            root_certificates: set_of(&[TEST_ROOT_CA_G1, TEST_ALTERNATE_ROOT_CA]),
            intermediate_certificates: set_of(&[
                TEST_BUSINESS_CA_G1,
                TEST_ALTERNATE_ENTERPRISE_CA,
            ]),
            policies: set_of(&[TEST_ENTERPRISE_POLICY]),
            critical_extensions_recognized: set_of(&[KEY_USAGE, BASIC_CONSTRAINTS]),
            critical_extensions_required: set_of(&[KEY_USAGE]),
            crl_distribution_points: set_of(&[TEST_BUSINESS_CA_CRL, TEST_ALTERNATE_CA_CRL]),
            policy_exempt_issuers: set_of(&[TEST_ALTERNATE_ISSUER]),
        },
        Environment::Prod => TrustProperties {
            root_certificates: set_of(&[PROD_ROOT_CA_G1]),
            intermediate_certificates: set_of(&[PROD_BUSINESS_CA_G1]),
            policies: set_of(&[PROD_ENTERPRISE_POLICY]),
            critical_extensions_recognized: set_of(&[KEY_USAGE, BASIC_CONSTRAINTS]),
            critical_extensions_required: set_of(&[KEY_USAGE]),
            crl_distribution_points: set_of(&[PROD_BUSINESS_CA_CRL]),
            policy_exempt_issuers: BTreeSet::new(),
        },
    }
}

fn pick(base: &BTreeSet<String>, over: &BTreeSet<String>) -> BTreeSet<String> {
    if over.is_empty() {
        base.clone()
    } else {
        over.clone()
    }
}

/// merge returns `base` with each field replaced by the corresponding field of `over` when that
/// field is non-empty.
pub fn merge(base: &TrustProperties, over: &TrustProperties) -> TrustProperties {
    TrustProperties {
        root_certificates: pick(&base.root_certificates, &over.root_certificates),
        intermediate_certificates: pick(
            &base.intermediate_certificates,
            &over.intermediate_certificates,
        ),
        policies: pick(&base.policies, &over.policies),
        critical_extensions_recognized: pick(
            &base.critical_extensions_recognized,
            &over.critical_extensions_recognized,
        ),
        critical_extensions_required: pick(
            &base.critical_extensions_required,
            &over.critical_extensions_required,
        ),
        crl_distribution_points: pick(&base.crl_distribution_points, &over.crl_distribution_points),
        policy_exempt_issuers: pick(&base.policy_exempt_issuers, &over.policy_exempt_issuers),
    }
}

impl TrustProperties {
    /// Parses overrides from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads overrides from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Returns true when every field is empty.
    pub fn is_empty(&self) -> bool {
        *self == TrustProperties::default()
    }
}
