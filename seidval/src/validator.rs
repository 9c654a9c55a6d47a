//! Certificate validation: the rules, their assembly into a pipeline and the validator facade

pub mod certificate_rules;
pub mod certificate_validator;
pub mod chain_rule;
pub mod crl_rule;
pub mod parsed_certificate;
pub mod validator_builder;
pub mod validator_rule;

pub use crate::{
    validator::certificate_rules::*, validator::certificate_validator::*,
    validator::chain_rule::*, validator::crl_rule::*, validator::parsed_certificate::*,
    validator::validator_builder::*, validator::validator_rule::*,
};
