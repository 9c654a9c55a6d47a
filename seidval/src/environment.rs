//! Deployment environments and the trust material associated with each

pub mod seid_environment;
pub mod trust_properties;

pub use crate::{environment::seid_environment::*, environment::trust_properties::*};
