//! Basic utility functionality supporting certificate validation

pub mod cert_utilities;
pub mod crypto;
pub mod error;
pub mod pem;
pub mod time_of_interest;

pub use crate::{
    util::cert_utilities::*, util::crypto::*, util::error::*, util::pem::*,
    util::time_of_interest::*,
};
