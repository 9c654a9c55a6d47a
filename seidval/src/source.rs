//! Sources of trust material and CRL snapshots

pub mod certificate_bucket;
pub mod snapshot_source;

pub use crate::{source::certificate_bucket::*, source::snapshot_source::*};
