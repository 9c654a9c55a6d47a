//! Revocation status determination from CRLs
//!
//! CRLs are held in a [`CrlCache`] keyed by distribution point URL. The revocation rule reaches
//! the cache through a [`CachingCrlFetcher`], which only goes to the network for caches that are
//! not refreshed in the background.

pub mod crl;
pub mod crl_cache;
pub mod crl_fetcher;
pub mod directory_crl_cache;
pub mod refreshing_crl_cache;

pub use crate::{
    revocation::crl::*, revocation::crl_cache::*, revocation::crl_fetcher::*,
    revocation::directory_crl_cache::*, revocation::refreshing_crl_cache::*,
};
