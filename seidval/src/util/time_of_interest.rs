//! Time against which validity periods and CRL freshness are evaluated

use core::{cmp::Ordering, fmt, time::Duration};
use std::time::SystemTime;

use crate::util::error::{Error, Result};

/// Time of interest for the validation of a certificate or a check against a CRL.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct TimeOfInterest(pub der::DateTime);

impl fmt::Display for TimeOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TimeOfInterest {
    /// Creates a [`TimeOfInterest`] for the current system time. Fails if the clock reads outside
    /// the range representable by [`der::DateTime`].
    pub fn now() -> Result<Self> {
        Ok(Self(der::DateTime::from_system_time(SystemTime::now())?))
    }

    /// Create a [`TimeOfInterest`] from seconds since the Unix epoch
    pub fn from_unix_secs(v: u64) -> Result<Self> {
        Ok(Self(der::DateTime::from_unix_duration(
            Duration::from_secs(v),
        )?))
    }

    /// Parse an RFC 3339 style UTC time, i.e. `2030-01-01T00:00:00Z`
    pub fn parse(s: &str) -> Result<Self> {
        s.parse::<der::DateTime>()
            .map(Self)
            .map_err(|e| Error::Config(format!("invalid time '{s}': {e}")))
    }

    /// Return Unix epoch (in seconds) for this value
    pub fn as_unix_secs(&self) -> u64 {
        self.0.unix_duration().as_secs()
    }
}

impl PartialEq<x509_cert::time::Time> for TimeOfInterest {
    fn eq(&self, other: &x509_cert::time::Time) -> bool {
        self.0.eq(&other.to_date_time())
    }
}

impl PartialOrd<x509_cert::time::Time> for TimeOfInterest {
    fn partial_cmp(&self, other: &x509_cert::time::Time) -> Option<Ordering> {
        self.0.partial_cmp(&other.to_date_time())
    }
}
