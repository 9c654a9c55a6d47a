//! Arguments for the seidval utility

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Validates SEID2 enterprise certificates against the TEST or PROD trust configuration
#[derive(Parser, Debug, Serialize, Deserialize, Default)]
#[command(arg_required_else_help(true))]
#[clap(author, version, about, long_about = None)]
pub struct SeidvalArgs {
    /// Trust environment to validate against, either TEST or PROD (case-insensitive).
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub environment: String,

    /// Full path and filename of a JSON file whose non-empty fields replace the built-in trust
    /// properties for the environment.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub properties: Option<String>,

    /// Full path and filename of YAML-formatted configuration file for log4rs logging mechanism.
    /// See <https://docs.rs/log4rs/latest/log4rs/> for details.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub logging_config: Option<String>,

    /// Full path of folder used to persist CRLs between runs. When neither this nor in_memory is
    /// given, a refreshing cache preloaded from bundled snapshots is used.
    #[clap(short, long, conflicts_with = "in_memory", help_heading = "REVOCATION")]
    pub crl_folder: Option<String>,

    /// Keep CRLs in memory only, fetching them when first needed.
    #[clap(short = 'm', long, help_heading = "REVOCATION")]
    pub in_memory: bool,

    /// Full path of folder containing CRL snapshots laid out as <folder>/<ENVIRONMENT>/<encoded
    /// url>, used to preload the cache.
    #[clap(short, long, help_heading = "REVOCATION")]
    pub snapshots: Option<String>,

    /// Treat certificates whose revocation status cannot be determined as not revoked.
    #[clap(short, long, help_heading = "REVOCATION")]
    pub accept_unknown: bool,

    /// Full path of folder to receive the CRLs for every configured distribution point, in the
    /// layout read by snapshots. No certificates are validated when this is given.
    #[clap(short, long, help_heading = "REVOCATION")]
    pub download_crls: Option<String>,

    /// Time to use for validation expressed as an RFC 3339 timestamp, i.e. 2030-01-01T00:00:00Z
    /// (defaults to current system time).
    #[clap(short = 'i', long, help_heading = "VALIDATION")]
    pub time_of_interest: Option<String>,

    /// Emit results as a JSON array instead of one line per certificate.
    #[clap(short, long, help_heading = "VALIDATION")]
    pub json: bool,

    /// Files containing PEM or DER encoded certificates to validate.
    #[clap(help_heading = "VALIDATION")]
    pub certificates: Vec<String>,
}
