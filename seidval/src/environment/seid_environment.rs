//! The closed set of deployment environments

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::error::{Error, Result};

/// Deployment environment. Each value selects one of two disjoint sets of built-in trust material.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    /// Test environment
    Test,
    /// Production environment
    Prod,
}

impl Environment {
    /// Resolves an environment from its name, ignoring case. Empty and unrecognized names fail with
    /// [`Error::UnknownEnvironment`].
    pub fn of(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "TEST" => Ok(Environment::Test),
            "PROD" => Ok(Environment::Prod),
            _ => Err(Error::UnknownEnvironment(name.to_string())),
        }
    }

    /// Upper case name of the environment, also used as the folder name for CRL snapshots.
    pub fn name(&self) -> &'static str {
        match self {
            Environment::Test => "TEST",
            Environment::Prod => "PROD",
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Environment::of(s)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[test]
fn environment_names() {
    assert_eq!(Environment::of("test").unwrap(), Environment::Test);
    assert_eq!(Environment::of("PROD").unwrap(), Environment::Prod);
    assert_eq!("Prod".parse::<Environment>().unwrap(), Environment::Prod);
    assert_eq!(
        Environment::of("").unwrap_err(),
        Error::UnknownEnvironment(String::new())
    );
    assert!(Environment::of("staging").is_err());
    assert_eq!(Environment::Test.to_string(), "TEST");
    assert_eq!(
        serde_json::to_string(&Environment::Prod).unwrap(),
        "\"PROD\""
    );
}
