use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Which deployment of the archive service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Production,
}

impl Environment {
    /// Maps the CLI's `--devel` flag.
    pub fn from_devel_flag(devel: bool) -> Self {
        if devel {
            Environment::Test
        } else {
            Environment::Production
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => f.write_str("test"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Base URLs per environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentUrls {
    pub test: String,
    pub production: String,
}

impl EnvironmentUrls {
    pub fn base_url(&self, environment: Environment) -> &str {
        let url = match environment {
            Environment::Test => &self.test,
            Environment::Production => &self.production,
        };
        info!(%environment, base_url = %url, "Selected service environment");
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devel_flag_selects_test_environment() {
        let urls = EnvironmentUrls {
            test: "https://test.example".into(),
            production: "https://prod.example".into(),
        };
        assert_eq!(
            urls.base_url(Environment::from_devel_flag(true)),
            "https://test.example"
        );
        assert_eq!(
            urls.base_url(Environment::from_devel_flag(false)),
            "https://prod.example"
        );
    }
}
