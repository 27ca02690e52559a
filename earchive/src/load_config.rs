/// `load_config` module: Loads the optional YAML config and applies environment overrides.
///
/// This module is the only place where the YAML configuration is parsed.
///
/// # Responsibilities
/// - Read `--config <file>`, or `earchive.yaml` in the working directory when present
/// - Fill anything the file leaves out with built-in defaults
/// - Apply `EARCHIVE_TEST_URL`, `EARCHIVE_PRODUCTION_URL` and `EARCHIVE_CERT_STORE` on top
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary as a usage error.
///
/// Accepted YAML:
///
/// ```yaml
/// environments:
///   test: https://tstearhiv.posta.si
///   production: https://earhiv.posta.si
/// certificate_store: ./certs
/// ```
use anyhow::Result;
use earchive_core::config::EnvironmentUrls;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_CONFIG_FILE: &str = "earchive.yaml";
pub const DEFAULT_TEST_URL: &str = "https://tstearhiv.posta.si";
pub const DEFAULT_PRODUCTION_URL: &str = "https://earhiv.posta.si";
pub const DEFAULT_CERT_STORE: &str = "./certs";

pub const ENV_TEST_URL: &str = "EARCHIVE_TEST_URL";
pub const ENV_PRODUCTION_URL: &str = "EARCHIVE_PRODUCTION_URL";
pub const ENV_CERT_STORE: &str = "EARCHIVE_CERT_STORE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub environments: EnvironmentUrls,
    pub certificate_store: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            environments: EnvironmentUrls {
                test: DEFAULT_TEST_URL.to_string(),
                production: DEFAULT_PRODUCTION_URL.to_string(),
            },
            certificate_store: PathBuf::from(DEFAULT_CERT_STORE),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvironments {
    test: Option<String>,
    production: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    environments: Option<RawEnvironments>,
    #[serde(default)]
    certificate_store: Option<PathBuf>,
}

/// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, then applies
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let raw = match path {
        Some(path) => read_raw(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => read_raw(Path::new(DEFAULT_CONFIG_FILE))?,
        None => {
            info!("No config file, using defaults");
            RawConfig::default()
        }
    };

    let mut config = CliConfig::default();
    if let Some(envs) = raw.environments {
        if let Some(test) = envs.test {
            config.environments.test = test;
        }
        if let Some(production) = envs.production {
            config.environments.production = production;
        }
    }
    if let Some(store) = raw.certificate_store {
        config.certificate_store = store;
    }

    apply_env_overrides(&mut config);
    info!(
        test_url = %config.environments.test,
        production_url = %config.environments.production,
        certificate_store = %config.certificate_store.display(),
        "Configuration loaded"
    );
    Ok(config)
}

fn read_raw(path: &Path) -> Result<RawConfig> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path, e)
    })?;
    // An empty file is a valid, empty config.
    if content.trim().is_empty() {
        return Ok(RawConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })
}

fn apply_env_overrides(config: &mut CliConfig) {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    if let Some(url) = var(ENV_TEST_URL) {
        info!(variable = ENV_TEST_URL, "Test URL overridden from environment");
        config.environments.test = url;
    }
    if let Some(url) = var(ENV_PRODUCTION_URL) {
        info!(variable = ENV_PRODUCTION_URL, "Production URL overridden from environment");
        config.environments.production = url;
    }
    if let Some(store) = var(ENV_CERT_STORE) {
        info!(variable = ENV_CERT_STORE, "Certificate store overridden from environment");
        config.certificate_store = PathBuf::from(store);
    }
}
