//! Environment selection and settings.
//!
//! Settings come from process environment variables, optionally seeded from an
//! env file chosen by `--env` (or `DOTENV_CONFIG_PATH`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use cmsstore::StoreConfig;
use dlpfetcher::FetcherConfig;

use crate::error::{Result, SyncError};

pub const DOTENV_PATH_VAR: &str = "DOTENV_CONFIG_PATH";

pub const PROJECT_ID_VAR: &str = "SANITY_PROJECT_ID";
pub const DATASET_VAR: &str = "SANITY_DATASET";
pub const WRITE_TOKEN_VAR: &str = "SANITY_WRITE_TOKEN";
pub const API_VERSION_VAR: &str = "SANITY_API_VERSION";
pub const SUBGRAPH_URL_VAR: &str = "SUBGRAPH_URL";
pub const EXPLORER_URL_VAR: &str = "VANASCAN_API_URL";
pub const PAGE_SIZE_VAR: &str = "SYNC_PAGE_SIZE";
pub const PAGE_DELAY_VAR: &str = "SYNC_PAGE_DELAY_MS";
pub const ITEM_DELAY_VAR: &str = "SYNC_ITEM_DELAY_MS";
pub const CONCURRENCY_VAR: &str = "SYNC_ENRICH_CONCURRENCY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Mainnet,
    Moksha,
}

impl Environment {
    pub fn env_file_name(&self) -> &'static str {
        match self {
            Environment::Mainnet => ".env",
            Environment::Moksha => ".env.moksha",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Mainnet => "mainnet",
            Environment::Moksha => "moksha",
        }
    }
}

/// `DOTENV_CONFIG_PATH` when set, else the environment's file inside `dir`.
pub fn env_file_path(environment: Environment, explicit: Option<&str>, dir: &Path) -> PathBuf {
    match explicit.map(str::trim).filter(|path| !path.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => dir.join(environment.env_file_name()),
    }
}

/// Loads the selected env file into the process environment. Variables that
/// are already set keep their values. A missing file is not an error.
pub fn load_env_file(environment: Environment) -> Result<Option<PathBuf>> {
    let explicit = std::env::var(DOTENV_PATH_VAR).ok();
    let path = env_file_path(environment, explicit.as_deref(), Path::new("."));
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no env file found");
        return Ok(None);
    }
    dotenvy::from_path(&path)?;
    tracing::debug!(path = %path.display(), "loaded env file");
    Ok(Some(path))
}

/// Parses an env file without touching the process environment.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match non_empty(lookup, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| SyncError::Config(format!("{key} must be a number, got '{raw}'"))),
    }
}

fn missing_error(missing: &[&str]) -> SyncError {
    SyncError::Config(format!(
        "missing required environment variables: {}. Check your .env file.",
        missing.join(", ")
    ))
}

/// Store settings only; enough for maintenance commands.
pub fn store_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<StoreConfig> {
    let project_id = non_empty(&lookup, PROJECT_ID_VAR);
    let dataset = non_empty(&lookup, DATASET_VAR);
    let token = non_empty(&lookup, WRITE_TOKEN_VAR);

    let mut missing = Vec::new();
    for (name, value) in [
        (PROJECT_ID_VAR, &project_id),
        (DATASET_VAR, &dataset),
        (WRITE_TOKEN_VAR, &token),
    ] {
        if value.is_none() {
            missing.push(name);
        }
    }
    if !missing.is_empty() {
        return Err(missing_error(&missing));
    }

    let mut config = StoreConfig::new(
        project_id.unwrap_or_default(),
        dataset.unwrap_or_default(),
        token.unwrap_or_default(),
    );
    if let Some(version) = non_empty(&lookup, API_VERSION_VAR) {
        config.api_version = version;
    }
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub environment: Environment,
    pub store: StoreConfig,
    pub fetcher: FetcherConfig,
    pub item_delay: Duration,
}

impl SyncConfig {
    pub fn from_env(environment: Environment) -> Result<Self> {
        Self::from_lookup(environment, |key| std::env::var(key).ok())
    }

    /// Reads every setting through `lookup`; all missing required settings are
    /// reported together.
    pub fn from_lookup(
        environment: Environment,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let subgraph_url = non_empty(&lookup, SUBGRAPH_URL_VAR);
        let store = match store_config_from_lookup(&lookup) {
            Ok(store) => store,
            Err(SyncError::Config(_)) => {
                let mut missing: Vec<&str> = [PROJECT_ID_VAR, DATASET_VAR, WRITE_TOKEN_VAR]
                    .into_iter()
                    .filter(|key| non_empty(&lookup, key).is_none())
                    .collect();
                if subgraph_url.is_none() {
                    missing.push(SUBGRAPH_URL_VAR);
                }
                return Err(missing_error(&missing));
            }
            Err(other) => return Err(other),
        };
        let subgraph_url = subgraph_url.ok_or_else(|| missing_error(&[SUBGRAPH_URL_VAR]))?;

        let mut fetcher = FetcherConfig::new(subgraph_url);
        if let Some(explorer) = non_empty(&lookup, EXPLORER_URL_VAR) {
            fetcher.explorer_url = explorer;
        }
        fetcher.page_size = parse_or(&lookup, PAGE_SIZE_VAR, fetcher.page_size)?;
        fetcher.page_delay_ms = parse_or(&lookup, PAGE_DELAY_VAR, fetcher.page_delay_ms)?;
        fetcher.enrich_concurrency =
            parse_or(&lookup, CONCURRENCY_VAR, fetcher.enrich_concurrency)?;
        fetcher
            .validate()
            .map_err(|err| SyncError::Config(err.to_string()))?;

        let item_delay_ms: u64 = parse_or(&lookup, ITEM_DELAY_VAR, 100)?;

        Ok(Self {
            environment,
            store,
            fetcher,
            item_delay: Duration::from_millis(item_delay_ms),
        })
    }
}
