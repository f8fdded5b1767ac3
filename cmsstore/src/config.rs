use serde::Deserialize;

use crate::errors::{Result, StoreError};

pub const DEFAULT_API_VERSION: &str = "2023-05-03";

#[derive(Deserialize, Debug, Clone)]
pub struct StoreConfig {
    pub project_id: String,
    pub dataset: String,
    pub token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub use_cdn: bool,
    /// Overrides the `https://<project>.api.sanity.io` host, mainly for tests.
    #[serde(default)]
    pub api_host: Option<String>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl StoreConfig {
    pub fn new(
        project_id: impl Into<String>,
        dataset: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            token: token.into(),
            api_version: default_api_version(),
            use_cdn: false,
            api_host: None,
        }
    }

    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Base URL for versioned API calls, e.g. `https://abc.api.sanity.io/v2023-05-03`.
    pub fn api_base(&self) -> String {
        let host = match &self.api_host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => {
                let domain = if self.use_cdn { "apicdn" } else { "api" };
                format!("https://{}.{}.sanity.io", self.project_id, domain)
            }
        };
        let version = self.api_version.trim_start_matches('v');
        format!("{host}/v{version}")
    }

    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.project_id.trim().is_empty() {
            missing.push("project id");
        }
        if self.dataset.trim().is_empty() {
            missing.push("dataset");
        }
        if self.token.trim().is_empty() {
            missing.push("write token");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Config(format!(
                "missing store settings: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_uses_project_subdomain() {
        let config = StoreConfig::new("abc123", "moksha", "secret");
        assert_eq!(config.api_base(), "https://abc123.api.sanity.io/v2023-05-03");
    }

    #[test]
    fn api_base_honours_host_override() {
        let config = StoreConfig::new("abc123", "moksha", "secret")
            .with_api_host("http://127.0.0.1:4000/");
        assert_eq!(config.api_base(), "http://127.0.0.1:4000/v2023-05-03");
    }

    #[test]
    fn validate_lists_every_missing_setting() {
        let err = StoreConfig::new("", "mainnet", " ").validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("project id"));
        assert!(message.contains("write token"));
        assert!(!message.contains("dataset"));
    }
}
