use crate::error::{Error, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub github_host: String,
    pub github_protocol: String,
    pub github_enterprise: bool,
    pub page_size: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN")
            .map_err(|_| Error::Config("GITHUB_TOKEN environment variable not set".to_string()))?;

        let github_host =
            env::var("GITHUB_HOST").unwrap_or_else(|_| "api.github.com".to_string());

        let github_protocol =
            env::var("GITHUB_PROTOCOL").unwrap_or_else(|_| "https".to_string());

        let github_enterprise = env::var("GITHUB_ENTERPRISE")
            .ok()
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let page_size = env::var("PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        Ok(Self {
            github_token,
            github_host,
            github_protocol,
            github_enterprise,
            page_size,
        })
    }
}
