use std::env;

/// Runtime configuration for the GitHub REST client.
/// Built once at start-up and passed by reference to everything that talks to the API.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub api_url: String,
    pub api_version: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Config {
    /// Build configuration around an explicit token, reading the remaining values from the
    /// environment.
    ///
    /// Env vars:
    /// - GITHUB_API_URL (default: https://api.github.com)
    /// - GITHUB_API_VERSION (default: 2022-11-28)
    /// - GITHUB_HTTP_TIMEOUT_SECS (default: 30)
    /// - GITHUB_USER_AGENT (default: github-review-stats/<version>)
    pub fn with_token(token: impl Into<String>) -> Self {
        let api_url = env::var("GITHUB_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "https://api.github.com".to_string());
        let api_version =
            env::var("GITHUB_API_VERSION").unwrap_or_else(|_| "2022-11-28".to_string());
        let timeout_secs = env::var("GITHUB_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let default_ua = format!("github-review-stats/{}", env!("CARGO_PKG_VERSION"));
        let user_agent = env::var("GITHUB_USER_AGENT").unwrap_or(default_ua);

        Self {
            token: token.into(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_version,
            user_agent,
            timeout_secs,
        }
    }
}
