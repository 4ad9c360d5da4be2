use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Quota exhausted; the request may be repeated once `reset_at` has passed.
    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("GitHub API returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed while processing {repo}#{number}")]
    Item {
        repo: String,
        number: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("failed while processing repository {repo}")]
    Repo {
        repo: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    pub fn for_item(self, repo: &str, number: u64) -> Self {
        Error::Item {
            repo: repo.to_string(),
            number,
            source: Box::new(self),
        }
    }

    pub fn for_repo(self, repo: &str) -> Self {
        Error::Repo {
            repo: repo.to_string(),
            source: Box::new(self),
        }
    }
}
