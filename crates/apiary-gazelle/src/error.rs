// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GazelleError>;

#[derive(Debug, Error)]
pub enum GazelleError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("rate limiter is closed")]
    RateLimiterClosed,

    #[error("tracker API error: {0}")]
    Api(String),

    #[error("invalid response from tracker: {0}")]
    InvalidResponse(String),

    #[error("torrent {id} not found on tracker{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    NotFound { id: String, reason: Option<String> },

    #[error("tracker returned HTTP {status}")]
    Http { status: u16 },

    #[error("download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GazelleError {
    /// Whether the tracker said the requested torrent does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api(message) => {
                let message = message.to_lowercase();
                message.contains("bad id parameter") || message.contains("bad parameters")
            }
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded)
    }
}
