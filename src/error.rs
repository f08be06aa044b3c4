//! Per-repository scan errors.

use thiserror::Error;

/// Errors that can occur while talking to GitHub about a single repository.
///
/// These never abort a scan run; the orchestrator turns them into status
/// lines and moves on to the next repository.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Repository not found or no access to security alerts")]
    NotFound,

    #[error("Unauthorized - check your GitHub token permissions")]
    Unauthorized { message: String },

    #[error("{0}")]
    Other(String),
}

impl ScanError {
    /// Classify an HTTP status returned by the GitHub API.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound,
            401 | 403 => Self::Unauthorized { message },
            _ if message.is_empty() => Self::Other(format!("GitHub returned HTTP {status}")),
            _ => Self::Other(format!("HTTP {status}: {message}")),
        }
    }

    /// Platform message behind an authorization failure, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } if !message.is_empty() => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn timeout(what: &str, secs: u64) -> Self {
        Self::Other(format!("{what} timed out after {secs}s"))
    }
}

impl From<octocrab::Error> for ScanError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                Self::from_status(source.status_code.as_u16(), source.message)
            }
            other => Self::Other(other.to_string()),
        }
    }
}
