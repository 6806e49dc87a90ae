//! Source adapter trait and the built-in adapters.
//!
//! An adapter wraps one external data source behind a single lookup call and
//! reports every result, including failures, as a [`SourceOutcome`].

mod dork;
mod sanctions;

use std::time::Duration;

use async_trait::async_trait;
use dossier_shared::{DossierError, SourceKind, SourceOutcome, SubjectQuery};
use reqwest::Client;

pub use dork::{BIRTH_DATA_PHRASES, DorkSearchAdapter, dork_queries};
pub use sanctions::{SanctionsAdapter, map_sanctions_response};

/// User-Agent string for outbound lookups.
const USER_AGENT: &str = concat!("Dossier/", env!("CARGO_PKG_VERSION"));

/// Message used when an adapter receives a subject with no usable name.
pub(crate) const EMPTY_QUERY_MESSAGE: &str = "given name and family name must not be empty";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Contract every data source implements.
///
/// `lookup` has no error channel: transport problems, unexpected payloads,
/// and empty answers all come back as an outcome with the matching
/// [`SourceStatus`](dossier_shared::SourceStatus).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Key in the aggregate result and `source_module` in audit rows.
    fn name(&self) -> &str;

    /// Source family, used for grading.
    fn kind(&self) -> SourceKind;

    /// Category label written next to persisted findings.
    fn data_category(&self) -> &str;

    /// Query the source for `subject`. One remote attempt, bounded by a timeout.
    async fn lookup(&self, subject: &SubjectQuery) -> SourceOutcome;
}

// ---------------------------------------------------------------------------
// Adapter-local failures
// ---------------------------------------------------------------------------

/// Why a remote call failed. Never escapes an adapter; it becomes the
/// `message` of an error outcome.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The request did not complete within its timeout.
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Connection refused, DNS failure, TLS failure, body read failure.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-2xx status.
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body could not be decoded.
    #[error("invalid response from {url}: {message}")]
    Parse { url: String, message: String },
}

impl LookupError {
    /// Classify a reqwest failure for `url`.
    pub(crate) fn from_reqwest(url: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Build a reqwest client with a per-request timeout.
pub(crate) fn build_client(timeout: Duration) -> dossier_shared::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_error_messages() {
        let err = LookupError::Status {
            url: "https://api.example.com/search".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "https://api.example.com/search: HTTP 503");

        let err = LookupError::Timeout {
            url: "https://api.example.com/search".into(),
            secs: 15,
        };
        assert!(err.to_string().contains("timed out after 15s"));
    }

    #[test]
    fn client_builds() {
        assert!(build_client(Duration::from_secs(1)).is_ok());
    }
}
