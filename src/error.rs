//! Error types, one enum per concern.
//!
//! Library code returns these; the binary wraps them in `anyhow` at the edge.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single PokeAPI request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or protocol failure.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body could not be decoded into the expected payload.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// No answer within the per-request timeout.
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// An identifier that cannot name a Pokémon.
    #[error("invalid pokemon reference: {0:?}")]
    InvalidRef(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            };
        }
        if err.is_decode() {
            return FetchError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            };
        }
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether retrying the same request might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode { .. } | FetchError::InvalidRef(_) => false,
        }
    }
}

/// Failure of an enrichment run as a whole.
///
/// Per-entry failures never show up here; they become
/// [`EnrichedEntry::Failed`](crate::models::EnrichedEntry::Failed) slots.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("enrichment cancelled")]
    Cancelled,

    /// The stub list itself could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("favorites I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored value is not a JSON array of ids.
    #[error("favorites file {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("page size must be at least 1")]
    InvalidPageSize,

    #[error("page {page} is out of range (1..={pages})")]
    InvalidPage { page: usize, pages: usize },
}
