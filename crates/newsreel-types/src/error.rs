use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failure of a shared fetch. Every waiter on the same flight receives a
/// clone of the same value, so I/O sources are reference counted.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("could not resolve locator '{locator}': {message}")]
    Resolution { locator: String, message: String },
    #[error("transfer from '{url}' failed: {message}")]
    Network { url: String, message: String },
    #[error("fetch did not finish within {0:?}")]
    Timeout(Duration),
    #[error("download exceeds the {limit} byte ceiling (observed {observed} bytes)")]
    Oversize { limit: u64, observed: u64 },
    #[error("failed to write cache file at '{}': {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("fetch task ended before reporting a result")]
    Abandoned,
}

impl FetchError {
    pub fn resolution(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            locator: locator.into(),
            message: message.into(),
        }
    }

    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn storage_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StorageWrite {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Short machine-friendly label, used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::Network { .. } => "network",
            Self::Timeout(_) => "timeout",
            Self::Oversize { .. } => "oversize",
            Self::StorageWrite { .. } => "storage-write",
            Self::Abandoned => "abandoned",
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Failure reported by the player primitive.
#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    #[error("could not open '{}': {message}", path.display())]
    Open { path: PathBuf, message: String },
    #[error("media is not playable: {0}")]
    Unplayable(String),
}
