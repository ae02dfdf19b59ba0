use std::fmt;
use std::path::PathBuf;

use newsreel_store::StoreError;
use newsreel_types::FetchError;

use crate::settings::ConfigError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Logging(String),
    ManifestIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ManifestParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Store(StoreError),
    Fetch(FetchError),
    PrefetchFailed {
        failed: usize,
        total: usize,
    },
    Interrupted,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "{err}"),
            AppError::Logging(message) => write!(f, "failed to initialize logging: {message}"),
            AppError::ManifestIo { path, source } => {
                write!(f, "failed to read feed {}: {}", path.display(), source)
            }
            AppError::ManifestParse { path, source } => {
                write!(f, "failed to parse feed {}: {}", path.display(), source)
            }
            AppError::Store(err) => write!(f, "{err}"),
            AppError::Fetch(err) => write!(f, "{err}"),
            AppError::PrefetchFailed { failed, total } => {
                write!(f, "{failed} of {total} videos could not be cached")
            }
            AppError::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::ManifestIo { source, .. } => Some(source),
            AppError::ManifestParse { source, .. } => Some(source),
            AppError::Store(err) => Some(err),
            AppError::Fetch(err) => Some(err),
            AppError::Logging(_) | AppError::PrefetchFailed { .. } | AppError::Interrupted => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::Fetch(err)
    }
}
