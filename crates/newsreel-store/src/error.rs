use std::io;
use std::path::PathBuf;

use newsreel_types::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create cache directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write cache file '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to remove cache file '{}': {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },
    #[error("failed to list cache directory '{}': {source}", path.display())]
    List { path: PathBuf, source: io::Error },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for FetchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CreateDir { path, source }
            | StoreError::Write { path, source }
            | StoreError::Remove { path, source }
            | StoreError::List { path, source } => FetchError::storage_write(path, source),
        }
    }
}
