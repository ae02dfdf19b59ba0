//! Content-addressable on-disk cache of downloaded feed videos.

mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use newsreel_types::VideoId;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub use error::{StoreError, StoreResult};

const VIDEO_EXTENSION: &str = "mp4";
const PARTIAL_EXTENSION: &str = "part";

/// Maps a [`VideoId`] to a deterministic file under one private directory.
///
/// A path is only ever reported for a complete file: bytes are written to a
/// uniquely named `.part` file next to the final location and renamed into
/// place once flushed.
#[derive(Debug)]
pub struct ContentAddressableVideoStore {
    root: PathBuf,
    next_temp: AtomicU64,
}

impl ContentAddressableVideoStore {
    /// Open (creating if needed) the store rooted at `root`, discarding
    /// partial files left behind by an interrupted process.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::CreateDir {
            path: root.clone(),
            source,
        })?;

        let store = Self {
            root,
            next_temp: AtomicU64::new(0),
        };
        let removed = store.remove_matching(PARTIAL_EXTENSION)?;
        if removed > 0 {
            warn!(removed, root = %store.root.display(), "discarded stale partial downloads");
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location for `id`, whether or not it exists yet.
    pub fn path_for(&self, id: &VideoId) -> PathBuf {
        self.root
            .join(format!("{}.{VIDEO_EXTENSION}", id.file_stem()))
    }

    /// Path of the committed file for `id`, if a complete one exists.
    ///
    /// Only touches file metadata; never performs network or write I/O.
    pub fn resolved_path(&self, id: &VideoId) -> Option<PathBuf> {
        let path = self.path_for(id);
        file_ready(&path).then_some(path)
    }

    /// Durably write `bytes` as the cached file for `id` and return its path.
    ///
    /// Repeated commits for the same id overwrite the previous file
    /// atomically.
    pub async fn commit(&self, bytes: &[u8], id: &VideoId) -> StoreResult<PathBuf> {
        let final_path = self.path_for(id);
        let temp_path = self.temp_path_for(id);

        if let Err(err) = write_synced(&temp_path, bytes).await {
            discard(&temp_path).await;
            return Err(err);
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &final_path).await {
            discard(&temp_path).await;
            return Err(StoreError::Write {
                path: final_path,
                source,
            });
        }

        info!(id = %id, bytes = bytes.len(), path = %final_path.display(), "committed video");
        Ok(final_path)
    }

    /// Remove the cached file for `id`. Returns whether a file was removed.
    pub fn evict(&self, id: &VideoId) -> StoreResult<bool> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id = %id, "evicted video");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Remove { path, source }),
        }
    }

    /// Remove every committed and partial file, returning the number of
    /// committed videos removed.
    pub fn evict_all(&self) -> StoreResult<usize> {
        let removed = self.remove_matching(VIDEO_EXTENSION)?;
        self.remove_matching(PARTIAL_EXTENSION)?;
        info!(removed, root = %self.root.display(), "cleared video cache");
        Ok(removed)
    }

    /// Identifiers of all committed videos, sorted.
    pub fn cached_ids(&self) -> StoreResult<Vec<VideoId>> {
        let mut ids: Vec<VideoId> = self
            .list_with_extension(VIDEO_EXTENSION)?
            .into_iter()
            .filter(|path| file_ready(path))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                VideoId::from_file_stem(stem)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn temp_path_for(&self, id: &VideoId) -> PathBuf {
        let nonce = self.next_temp.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            "{}.{}-{nonce}.{PARTIAL_EXTENSION}",
            id.file_stem(),
            std::process::id()
        ))
    }

    fn list_with_extension(&self, extension: &str) -> StoreResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::List {
            path: self.root.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::List {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn remove_matching(&self, extension: &str) -> StoreResult<usize> {
        let mut removed = 0;
        for path in self.list_with_extension(extension)? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(StoreError::Remove { path, source }),
            }
        }
        Ok(removed)
    }
}

fn file_ready(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

async fn write_synced(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(path).await.map_err(write_err)?;
    file.write_all(bytes).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "failed to remove partial file");
    }
}
