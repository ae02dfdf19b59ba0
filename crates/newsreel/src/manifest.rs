use std::path::Path;

use newsreel_types::FeedManifest;

use crate::error::AppError;

/// Read a feed manifest: a TOML file with one `[[items]]` table per post.
pub async fn load_manifest(path: &Path) -> Result<FeedManifest, AppError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AppError::ManifestIo {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| AppError::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}
