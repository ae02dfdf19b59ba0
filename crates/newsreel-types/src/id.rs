use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identifier of a feed video, derived from the owning post.
///
/// Used both as the cache key and as the correlation key for
/// activate/deactivate events. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(Arc<str>);

impl VideoId {
    /// Returns `None` for empty or whitespace-only identifiers.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem safe to join onto a directory: bytes outside
    /// `[A-Za-z0-9._-]` are written as `%XX`, and a leading dot is escaped
    /// so the result is never hidden or a relative path component.
    pub fn file_stem(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for (idx, byte) in self.0.bytes().enumerate() {
            let keep = byte.is_ascii_alphanumeric()
                || byte == b'-'
                || byte == b'_'
                || (byte == b'.' && idx > 0);
            if keep {
                out.push(byte as char);
            } else {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
        out
    }

    /// Inverse of [`VideoId::file_stem`]. Returns `None` for stems that were
    /// not produced by it.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let bytes = stem.as_bytes();
        let mut decoded = Vec::with_capacity(bytes.len());
        let mut idx = 0;
        while idx < bytes.len() {
            if bytes[idx] == b'%' {
                let hex = stem.get(idx + 1..idx + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                idx += 3;
            } else {
                decoded.push(bytes[idx]);
                idx += 1;
            }
        }
        let text = String::from_utf8(decoded).ok()?;
        Self::new(text)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VideoId({})", self.0)
    }
}

impl TryFrom<String> for VideoId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or_else(|| "video id must not be empty".to_string())
    }
}

impl From<VideoId> for String {
    fn from(value: VideoId) -> Self {
        value.0.to_string()
    }
}

/// Opaque, scheme-qualified name of a video in remote object storage
/// (for example `store://bucket/path/clip.mp4`).
///
/// Turning a locator into a downloadable URL is the storage client's job.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteLocator(String);

impl RemoteLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits `scheme://rest` into its two halves.
    pub fn scheme_and_rest(&self) -> Option<(&str, &str)> {
        let (scheme, rest) = self.0.split_once("://")?;
        if scheme.is_empty() || rest.is_empty() {
            return None;
        }
        Some((scheme, rest))
    }
}

impl fmt::Display for RemoteLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RemoteLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteLocator({})", self.0)
    }
}
