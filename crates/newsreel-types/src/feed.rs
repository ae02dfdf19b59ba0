use serde::{Deserialize, Serialize};

use crate::{RemoteLocator, VideoId};

/// One post in the feed as supplied by the document store.
///
/// The playback core only reads `id` and `locator`; the rest rides along
/// for the caller's UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: VideoId,
    pub locator: RemoteLocator,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl FeedItem {
    pub fn new(id: VideoId, locator: RemoteLocator) -> Self {
        Self {
            id,
            locator,
            headline: None,
            subtitle: None,
            likes: 0,
            shares: 0,
            user_id: None,
        }
    }
}

/// Ordered feed snapshot, as loaded from a manifest file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedManifest {
    pub items: Vec<FeedItem>,
}
