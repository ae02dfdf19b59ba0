mod error;
mod feed;
mod geometry;
mod id;

pub use error::{FetchError, FetchResult, PlayerError};
pub use feed::{FeedItem, FeedManifest};
pub use geometry::Rect;
pub use id::{RemoteLocator, VideoId};
