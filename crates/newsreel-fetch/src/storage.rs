use std::sync::Arc;

use futures_util::future::BoxFuture;
use newsreel_types::{FetchResult, RemoteLocator};

/// Remote object storage the coordinator downloads from.
///
/// Resolution and download are separate steps: a locator names an object,
/// and only the resolved URL can be fetched.
pub trait ObjectStorage: Send + Sync {
    /// Turn `locator` into a downloadable URL.
    fn resolve<'a>(&'a self, locator: &'a RemoteLocator) -> BoxFuture<'a, FetchResult<String>>;

    /// Download the object at `url`, failing with
    /// [`FetchError::Oversize`](newsreel_types::FetchError::Oversize) once
    /// more than `max_bytes` are declared or received.
    fn download<'a>(&'a self, url: &'a str, max_bytes: u64) -> BoxFuture<'a, FetchResult<Vec<u8>>>;
}

pub type DynObjectStorage = Arc<dyn ObjectStorage>;
