use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::future::BoxFuture;
use newsreel_types::{FetchError, FetchResult, RemoteLocator};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::storage::ObjectStorage;

const MEMORY_SCHEME: &str = "memory:";

/// In-process object storage for offline runs and tests.
///
/// Objects are keyed by locator. Downloads can be held open with
/// [`MemoryObjectStorage::hold`] to observe in-flight behavior, and failures
/// can be queued per locator.
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, VecDeque<FetchError>>>,
    resolves: AtomicUsize,
    downloads: AtomicUsize,
    held: AtomicBool,
    gate: Notify,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: &RemoteLocator, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .insert(locator.as_str().to_string(), bytes.into());
    }

    /// Make the next download of `locator` fail with `err`.
    pub fn fail_next(&self, locator: &RemoteLocator, err: FetchError) {
        self.failures
            .lock()
            .entry(locator.as_str().to_string())
            .or_default()
            .push_back(err);
    }

    /// Block downloads until [`MemoryObjectStorage::release`] is called.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    async fn wait_released(&self) {
        loop {
            let notified = self.gate.notified();
            if !self.held.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

impl ObjectStorage for MemoryObjectStorage {
    fn resolve<'a>(&'a self, locator: &'a RemoteLocator) -> BoxFuture<'a, FetchResult<String>> {
        Box::pin(async move {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            if !self.objects.lock().contains_key(locator.as_str()) {
                return Err(FetchError::resolution(locator.as_str(), "no such object"));
            }
            Ok(format!("{MEMORY_SCHEME}{locator}"))
        })
    }

    fn download<'a>(&'a self, url: &'a str, max_bytes: u64) -> BoxFuture<'a, FetchResult<Vec<u8>>> {
        Box::pin(async move {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            self.wait_released().await;

            let key = url.strip_prefix(MEMORY_SCHEME).unwrap_or(url);
            let queued = self
                .failures
                .lock()
                .get_mut(key)
                .and_then(|queue| queue.pop_front());
            if let Some(err) = queued {
                return Err(err);
            }

            let bytes = self
                .objects
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| FetchError::network(url, "object disappeared"))?;
            let observed = bytes.len() as u64;
            if observed > max_bytes {
                return Err(FetchError::Oversize {
                    limit: max_bytes,
                    observed,
                });
            }
            Ok(bytes)
        })
    }
}
