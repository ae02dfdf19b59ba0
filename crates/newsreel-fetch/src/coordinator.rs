use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use newsreel_store::ContentAddressableVideoStore;
use newsreel_types::{FetchError, FetchResult, RemoteLocator, VideoId};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::storage::DynObjectStorage;

pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Largest object a single fetch may download.
    pub max_bytes: u64,
    /// Budget for resolving and downloading one object.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Snapshot of what the coordinator knows about one identifier.
#[derive(Debug, Clone)]
pub enum FetchState {
    NotStarted,
    InFlight { waiters: usize },
    Cached(PathBuf),
    Failed(FetchError),
}

type Outcome = Option<FetchResult<PathBuf>>;

struct Flight {
    outcome: watch::Receiver<Outcome>,
    waiters: Arc<AtomicUsize>,
}

impl Flight {
    /// A flight whose task is gone without publishing is dead and may be
    /// replaced.
    fn is_live(&self) -> bool {
        self.outcome.has_changed().is_ok()
    }
}

enum Slot {
    InFlight(Flight),
    Failed(FetchError),
}

enum Join {
    Cached(PathBuf),
    Wait(watch::Receiver<Outcome>, Arc<AtomicUsize>),
}

struct Inner {
    store: Arc<ContentAddressableVideoStore>,
    storage: DynObjectStorage,
    config: FetchConfig,
    slots: Mutex<HashMap<VideoId, Slot>>,
}

/// Brings remote videos into the local store with at most one download in
/// flight per identifier.
///
/// Concurrent callers for the same identifier share one flight and all see
/// its outcome. The flight runs as its own task, so a caller that stops
/// waiting never cancels it for the others; the bytes land in the cache
/// either way. A failed identifier may be fetched again by a later call.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl FetchCoordinator {
    pub fn new(
        store: Arc<ContentAddressableVideoStore>,
        storage: DynObjectStorage,
        config: FetchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                storage,
                config,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ContentAddressableVideoStore> {
        &self.inner.store
    }

    pub fn config(&self) -> FetchConfig {
        self.inner.config
    }

    /// Local path of a complete copy of `id`, downloading it on a miss.
    pub async fn ensure_local(&self, id: &VideoId, locator: &RemoteLocator) -> FetchResult<PathBuf> {
        if let Some(path) = self.inner.store.resolved_path(id) {
            debug!(id = %id, "cache hit");
            return Ok(path);
        }

        match self.join_or_start(id, locator) {
            Join::Cached(path) => Ok(path),
            Join::Wait(outcome, waiters) => {
                let _interest = WaiterGuard::register(waiters);
                wait_outcome(outcome).await
            }
        }
    }

    /// Start or join a fetch for `id` without waiting for it.
    ///
    /// Returns `false` when the video is already cached. Must be called from
    /// within a tokio runtime.
    pub fn prefetch(&self, id: &VideoId, locator: &RemoteLocator) -> bool {
        if self.inner.store.resolved_path(id).is_some() {
            return false;
        }
        matches!(self.join_or_start(id, locator), Join::Wait(..))
    }

    pub fn state(&self, id: &VideoId) -> FetchState {
        if let Some(path) = self.inner.store.resolved_path(id) {
            return FetchState::Cached(path);
        }
        match self.inner.slots.lock().get(id) {
            Some(Slot::InFlight(flight)) if flight.is_live() => FetchState::InFlight {
                waiters: flight.waiters.load(Ordering::SeqCst),
            },
            Some(Slot::Failed(err)) => FetchState::Failed(err.clone()),
            _ => FetchState::NotStarted,
        }
    }

    /// Forget failed outcomes and evict every cached video.
    pub fn clear(&self) -> FetchResult<usize> {
        self.inner
            .slots
            .lock()
            .retain(|_, slot| matches!(slot, Slot::InFlight(_)));
        Ok(self.inner.store.evict_all()?)
    }

    fn join_or_start(&self, id: &VideoId, locator: &RemoteLocator) -> Join {
        let mut slots = self.inner.slots.lock();

        if let Some(Slot::InFlight(flight)) = slots.get(id)
            && flight.is_live()
        {
            debug!(id = %id, "joining in-flight fetch");
            return Join::Wait(flight.outcome.clone(), Arc::clone(&flight.waiters));
        }

        // A flight may have finished between the caller's cache probe and
        // taking the lock.
        if let Some(path) = self.inner.store.resolved_path(id) {
            slots.remove(id);
            return Join::Cached(path);
        }

        let (sender, receiver) = watch::channel(None);
        let waiters = Arc::new(AtomicUsize::new(0));
        slots.insert(
            id.clone(),
            Slot::InFlight(Flight {
                outcome: receiver.clone(),
                waiters: Arc::clone(&waiters),
            }),
        );
        drop(slots);

        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        let locator = locator.clone();
        let span = info_span!("fetch", id = %id);
        tokio::spawn(
            async move {
                let result = inner.run(&id, &locator).await;
                {
                    let mut slots = inner.slots.lock();
                    match &result {
                        Ok(_) => {
                            slots.remove(&id);
                        }
                        Err(err) => {
                            slots.insert(id.clone(), Slot::Failed(err.clone()));
                        }
                    }
                }
                sender.send_replace(Some(result));
            }
            .instrument(span),
        );

        Join::Wait(receiver, waiters)
    }
}

impl Inner {
    async fn run(&self, id: &VideoId, locator: &RemoteLocator) -> FetchResult<PathBuf> {
        let result = self.download_and_commit(id, locator).await;
        match &result {
            Ok(path) => info!(path = %path.display(), "video cached"),
            Err(err) => warn!(kind = err.kind(), error = %err, "fetch failed"),
        }
        result
    }

    async fn download_and_commit(
        &self,
        id: &VideoId,
        locator: &RemoteLocator,
    ) -> FetchResult<PathBuf> {
        let FetchConfig { max_bytes, timeout } = self.config;

        let transfer = async {
            let url = self.storage.resolve(locator).await?;
            debug!(url = %url, "locator resolved");
            self.storage.download(&url, max_bytes).await
        };
        let bytes = tokio::time::timeout(timeout, transfer)
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;

        let observed = bytes.len() as u64;
        if observed > max_bytes {
            return Err(FetchError::Oversize {
                limit: max_bytes,
                observed,
            });
        }

        Ok(self.store.commit(&bytes, id).await?)
    }
}

async fn wait_outcome(mut outcome: watch::Receiver<Outcome>) -> FetchResult<PathBuf> {
    match outcome.wait_for(Option::is_some).await {
        Ok(value) => value.clone().unwrap_or(Err(FetchError::Abandoned)),
        Err(_) => Err(FetchError::Abandoned),
    }
}

/// Counts a caller as waiting on a flight for as long as it is held.
struct WaiterGuard(Arc<AtomicUsize>);

impl WaiterGuard {
    fn register(waiters: Arc<AtomicUsize>) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Self(waiters)
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
