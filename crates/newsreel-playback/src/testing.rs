use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use newsreel_fetch::{FetchConfig, FetchCoordinator, MemoryObjectStorage};
use newsreel_store::ContentAddressableVideoStore;
use newsreel_types::{PlayerError, RemoteLocator, VideoId};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::oneshot;

use crate::player::{Player, PlayerFactory};

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub live: usize,
    pub playing: usize,
    pub max_playing: usize,
    pub opened: usize,
}

/// Player whose readiness is fired by the test through [`FakePlayers`].
pub(crate) struct FakePlayer {
    counters: Arc<Mutex<Counters>>,
    ready: Option<oneshot::Receiver<Result<(), PlayerError>>>,
    playing: bool,
    position: Duration,
}

impl FakePlayer {
    fn set_playing(&mut self, playing: bool) {
        if self.playing == playing {
            return;
        }
        self.playing = playing;
        let mut counters = self.counters.lock();
        if playing {
            counters.playing += 1;
            counters.max_playing = counters.max_playing.max(counters.playing);
        } else {
            counters.playing -= 1;
        }
    }
}

impl Player for FakePlayer {
    fn play(&mut self) {
        self.set_playing(true);
        self.position += Duration::from_millis(500);
    }

    fn pause(&mut self) {
        self.set_playing(false);
    }

    fn seek(&mut self, position: Duration) {
        self.position = position;
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn ready(&mut self) -> BoxFuture<'static, Result<(), PlayerError>> {
        match self.ready.take() {
            Some(receiver) => receiver
                .map(|result| {
                    result.unwrap_or_else(|_| {
                        Err(PlayerError::Unplayable("player dropped".to_string()))
                    })
                })
                .boxed(),
            None => futures_util::future::ready(Ok(())).boxed(),
        }
    }
}

impl Drop for FakePlayer {
    fn drop(&mut self) {
        self.set_playing(false);
        self.counters.lock().live -= 1;
    }
}

#[derive(Default)]
pub(crate) struct FakePlayers {
    pub counters: Arc<Mutex<Counters>>,
    manual_ready: bool,
    pending: Mutex<HashMap<PathBuf, oneshot::Sender<Result<(), PlayerError>>>>,
    reject: Mutex<Vec<PathBuf>>,
}

impl FakePlayers {
    /// Players report ready as soon as they are asked.
    pub fn instant() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Players wait for [`FakePlayers::fire_ready`].
    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            manual_ready: true,
            ..Self::default()
        })
    }

    pub fn reject(&self, path: PathBuf) {
        self.reject.lock().push(path);
    }

    pub fn has_pending(&self, path: &Path) -> bool {
        self.pending.lock().contains_key(path)
    }

    pub fn fire_ready(&self, path: &Path, result: Result<(), PlayerError>) {
        if let Some(sender) = self.pending.lock().remove(path) {
            let _ = sender.send(result);
        }
    }

    pub fn live(&self) -> usize {
        self.counters.lock().live
    }

    pub fn playing(&self) -> usize {
        self.counters.lock().playing
    }

    pub fn max_playing(&self) -> usize {
        self.counters.lock().max_playing
    }
}

impl PlayerFactory for FakePlayers {
    fn open(&self, path: &Path) -> Result<Box<dyn Player>, PlayerError> {
        if self.reject.lock().iter().any(|rejected| rejected == path) {
            return Err(PlayerError::Open {
                path: path.to_path_buf(),
                message: "corrupt container".to_string(),
            });
        }

        let ready = if self.manual_ready {
            let (sender, receiver) = oneshot::channel();
            self.pending.lock().insert(path.to_path_buf(), sender);
            Some(receiver)
        } else {
            None
        };

        {
            let mut counters = self.counters.lock();
            counters.live += 1;
            counters.opened += 1;
        }

        Ok(Box::new(FakePlayer {
            counters: Arc::clone(&self.counters),
            ready,
            playing: false,
            position: Duration::ZERO,
        }))
    }
}

pub(crate) struct Backend {
    pub _dir: TempDir,
    pub storage: Arc<MemoryObjectStorage>,
    pub fetcher: FetchCoordinator,
}

impl Backend {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentAddressableVideoStore::open(dir.path()).unwrap());
        let storage = Arc::new(MemoryObjectStorage::new());
        let fetcher = FetchCoordinator::new(store, storage.clone(), FetchConfig::default());
        Self {
            _dir: dir,
            storage,
            fetcher,
        }
    }

    /// Register a remote video and return its id, locator and cache path.
    pub fn video(&self, name: &str) -> (VideoId, RemoteLocator, PathBuf) {
        let id = VideoId::new(name).unwrap();
        let locator = RemoteLocator::new(format!("store://media/{name}.mp4"));
        self.storage.insert(&locator, format!("bytes of {name}").into_bytes());
        let path = self.fetcher.store().path_for(&id);
        (id, locator, path)
    }
}

/// Yield until `condition` holds.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}
