use std::sync::Arc;
use std::time::Duration;

use newsreel_fetch::FetchCoordinator;
use newsreel_types::{FetchError, PlayerError, RemoteLocator, VideoId};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::player::{DynPlayerFactory, Player};
use crate::tracker::ActiveProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded, or the last load failed (see
    /// [`PlaybackSession::last_error`]).
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    /// Player dropped; the session holds nothing until bound again.
    Released,
}

/// Why a session could not reach `Ready`.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Player(#[from] PlayerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session has been released")]
    Released,
    #[error("session is not the active item")]
    NotActive,
    #[error("session has no player")]
    NoPlayer,
}

struct SessionInner {
    state: PlaybackState,
    bound: Option<VideoId>,
    generation: u64,
    player: Option<Box<dyn Player>>,
    last_error: Option<LoadError>,
    /// Set when playback wrapped around at end-of-media and has not been
    /// touched since; a deactivation in that window lands at position zero.
    rewound: bool,
}

impl SessionInner {
    fn drop_player(&mut self) {
        self.rewound = false;
        if let Some(mut player) = self.player.take() {
            player.pause();
        }
    }

    fn fail(&mut self, err: LoadError) {
        warn!(id = ?self.bound, error = %err, "video failed to load");
        self.drop_player();
        self.state = PlaybackState::Idle;
        self.last_error = Some(err);
    }

    fn ensure_usable(&self) -> Result<(), SessionError> {
        if self.state == PlaybackState::Released {
            return Err(SessionError::Released);
        }
        Ok(())
    }
}

/// Playback state of one feed cell.
///
/// Owns at most one player, bound to one video at a time. Handles are cheap
/// to clone and share the same state; `bind` runs on a task while control
/// calls arrive from the feed.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<Mutex<SessionInner>>,
    fetcher: FetchCoordinator,
    players: DynPlayerFactory,
    active: ActiveProbe,
    rebound: Arc<Notify>,
}

impl PlaybackSession {
    pub fn new(fetcher: FetchCoordinator, players: DynPlayerFactory, active: ActiveProbe) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                state: PlaybackState::Idle,
                bound: None,
                generation: 0,
                player: None,
                last_error: None,
                rewound: false,
            })),
            fetcher,
            players,
            active,
            rebound: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    pub fn bound_id(&self) -> Option<VideoId> {
        self.inner.lock().bound.clone()
    }

    pub fn has_player(&self) -> bool {
        self.inner.lock().player.is_some()
    }

    pub fn last_error(&self) -> Option<LoadError> {
        self.inner.lock().last_error.clone()
    }

    pub fn position(&self) -> Option<Duration> {
        self.inner.lock().player.as_ref().map(|player| player.position())
    }

    /// Load `id` and get it ready to play.
    ///
    /// Resolves once the session has settled: `Playing` if `id` is the
    /// active item when the player becomes ready, `Ready` if not, `Idle` on
    /// failure. A later `bind` or `release` supersedes an unfinished one.
    pub async fn bind(&self, id: VideoId, locator: RemoteLocator) {
        let generation = {
            let mut inner = self.inner.lock();
            let same_video = inner.bound.as_ref() == Some(&id);
            if same_video && (inner.player.is_some() || inner.state == PlaybackState::Loading) {
                debug!(id = %id, "already bound");
                return;
            }
            inner.drop_player();
            inner.generation += 1;
            inner.bound = Some(id.clone());
            inner.state = PlaybackState::Loading;
            inner.last_error = None;
            inner.generation
        };
        self.rebound.notify_waiters();
        debug!(id = %id, "loading");

        let fetched = self.fetcher.ensure_local(&id, &locator).await;

        let (ready, superseded) = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            let opened = fetched
                .map_err(LoadError::from)
                .and_then(|path| self.players.open(&path).map_err(LoadError::from));
            let mut player = match opened {
                Ok(player) => player,
                Err(err) => {
                    inner.fail(err);
                    return;
                }
            };
            let ready = player.ready();
            inner.player = Some(player);
            // Registered under the lock so a release that follows cannot be
            // missed.
            let superseded = self.rebound.notified();
            (ready, superseded)
        };

        let readiness = tokio::select! {
            result = ready => Some(result),
            _ = superseded => None,
        };
        let Some(readiness) = readiness else {
            return;
        };

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        if let Err(err) = readiness {
            inner.fail(err.into());
            return;
        }
        inner.state = PlaybackState::Ready;

        let is_active = self.active.borrow().as_ref() == Some(&id);
        if is_active && let Some(player) = inner.player.as_mut() {
            player.play();
            inner.state = PlaybackState::Playing;
            debug!(id = %id, "ready, playing");
        } else {
            debug!(id = %id, "ready, waiting for activation");
        }
    }

    /// Start or resume playback. While loading, readiness decides instead.
    pub fn activate(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        inner.ensure_usable()?;
        match inner.state {
            PlaybackState::Ready | PlaybackState::Paused => {
                let player = inner.player.as_mut().ok_or(SessionError::NoPlayer)?;
                player.play();
                inner.state = PlaybackState::Playing;
                inner.rewound = false;
            }
            PlaybackState::Loading => debug!(id = ?inner.bound, "activated while loading"),
            _ => {}
        }
        Ok(())
    }

    /// Pause and keep the player for a quick resume.
    pub fn deactivate(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        inner.ensure_usable()?;
        if !matches!(inner.state, PlaybackState::Ready | PlaybackState::Playing) {
            return Ok(());
        }
        let rewound = std::mem::take(&mut inner.rewound);
        if let Some(player) = inner.player.as_mut() {
            if rewound {
                player.seek(Duration::ZERO);
            }
            player.pause();
            inner.state = PlaybackState::Paused;
        }
        Ok(())
    }

    /// Drop the player and end the current binding. Calling it again is a
    /// no-op.
    pub fn release(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == PlaybackState::Released {
                return;
            }
            inner.drop_player();
            inner.generation += 1;
            inner.state = PlaybackState::Released;
            let id = inner.bound.take();
            debug!(id = ?id, "released");
        }
        self.rebound.notify_waiters();
    }

    /// Handle end-of-media: rewind, and keep playing only if still playing.
    pub fn end_of_media(&self) -> Result<PlaybackState, SessionError> {
        let mut inner = self.inner.lock();
        inner.ensure_usable()?;
        let state = inner.state;
        if state == PlaybackState::Loading {
            return Ok(state);
        }
        let player = inner.player.as_mut().ok_or(SessionError::NoPlayer)?;
        player.seek(Duration::ZERO);
        if state == PlaybackState::Playing {
            player.play();
            inner.rewound = true;
        } else {
            player.pause();
            inner.state = PlaybackState::Paused;
            inner.rewound = false;
        }
        Ok(inner.state)
    }

    /// Flip between playing and paused. Only the active item responds.
    pub fn toggle(&self) -> Result<PlaybackState, SessionError> {
        let mut inner = self.inner.lock();
        inner.ensure_usable()?;
        let is_active = inner.bound.is_some() && *self.active.borrow() == inner.bound;
        if !is_active {
            return Err(SessionError::NotActive);
        }
        let state = inner.state;
        inner.rewound = false;
        let player = inner.player.as_mut().ok_or(SessionError::NoPlayer)?;
        match state {
            PlaybackState::Playing => {
                player.pause();
                inner.state = PlaybackState::Paused;
            }
            PlaybackState::Ready | PlaybackState::Paused => {
                player.play();
                inner.state = PlaybackState::Playing;
            }
            _ => {}
        }
        Ok(inner.state)
    }
}
