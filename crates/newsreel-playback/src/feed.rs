use std::collections::HashMap;

use newsreel_fetch::FetchCoordinator;
use newsreel_types::{FeedItem, Rect, VideoId};
use tracing::{debug, info};

use crate::player::DynPlayerFactory;
use crate::session::{PlaybackSession, PlaybackState, SessionError};
use crate::tracker::{ActivationListener, ActiveItemTracker, TrackerEvent};

/// Applies tracker decisions to the sessions that own the players.
struct SessionDispatch<'a> {
    sessions: &'a HashMap<VideoId, PlaybackSession>,
    events: Vec<TrackerEvent>,
}

impl ActivationListener for SessionDispatch<'_> {
    fn deactivate(&mut self, id: &VideoId) {
        if let Some(session) = self.sessions.get(id)
            && let Err(err) = session.deactivate()
        {
            debug!(id = %id, error = %err, "deactivate skipped");
        }
        self.events.push(TrackerEvent::Deactivate(id.clone()));
    }

    fn activate(&mut self, id: &VideoId) {
        if let Some(session) = self.sessions.get(id)
            && let Err(err) = session.activate()
        {
            debug!(id = %id, error = %err, "activate skipped");
        }
        self.events.push(TrackerEvent::Activate(id.clone()));
    }
}

/// Drives a scrolling feed: one session per bound cell, one active item.
///
/// All methods are called from the layout context; binds run on spawned
/// tasks and must be called inside a tokio runtime.
pub struct FeedController {
    fetcher: FetchCoordinator,
    players: DynPlayerFactory,
    tracker: ActiveItemTracker,
    sessions: HashMap<VideoId, PlaybackSession>,
    order: Vec<FeedItem>,
    activation_threshold: f32,
}

impl FeedController {
    pub fn new(
        fetcher: FetchCoordinator,
        players: DynPlayerFactory,
        activation_threshold: f32,
    ) -> Self {
        Self {
            fetcher,
            players,
            tracker: ActiveItemTracker::new(),
            sessions: HashMap::new(),
            order: Vec::new(),
            activation_threshold,
        }
    }

    /// Replace the feed order used for prefetching.
    pub fn set_feed(&mut self, items: Vec<FeedItem>) {
        self.order = items;
    }

    /// Bind a cell to `item`, reusing its session if one exists.
    pub fn bind_cell(&mut self, item: &FeedItem) -> PlaybackSession {
        let session = self
            .sessions
            .entry(item.id.clone())
            .or_insert_with(|| {
                PlaybackSession::new(
                    self.fetcher.clone(),
                    self.players.clone(),
                    self.tracker.subscribe(),
                )
            })
            .clone();

        let task = session.clone();
        let id = item.id.clone();
        let locator = item.locator.clone();
        tokio::spawn(async move { task.bind(id, locator).await });
        session
    }

    /// Run one layout pass over the cells currently on screen.
    ///
    /// Sessions whose cell was not reported in this pass are released.
    /// Returns the activation changes applied, deactivation first.
    pub fn layout_pass(
        &mut self,
        reports: impl IntoIterator<Item = (VideoId, Rect)>,
        viewport_center_y: f32,
    ) -> Vec<TrackerEvent> {
        for (id, rect) in reports {
            self.tracker.report(id, rect);
        }

        let mut dispatch = SessionDispatch {
            sessions: &self.sessions,
            events: Vec::new(),
        };
        let transition =
            self.tracker
                .recompute_active(viewport_center_y, self.activation_threshold, &mut dispatch);
        let events = dispatch.events;

        let visible = self.tracker.visible_ids();
        let offscreen: Vec<VideoId> = self
            .sessions
            .keys()
            .filter(|id| !visible.contains(*id))
            .cloned()
            .collect();
        for id in offscreen {
            if let Some(session) = self.sessions.remove(&id) {
                debug!(id = %id, "cell left the window");
                session.release();
            }
        }

        if let Some(current) = transition.and_then(|transition| transition.current) {
            self.prefetch_after(&current);
        }
        events
    }

    /// Release every session and clear the active item, as when the app
    /// leaves the foreground.
    pub fn suspend(&mut self) {
        let mut dispatch = SessionDispatch {
            sessions: &self.sessions,
            events: Vec::new(),
        };
        self.tracker.clear(&mut dispatch);
        let released = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            session.release();
        }
        info!(released, "feed suspended");
    }

    /// Forward a tap on `id`'s cell.
    pub fn toggle(&self, id: &VideoId) -> Result<PlaybackState, SessionError> {
        self.sessions
            .get(id)
            .ok_or(SessionError::NotActive)?
            .toggle()
    }

    pub fn end_of_media(&self, id: &VideoId) -> Result<PlaybackState, SessionError> {
        self.sessions
            .get(id)
            .ok_or(SessionError::NoPlayer)?
            .end_of_media()
    }

    pub fn session(&self, id: &VideoId) -> Option<&PlaybackSession> {
        self.sessions.get(id)
    }

    pub fn active_id(&self) -> Option<&VideoId> {
        self.tracker.active_id()
    }

    fn prefetch_after(&self, id: &VideoId) {
        let next = self
            .order
            .iter()
            .position(|item| item.id == *id)
            .and_then(|index| self.order.get(index + 1));
        if let Some(item) = next
            && self.fetcher.prefetch(&item.id, &item.locator)
        {
            debug!(id = %item.id, "prefetching next item");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Backend, FakePlayers, eventually};
    use std::sync::Arc;

    fn cell(mid_y: f32) -> Rect {
        Rect::new(0.0, mid_y - 200.0, 390.0, 400.0)
    }

    struct Feed {
        backend: Backend,
        players: Arc<FakePlayers>,
        controller: FeedController,
        items: Vec<FeedItem>,
    }

    impl Feed {
        fn new(names: &[&str]) -> Self {
            let backend = Backend::new();
            let players = FakePlayers::instant();
            let items: Vec<FeedItem> = names
                .iter()
                .map(|name| {
                    let (id, locator, _) = backend.video(name);
                    FeedItem::new(id, locator)
                })
                .collect();
            let mut controller =
                FeedController::new(backend.fetcher.clone(), players.clone(), 200.0);
            controller.set_feed(items.clone());
            Self {
                backend,
                players,
                controller,
                items,
            }
        }

        fn id(&self, index: usize) -> VideoId {
            self.items[index].id.clone()
        }

        async fn bind_all_ready(&mut self) {
            let sessions: Vec<PlaybackSession> = self
                .items
                .clone()
                .iter()
                .map(|item| self.controller.bind_cell(item))
                .collect();
            eventually(|| {
                sessions
                    .iter()
                    .all(|session| session.state() == PlaybackState::Ready)
            })
            .await;
        }

        fn reports(&self, mids: &[f32]) -> Vec<(VideoId, Rect)> {
            mids.iter()
                .enumerate()
                .map(|(index, mid)| (self.id(index), cell(*mid)))
                .collect()
        }

        fn state(&self, index: usize) -> Option<PlaybackState> {
            self.controller
                .session(&self.id(index))
                .map(|session| session.state())
        }
    }

    #[tokio::test]
    async fn scrolling_moves_playback_to_one_item() {
        let mut feed = Feed::new(&["a", "b", "c"]);
        feed.bind_all_ready().await;

        let reports = feed.reports(&[100.0, 500.0, 900.0]);
        let events = feed.controller.layout_pass(reports, 500.0);
        assert_eq!(events, vec![TrackerEvent::Activate(feed.id(1))]);
        assert_eq!(feed.state(1), Some(PlaybackState::Playing));

        let reports = feed.reports(&[100.0, 500.0, 900.0]);
        let events = feed.controller.layout_pass(reports, 900.0);
        assert_eq!(
            events,
            vec![
                TrackerEvent::Deactivate(feed.id(1)),
                TrackerEvent::Activate(feed.id(2)),
            ]
        );
        assert_eq!(feed.state(1), Some(PlaybackState::Paused));
        assert_eq!(feed.state(2), Some(PlaybackState::Playing));
        assert_eq!(feed.players.max_playing(), 1);
    }

    #[tokio::test]
    async fn repeated_layout_is_stable() {
        let mut feed = Feed::new(&["a", "b", "c"]);
        feed.bind_all_ready().await;

        let reports = feed.reports(&[100.0, 500.0, 900.0]);
        feed.controller.layout_pass(reports, 500.0);
        let reports = feed.reports(&[100.0, 500.0, 900.0]);
        assert!(feed.controller.layout_pass(reports, 500.0).is_empty());
        assert_eq!(feed.players.playing(), 1);
    }

    #[tokio::test]
    async fn cells_leaving_the_window_are_released() {
        let mut feed = Feed::new(&["a", "b", "c"]);
        feed.bind_all_ready().await;
        let sessions: Vec<PlaybackSession> = (0..3)
            .filter_map(|index| feed.controller.session(&feed.id(index)).cloned())
            .collect();

        let reports = feed.reports(&[100.0, 500.0, 900.0]);
        feed.controller.layout_pass(reports, 500.0);
        let reports = vec![(feed.id(2), cell(500.0))];
        let events = feed.controller.layout_pass(reports, 500.0);

        assert_eq!(
            events,
            vec![
                TrackerEvent::Deactivate(feed.id(1)),
                TrackerEvent::Activate(feed.id(2)),
            ]
        );
        assert_eq!(sessions[0].state(), PlaybackState::Released);
        assert_eq!(sessions[1].state(), PlaybackState::Released);
        assert!(feed.controller.session(&feed.id(0)).is_none());
        assert_eq!(feed.players.live(), 1);
        assert_eq!(feed.players.playing(), 1);
    }

    #[tokio::test]
    async fn bound_cells_never_reported_are_released() {
        let mut feed = Feed::new(&["a", "b"]);
        feed.bind_all_ready().await;
        let unreported = feed.controller.session(&feed.id(0)).cloned().unwrap();
        assert_eq!(feed.players.live(), 2);

        for _ in 0..3 {
            let reports = vec![(feed.id(1), cell(500.0))];
            feed.controller.layout_pass(reports, 500.0);
        }

        assert_eq!(unreported.state(), PlaybackState::Released);
        assert!(feed.controller.session(&feed.id(0)).is_none());
        assert_eq!(feed.players.live(), 1);
        assert_eq!(feed.players.playing(), 1);
    }

    #[tokio::test]
    async fn suspend_releases_every_player() {
        let mut feed = Feed::new(&["a", "b", "c"]);
        feed.bind_all_ready().await;
        let reports = feed.reports(&[100.0, 500.0, 900.0]);
        feed.controller.layout_pass(reports, 500.0);

        feed.controller.suspend();

        assert_eq!(feed.controller.active_id(), None);
        assert_eq!(feed.players.live(), 0);
        assert_eq!(feed.players.playing(), 0);
    }

    #[tokio::test]
    async fn cell_bound_after_activation_autoplays() {
        let mut feed = Feed::new(&["a", "b"]);
        let reports = feed.reports(&[100.0, 500.0]);
        feed.controller.layout_pass(reports, 500.0);
        assert_eq!(feed.controller.active_id(), Some(&feed.id(1)));

        let item = feed.items[1].clone();
        let session = feed.controller.bind_cell(&item);
        eventually(|| session.state() == PlaybackState::Playing).await;
        assert_eq!(feed.players.playing(), 1);
    }

    #[tokio::test]
    async fn next_item_is_prefetched() {
        let mut feed = Feed::new(&["a", "b", "c"]);
        let item = feed.items[0].clone();
        feed.controller.bind_cell(&item);

        let reports = vec![(feed.id(0), cell(500.0))];
        feed.controller.layout_pass(reports, 500.0);

        let store = feed.backend.fetcher.store().clone();
        let next = feed.id(1);
        eventually(|| store.resolved_path(&next).is_some()).await;
        assert!(store.resolved_path(&feed.id(2)).is_none());
    }

    #[tokio::test]
    async fn taps_reach_only_the_active_item() {
        let mut feed = Feed::new(&["a", "b"]);
        feed.bind_all_ready().await;
        let reports = feed.reports(&[100.0, 500.0]);
        feed.controller.layout_pass(reports, 500.0);

        assert_eq!(
            feed.controller.toggle(&feed.id(0)),
            Err(SessionError::NotActive)
        );
        assert_eq!(
            feed.controller.toggle(&feed.id(1)),
            Ok(PlaybackState::Paused)
        );
    }
}
