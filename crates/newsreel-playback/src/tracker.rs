use newsreel_types::{Rect, VideoId};
use tokio::sync::watch;
use tracing::debug;

/// Read side of the tracker's current active item.
pub type ActiveProbe = watch::Receiver<Option<VideoId>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Deactivate(VideoId),
    Activate(VideoId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub previous: Option<VideoId>,
    pub current: Option<VideoId>,
}

/// Receives activation changes in the order they must be applied.
pub trait ActivationListener {
    fn deactivate(&mut self, id: &VideoId);

    fn activate(&mut self, id: &VideoId);
}

impl ActivationListener for Vec<TrackerEvent> {
    fn deactivate(&mut self, id: &VideoId) {
        self.push(TrackerEvent::Deactivate(id.clone()));
    }

    fn activate(&mut self, id: &VideoId) {
        self.push(TrackerEvent::Activate(id.clone()));
    }
}

/// Decides which single feed item is active from per-pass cell geometry.
///
/// Reports accumulate until [`ActiveItemTracker::recompute_active`] closes
/// the pass; the next pass starts from an empty set, so cells that scrolled
/// away do not linger.
#[derive(Debug)]
pub struct ActiveItemTracker {
    pending: Vec<(VideoId, Rect)>,
    visible: Vec<VideoId>,
    active: Option<VideoId>,
    probe: watch::Sender<Option<VideoId>>,
}

impl Default for ActiveItemTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveItemTracker {
    pub fn new() -> Self {
        let (probe, _) = watch::channel(None);
        Self {
            pending: Vec::new(),
            visible: Vec::new(),
            active: None,
            probe,
        }
    }

    /// Record one cell's rectangle for the current pass. A second report
    /// for the same id in one pass replaces the first but keeps its order.
    pub fn report(&mut self, id: VideoId, rect: Rect) {
        if let Some(entry) = self.pending.iter_mut().find(|(existing, _)| *existing == id) {
            entry.1 = rect;
        } else {
            self.pending.push((id, rect));
        }
    }

    /// Close the current pass and pick the item whose midpoint is nearest
    /// `viewport_center_y`, within `activation_threshold`. Ties go to the
    /// earliest report.
    ///
    /// On change the listener sees the deactivation of the old item before
    /// the activation of the new one. No change means no calls.
    pub fn recompute_active(
        &mut self,
        viewport_center_y: f32,
        activation_threshold: f32,
        listener: &mut impl ActivationListener,
    ) -> Option<Transition> {
        let reports = std::mem::take(&mut self.pending);

        let mut nearest: Option<(&VideoId, f32)> = None;
        for (id, rect) in &reports {
            let distance = rect.distance_to(viewport_center_y);
            if !(distance <= activation_threshold) {
                continue;
            }
            if nearest.is_none_or(|(_, best)| distance < best) {
                nearest = Some((id, distance));
            }
        }
        let next = nearest.map(|(id, _)| id.clone());

        self.visible = reports.into_iter().map(|(id, _)| id).collect();
        self.transition_to(next, listener)
    }

    /// Drop all geometry and deactivate the current item, if any.
    pub fn clear(&mut self, listener: &mut impl ActivationListener) -> Option<Transition> {
        self.pending.clear();
        self.visible.clear();
        self.transition_to(None, listener)
    }

    pub fn active_id(&self) -> Option<&VideoId> {
        self.active.as_ref()
    }

    /// Items reported in the last completed pass, in report order.
    pub fn visible_ids(&self) -> &[VideoId] {
        &self.visible
    }

    pub fn subscribe(&self) -> ActiveProbe {
        self.probe.subscribe()
    }

    fn transition_to(
        &mut self,
        next: Option<VideoId>,
        listener: &mut impl ActivationListener,
    ) -> Option<Transition> {
        if next == self.active {
            return None;
        }

        let previous = self.active.take();
        if let Some(old) = &previous {
            // Nobody may observe the old item as active once it starts
            // winding down, or a late readiness signal could start it again.
            self.probe.send_replace(None);
            listener.deactivate(old);
        }

        self.active = next.clone();
        self.probe.send_replace(next.clone());
        if let Some(new) = &next {
            listener.activate(new);
        }

        debug!(previous = ?previous, current = ?next, "active item changed");
        Some(Transition {
            previous,
            current: next,
        })
    }
}
