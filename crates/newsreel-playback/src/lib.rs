mod feed;
mod player;
mod session;
mod tracker;

#[cfg(test)]
mod testing;

pub use feed::FeedController;
pub use player::{DynPlayerFactory, Player, PlayerFactory};
pub use session::{LoadError, PlaybackSession, PlaybackState, SessionError};
pub use tracker::{ActivationListener, ActiveItemTracker, ActiveProbe, TrackerEvent, Transition};
