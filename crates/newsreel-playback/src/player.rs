use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use newsreel_types::PlayerError;

/// A decoder-backed handle for one local video file.
///
/// Sessions own their player exclusively; dropping it releases the decoder.
pub trait Player: Send {
    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, position: Duration);

    fn position(&self) -> Duration;

    /// Resolves once the media can start playing, or with the reason it
    /// never will. Called once per player.
    fn ready(&mut self) -> BoxFuture<'static, Result<(), PlayerError>>;
}

/// Builds players for local files.
pub trait PlayerFactory: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn Player>, PlayerError>;
}

pub type DynPlayerFactory = Arc<dyn PlayerFactory>;
