//! Point-of-interest audio: the shared registry behind solo playback and the
//! per-point player that owns one audio handle.

pub mod player;
pub mod registry;

pub use player::{PlayerEvent, PlayerState, PointPlayer, SourceState};
pub use registry::{PlaybackEntry, PlaybackRegistry, PointId};
