//! Playback engine: the [`PlaybackEngine`] trait the session drives, the
//! pure [`PlayQueue`] navigation model, and a `rodio`-backed implementation
//! running on its own audio thread.

mod engine;
mod player;
mod queue;
mod sink;
mod thread;
mod types;

pub use engine::PlaybackEngine;
pub use player::RodioEngine;
pub use queue::PlayQueue;
pub use types::*;
