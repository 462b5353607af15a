use std::time::Duration;

use crate::library::Track;

use super::types::{EventSink, RepeatMode};

/// Transport surface the session coordinator needs from a player.
///
/// Indices are playlist (display order) indices. Queue order may differ when
/// shuffle is on; `has_next`/`has_previous`/`seek_to_*` follow queue order.
pub trait PlaybackEngine: Send {
    /// Register the receiver of engine events, replacing any previous one.
    fn subscribe(&mut self, sink: EventSink);

    /// Replace the queue with `tracks`, positioned (paused) at `start_index`.
    fn load_queue(&mut self, tracks: &[Track], start_index: usize, start_position_ms: u64);
    /// Stop and drop the whole queue.
    fn clear(&mut self);

    fn play(&mut self);
    fn pause(&mut self);
    /// Stop output but keep the queue and current item.
    fn stop(&mut self);
    /// Seek to `position_ms` in `index`, or in the current item when `None`.
    fn seek(&mut self, index: Option<usize>, position_ms: u64);
    fn seek_to_next(&mut self);
    fn seek_to_previous(&mut self);

    fn set_shuffle(&mut self, enabled: bool);
    fn set_repeat_mode(&mut self, mode: RepeatMode);
    fn set_speed(&mut self, speed: f32);

    fn is_playing(&self) -> bool;
    /// Duration of the current item, when known.
    fn duration_ms(&self) -> Option<u64>;
    fn position_ms(&self) -> u64;
    fn buffered_position_ms(&self) -> u64;
    fn queue_len(&self) -> usize;
    fn current_index(&self) -> Option<usize>;
    fn has_next(&self) -> bool;
    fn has_previous(&self) -> bool;
    fn shuffle_enabled(&self) -> bool;
    fn repeat_mode(&self) -> RepeatMode;
    fn speed(&self) -> f32;

    /// Tear down output. The engine is unusable afterwards.
    fn release(&mut self, fade_out: Duration);
}
