use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use crate::library::Track;

use super::engine::PlaybackEngine;
use super::queue::PlayQueue;
use super::thread::{EngineShared, QueueItem, SharedHandle, lock, spawn_audio_thread};
use super::types::{EngineError, EngineEvent, EventSink, RepeatMode, SinkCmd};

/// `PlaybackEngine` backed by `rodio`.
///
/// Queue navigation happens here under the shared lock, so getters reflect a
/// command as soon as it returns; the audio thread only drives the sink.
pub struct RodioEngine {
    tx: Sender<SinkCmd>,
    shared: SharedHandle,
    join: Option<JoinHandle<()>>,
}

impl RodioEngine {
    /// Open the default output device on a fresh audio thread.
    pub fn new() -> Result<Self, EngineError> {
        let (tx, rx) = mpsc::channel::<SinkCmd>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let shared: SharedHandle = Arc::new(Mutex::new(EngineShared {
            items: Vec::new(),
            queue: PlayQueue::new(),
            playing: false,
            position_ms: 0,
            speed: 1.0,
            events: None,
        }));

        let join = spawn_audio_thread(rx, shared.clone(), ready_tx);
        ready_rx.recv().map_err(|_| EngineError::ThreadGone)??;

        Ok(Self {
            tx,
            shared,
            join: Some(join),
        })
    }

    fn send(&self, cmd: SinkCmd) {
        if self.tx.send(cmd).is_err() {
            debug!("audio thread is gone, dropping command");
        }
    }

    /// Move to `index` (or stay) at `position_ms`, reloading the sink.
    fn jump(&mut self, index: Option<usize>, position_ms: u64) {
        let mut s = lock(&self.shared);
        let previous = s.queue.current();
        let Some(target) = index.or(previous) else {
            return;
        };
        if !s.queue.set_current(target) {
            return;
        }
        s.position_ms = position_ms;
        let Some(path) = s.items.get(target).map(|item| item.path.clone()) else {
            return;
        };

        if previous == Some(target) {
            self.send(SinkCmd::Seek(position_ms));
        } else {
            self.send(SinkCmd::Load {
                path,
                start_ms: position_ms,
                play: s.playing,
            });
            s.emit(EngineEvent::ItemTransitioned);
        }
    }
}

impl PlaybackEngine for RodioEngine {
    fn subscribe(&mut self, sink: EventSink) {
        lock(&self.shared).events = Some(sink);
    }

    fn load_queue(&mut self, tracks: &[Track], start_index: usize, start_position_ms: u64) {
        let mut s = lock(&self.shared);
        s.set_playing(false);
        s.items = tracks
            .iter()
            .map(|t| QueueItem {
                path: t.source.path().to_path_buf(),
                duration_ms: t.duration_ms,
            })
            .collect();
        let len = s.items.len();
        s.queue.load(len, start_index, &mut rand::rng());
        s.position_ms = start_position_ms;

        match s.current_item().map(|item| item.path.clone()) {
            Some(path) => self.send(SinkCmd::Load {
                path,
                start_ms: start_position_ms,
                play: false,
            }),
            None => self.send(SinkCmd::Stop),
        }
    }

    fn clear(&mut self) {
        let mut s = lock(&self.shared);
        s.set_playing(false);
        s.items.clear();
        s.queue.clear();
        s.position_ms = 0;
        self.send(SinkCmd::Stop);
    }

    fn play(&mut self) {
        let mut s = lock(&self.shared);
        if s.queue.current().is_none() {
            return;
        }
        s.set_playing(true);
        self.send(SinkCmd::Play);
    }

    fn pause(&mut self) {
        lock(&self.shared).set_playing(false);
        self.send(SinkCmd::Pause);
    }

    fn stop(&mut self) {
        lock(&self.shared).set_playing(false);
        self.send(SinkCmd::Stop);
    }

    fn seek(&mut self, index: Option<usize>, position_ms: u64) {
        self.jump(index, position_ms);
    }

    fn seek_to_next(&mut self) {
        let next = lock(&self.shared).queue.next_index();
        if next.is_some() {
            self.jump(next, 0);
        }
    }

    fn seek_to_previous(&mut self) {
        let previous = lock(&self.shared).queue.previous_index();
        if previous.is_some() {
            self.jump(previous, 0);
        }
    }

    fn set_shuffle(&mut self, enabled: bool) {
        let mut s = lock(&self.shared);
        if s.queue.shuffle() != enabled {
            s.queue.set_shuffle(enabled, &mut rand::rng());
            s.emit(EngineEvent::ShuffleChanged(enabled));
        }
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        let mut s = lock(&self.shared);
        if s.queue.repeat() != mode {
            s.queue.set_repeat(mode);
            s.emit(EngineEvent::RepeatChanged(mode));
        }
    }

    fn set_speed(&mut self, speed: f32) {
        let mut s = lock(&self.shared);
        if s.speed != speed {
            s.speed = speed;
            self.send(SinkCmd::SetSpeed(speed));
            s.emit(EngineEvent::SpeedChanged(speed));
        }
    }

    fn is_playing(&self) -> bool {
        lock(&self.shared).playing
    }

    fn duration_ms(&self) -> Option<u64> {
        lock(&self.shared).current_item().and_then(|item| item.duration_ms)
    }

    fn position_ms(&self) -> u64 {
        lock(&self.shared).position_ms
    }

    fn buffered_position_ms(&self) -> u64 {
        // Local files are fully available once opened.
        let s = lock(&self.shared);
        match s.current_item() {
            Some(item) => item.duration_ms.unwrap_or(0).max(s.position_ms),
            None => 0,
        }
    }

    fn queue_len(&self) -> usize {
        lock(&self.shared).queue.len()
    }

    fn current_index(&self) -> Option<usize> {
        lock(&self.shared).queue.current()
    }

    fn has_next(&self) -> bool {
        lock(&self.shared).queue.has_next()
    }

    fn has_previous(&self) -> bool {
        lock(&self.shared).queue.has_previous()
    }

    fn shuffle_enabled(&self) -> bool {
        lock(&self.shared).queue.shuffle()
    }

    fn repeat_mode(&self) -> RepeatMode {
        lock(&self.shared).queue.repeat()
    }

    fn speed(&self) -> f32 {
        lock(&self.shared).speed
    }

    fn release(&mut self, fade_out: Duration) {
        self.send(SinkCmd::Quit {
            fade_out_ms: fade_out.as_millis() as u64,
        });

        if let Some(h) = self.join.take() {
            let _ = h.join();
        }
        lock(&self.shared).events = None;
    }
}
