use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, warn};

use super::queue::PlayQueue;
use super::sink::{create_sink_at, fade_out_sink};
use super::types::{EngineError, EngineEvent, EventSink, SinkCmd};

/// How often the audio thread publishes position and checks for track end.
const TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub(super) struct QueueItem {
    pub path: PathBuf,
    pub duration_ms: Option<u64>,
}

/// Engine state shared between the `RodioEngine` handle and the audio thread.
pub(super) struct EngineShared {
    pub items: Vec<QueueItem>,
    pub queue: PlayQueue,
    pub playing: bool,
    pub position_ms: u64,
    pub speed: f32,
    pub events: Option<EventSink>,
}

impl EngineShared {
    pub fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.events {
            sink(event);
        }
    }

    pub fn current_item(&self) -> Option<&QueueItem> {
        self.queue.current().and_then(|i| self.items.get(i))
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            self.emit(EngineEvent::IsPlayingChanged(playing));
        }
    }
}

pub(super) type SharedHandle = Arc<Mutex<EngineShared>>;

pub(super) fn lock(shared: &SharedHandle) -> MutexGuard<'_, EngineShared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The output stream plus the sink for the current item. Lives on the audio
/// thread only, since the stream cannot move between threads.
struct Output {
    stream: OutputStream,
    sink: Option<Sink>,
    /// Where the current sink started within its file.
    offset: Duration,
    speed: f32,
}

impl Output {
    fn load(&mut self, path: &Path, start_ms: u64, play: bool) -> Result<(), EngineError> {
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        let start = Duration::from_millis(start_ms);
        let sink = create_sink_at(&self.stream, path, start, self.speed)?;
        if play {
            sink.play();
        }
        self.sink = Some(sink);
        self.offset = start;
        Ok(())
    }

    fn load_or_give_up(&mut self, path: &Path, start_ms: u64, play: bool, shared: &SharedHandle) {
        if let Err(err) = self.load(path, start_ms, play) {
            warn!(error = %err, "cannot play track");
            lock(shared).set_playing(false);
        }
    }

    fn position(&self) -> Option<Duration> {
        self.sink.as_ref().map(|s| self.offset + s.get_pos())
    }

    fn publish_position(&self, shared: &SharedHandle) {
        if let Some(pos) = self.position() {
            lock(shared).position_ms = pos.as_millis() as u64;
        }
    }

    fn apply(&mut self, cmd: SinkCmd, shared: &SharedHandle) {
        match cmd {
            SinkCmd::Load {
                path,
                start_ms,
                play,
            } => self.load_or_give_up(&path, start_ms, play, shared),
            SinkCmd::Play => {
                if let Some(sink) = &self.sink {
                    sink.play();
                    return;
                }
                let target = {
                    let s = lock(shared);
                    s.current_item().map(|item| (item.path.clone(), s.position_ms))
                };
                if let Some((path, start_ms)) = target {
                    self.load_or_give_up(&path, start_ms, true, shared);
                }
            }
            SinkCmd::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
                self.publish_position(shared);
            }
            SinkCmd::Stop => {
                if let Some(sink) = self.sink.take() {
                    sink.stop();
                }
            }
            SinkCmd::Seek(ms) => {
                // Seeking rebuilds the sink and skips into the file.
                let Some(playing) = self.sink.as_ref().map(|s| !s.is_paused()) else {
                    return;
                };
                let path = lock(shared).current_item().map(|item| item.path.clone());
                if let Some(path) = path {
                    self.load_or_give_up(&path, ms, playing, shared);
                }
            }
            SinkCmd::SetSpeed(speed) => {
                self.speed = speed;
                if let Some(sink) = &self.sink {
                    sink.set_speed(speed);
                }
            }
            SinkCmd::Quit { .. } => {}
        }
    }

    /// Publish position and handle the current item running out.
    fn tick(&mut self, shared: &SharedHandle) {
        let Some(sink) = &self.sink else {
            return;
        };
        if sink.is_paused() {
            return;
        }
        if !sink.empty() {
            self.publish_position(shared);
            return;
        }

        let next = {
            let mut s = lock(shared);
            match s.queue.advance_on_end() {
                Some(i) => {
                    s.queue.set_current(i);
                    s.position_ms = 0;
                    s.emit(EngineEvent::ItemTransitioned);
                    s.items.get(i).map(|item| item.path.clone())
                }
                None => {
                    // Resuming after the end restarts the last item.
                    s.position_ms = 0;
                    s.set_playing(false);
                    s.emit(EngineEvent::PlaybackEnded);
                    None
                }
            }
        };

        match next {
            Some(path) => {
                debug!(path = %path.display(), "auto-advancing");
                self.load_or_give_up(&path, 0, true, shared);
            }
            None => self.sink = None,
        }
    }

    fn quit(&mut self, fade_out_ms: u64) {
        if let Some(sink) = self.sink.take() {
            if !sink.is_paused() {
                fade_out_sink(&sink, fade_out_ms);
            }
            sink.stop();
        }
    }
}

pub(super) fn spawn_audio_thread(
    rx: Receiver<SinkCmd>,
    shared: SharedHandle,
    ready: Sender<Result<(), EngineError>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut stream = match OutputStreamBuilder::open_default_stream() {
            Ok(s) => s,
            Err(e) => {
                let _ = ready.send(Err(EngineError::NoOutputDevice(e.to_string())));
                return;
            }
        };
        // rodio logs to stderr when OutputStream is dropped. That's useful in debugging,
        // but noisy for a TUI app.
        stream.log_on_drop(false);
        let _ = ready.send(Ok(()));

        let mut output = Output {
            stream,
            sink: None,
            offset: Duration::ZERO,
            speed: 1.0,
        };
        let mut last_tick = Instant::now();

        loop {
            match rx.recv_timeout(TICK) {
                Ok(SinkCmd::Quit { fade_out_ms }) => {
                    output.quit(fade_out_ms);
                    // Update shared state so observers don't keep showing Playing.
                    lock(&shared).set_playing(false);
                    break;
                }
                Ok(cmd) => output.apply(cmd, &shared),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if last_tick.elapsed() >= TICK {
                output.tick(&shared);
                last_tick = Instant::now();
            }
        }
    })
}
