use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::{TempDir, tempdir};

use super::message::Msg;
use super::ticker::ProgressTicker;
use super::*;
use crate::audio::{EngineEvent, EventSink, PlayQueue, PlaybackEngine, RepeatMode};
use crate::config::{LibrarySettings, Settings};
use crate::library::{FolderSource, Track};
use crate::store::{MemoryStore, PersistedSession, Persister, SessionStore, StoreOp};

const WAIT: Duration = Duration::from_secs(5);

/// In-memory engine mirroring `RodioEngine`'s queue and event behaviour.
struct FakeEngine {
    durations: Vec<Option<u64>>,
    fixed_duration: Option<u64>,
    queue: PlayQueue,
    rng: StdRng,
    playing: bool,
    position_ms: u64,
    speed: f32,
    events: Option<EventSink>,
    released: Arc<AtomicBool>,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            durations: Vec::new(),
            fixed_duration: None,
            queue: PlayQueue::new(),
            rng: StdRng::seed_from_u64(3),
            playing: false,
            position_ms: 0,
            speed: 1.0,
            events: None,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    fn with_duration(ms: u64) -> Self {
        Self {
            fixed_duration: Some(ms),
            ..Self::new()
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.events {
            sink(event);
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            self.emit(EngineEvent::IsPlayingChanged(playing));
        }
    }

    fn jump(&mut self, index: Option<usize>, position_ms: u64) {
        let previous = self.queue.current();
        let Some(target) = index.or(previous) else {
            return;
        };
        if !self.queue.set_current(target) {
            return;
        }
        self.position_ms = position_ms;
        if previous != Some(target) {
            self.emit(EngineEvent::ItemTransitioned);
        }
    }

    /// Simulate the current item finishing.
    fn finish_item(&mut self) {
        match self.queue.advance_on_end() {
            Some(next) => self.jump(Some(next), 0),
            None => {
                self.position_ms = 0;
                self.set_playing(false);
                self.emit(EngineEvent::PlaybackEnded);
            }
        }
    }
}

impl PlaybackEngine for FakeEngine {
    fn subscribe(&mut self, sink: EventSink) {
        self.events = Some(sink);
    }

    fn load_queue(&mut self, tracks: &[Track], start_index: usize, start_position_ms: u64) {
        self.set_playing(false);
        self.durations = tracks.iter().map(|t| t.duration_ms).collect();
        self.queue.load(tracks.len(), start_index, &mut self.rng);
        self.position_ms = start_position_ms;
    }

    fn clear(&mut self) {
        self.set_playing(false);
        self.durations.clear();
        self.queue.clear();
        self.position_ms = 0;
    }

    fn play(&mut self) {
        if self.queue.current().is_some() {
            self.set_playing(true);
        }
    }

    fn pause(&mut self) {
        self.set_playing(false);
    }

    fn stop(&mut self) {
        self.set_playing(false);
    }

    fn seek(&mut self, index: Option<usize>, position_ms: u64) {
        self.jump(index, position_ms);
    }

    fn seek_to_next(&mut self) {
        if let Some(next) = self.queue.next_index() {
            self.jump(Some(next), 0);
        }
    }

    fn seek_to_previous(&mut self) {
        if let Some(previous) = self.queue.previous_index() {
            self.jump(Some(previous), 0);
        }
    }

    fn set_shuffle(&mut self, enabled: bool) {
        if self.queue.shuffle() != enabled {
            self.queue.set_shuffle(enabled, &mut self.rng);
            self.emit(EngineEvent::ShuffleChanged(enabled));
        }
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        if self.queue.repeat() != mode {
            self.queue.set_repeat(mode);
            self.emit(EngineEvent::RepeatChanged(mode));
        }
    }

    fn set_speed(&mut self, speed: f32) {
        if self.speed != speed {
            self.speed = speed;
            self.emit(EngineEvent::SpeedChanged(speed));
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn duration_ms(&self) -> Option<u64> {
        let current = self.queue.current()?;
        self.fixed_duration
            .or_else(|| self.durations.get(current).copied().flatten())
    }

    fn position_ms(&self) -> u64 {
        self.position_ms
    }

    fn buffered_position_ms(&self) -> u64 {
        self.duration_ms().unwrap_or(0).max(self.position_ms)
    }

    fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn current_index(&self) -> Option<usize> {
        self.queue.current()
    }

    fn has_next(&self) -> bool {
        self.queue.has_next()
    }

    fn has_previous(&self) -> bool {
        self.queue.has_previous()
    }

    fn shuffle_enabled(&self) -> bool {
        self.queue.shuffle()
    }

    fn repeat_mode(&self) -> RepeatMode {
        self.queue.repeat()
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn release(&mut self, _fade_out: Duration) {
        self.playing = false;
        self.events = None;
        self.released.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    coord: Coordinator<FakeEngine>,
    rx: Receiver<Msg>,
    store: MemoryStore,
    reader: StateReader,
}

impl Harness {
    fn new() -> Self {
        Self::with(MemoryStore::default(), FakeEngine::new())
    }

    fn with(store: MemoryStore, engine: FakeEngine) -> Self {
        let (tx, rx) = mpsc::channel();
        let publisher = StatePublisher::new();
        let reader = publisher.reader();
        let coord = Coordinator::new(
            engine,
            Persister::spawn(store.clone()),
            publisher,
            tx,
            LibrarySettings::default(),
            // Long enough that no tick fires during a test.
            Duration::from_secs(3600),
        );
        Self {
            coord,
            rx,
            store,
            reader,
        }
    }

    /// Handle messages until `scans` scan results went through, then drain.
    fn settle_scans(&mut self, scans: usize) {
        let mut seen = 0;
        while seen < scans {
            let msg = self.rx.recv_timeout(WAIT).expect("scan result");
            if matches!(msg, Msg::Scanned(_)) {
                seen += 1;
            }
            self.coord.handle(msg);
        }
        self.drain();
    }

    fn drain(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.coord.handle(msg);
        }
    }

    fn load(&mut self, dir: &TempDir) {
        self.coord.select_folder(FolderSource::new(dir.path()));
        self.settle_scans(1);
    }

    fn writes(&self) -> Vec<PersistedSession> {
        self.coord.flush_persistence();
        self.store
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Write(session) => Some(session),
                StoreOp::Clear => None,
            })
            .collect()
    }

    fn last_write(&self) -> PersistedSession {
        self.writes().pop().expect("at least one write")
    }

    fn titles(&self) -> Vec<String> {
        self.coord
            .state()
            .tracks
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }
}

fn music_dir(names: &[&str]) -> TempDir {
    let dir = tempdir().unwrap();
    for name in names {
        fs::write(dir.path().join(name), b"not really audio").unwrap();
    }
    dir
}

fn source_of(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn speed_presets_cycle_from_normal_speed() {
    let mut speed = 1.0;
    let mut seen = Vec::new();
    for _ in 0..6 {
        speed = next_speed(speed);
        seen.push(speed);
    }
    assert_eq!(seen, vec![1.25, 1.5, 1.75, 2.0, 0.75, 1.0]);
    // Off-preset speeds snap to the next preset up.
    assert_eq!(next_speed(1.1), 1.25);
    assert_eq!(next_speed(3.0), 0.75);
}

#[test]
fn select_folder_loads_sorted_playlist_paused_at_first_track() {
    let previous = music_dir(&["old.mp3", "older.mp3"]);
    let dir = music_dir(&["b.mp3", "A.flac", "c.txt"]);
    let mut h = Harness::new();
    h.load(&previous);
    h.coord.toggle_play_pause();
    h.drain();

    h.coord.select_folder(FolderSource::new(dir.path()));
    let loading = h.reader.snapshot();
    assert!(loading.is_loading);
    assert!(loading.tracks.is_empty());
    assert_eq!(loading.current_index, None);
    assert!(!loading.is_playing);
    assert_eq!(loading.current_position_ms, 0);
    assert_eq!(loading.duration_ms, 0);
    assert_eq!(loading.folder, Some(FolderSource::new(dir.path())));
    assert!(!h.coord.is_sampling());
    assert_eq!(h.coord.engine().queue_len(), 0);
    h.settle_scans(1);

    let state = h.coord.state();
    assert_eq!(h.titles(), vec!["A.flac", "b.mp3"]);
    assert_eq!(state.current_index, Some(0));
    assert!(!state.is_playing);
    assert!(!state.is_loading);
    assert_eq!(state.error_message, None);
    assert!(!h.coord.engine().is_playing());
    assert_eq!(*h.reader.snapshot(), *state);

    let saved = h.last_write();
    assert_eq!(saved.folder, Some(dir.path().to_string_lossy().into_owned()));
    assert_eq!(saved.current_track, Some(source_of(&dir, "A.flac")));
    assert_eq!(saved.position_ms, 0);
}

#[test]
fn empty_folder_clears_saved_session_and_reports_it() {
    let dir = music_dir(&["notes.txt"]);
    let store = MemoryStore::with(PersistedSession {
        folder: Some("/old".into()),
        ..PersistedSession::default()
    });
    let mut h = Harness::with(store, FakeEngine::new());

    h.load(&dir);

    let state = h.coord.state();
    assert!(state.tracks.is_empty());
    assert_eq!(state.current_index, None);
    assert!(!state.is_loading);
    assert_eq!(state.error_message.as_deref(), Some(NO_AUDIO_IN_FOLDER));
    assert!(h.writes().is_empty());
    assert_eq!(h.store.current(), None);
}

#[test]
fn new_scan_clears_previous_error() {
    let empty = music_dir(&[]);
    let full = music_dir(&["one.mp3"]);
    let mut h = Harness::new();

    h.load(&empty);
    assert!(h.coord.state().error_message.is_some());

    h.coord.select_folder(FolderSource::new(full.path()));
    assert_eq!(h.coord.state().error_message, None);
    h.settle_scans(1);
    assert_eq!(h.titles(), vec!["one.mp3"]);
}

#[test]
fn restoring_an_emptied_folder_uses_its_own_message() {
    let dir = music_dir(&[]);
    let saved = PersistedSession {
        folder: Some(dir.path().to_string_lossy().into_owned()),
        current_track: Some(source_of(&dir, "gone.mp3")),
        ..PersistedSession::default()
    };
    let mut h = Harness::with(MemoryStore::with(saved.clone()), FakeEngine::new());

    h.coord.restore(saved);
    h.settle_scans(1);

    assert_eq!(
        h.coord.state().error_message.as_deref(),
        Some(NO_AUDIO_IN_SAVED_FOLDER)
    );
    h.coord.flush_persistence();
    assert_eq!(h.store.current(), None);
}

#[test]
fn restore_with_missing_track_falls_back_to_first_track() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let saved = PersistedSession {
        folder: Some(dir.path().to_string_lossy().into_owned()),
        current_track: Some(source_of(&dir, "deleted.mp3")),
        position_ms: 0,
        shuffle_enabled: false,
        repeat_mode: RepeatMode::All,
        playback_speed: 1.5,
    };
    let mut h = Harness::new();

    h.coord.restore(saved);
    h.settle_scans(1);

    let state = h.coord.state();
    assert_eq!(state.current_index, Some(0));
    assert_eq!(state.repeat_mode, RepeatMode::All);
    assert_eq!(state.playback_speed, 1.5);
    assert!(!state.is_playing);
    assert!(!h.coord.engine().is_playing());
}

#[test]
fn restore_resumes_saved_track_and_position_without_playing() {
    let dir = music_dir(&["a.mp3", "b.mp3", "c.mp3"]);
    let saved = PersistedSession {
        folder: Some(dir.path().to_string_lossy().into_owned()),
        current_track: Some(source_of(&dir, "b.mp3")),
        position_ms: 4200,
        shuffle_enabled: true,
        repeat_mode: RepeatMode::One,
        playback_speed: 0.0,
    };
    let mut h = Harness::new();

    h.coord.restore(saved);
    h.settle_scans(1);

    let state = h.coord.state();
    assert_eq!(state.current_index, Some(1));
    assert_eq!(state.current_position_ms, 4200);
    assert!(state.shuffle_enabled);
    assert_eq!(state.repeat_mode, RepeatMode::One);
    // A non-positive saved speed is ignored.
    assert_eq!(state.playback_speed, 1.0);
    assert!(!h.coord.engine().is_playing());

    let last = h.last_write();
    assert_eq!(last.current_track, Some(source_of(&dir, "b.mp3")));
    assert_eq!(last.position_ms, 4200);
}

#[test]
fn toggle_play_pause_does_nothing_without_tracks() {
    let mut h = Harness::new();
    let before = h.coord.state().clone();

    h.coord.toggle_play_pause();
    h.drain();

    assert_eq!(*h.coord.state(), before);
    assert!(!h.coord.engine().is_playing());
}

#[test]
fn toggle_play_pause_plays_then_pauses() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);

    h.coord.toggle_play_pause();
    h.drain();
    assert!(h.coord.state().is_playing);
    assert!(h.coord.engine().is_playing());
    assert!(h.coord.is_sampling());

    h.coord.toggle_play_pause();
    h.drain();
    assert!(!h.coord.state().is_playing);
    assert!(!h.coord.engine().is_playing());
    assert!(!h.coord.is_sampling());
}

#[test]
fn next_and_previous_move_through_the_queue() {
    let dir = music_dir(&["a.mp3", "b.mp3", "c.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);

    h.coord.next();
    h.drain();
    assert_eq!(h.coord.state().current_index, Some(1));
    assert!(h.coord.state().is_playing);

    h.coord.previous();
    h.drain();
    assert_eq!(h.coord.state().current_index, Some(0));
    assert!(h.coord.state().is_playing);
}

#[test]
fn previous_on_first_track_restarts_it() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);
    h.coord.engine_mut().position_ms = 1234;

    h.coord.previous();
    h.drain();

    assert_eq!(h.coord.state().current_index, Some(0));
    assert_eq!(h.coord.engine().position_ms(), 0);
    assert!(h.coord.engine().is_playing());
}

#[test]
fn next_on_last_track_without_repeat_does_nothing() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);
    h.coord.select_track(1, false);
    h.drain();

    h.coord.next();
    h.drain();

    assert_eq!(h.coord.state().current_index, Some(1));
    assert!(!h.coord.engine().is_playing());
}

#[test]
fn select_track_out_of_range_changes_nothing() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);
    let before = h.coord.state().clone();
    let writes_before = h.writes().len();

    h.coord.select_track(2, true);
    h.drain();

    assert_eq!(*h.coord.state(), before);
    assert_eq!(h.writes().len(), writes_before);
    assert!(!h.coord.engine().is_playing());
}

#[test]
fn select_track_persists_selection_and_can_play() {
    let dir = music_dir(&["a.mp3", "b.mp3", "c.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);

    h.coord.select_track(2, true);
    h.drain();

    assert_eq!(h.coord.state().current_index, Some(2));
    assert!(h.coord.state().is_playing);
    let selection = h
        .writes()
        .into_iter()
        .find(|w| w.current_track == Some(source_of(&dir, "c.mp3")))
        .expect("selection write");
    assert_eq!(selection.position_ms, 0);
}

#[test]
fn repeat_mode_cycles_off_all_one() {
    let mut h = Harness::new();
    let mut seen = Vec::new();
    for _ in 0..3 {
        h.coord.cycle_repeat_mode();
        h.drain();
        seen.push(h.coord.state().repeat_mode);
    }
    assert_eq!(seen, vec![RepeatMode::All, RepeatMode::One, RepeatMode::Off]);
}

#[test]
fn playback_speed_cycles_through_presets() {
    let mut h = Harness::new();
    let mut seen = Vec::new();
    for _ in 0..6 {
        h.coord.cycle_playback_speed();
        h.drain();
        seen.push(h.coord.state().playback_speed);
    }
    assert_eq!(seen, vec![1.25, 1.5, 1.75, 2.0, 0.75, 1.0]);
}

#[test]
fn seek_is_clamped_to_track_bounds() {
    let dir = music_dir(&["a.mp3"]);
    let mut h = Harness::with(MemoryStore::default(), FakeEngine::with_duration(10_000));
    h.load(&dir);

    h.coord.seek(-50);
    assert_eq!(h.coord.engine().position_ms(), 0);
    assert_eq!(h.coord.state().current_position_ms, 0);

    h.coord.seek(999_999);
    assert_eq!(h.coord.engine().position_ms(), 10_000);
    assert_eq!(h.coord.state().current_position_ms, 10_000);
    assert_eq!(h.coord.state().duration_ms, 10_000);
    assert_eq!(h.last_write().position_ms, 10_000);
}

#[test]
fn seek_without_known_duration_has_no_upper_bound() {
    let dir = music_dir(&["a.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);

    h.coord.seek(123_456_789);

    assert_eq!(h.coord.engine().position_ms(), 123_456_789);
    // Reported duration never trails the position.
    assert_eq!(h.coord.state().duration_ms, 123_456_789);
}

#[test]
fn seek_by_moves_relative_to_the_engine_position() {
    let dir = music_dir(&["a.mp3"]);
    let mut h = Harness::with(MemoryStore::default(), FakeEngine::with_duration(10_000));
    h.load(&dir);
    h.coord.engine_mut().position_ms = 3_000;

    h.coord.apply(Intent::SeekBy(-5_000));
    assert_eq!(h.coord.engine().position_ms(), 0);

    h.coord.apply(Intent::SeekBy(4_000));
    assert_eq!(h.coord.engine().position_ms(), 4_000);
}

#[test]
fn stop_rewinds_and_saves_position_zero() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);
    h.coord.select_track(1, true);
    h.drain();
    h.coord.engine_mut().position_ms = 5_000;

    h.coord.stop();
    h.drain();

    assert!(!h.coord.state().is_playing);
    assert!(!h.coord.engine().is_playing());
    assert!(!h.coord.is_sampling());
    assert_eq!(h.coord.engine().position_ms(), 0);
    assert_eq!(h.coord.state().current_index, Some(1));
    let last = h.last_write();
    assert_eq!(last.current_track, Some(source_of(&dir, "b.mp3")));
    assert_eq!(last.position_ms, 0);
}

#[test]
fn stop_after_empty_scan_keeps_session_cleared() {
    let dir = music_dir(&["notes.txt"]);
    let store = MemoryStore::with(PersistedSession {
        folder: Some("/old".into()),
        ..PersistedSession::default()
    });
    let mut h = Harness::with(store, FakeEngine::new());
    h.load(&dir);

    h.coord.stop();
    h.coord.select_track(0, true);
    h.drain();

    assert!(h.writes().is_empty());
    assert_eq!(h.store.current(), None);
    assert!(!h.coord.state().is_playing);
    assert_eq!(
        h.coord.state().error_message.as_deref(),
        Some(NO_AUDIO_IN_FOLDER)
    );
}

#[test]
fn progress_ticker_restart_cancels_the_previous_stream() {
    let mut ticker = ProgressTicker::default();
    let (first_tx, first_rx) = mpsc::channel();
    let (second_tx, second_rx) = mpsc::channel();

    ticker.start(Duration::from_millis(5), first_tx);
    assert!(matches!(first_rx.recv_timeout(WAIT), Ok(Msg::Tick)));

    ticker.start(Duration::from_millis(5), second_tx);
    assert!(ticker.is_running());
    // The first thread exits and drops its sender once cancelled.
    loop {
        match first_rx.recv_timeout(WAIT) {
            Ok(Msg::Tick) => continue,
            Ok(_) => panic!("ticker only sends ticks"),
            Err(err) => {
                assert_eq!(err, mpsc::RecvTimeoutError::Disconnected);
                break;
            }
        }
    }
    assert!(matches!(second_rx.recv_timeout(WAIT), Ok(Msg::Tick)));
    assert!(matches!(second_rx.recv_timeout(WAIT), Ok(Msg::Tick)));

    ticker.stop();
    assert!(!ticker.is_running());
    loop {
        match second_rx.recv_timeout(WAIT) {
            Ok(Msg::Tick) => continue,
            Ok(_) => panic!("ticker only sends ticks"),
            Err(err) => {
                assert_eq!(err, mpsc::RecvTimeoutError::Disconnected);
                break;
            }
        }
    }
}

#[test]
fn auto_advance_updates_index_and_saves_new_track() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);
    h.coord.toggle_play_pause();
    h.drain();

    h.coord.engine_mut().finish_item();
    h.drain();

    assert_eq!(h.coord.state().current_index, Some(1));
    let last = h.last_write();
    assert_eq!(last.current_track, Some(source_of(&dir, "b.mp3")));
    assert_eq!(last.position_ms, 0);
}

#[test]
fn playback_end_stops_sampling() {
    let dir = music_dir(&["a.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);
    h.coord.toggle_play_pause();
    h.drain();
    assert!(h.coord.is_sampling());

    h.coord.engine_mut().finish_item();
    h.drain();

    assert!(!h.coord.state().is_playing);
    assert!(!h.coord.is_sampling());
    assert_eq!(h.coord.state().current_index, Some(0));
}

#[test]
fn superseded_scan_never_overwrites_newer_state() {
    let first = music_dir(&["old.mp3"]);
    let second = music_dir(&["x.mp3", "y.mp3"]);
    let mut h = Harness::new();

    h.coord.select_folder(FolderSource::new(first.path()));
    h.coord.select_folder(FolderSource::new(second.path()));
    h.settle_scans(2);

    let state = h.coord.state();
    assert_eq!(state.folder, Some(FolderSource::new(second.path())));
    assert_eq!(h.titles(), vec!["x.mp3", "y.mp3"]);
    assert!(!state.is_loading);
    assert!(
        h.writes()
            .iter()
            .all(|w| w.current_track != Some(source_of(&first, "old.mp3")))
    );
}

#[test]
fn persisted_writes_follow_operation_order() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let mut h = Harness::new();
    h.load(&dir);

    h.coord.toggle_shuffle();
    h.coord.cycle_repeat_mode();
    h.coord.cycle_playback_speed();
    h.drain();

    let writes = h.writes();
    let shuffled = writes.iter().position(|w| w.shuffle_enabled).unwrap();
    let repeated = writes
        .iter()
        .position(|w| w.repeat_mode == RepeatMode::All)
        .unwrap();
    let faster = writes
        .iter()
        .position(|w| w.playback_speed == 1.25)
        .unwrap();
    assert!(shuffled < repeated && repeated < faster);

    let last = writes.last().unwrap();
    assert!(last.shuffle_enabled);
    assert_eq!(last.repeat_mode, RepeatMode::All);
    assert_eq!(last.playback_speed, 1.25);
}

#[test]
fn dispose_saves_final_position_and_releases_engine() {
    let dir = music_dir(&["a.mp3"]);
    let engine = FakeEngine::new();
    let released = engine.released.clone();
    let mut h = Harness::with(MemoryStore::default(), engine);
    h.load(&dir);
    h.coord.toggle_play_pause();
    h.drain();
    h.coord.engine_mut().position_ms = 7_000;

    h.coord.dispose(Duration::ZERO);

    assert!(released.load(Ordering::SeqCst));
    assert!(!h.coord.is_sampling());
    let saved = h.store.current().unwrap();
    assert_eq!(saved.position_ms, 7_000);
    assert_eq!(saved.current_track, Some(source_of(&dir, "a.mp3")));
}

#[test]
fn publisher_prunes_dropped_subscribers() {
    let publisher = StatePublisher::new();
    let reader = publisher.reader();
    let kept = reader.subscribe();
    let dropped = reader.subscribe();
    drop(dropped);

    let state = PlaylistState {
        is_loading: true,
        ..PlaylistState::default()
    };
    publisher.publish(&state);

    assert!(kept.try_recv().unwrap().is_loading);
    assert!(reader.snapshot().is_loading);
    assert_eq!(reader.subscriber_count(), 1);
}

fn wait_until(
    service: &SessionService,
    pred: impl Fn(&PlaylistState) -> bool,
) -> Arc<PlaylistState> {
    let updates = service.subscribe();
    let deadline = Instant::now() + WAIT;
    loop {
        let snapshot = service.snapshot();
        if pred(&snapshot) {
            return snapshot;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        assert!(!remaining.is_zero(), "timed out waiting for state");
        let _ = updates.recv_timeout(remaining.min(Duration::from_millis(50)));
    }
}

#[test]
fn service_runs_intents_and_saves_on_shutdown() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let engine = FakeEngine::new();
    let released = engine.released.clone();
    let store = MemoryStore::default();

    let service = SessionService::spawn(
        engine,
        store.clone(),
        &Settings::default(),
        Some(FolderSource::new(dir.path())),
    )
    .unwrap();

    wait_until(&service, |s| s.tracks.len() == 2);
    service.send(Intent::SelectTrack {
        index: 1,
        play: true,
    });
    wait_until(&service, |s| s.is_playing && s.current_index == Some(1));

    service.shutdown();

    assert!(released.load(Ordering::SeqCst));
    let saved = store.current().unwrap();
    assert_eq!(saved.current_track, Some(source_of(&dir, "b.mp3")));
}

#[test]
fn service_restores_saved_session_on_start() {
    let dir = music_dir(&["a.mp3", "b.mp3"]);
    let store = MemoryStore::with(PersistedSession {
        folder: Some(dir.path().to_string_lossy().into_owned()),
        current_track: Some(source_of(&dir, "b.mp3")),
        ..PersistedSession::default()
    });

    let service =
        SessionService::spawn(FakeEngine::new(), store.clone(), &Settings::default(), None)
            .unwrap();
    let state = wait_until(&service, |s| !s.tracks.is_empty());

    assert_eq!(state.current_index, Some(1));
    assert!(!state.is_playing);
    assert!(store.read().unwrap().is_some());
    service.shutdown();
}
