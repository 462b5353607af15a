use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::audio::{EngineEvent, PlaybackEngine};
use crate::config::LibrarySettings;
use crate::library::{self, FolderSource, Track};
use crate::store::{PersistedSession, Persister};

use super::message::{Intent, Msg, ScanResult};
use super::publisher::StatePublisher;
use super::state::{NO_AUDIO_IN_FOLDER, NO_AUDIO_IN_SAVED_FOLDER, PlaylistState};
use super::ticker::ProgressTicker;

const SPEED_PRESETS: [f32; 6] = [0.75, 1.0, 1.25, 1.5, 1.75, 2.0];
const SPEED_EPSILON: f32 = 0.05;

/// First preset clearly above `current`, wrapping to the slowest one.
pub fn next_speed(current: f32) -> f32 {
    SPEED_PRESETS
        .iter()
        .copied()
        .find(|preset| *preset > current + SPEED_EPSILON)
        .unwrap_or(SPEED_PRESETS[0])
}

/// Owns the playlist state and drives the engine.
///
/// Every public operation updates the state, publishes a snapshot and queues
/// a persistence write as needed. Scans run on short-lived threads and come
/// back as `Msg::Scanned`; a result from a superseded scan is dropped.
pub struct Coordinator<E: PlaybackEngine> {
    engine: E,
    persister: Persister,
    publisher: StatePublisher,
    state: PlaylistState,
    tx: Sender<Msg>,
    library: LibrarySettings,
    progress_interval: Duration,
    ticker: ProgressTicker,
    scan_generation: u64,
}

impl<E: PlaybackEngine> Coordinator<E> {
    pub(crate) fn new(
        mut engine: E,
        persister: Persister,
        publisher: StatePublisher,
        tx: Sender<Msg>,
        library: LibrarySettings,
        progress_interval: Duration,
    ) -> Self {
        let events = tx.clone();
        engine.subscribe(Box::new(move |event| {
            let _ = events.send(Msg::Engine(event));
        }));

        let state = PlaylistState {
            shuffle_enabled: engine.shuffle_enabled(),
            repeat_mode: engine.repeat_mode(),
            playback_speed: engine.speed(),
            ..PlaylistState::default()
        };
        publisher.publish(&state);

        Self {
            engine,
            persister,
            publisher,
            state,
            tx,
            library,
            progress_interval,
            ticker: ProgressTicker::default(),
            scan_generation: 0,
        }
    }

    pub(crate) fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Intent(intent) => self.apply(intent),
            Msg::Scanned(result) => self.finish_scan(result),
            Msg::Engine(event) => self.on_engine_event(event),
            Msg::Tick => self.sample_progress(),
            // Handled by the owning loop.
            Msg::Shutdown => {}
        }
    }

    pub fn apply(&mut self, intent: Intent) {
        debug!(?intent, "intent");
        match intent {
            Intent::ChooseFolder(folder) => self.select_folder(folder),
            Intent::TogglePlayPause => self.toggle_play_pause(),
            Intent::Play => self.play(),
            Intent::Pause => self.pause(),
            Intent::Next => self.next(),
            Intent::Previous => self.previous(),
            Intent::Stop => self.stop(),
            Intent::SelectTrack { index, play } => self.select_track(index, play),
            Intent::Seek(position_ms) => self.seek(position_ms),
            Intent::SeekBy(delta_ms) => {
                let position = i64::try_from(self.engine.position_ms()).unwrap_or(i64::MAX);
                self.seek(position.saturating_add(delta_ms));
            }
            Intent::ToggleShuffle => self.toggle_shuffle(),
            Intent::CycleRepeatMode => self.cycle_repeat_mode(),
            Intent::CyclePlaybackSpeed => self.cycle_playback_speed(),
        }
    }

    // -- folder scans ------------------------------------------------------

    pub fn select_folder(&mut self, folder: FolderSource) {
        self.begin_scan(folder, None);
    }

    /// Re-open the folder recorded in `saved`. Never starts playback.
    pub fn restore(&mut self, saved: PersistedSession) {
        let Some(folder) = saved.folder.clone().filter(|f| !f.is_empty()) else {
            debug!("saved session has no folder, nothing to restore");
            return;
        };
        self.begin_scan(FolderSource::new(folder), Some(saved));
    }

    fn begin_scan(&mut self, folder: FolderSource, restore: Option<PersistedSession>) {
        self.scan_generation += 1;
        let generation = self.scan_generation;

        // The previous folder's playlist is gone while loading.
        self.ticker.stop();
        self.engine.stop();
        self.engine.clear();
        self.state = PlaylistState {
            folder: Some(folder.clone()),
            is_loading: true,
            shuffle_enabled: self.engine.shuffle_enabled(),
            repeat_mode: self.engine.repeat_mode(),
            playback_speed: self.engine.speed(),
            ..PlaylistState::default()
        };
        self.publish();
        info!(%folder, generation, restoring = restore.is_some(), "scanning folder");

        let tx = self.tx.clone();
        let settings = self.library.clone();
        let request = (folder.clone(), restore.clone());
        let spawned = thread::Builder::new()
            .name("foldplay-scan".into())
            .spawn(move || {
                let tracks = library::scan(&folder, &settings);
                let _ = tx.send(Msg::Scanned(ScanResult {
                    generation,
                    folder,
                    tracks,
                    restore,
                }));
            });

        if let Err(err) = spawned {
            warn!(error = %err, "could not start folder scan");
            let (folder, restore) = request;
            self.finish_scan(ScanResult {
                generation,
                folder,
                tracks: Vec::new(),
                restore,
            });
        }
    }

    fn finish_scan(&mut self, result: ScanResult) {
        if result.generation != self.scan_generation {
            debug!(
                generation = result.generation,
                latest = self.scan_generation,
                "discarding superseded scan"
            );
            return;
        }

        let ScanResult {
            folder,
            tracks,
            restore,
            ..
        } = result;

        if tracks.is_empty() {
            let message = if restore.is_some() {
                NO_AUDIO_IN_SAVED_FOLDER
            } else {
                NO_AUDIO_IN_FOLDER
            };
            info!(%folder, "no audio found");
            self.ticker.stop();
            self.engine.stop();
            self.engine.clear();
            self.persister.clear();
            self.state = PlaylistState {
                folder: Some(folder),
                error_message: Some(message.to_string()),
                shuffle_enabled: self.engine.shuffle_enabled(),
                repeat_mode: self.engine.repeat_mode(),
                playback_speed: self.engine.speed(),
                ..PlaylistState::default()
            };
            self.publish();
            return;
        }

        match restore {
            Some(saved) => self.finish_restore(folder, tracks, saved),
            None => {
                self.set_playlist(folder, tracks, 0);
                self.persist_selection(Some(0));
            }
        }
    }

    fn finish_restore(&mut self, folder: FolderSource, tracks: Vec<Track>, saved: PersistedSession) {
        let target = saved
            .current_track
            .as_deref()
            .and_then(|source| tracks.iter().position(|t| t.source.as_persisted() == source))
            .unwrap_or(0);

        self.set_playlist(folder, tracks, target);
        self.engine.set_shuffle(saved.shuffle_enabled);
        self.engine.set_repeat_mode(saved.repeat_mode);
        if saved.playback_speed > 0.0 {
            self.engine.set_speed(saved.playback_speed);
        }
        if saved.position_ms > 0 {
            self.engine.seek(Some(target), saved.position_ms);
        }

        self.state.shuffle_enabled = self.engine.shuffle_enabled();
        self.state.repeat_mode = self.engine.repeat_mode();
        self.state.playback_speed = self.engine.speed();
        self.sample_progress();
        self.persist_current_state();
        info!(index = target, position_ms = saved.position_ms, "session restored");
    }

    /// Load `tracks` into the engine, paused at `start_index`.
    fn set_playlist(&mut self, folder: FolderSource, tracks: Vec<Track>, start_index: usize) {
        self.ticker.stop();
        let index = start_index.min(tracks.len().saturating_sub(1));
        self.engine.load_queue(&tracks, index, 0);

        self.state = PlaylistState {
            folder: Some(folder),
            tracks,
            current_index: Some(index),
            duration_ms: self.engine.duration_ms().unwrap_or(0),
            shuffle_enabled: self.engine.shuffle_enabled(),
            repeat_mode: self.engine.repeat_mode(),
            playback_speed: self.engine.speed(),
            ..PlaylistState::default()
        };
        self.publish();
    }

    // -- transport ---------------------------------------------------------

    pub fn toggle_play_pause(&mut self) {
        if self.state.tracks.is_empty() {
            return;
        }
        if self.engine.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn play(&mut self) {
        if self.state.tracks.is_empty() {
            return;
        }
        if self.engine.current_index().is_none() {
            self.select_track(0, true);
        } else {
            self.start_playback();
        }
    }

    pub fn pause(&mut self) {
        self.engine.pause();
        self.state.is_playing = false;
        self.publish();
    }

    pub fn next(&mut self) {
        if self.engine.has_next() {
            self.engine.seek_to_next();
            self.start_playback();
        }
    }

    pub fn previous(&mut self) {
        if self.engine.has_previous() {
            self.engine.seek_to_previous();
            self.start_playback();
        } else if self.engine.queue_len() > 0 {
            self.engine.seek(None, 0);
            self.start_playback();
        }
    }

    /// Pause and rewind the current track. Does nothing without one.
    pub fn stop(&mut self) {
        let Some(index) = self.engine.current_index() else {
            return;
        };
        if self.state.tracks.is_empty() {
            return;
        }
        self.engine.pause();
        self.engine.seek(Some(index), 0);
        self.state.is_playing = false;
        self.stop_sampling();
        self.persist_selection(Some(index));
    }

    /// Jump to `index`; out-of-range indices are ignored.
    pub fn select_track(&mut self, index: usize, play: bool) {
        if index >= self.state.tracks.len() {
            return;
        }
        self.engine.seek(Some(index), 0);
        self.state.current_index = Some(index);
        self.sample_progress();
        self.persist_selection(Some(index));
        if play {
            self.start_playback();
        }
    }

    pub fn toggle_shuffle(&mut self) {
        let enabled = !self.engine.shuffle_enabled();
        self.engine.set_shuffle(enabled);
        self.state.shuffle_enabled = enabled;
        self.publish();
        self.persist_current_state();
    }

    pub fn cycle_repeat_mode(&mut self) {
        let mode = self.engine.repeat_mode().cycled();
        self.engine.set_repeat_mode(mode);
        self.state.repeat_mode = mode;
        self.publish();
        self.persist_current_state();
    }

    pub fn cycle_playback_speed(&mut self) {
        let speed = next_speed(self.engine.speed());
        self.engine.set_speed(speed);
        self.state.playback_speed = speed;
        self.publish();
        self.persist_current_state();
    }

    /// Seek within the current track, clamped to `[0, duration]`. With an
    /// unknown duration only the lower bound applies.
    pub fn seek(&mut self, position_ms: i64) {
        let upper = self.engine.duration_ms().unwrap_or(u64::MAX);
        let target = u64::try_from(position_ms).unwrap_or(0).min(upper);
        self.engine.seek(None, target);
        self.sample_progress();
        self.persist_current_state();
    }

    fn start_playback(&mut self) {
        self.engine.play();
        self.state.is_playing = self.engine.is_playing();
        self.state.current_index = self.engine.current_index();
        self.start_sampling();
    }

    // -- engine events and progress ------------------------------------------

    pub fn on_engine_event(&mut self, event: EngineEvent) {
        debug!(?event, "engine event");
        match event {
            EngineEvent::ItemTransitioned => {
                let index = self.engine.current_index();
                self.state.current_index = index;
                self.sample_progress();
                self.persist_selection(index);
            }
            EngineEvent::IsPlayingChanged(playing) => {
                self.state.is_playing = playing;
                if playing {
                    self.start_sampling();
                } else {
                    self.stop_sampling();
                    self.persist_current_state();
                }
            }
            EngineEvent::PlaybackEnded => {
                self.state.is_playing = false;
                self.stop_sampling();
            }
            EngineEvent::SpeedChanged(speed) => {
                self.state.playback_speed = speed;
                self.publish();
                self.persist_current_state();
            }
            EngineEvent::ShuffleChanged(enabled) => {
                self.state.shuffle_enabled = enabled;
                self.publish();
                self.persist_current_state();
            }
            EngineEvent::RepeatChanged(mode) => {
                self.state.repeat_mode = mode;
                self.publish();
                self.persist_current_state();
            }
        }
    }

    fn start_sampling(&mut self) {
        self.ticker.start(self.progress_interval, self.tx.clone());
        self.sample_progress();
    }

    fn stop_sampling(&mut self) {
        self.ticker.stop();
        self.sample_progress();
    }

    pub fn sample_progress(&mut self) {
        let position = self.engine.position_ms();
        let duration = self.engine.duration_ms().unwrap_or(0);
        self.state.current_position_ms = position;
        self.state.buffered_position_ms = self.engine.buffered_position_ms();
        self.state.duration_ms = duration.max(position);
        self.publish();
    }

    // -- persistence -----------------------------------------------------

    fn snapshot(&self, track: Option<&Track>, position_ms: u64) -> PersistedSession {
        PersistedSession {
            folder: self.state.folder.as_ref().map(FolderSource::as_persisted),
            current_track: track.map(|t| t.source.as_persisted()),
            position_ms,
            shuffle_enabled: self.engine.shuffle_enabled(),
            repeat_mode: self.engine.repeat_mode(),
            playback_speed: self.engine.speed(),
        }
    }

    /// Record `index` as the current track with position 0.
    fn persist_selection(&self, index: Option<usize>) {
        if self.state.folder.is_none() || self.state.tracks.is_empty() {
            return;
        }
        let track = index.and_then(|i| self.state.tracks.get(i));
        self.persister.write(self.snapshot(track, 0));
    }

    /// Record the engine's current track and position. An empty playlist has
    /// nothing worth restoring, so it is never written.
    fn persist_current_state(&self) {
        if self.state.tracks.is_empty() {
            return;
        }
        let track = self
            .engine
            .current_index()
            .and_then(|i| self.state.tracks.get(i));
        self.persister
            .write(self.snapshot(track, self.engine.position_ms()));
    }

    fn publish(&self) {
        self.publisher.publish(&self.state);
    }

    // -- lifecycle -----------------------------------------------------------

    /// Detach from the engine, save the final state and release output.
    /// Blocks until the final write reaches the store.
    pub fn dispose(&mut self, fade_out: Duration) {
        self.engine.subscribe(Box::new(|_| {}));
        self.stop_sampling();
        self.persist_current_state();
        self.persister.flush();
        self.engine.release(fade_out);
        info!("session closed");
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &PlaylistState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    #[cfg(test)]
    pub(crate) fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    #[cfg(test)]
    pub(crate) fn is_sampling(&self) -> bool {
        self.ticker.is_running()
    }

    #[cfg(test)]
    pub(crate) fn flush_persistence(&self) {
        self.persister.flush();
    }
}
