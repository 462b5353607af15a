use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::PlaybackEngine;
use crate::config::Settings;
use crate::library::FolderSource;
use crate::store::{Persister, SessionStore};

use super::coordinator::Coordinator;
use super::message::{Intent, Msg};
use super::publisher::{StatePublisher, StateReader};
use super::state::PlaylistState;

/// Handle to the running session.
///
/// The coordinator lives on its own thread; this handle sends it intents and
/// reads the snapshots it publishes. Dropping the handle shuts the session
/// down the same way [`SessionService::shutdown`] does.
pub struct SessionService {
    tx: Sender<Msg>,
    reader: StateReader,
    join: Option<JoinHandle<()>>,
}

impl SessionService {
    /// Start the session. `initial_folder` takes precedence over the saved
    /// session; without it the saved session (if any) is restored.
    pub fn spawn<E, S>(
        engine: E,
        store: S,
        settings: &Settings,
        initial_folder: Option<FolderSource>,
    ) -> io::Result<Self>
    where
        E: PlaybackEngine + 'static,
        S: SessionStore + 'static,
    {
        let saved = match store.read() {
            Ok(saved) => saved,
            Err(err) => {
                warn!(error = %err, "ignoring unreadable saved session");
                None
            }
        };

        let persister = Persister::spawn(store);
        let publisher = StatePublisher::new();
        let reader = publisher.reader();
        let (tx, rx) = mpsc::channel();

        let library = settings.library.clone();
        let interval = Duration::from_millis(settings.session.progress_interval_ms);
        let fade_out = Duration::from_millis(settings.audio.quit_fade_out_ms);
        let coordinator_tx = tx.clone();

        let join = thread::Builder::new()
            .name("foldplay-session".into())
            .spawn(move || {
                let mut coordinator =
                    Coordinator::new(engine, persister, publisher, coordinator_tx, library, interval);
                match (initial_folder, saved) {
                    (Some(folder), _) => coordinator.select_folder(folder),
                    (None, Some(saved)) => coordinator.restore(saved),
                    (None, None) => debug!("no saved session"),
                }
                run(coordinator, rx, fade_out);
            })?;

        Ok(Self {
            tx,
            reader,
            join: Some(join),
        })
    }

    pub fn send(&self, intent: Intent) {
        if self.tx.send(Msg::Intent(intent)).is_err() {
            debug!("session thread is gone, dropping intent");
        }
    }

    pub fn reader(&self) -> StateReader {
        self.reader.clone()
    }

    pub fn snapshot(&self) -> Arc<PlaylistState> {
        self.reader.snapshot()
    }

    pub fn subscribe(&self) -> Receiver<Arc<PlaylistState>> {
        self.reader.subscribe()
    }

    /// Handle everything already sent, persist the final state and release
    /// the engine. Blocks until done.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        let _ = self.tx.send(Msg::Shutdown);
        if join.join().is_err() {
            warn!("session thread panicked");
        }
    }
}

impl Drop for SessionService {
    fn drop(&mut self) {
        self.close();
    }
}

fn run<E: PlaybackEngine>(mut coordinator: Coordinator<E>, rx: Receiver<Msg>, fade_out: Duration) {
    while let Ok(msg) = rx.recv() {
        if matches!(msg, Msg::Shutdown) {
            break;
        }
        coordinator.handle(msg);
    }
    coordinator.dispose(fade_out);
}
