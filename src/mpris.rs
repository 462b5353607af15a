//! Now-playing mirror over MPRIS (D-Bus).
//!
//! The runtime feeds session snapshots into [`MprisHandle::update`]; desktop
//! media controls come back as [`ControlCmd`]s on the channel passed to
//! [`spawn_mpris`].

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, info, warn};
use zbus::object_server::InterfaceRef;
use zbus::{Connection, interface};
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::session::PlaylistState;

const BUS_NAME: &str = "org.mpris.MediaPlayer2.foldplay";
const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const NOTIFY_POLL: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackStatus {
    /// A track part-way through but not playing is paused; a track sitting at
    /// its start (fresh load or after stop) counts as stopped.
    pub fn from_state(state: &PlaylistState) -> Self {
        if state.is_playing {
            Self::Playing
        } else if state.current_track().is_some() && state.current_position_ms > 0 {
            Self::Paused
        } else {
            Self::Stopped
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// What the bus sees. Position is left out so progress ticks don't signal.
#[derive(Debug, Default, Clone, PartialEq)]
struct SharedState {
    playback: PlaybackStatus,
    title: Option<String>,
    subtitle: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    track_id: Option<OwnedObjectPath>,
}

impl SharedState {
    fn from_snapshot(state: &PlaylistState) -> Self {
        let playback = PlaybackStatus::from_state(state);
        let (Some(index), Some(track)) = (state.current_index, state.current_track()) else {
            return Self {
                playback,
                ..Self::default()
            };
        };

        Self {
            playback,
            title: Some(track.title.clone()),
            subtitle: track.subtitle(),
            artist: track.artist.iter().cloned().collect(),
            album: track.album.clone(),
            url: Some(format!("file://{}", track.source.path().display())),
            length_micros: track
                .duration_ms
                .and_then(|ms| i64::try_from(ms.saturating_mul(1000)).ok()),
            track_id: OwnedObjectPath::try_from(format!("{OBJECT_PATH}/track/{index}")).ok(),
        }
    }
}

fn lock(state: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<()>,
}

impl MprisHandle {
    /// Mirror `snapshot`, signalling the bus only when something it shows
    /// actually changed.
    pub fn update(&self, snapshot: &PlaylistState) {
        let next = SharedState::from_snapshot(snapshot);
        let mut current = lock(&self.state);
        if *current != next {
            *current = next;
            let _ = self.notify.send(());
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No-op for TUI.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "foldplay"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        lock(&self.state).playback.as_str()
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let s = lock(&self.state).clone();
        let mut map = HashMap::new();
        let mut put = |key: &str, value: Value<'_>| {
            if let Ok(owned) = OwnedValue::try_from(value) {
                map.insert(key.to_string(), owned);
            }
        };

        put("xesam:title", Value::from(s.title.unwrap_or_default()));
        if let Some(id) = s.track_id {
            put("mpris:trackid", Value::from(id.into_inner()));
        }
        if !s.artist.is_empty() {
            put("xesam:artist", Value::from(s.artist));
        }
        if let Some(album) = s.album {
            put("xesam:album", Value::from(album));
        }
        if let Some(subtitle) = s.subtitle {
            put("xesam:comment", Value::from(vec![subtitle]));
        }
        if let Some(url) = s.url {
            put("xesam:url", Value::from(url));
        }
        if let Some(length) = s.length_micros {
            put("mpris:length", Value::from(length));
        }
        map
    }
}

enum Pending {
    Nothing,
    Changed,
    Closed,
}

fn drain(rx: &Receiver<()>) -> Pending {
    let mut pending = Pending::Nothing;
    loop {
        match rx.try_recv() {
            Ok(()) => pending = Pending::Changed,
            Err(TryRecvError::Empty) => return pending,
            Err(TryRecvError::Disconnected) => return Pending::Closed,
        }
    }
}

async fn emit_changes(player: &InterfaceRef<PlayerIface>) {
    let iface = player.get().await;
    let emitter = player.signal_emitter();
    if let Err(e) = iface.playback_status_changed(emitter).await {
        debug!(error = %e, "MPRIS: failed to signal playback status");
    }
    if let Err(e) = iface.metadata_changed(emitter).await {
        debug!(error = %e, "MPRIS: failed to signal metadata");
    }
}

async fn serve(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    notify: Receiver<()>,
) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;

    let object_server = connection.object_server();
    object_server.at(OBJECT_PATH, RootIface { tx: tx.clone() }).await?;
    object_server
        .at(OBJECT_PATH, PlayerIface { tx, state })
        .await?;
    let player = object_server
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await?;
    info!(name = BUS_NAME, "MPRIS service registered");

    loop {
        Timer::after(NOTIFY_POLL).await;
        match drain(&notify) {
            Pending::Nothing => {}
            Pending::Changed => emit_changes(&player).await,
            Pending::Closed => return Ok(()),
        }
    }
}

/// Register on the session bus from a background thread. Bus failures are
/// logged and the player keeps running without media controls.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<()>();

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("foldplay-mpris".into())
        .spawn(move || {
            if let Err(e) = block_on(serve(tx, state_for_thread, notify_rx)) {
                warn!(error = %e, "MPRIS unavailable");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "could not start MPRIS thread");
    }

    MprisHandle {
        state,
        notify: notify_tx,
    }
}
