use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::debug;

use crate::app::{App, InputMode};
use crate::config;
use crate::mpris::{ControlCmd, MprisHandle};
use crate::runtime::mpris_sync::update_mpris;
use crate::session::{Intent, PlaylistState, SessionService};
use crate::ui;

/// State tracked by the runtime event loop across iterations.
#[derive(Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
}

/// Main terminal event loop: applies session snapshots, draws the UI and
/// forwards keyboard and MPRIS input to the session. Returns `Ok(())` when
/// shutdown is requested.
#[allow(clippy::too_many_arguments)]
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    session: &SessionService,
    snapshots: &Receiver<Arc<PlaylistState>>,
    mpris: &MprisHandle,
    control_rx: &Receiver<ControlCmd>,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        // Only the newest snapshot matters; intermediate ones are skipped.
        let mut latest = None;
        while let Ok(snapshot) = snapshots.try_recv() {
            latest = Some(snapshot);
        }
        if let Some(snapshot) = latest {
            app.apply_snapshot(snapshot);
            update_mpris(mpris, app);
        }

        terminal.draw(|f| ui::draw(f, app, &settings.ui, &settings.controls))?;

        while let Ok(cmd) = control_rx.try_recv() {
            if handle_control_cmd(cmd, app, session) {
                return Ok(());
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, settings, app, session, state) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Map an MPRIS command to a session intent. Returns `true` on quit.
fn handle_control_cmd(cmd: ControlCmd, app: &mut App, session: &SessionService) -> bool {
    debug!(?cmd, "mpris command");
    let intent = match cmd {
        ControlCmd::Quit => return true,
        ControlCmd::Play => Intent::Play,
        ControlCmd::Pause => Intent::Pause,
        ControlCmd::PlayPause => Intent::TogglePlayPause,
        ControlCmd::Stop => Intent::Stop,
        ControlCmd::Next => Intent::Next,
        ControlCmd::Prev => Intent::Previous,
    };
    app.follow_playback_on();
    session.send(intent);
    false
}

fn handle_key_event(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    session: &SessionService,
    state: &mut EventLoopState,
) -> bool {
    if app.input_mode == InputMode::FolderPrompt {
        state.pending_gg = false;
        match key.code {
            KeyCode::Esc => app.cancel_folder_prompt(),
            KeyCode::Backspace => app.pop_folder_char(),
            KeyCode::Enter => {
                if let Some(folder) = app.submit_folder_prompt() {
                    app.follow_playback_on();
                    session.send(Intent::ChooseFolder(folder));
                }
            }
            KeyCode::Char(c) if !c.is_control() => app.push_folder_char(c),
            _ => {}
        }
        return false;
    }

    if key.code != KeyCode::Char('g') {
        state.pending_gg = false;
    }

    let scrub_ms = i64::try_from(settings.controls.scrub_seconds.saturating_mul(1000))
        .unwrap_or(i64::MAX);

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('g') => {
            if state.pending_gg {
                state.pending_gg = false;
                app.follow_playback_off();
                app.select_first();
            } else {
                state.pending_gg = true;
            }
        }
        KeyCode::Char('G') => {
            app.follow_playback_off();
            app.select_last();
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.follow_playback_off();
            app.next();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.follow_playback_off();
            app.prev();
        }
        KeyCode::Enter => {
            if app.has_tracks() {
                let snapshot = &app.snapshot;
                let is_playing_selected =
                    snapshot.is_playing && snapshot.current_index == Some(app.selected);
                if !is_playing_selected {
                    app.follow_playback_on();
                    session.send(Intent::SelectTrack {
                        index: app.selected,
                        play: true,
                    });
                }
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            app.follow_playback_on();
            session.send(Intent::TogglePlayPause);
        }
        KeyCode::Char('l') => {
            app.follow_playback_on();
            session.send(Intent::Next);
        }
        KeyCode::Char('h') => {
            app.follow_playback_on();
            session.send(Intent::Previous);
        }
        KeyCode::Char('L') => session.send(Intent::SeekBy(scrub_ms)),
        KeyCode::Char('H') => session.send(Intent::SeekBy(-scrub_ms)),
        KeyCode::Char('x') => session.send(Intent::Stop),
        KeyCode::Char('s') => session.send(Intent::ToggleShuffle),
        KeyCode::Char('r') => session.send(Intent::CycleRepeatMode),
        KeyCode::Char('v') => session.send(Intent::CyclePlaybackSpeed),
        KeyCode::Char('o') => app.open_folder_prompt(),
        KeyCode::Char('K') => app.toggle_metadata_window(),
        _ => {}
    }

    false
}
