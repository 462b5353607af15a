use std::env;
use std::io::Stdout;
use std::sync::mpsc;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::audio::RodioEngine;
use crate::library::FolderSource;
use crate::mpris::ControlCmd;
use crate::session::SessionService;
use crate::store::TomlFileStore;

mod event_loop;
mod mpris_sync;
mod settings;
mod startup;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, settings_warning) = settings::load_settings();
    let _log_guard = startup::init_logging(&settings);
    if let Some(msg) = settings_warning {
        warn!("{msg}");
    }
    info!(state_dir = %settings.state_dir().display(), "starting foldplay");

    // A folder on the command line replaces whatever session was saved.
    let initial_folder = env::args_os().nth(1).map(FolderSource::new);

    let engine = RodioEngine::new()?;
    let store = TomlFileStore::new(settings.state_dir());
    let session = SessionService::spawn(engine, store, &settings, initial_folder)?;
    let snapshots = session.subscribe();

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = crate::mpris::spawn_mpris(control_tx);

    let mut app = App::new(session.snapshot(), settings.ui.follow_playback);
    mpris_sync::update_mpris(&mpris, &app);

    enable_raw_mode()?;
    let mut terminal = undo_on_error(enter_terminal, || {
        let _ = disable_raw_mode();
    })?;

    let run_result: Result<(), Box<dyn std::error::Error>> = (|| {
        let mut state = event_loop::EventLoopState::default();

        event_loop::run(
            &mut terminal,
            &settings,
            &mut app,
            &session,
            &snapshots,
            &mpris,
            &control_rx,
            &mut state,
        )
    })();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    session.shutdown();
    info!("foldplay exited");

    run_result
}

fn enter_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

/// Run `setup`; if it fails, run `undo` before handing the error back.
fn undo_on_error<T, E>(setup: impl FnOnce() -> Result<T, E>, undo: impl FnOnce()) -> Result<T, E> {
    let result = setup();
    if result.is_err() {
        undo();
    }
    result
}
