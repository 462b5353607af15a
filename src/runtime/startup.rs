use std::env;
use std::fs;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Overrides `log.level` when set, e.g. `FOLDPLAY_LOG=foldplay=debug`.
pub const LOG_ENV: &str = "FOLDPLAY_LOG";

pub fn log_path(settings: &Settings) -> PathBuf {
    settings
        .log
        .file
        .clone()
        .unwrap_or_else(|| settings.state_dir().join("foldplay.log"))
}

pub fn build_filter(env_directive: Option<&str>, level: &str) -> EnvFilter {
    env_directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Route `tracing` output to the log file; the terminal belongs to the TUI.
///
/// Returns the writer guard, which must live until exit. `None` means the
/// log file could not be set up and the app runs without logs.
pub fn init_logging(settings: &Settings) -> Option<WorkerGuard> {
    let path = log_path(settings);
    let dir = path.parent()?;
    let file_name = path.file_name()?;
    fs::create_dir_all(dir).ok()?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = build_filter(env::var(LOG_ENV).ok().as_deref(), &settings.log.level);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .ok()?;
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_defaults_into_state_dir() {
        let mut settings = Settings::default();
        settings.session.state_dir = Some(PathBuf::from("/tmp/fp-state"));
        assert_eq!(log_path(&settings), PathBuf::from("/tmp/fp-state/foldplay.log"));

        settings.log.file = Some(PathBuf::from("/var/log/fp.log"));
        assert_eq!(log_path(&settings), PathBuf::from("/var/log/fp.log"));
    }

    #[test]
    fn filter_prefers_env_directive_then_level() {
        assert_eq!(build_filter(Some("debug"), "warn").to_string(), "debug");
        assert_eq!(build_filter(None, "warn").to_string(), "warn");
        assert_eq!(
            build_filter(Some("foldplay=loud"), "foldplay=quiet").to_string(),
            "info"
        );
    }
}
