//! File logging. Every run appends to one log under the XDG state directory;
//! nothing is written to the terminal.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const APP_NAME: &str = "labdev";
const LOG_FILE: &str = "labdev.log";
const FILTER_ENV: &str = "LABDEV_LOG";

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the file logger once per process. Filter comes from `LABDEV_LOG`, default `info`.
pub fn init() -> Result<()> {
    if GUARD.get().is_some() {
        return Ok(());
    }

    let log_path = determine_log_path()?;
    let (directory, file_name) = log_location(&log_path)?;
    fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create log directory at {}", directory.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(rolling::never(&directory, file_name));

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(FILTER_ENV)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    let _ = GUARD.set(guard);
    Ok(())
}

/// Where log output goes; shown by `labdev status`.
pub fn determine_log_path() -> Result<PathBuf> {
    let state_home = std::env::var("XDG_STATE_HOME").ok();
    match state_dir(state_home.as_deref(), home::home_dir()) {
        Some(dir) => Ok(dir.join(APP_NAME).join(LOG_FILE)),
        None => Ok(std::env::current_dir()?.join(LOG_FILE)),
    }
}

/// `$XDG_STATE_HOME` when set and non-empty, otherwise `~/.local/state`.
fn state_dir(state_home: Option<&str>, home: Option<PathBuf>) -> Option<PathBuf> {
    match state_home {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => home.map(|h| h.join(".local").join("state")),
    }
}

fn log_location(path: &Path) -> Result<(PathBuf, &str)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid log file name: {}", path.display()))?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_home_wins_when_set() {
        let dir = state_dir(Some("/var/state"), Some(PathBuf::from("/home/lab")));
        assert_eq!(dir, Some(PathBuf::from("/var/state")));
    }

    #[test]
    fn empty_state_home_falls_back_to_home() {
        let dir = state_dir(Some(""), Some(PathBuf::from("/home/lab")));
        assert_eq!(dir, Some(PathBuf::from("/home/lab/.local/state")));
        assert_eq!(state_dir(None, None), None);
    }

    #[test]
    fn log_location_separates_directory_and_file() {
        let path = PathBuf::from("/var/state/labdev/labdev.log");
        let (dir, name) = log_location(&path).unwrap();
        assert_eq!(dir, PathBuf::from("/var/state/labdev"));
        assert_eq!(name, "labdev.log");
        assert!(log_location(Path::new("/")).is_err());
    }

    #[test]
    fn log_path_ends_with_app_file() {
        let path = determine_log_path().unwrap();
        assert!(path.ends_with(Path::new(APP_NAME).join(LOG_FILE)));
    }
}
