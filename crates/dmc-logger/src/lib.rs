//! User-facing console output and the per-run log file
//!
//! Libraries log through `tracing`; this crate is what the CLI prints and
//! what lands in `dmc.log`. Each file line carries a timestamp, the level
//! and the tenant the command is working on:
//!
//! ```text
//! 2026-03-02T14:07:31.412+01:00 WARN  [0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11] storage root left in place
//! ```

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LOG_FILE_NAME: &str = "dmc.log";

const NO_TENANT: &str = "-";
const SPINNER_TICKS: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Debug,
    Success,
    Warn,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Success => "OK",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    fn console_prefix(self) -> ColoredString {
        match self {
            Level::Debug => "debug:".blue().bold(),
            Level::Success => "\u{2714}".green().bold(),
            Level::Warn => "warning:".yellow().bold(),
            Level::Error => "error:".red().bold(),
        }
    }
}

#[derive(Default)]
struct State {
    log_file: Option<PathBuf>,
    verbosity: u8,
    no_stdout: bool,
    tenant: Option<String>,
    spinner: Option<ProgressBar>,
}

impl State {
    /// Warnings and errors always reach the console; the rest obey the flags
    fn shows(&self, level: Level) -> bool {
        match level {
            Level::Warn | Level::Error => true,
            Level::Success => !self.no_stdout,
            Level::Debug => !self.no_stdout && self.verbosity > 0,
        }
    }

    fn file_line(&self, level: Level, message: &str) -> String {
        format!(
            "{} {:<5} [{}] {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
            level.label(),
            self.tenant.as_deref().unwrap_or(NO_TENANT),
            message
        )
    }
}

static STATE: Mutex<Option<State>> = Mutex::new(None);

fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    let mut guard = STATE.lock();
    f(guard.get_or_insert_with(State::default))
}

/// Set verbosity and output flags, then start a fresh `dmc.log` in the default directory
pub fn init_with_verbosity(verbosity: u8, no_stdout: bool) -> Result<(), String> {
    with_state(|state| {
        state.verbosity = verbosity;
        state.no_stdout = no_stdout;
    });
    init_in_dir(&default_log_dir()?)
}

/// Start a fresh `dmc.log` in `dir`, discarding the previous run's file
pub fn init_in_dir(dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create log directory: {}", e))?;

    let log_file = dir.join(LOG_FILE_NAME);
    fs::write(&log_file, b"").map_err(|e| format!("Failed to reset {}: {}", log_file.display(), e))?;
    with_state(|state| state.log_file = Some(log_file));
    Ok(())
}

/// `~/.config/dmc`, or the platform config dir on Windows
fn default_log_dir() -> Result<PathBuf, String> {
    let base = if cfg!(target_os = "windows") {
        dirs::config_dir().ok_or("Could not determine config directory")?
    } else {
        dirs::home_dir()
            .ok_or("Could not determine home directory")?
            .join(".config")
    };
    Ok(base.join("dmc"))
}

/// Stamp later log lines with `tenant`, or clear the stamp with `None`
pub fn set_current_tenant(tenant: Option<String>) {
    with_state(|state| state.tenant = tenant);
}

/// Tracing filter level matching the verbosity: `warn`, `debug` (-v), `trace` (-vv)
pub fn verbosity_to_filter() -> String {
    let level = match with_state(|state| state.verbosity) {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    level.to_string()
}

fn emit(level: Level, message: &str) {
    let (line, log_file, to_console) = with_state(|state| {
        (
            state.file_line(level, message),
            state.log_file.clone(),
            state.shows(level),
        )
    });

    if let Some(path) = log_file {
        if let Ok(mut file) = OpenOptions::new().append(true).open(&path) {
            let _ = writeln!(file, "{}", line);
        }
    }
    if to_console {
        eprintln!("{} {}", level.console_prefix(), message);
    }
}

pub fn debug(message: &str) {
    emit(Level::Debug, message);
}

pub fn success(message: &str) {
    emit(Level::Success, message);
}

pub fn warn(message: &str) {
    emit(Level::Warn, message);
}

pub fn error(message: &str) {
    emit(Level::Error, message);
}

/// Tell the user where this run's log went
pub fn show_log_path() {
    let path = with_state(|state| state.log_file.clone())
        .or_else(|| default_log_dir().ok().map(|dir| dir.join(LOG_FILE_NAME)));
    match path {
        Some(path) => eprintln!("Log file: {}", path.display()),
        None => eprintln!("Log file location not available"),
    }
}

/// Show a spinner until the next `spinner_*` call; skipped when verbose or quiet
pub fn spinner_start(message: &str) {
    let spinner = with_state(|state| {
        if state.verbosity > 0 || state.no_stdout {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(&SPINNER_TICKS)
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        state.spinner.replace(spinner.clone());
        Some(spinner)
    });
    if let Some(spinner) = spinner {
        spinner.enable_steady_tick(Duration::from_millis(80));
    }
}

pub fn spinner_success(message: &str) {
    spinner_stop();
    success(message);
}

pub fn spinner_error(message: &str) {
    spinner_stop();
    error(message);
}

pub fn spinner_stop() {
    if let Some(spinner) = with_state(|state| state.spinner.take()) {
        spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_dir() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("failed to create temp dir: {err}"),
        }
    }

    #[test]
    fn test_log_file_receives_messages() {
        let dir = temp_dir();
        assert!(init_in_dir(dir.path()).is_ok());

        set_current_tenant(Some("0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11".to_string()));
        warn("storage root left in place");
        set_current_tenant(None);
        error("runtime unavailable");

        let content = fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap_or_default();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("WARN  [0b4e7a0e-5c1f-4c1a-9f59-8f3f0f7d3a11] storage root left in place"));
        assert!(lines[1].ends_with("ERROR [-] runtime unavailable"));
    }

    #[test]
    fn test_console_gating() {
        let state = State {
            no_stdout: true,
            ..State::default()
        };
        assert!(state.shows(Level::Error));
        assert!(state.shows(Level::Warn));
        assert!(!state.shows(Level::Success));

        let verbose = State {
            verbosity: 1,
            ..State::default()
        };
        assert!(verbose.shows(Level::Debug));
        assert!(!State::default().shows(Level::Debug));
    }

    #[test]
    fn test_verbosity_filter_mapping() {
        for (verbosity, expected) in [(0, "warn"), (1, "debug"), (2, "trace"), (0, "warn")] {
            with_state(|state| state.verbosity = verbosity);
            assert_eq!(verbosity_to_filter(), expected);
        }
    }
}
