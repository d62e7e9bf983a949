//! Session log for the engine and the headless CLI.
//!
//! [`init`] opens `<data dir>/brushwork/brushwork.log`, truncating whatever
//! the previous run left there, and mirrors panics into it.  Before that the
//! `log_info!` / `log_warn!` / `log_err!` macros go nowhere, which keeps
//! library embedders and the test suite off the filesystem.
//!
//! Data dir per platform:
//!   Windows:  `%APPDATA%`
//!   macOS:    `~/Library/Application Support`
//!   other:    `$XDG_DATA_HOME`, else `~/.local/share`

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

/// Where lines end up once the logger is live.
struct Sink {
    file: Option<File>,
    path: Option<PathBuf>,
    echo_stderr: bool,
}

impl Sink {
    fn emit(&mut self, line: &str) {
        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "{line}");
        }
        if self.echo_stderr {
            eprintln!("{line}");
        }
    }
}

static SINK: OnceLock<Mutex<Sink>> = OnceLock::new();

/// Path of the live session log, if one was opened.
pub fn log_path() -> Option<PathBuf> {
    SINK.get()?.lock().ok()?.path.clone()
}

/// Log `msg` at `level`.  A no-op until [`init`] ran; I/O errors are dropped.
pub fn write(level: Level, msg: &str) {
    let Some(sink) = SINK.get() else { return };
    if let Ok(mut sink) = sink.lock() {
        sink.emit(&format_line(level, unix_seconds(), msg));
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the session log at the default location.
pub fn init(echo_stderr: bool) {
    init_at(&data_dir().join("brushwork").join("brushwork.log"), echo_stderr);
}

/// Open (truncating) the session log at `path` and hook panics into it.
/// First call wins.  An unopenable file still leaves stderr echo working.
pub fn init_at(path: &Path, echo_stderr: bool) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(path) {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("[logger] cannot open {}: {e}", path.display());
            None
        }
    };
    let opened = file.is_some();
    let sink = Sink { file, path: opened.then(|| path.to_path_buf()), echo_stderr };
    if SINK.set(Mutex::new(sink)).is_err() {
        return;
    }

    if let Some(sink) = SINK.get()
        && let Ok(mut sink) = sink.lock()
    {
        sink.emit(&format!("=== brushwork session (unix {}) ===", unix_seconds()));
        if opened {
            sink.emit(&format!("log: {}", path.display()));
        }
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        prev(info);
    }));
}

fn data_dir() -> PathBuf {
    let var = |name: &str| std::env::var_os(name).map(PathBuf::from);
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = var("APPDATA") {
            return appdata;
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = var("HOME") {
            return home.join("Library").join("Application Support");
        }
    }
    var("XDG_DATA_HOME")
        .or_else(|| var("HOME").map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// `[HH:MM:SS] [LEVEL] msg`, clock in UTC.
fn format_line(level: Level, unix_secs: u64, msg: &str) -> String {
    let day = unix_secs % 86_400;
    format!("[{:02}:{:02}:{:02}] [{}] {}", day / 3600, (day % 3600) / 60, day % 60, level.tag(), msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_utc_clock_and_level() {
        let secs = 3 * 86_400 + 13 * 3600 + 5 * 60 + 9;
        assert_eq!(format_line(Level::Warn, secs, "empty upload"), "[13:05:09] [WARN] empty upload");
    }

    #[test]
    fn macros_are_silent_before_init() {
        log_info!("layer {} created", 3);
        log_err!("nothing listens yet");
    }
}
