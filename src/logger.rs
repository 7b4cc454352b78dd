//! Quilt session log.
//!
//! One file per data directory, `PixelQuilt/pixel_quilt.log`, rewritten on
//! every start so it covers only the last GUI session or maintenance run.
//! Background threads (quilt writer, store pollers) log through the same
//! file; every line carries the thread name.
//!
//! Maintenance runs also copy warnings to stderr so operators see them next
//! to the prompts; errors reach stderr through the command's own report.
//!
//! `log_info!`, `log_warn!` and `log_err!` do nothing until [`init`] has run.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Folder under the platform data directory that holds the log and cache.
pub const APP_DIR: &str = "PixelQuilt";
const LOG_FILE_NAME: &str = "pixel_quilt.log";

// ============================================================================
// LEVELS & MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Which front end owns this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Gui,
    Maintenance,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Gui => "gui",
            Mode::Maintenance => "maintenance",
        }
    }
}

struct Sink {
    file: Mutex<File>,
    path: PathBuf,
    mode: Mode,
}

static SINK: OnceLock<Sink> = OnceLock::new();

// ============================================================================
// WRITING
// ============================================================================

/// Log file of this run, once [`init`] succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK.get().map(|s| &s.path)
}

/// `[time] [thread] [LEVEL] message`
pub fn format_line(time: &str, thread: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] [{}] {}", time, thread, level.tag(), msg)
}

fn append(sink: &Sink, line: &str) {
    if let Ok(mut file) = sink.file.lock() {
        let _ = writeln!(file, "{}", line);
    }
}

pub fn write(level: Level, msg: &str) {
    let Some(sink) = SINK.get() else {
        return;
    };
    let current = std::thread::current();
    let thread = current.name().unwrap_or("worker");
    append(sink, &format_line(&timestamp(), thread, level, msg));
    if sink.mode == Mode::Maintenance && level == Level::Warn {
        eprintln!("warning: {}", msg);
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    };
}

// ============================================================================
// SETUP
// ============================================================================

/// Open (and truncate) the log for this run and route panics into it.
/// Failing to open the file only disables logging.
pub fn init(mode: Mode) {
    let path = app_data_dir().join(LOG_FILE_NAME);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("pixel-quilt: no log file at {}: {}", path.display(), e);
            return;
        }
    };
    let sink = Sink {
        file: Mutex::new(file),
        path,
        mode,
    };
    if SINK.set(sink).is_err() {
        return;
    }

    if let Some(sink) = SINK.get() {
        append(
            sink,
            &format!(
                "--- pixel-quilt {} {} ({}) ---",
                env!("CARGO_PKG_VERSION"),
                mode.name(),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z")
            ),
        );
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(sink) = SINK.get() {
            let current = std::thread::current();
            let thread = current.name().unwrap_or("worker");
            let msg = format!("panic: {}", info);
            append(sink, &format_line(&timestamp(), thread, Level::Error, &msg));
        }
        prev(info);
    }));
}

/// `<data_dir>/PixelQuilt`, shared by the log and the offline cache.
pub fn app_data_dir() -> PathBuf {
    data_dir().join(APP_DIR)
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support");
        }
    }
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}
