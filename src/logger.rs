//! Logging utilities with colored output and user notices.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro for output that only appears with `--verbose`
//! - `Notice` for short user-facing status messages (sync results, warnings)
//!
//! # Example
//!
//! ```ignore
//! log!("gateway"; "http://{}", addr);
//! debug!("cache"; "hit: {}", path.display());
//! notice_success("3 links updated");
//! ```

use crossterm::{
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument or `debug = true`)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "gateway" | "proxy" => prefix.bright_blue().bold().to_string(),
        "watch" => prefix.bright_green().bold().to_string(),
        "sync" => prefix.bright_magenta().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Notices
// ============================================================================

/// Get current UTC time formatted as HH:MM:SS
fn now() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Kind of user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeKind {
    fn symbol(self) -> String {
        match self {
            Self::Success => "✓".green().to_string(),
            Self::Info => String::new(),
            Self::Warning => "⚠".yellow().to_string(),
            Self::Error => "✗".red().to_string(),
        }
    }
}

/// Non-blocking status line shown to the user.
///
/// Transient failures (a single asset that could not be fetched, a link
/// that could not be found) surface here instead of aborting the operation.
pub struct Notice {
    /// Notices printed so far, per kind (success, info, warning, error).
    counts: [usize; 4],
}

/// Global notice printer, serialized so concurrent notices don't interleave.
static NOTICE: LazyLock<Mutex<Notice>> = LazyLock::new(|| Mutex::new(Notice::new()));

impl Notice {
    pub const fn new() -> Self {
        Self { counts: [0; 4] }
    }

    /// Render one notice line with timestamp and symbol.
    fn render(kind: NoticeKind, message: &str) -> String {
        let timestamp = format!("[{}]", now()).dimmed().to_string();
        let symbol = kind.symbol();
        match kind {
            NoticeKind::Info => format!("{timestamp} {}", message.dimmed()),
            _ if symbol.is_empty() => format!("{timestamp} {message}"),
            _ => format!("{timestamp} {symbol} {message}"),
        }
    }

    pub fn show(&mut self, kind: NoticeKind, message: &str) {
        let line = Self::render(kind, message);
        let mut stdout = stdout().lock();
        writeln!(stdout, "{line}").ok();
        stdout.flush().ok();
        self.counts[kind as usize] += 1;
    }

    #[cfg(test)]
    fn count(&self, kind: NoticeKind) -> usize {
        self.counts[kind as usize]
    }
}

/// Global notice: success
pub fn notice_success(message: &str) {
    NOTICE.lock().show(NoticeKind::Success, message);
}

/// Global notice: informational
pub fn notice_info(message: &str) {
    NOTICE.lock().show(NoticeKind::Info, message);
}

/// Global notice: warning
pub fn notice_warning(message: &str) {
    NOTICE.lock().show(NoticeKind::Warning, message);
}

/// Global notice: error
pub fn notice_error(message: &str) {
    NOTICE.lock().show(NoticeKind::Error, message);
}

// ============================================================================
// Tests
// ============================================================================
