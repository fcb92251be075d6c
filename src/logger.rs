//! Terminal output: colored log lines and a progress bar.
//!
//! ```ignore
//! log!("schema"; "loaded {} content types", count);
//! log!("warn"; "post `{}` is missing `{}`", slug, field);
//!
//! if let Some(progress) = Progress::start("render", jobs.len()) {
//!     progress.inc();
//! }
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// Terminal width, fetched once. 120 columns when detection fails.
fn terminal_width() -> usize {
    static WIDTH: OnceLock<u16> = OnceLock::new();
    *WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120)) as usize
}

/// Set while a bar occupies the last terminal line; log lines go above it.
static BAR_ACTIVE: AtomicBool = AtomicBool::new(false);

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Print `[module] message`. Single-line messages are cut to the terminal width.
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let message = if message.contains('\n') {
        message
    } else {
        truncate_str(message, terminal_width().saturating_sub(prefix_width(module)))
    };

    let mut stdout = stdout().lock();
    let bar_active = BAR_ACTIVE.load(Ordering::SeqCst);
    if bar_active {
        execute!(stdout, cursor::MoveUp(1), Clear(ClearType::FromCursorDown)).ok();
    }
    writeln!(stdout, "{prefix} {message}").ok();
    if bar_active {
        // the bar redraws itself into this line on its next update
        writeln!(stdout).ok();
    }
    stdout.flush().ok();
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module {
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "build" | "check" => prefix.bright_green().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// `[module] ` on screen.
const fn prefix_width(module: &str) -> usize {
    module.len() + 3
}

/// Truncate to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Progress Bar
// ============================================================================

const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

/// One in-place progress bar on the last terminal line: `[render] [███░░] 3/5`.
///
/// Updated from rayon workers; redraws are serialized by a `parking_lot`
/// mutex. The line is cleared on drop.
pub struct Progress {
    name: &'static str,
    total: usize,
    current: AtomicUsize,
    lock: parking_lot::Mutex<()>,
}

impl Progress {
    /// `None` for at most one item, where a bar would only flicker.
    pub fn start(name: &'static str, total: usize) -> Option<Self> {
        if total <= 1 {
            return None;
        }

        let mut stdout = stdout().lock();
        writeln!(stdout).ok();
        stdout.flush().ok();
        BAR_ACTIVE.store(true, Ordering::SeqCst);

        Some(Self {
            name,
            total,
            current: AtomicUsize::new(0),
            lock: parking_lot::Mutex::new(()),
        })
    }

    pub fn inc(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        let line = bar_line(self.name, current, self.total, terminal_width());

        let _guard = self.lock.lock();
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveUp(1), Clear(ClearType::CurrentLine)).ok();
        writeln!(stdout, "\r{} {line}", colorize_prefix(self.name)).ok();
        stdout.flush().ok();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        let _guard = self.lock.lock();
        BAR_ACTIVE.store(false, Ordering::SeqCst);

        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveUp(1), Clear(ClearType::CurrentLine)).ok();
        stdout.flush().ok();
    }
}

/// Bar and counter after the prefix, sized to fit `width` columns.
fn bar_line(name: &str, current: usize, total: usize, width: usize) -> String {
    let count = format!("{current}/{total}");
    // "[" and "] " around the bar
    let overhead = prefix_width(name) + 3 + count.len();
    let bar_width = width
        .saturating_sub(overhead)
        .clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);

    let filled = (current.min(total) * bar_width).checked_div(total).unwrap_or(0);
    format!(
        "[{}{}] {count}",
        "█".repeat(filled),
        "░".repeat(bar_width - filled)
    )
}
