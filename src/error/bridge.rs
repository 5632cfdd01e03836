//! Process-wide runtime-error trap.
//!
//! The bridge receives runtime faults reported by the hosting application,
//! forwards them to a registered callback (the emitter installs one that
//! either re-binds the view to a 500 page or escalates to a structured
//! error), de-duplicates log output per distinct fault, and trips a
//! circuit breaker after 100 observed errors in the process.

use crate::error::Result;
use dashmap::DashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Runtime fault severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Fatal,
    Warning,
    Parse,
    Notice,
    CoreFatal,
    CoreWarning,
    Strict,
    Deprecated,
}

impl ErrorLevel {
    /// Numeric severity code carried by escalated errors
    pub fn code(&self) -> i32 {
        match self {
            ErrorLevel::Fatal => 1,
            ErrorLevel::Warning => 2,
            ErrorLevel::Parse => 4,
            ErrorLevel::Notice => 8,
            ErrorLevel::CoreFatal => 16,
            ErrorLevel::CoreWarning => 32,
            ErrorLevel::Strict => 2048,
            ErrorLevel::Deprecated => 8192,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLevel::Fatal => "FATAL",
            ErrorLevel::Warning => "WARNING",
            ErrorLevel::Parse => "PARSE",
            ErrorLevel::Notice => "NOTICE",
            ErrorLevel::CoreFatal => "CORE_FATAL",
            ErrorLevel::CoreWarning => "CORE_WARNING",
            ErrorLevel::Strict => "STRICT",
            ErrorLevel::Deprecated => "DEPRECATED",
        }
    }
}

/// Every severity the bridge can intercept
pub const CATCH_ALL: &[ErrorLevel] = &[
    ErrorLevel::Fatal,
    ErrorLevel::Warning,
    ErrorLevel::Parse,
    ErrorLevel::Notice,
    ErrorLevel::CoreFatal,
    ErrorLevel::CoreWarning,
    ErrorLevel::Strict,
    ErrorLevel::Deprecated,
];

/// Number of observed errors after which the process is terminated
const ERROR_LIMIT: usize = 100;

type FailFast = Box<dyn Fn() + Send + Sync>;

/// Error counter and dedupe filter shared by every bridge in the process.
///
/// Constructed once by the caller and injected, so tests can use a fresh
/// state per test instead of ambient globals.
pub struct ProcessErrorState {
    count: AtomicUsize,
    seen: DashMap<u32, ()>,
    tripped: AtomicBool,
    fail_fast: FailFast,
}

impl Default for ProcessErrorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessErrorState {
    /// State whose circuit breaker terminates the process
    pub fn new() -> Self {
        Self::with_fail_fast(Box::new(|| std::process::exit(1)))
    }

    /// State with a custom breaker action, for test harnesses
    pub fn with_fail_fast(fail_fast: FailFast) -> Self {
        Self {
            count: AtomicUsize::new(0),
            seen: DashMap::new(),
            tripped: AtomicBool::new(false),
            fail_fast,
        }
    }

    pub fn error_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    fn observe(&self) {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= ERROR_LIMIT {
            self.tripped.store(true, Ordering::SeqCst);
            (self.fail_fast)();
        }
    }

    /// Record a checksum; returns true the first time it is seen
    fn first_occurrence(&self, checksum: u32) -> bool {
        self.seen.insert(checksum, ()).is_none()
    }
}

type Handler = Box<dyn Fn(&str, ErrorLevel, bool, bool) -> Result<()> + Send + Sync>;

/// Runtime-error trap with per-fault dedupe and a fail-safe valve
pub struct ErrorBridge {
    display_errors: bool,
    log_errors: bool,
    log_file: Option<PathBuf>,
    catch_levels: Vec<ErrorLevel>,
    message_template: Option<String>,
    handler: Option<Handler>,
    state: Arc<ProcessErrorState>,
}

impl ErrorBridge {
    pub fn new(
        display_errors: bool,
        log_errors: bool,
        log_file: Option<PathBuf>,
        state: Arc<ProcessErrorState>,
    ) -> Self {
        Self {
            display_errors,
            log_errors,
            log_file,
            catch_levels: Vec::new(),
            message_template: None,
            handler: None,
            state,
        }
    }

    /// Custom message template; `{message}`, `{file}` and `{line}` expand
    pub fn set_message(&mut self, template: impl Into<String>) {
        self.message_template = Some(template.into());
    }

    pub fn set_error_levels(&mut self, levels: &[ErrorLevel]) {
        self.catch_levels = levels.to_vec();
    }

    /// Register the forward callback, optionally updating the catch set.
    ///
    /// The callback receives the formatted message, the severity, whether the
    /// severity is in the catch set, and whether errors are displayed.
    pub fn set_handler<F>(&mut self, handler: F, levels: Option<&[ErrorLevel]>)
    where
        F: Fn(&str, ErrorLevel, bool, bool) -> Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        if let Some(levels) = levels {
            self.catch_levels = levels.to_vec();
        }
    }

    fn format_message(&self, message: &str, file: &str, line: u32) -> String {
        match &self.message_template {
            Some(template) => template
                .replace("{message}", message)
                .replace("{file}", file)
                .replace("{line}", &line.to_string()),
            None => format!("{} in {} on line {}", message, file, line),
        }
    }

    /// Report one runtime fault to the bridge.
    ///
    /// Forwards to the registered callback, writes at most one log line per
    /// distinct fault (unless errors are not displayed, then every
    /// occurrence is logged), and feeds the process-wide circuit breaker.
    /// Once the breaker has tripped no further callback runs.
    pub fn report(&self, level: ErrorLevel, message: &str, file: &str, line: u32) -> Result<()> {
        if self.state.is_tripped() {
            return Ok(());
        }

        let msg = self.format_message(message, file, line);
        let has_error = self.catch_levels.contains(&level);
        let checksum = fault_checksum(message, file, line);

        let forwarded = match &self.handler {
            Some(handler) => handler(&msg, level, has_error, self.display_errors),
            None => Ok(()),
        };

        if self.log_errors {
            // Checksum must be recorded whether or not this bridge displays
            let first = self.state.first_occurrence(checksum);
            if !self.display_errors || first {
                log::error!("ErrorID {}: [{}] {}", checksum, level.as_str(), msg);
                if let Some(path) = &self.log_file {
                    if let Err(err) = append_log_line(path, checksum, level, &msg) {
                        log::warn!("Could not write error log {}: {}", path.display(), err);
                    }
                }
            }
        }

        self.state.observe();
        forwarded
    }
}

fn append_log_line(path: &Path, checksum: u32, level: ErrorLevel, msg: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "ErrorID {}: [{}] {}", checksum, level.as_str(), msg)
}

/// Deterministic fnv1a-32 checksum of message + file basename + line,
/// used to key the dedupe filter and correlate rendered pages with logs
pub fn fault_checksum(message: &str, file: &str, line: u32) -> u32 {
    let basename = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file);
    let line = line.to_string();
    let mut hash: u32 = 0x811c_9dc5;
    for byte in message
        .bytes()
        .chain(basename.bytes())
        .chain(line.bytes())
    {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
