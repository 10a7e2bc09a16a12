//! Leveled logging routed through a single pluggable sink
//!
//! Levels mirror the layout engine's message levels (0 = fatal, 5 = default,
//! 7 = verbose) so engine callback messages and renderer messages share one
//! scale. Console output goes through the [`log`] facade, so hosts plug in
//! `env_logger` or any other `log` sink; a custom handler bypasses the facade
//! entirely. No level ever aborts the process.

use std::sync::Arc;

/// Log level, on the layout engine's numeric scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Only fatal errors that result in subtitles not being rendered.
    Fatal,
    /// Fatal errors and additional useful information.
    Default,
    /// All messages.
    Verbose,
}

impl LogLevel {
    /// Engine-scale numeric value of the level.
    pub fn raw(self) -> i32 {
        match self {
            Self::Fatal => 0,
            Self::Default => 5,
            Self::Verbose => 7,
        }
    }

    /// Bucket a raw engine level into a [`LogLevel`].
    ///
    /// Engine levels run 0..=7; anything above is not a level we report.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            i32::MIN..=0 => Some(Self::Fatal),
            1..=5 => Some(Self::Default),
            6..=7 => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// One log entry: message text and its level.
#[derive(Debug, Clone)]
pub struct LogMessage {
    /// Output message.
    pub message: String,
    /// Output message level.
    pub level: LogLevel,
}

/// Where log messages are sent.
#[derive(Clone)]
pub enum LogOutput {
    /// Route messages at or above the given level through the [`log`] facade.
    Console(LogLevel),
    /// Send every message to a custom handler.
    Custom(Arc<dyn Fn(LogMessage) + Send + Sync>),
}

/// Prefixing, filtering logger shared by the renderer session and the engine
/// message callback.
#[derive(Clone)]
pub struct Logger {
    prefix: &'static str,
    output: LogOutput,
}

impl Logger {
    /// Create a logger with the given output.
    pub fn new(output: LogOutput) -> Self {
        Self {
            prefix: "ass-overlay",
            output,
        }
    }

    /// Log a message at a level.
    pub fn log(&self, message: &str, level: LogLevel) {
        match &self.output {
            LogOutput::Console(threshold) => {
                if level > *threshold {
                    return;
                }
                match level {
                    LogLevel::Fatal => log::error!("[{}] {message}", self.prefix),
                    LogLevel::Default => log::info!("[{}] {message}", self.prefix),
                    LogLevel::Verbose => log::trace!("[{}] {message}", self.prefix),
                }
            }
            LogOutput::Custom(handler) => handler(LogMessage {
                message: format!("[{}] {message}", self.prefix),
                level,
            }),
        }
    }

    /// Log a raw engine-level message from the layout engine callback.
    pub fn log_engine(&self, raw_level: i32, message: &str) {
        if let Some(level) = LogLevel::from_raw(raw_level) {
            self.log(message, level);
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogOutput::Console(if cfg!(debug_assertions) {
            LogLevel::Default
        } else {
            LogLevel::Fatal
        }))
    }
}
