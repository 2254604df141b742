//! FFmpeg setup and log level control.
//!
//! FFmpeg has its own logging, separate from the Rust [`log`] facade. By
//! default it prints warnings to stderr, which is noisy when decoding
//! slightly broken files. [`set_codec_log_level`] tunes it without the
//! caller importing `ffmpeg-next`.
//!
//! ```no_run
//! use reframe::CodecLogLevel;
//!
//! reframe::set_codec_log_level(CodecLogLevel::Error);
//! ```

use std::path::Path;

use ffmpeg_next::util::log::Level;

use crate::error::ReframeError;

/// FFmpeg log verbosity, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecLogLevel {
    /// Print nothing.
    Quiet,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Debugging output.
    Debug,
}

impl CodecLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            CodecLogLevel::Quiet => Level::Quiet,
            CodecLogLevel::Fatal => Level::Fatal,
            CodecLogLevel::Error => Level::Error,
            CodecLogLevel::Warning => Level::Warning,
            CodecLogLevel::Info => Level::Info,
            CodecLogLevel::Debug => Level::Debug,
        }
    }

    /// Parse a level name as accepted by the CLI.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Some(CodecLogLevel::Quiet),
            "fatal" | "panic" => Some(CodecLogLevel::Fatal),
            "error" => Some(CodecLogLevel::Error),
            "warning" | "warn" => Some(CodecLogLevel::Warning),
            "info" | "verbose" => Some(CodecLogLevel::Info),
            "debug" | "trace" => Some(CodecLogLevel::Debug),
            _ => None,
        }
    }
}

/// Set FFmpeg's internal log verbosity.
///
/// Does not affect Rust-side `log` output.
pub fn set_codec_log_level(level: CodecLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Which side of FFmpeg a caller is setting up, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Decode,
    Encode,
}

/// Initialise FFmpeg. Safe to call more than once.
///
/// A failure is a [`ReframeError::DecodeFailure`] or an
/// [`ReframeError::EncodeFailure`] on `path`, following `direction`.
pub(crate) fn init(path: &Path, direction: Direction) -> Result<(), ReframeError> {
    ffmpeg_next::init().map_err(|error| init_failure(path, direction, &error.to_string()))
}

fn init_failure(path: &Path, direction: Direction, reason: &str) -> ReframeError {
    let path = path.to_path_buf();
    let reason = format!("FFmpeg initialisation failed: {reason}");
    match direction {
        Direction::Decode => ReframeError::DecodeFailure {
            path,
            index: 0,
            reason,
        },
        Direction::Encode => ReframeError::EncodeFailure { path, reason },
    }
}
