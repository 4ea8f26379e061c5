//! Error types and position tracking.
//!
//! Every failure the library can produce is a [`ConfigError`]. The variants
//! mirror the distinct failure classes of the API: file access, parsing,
//! path lookup, name collisions, type mismatches, and malformed arguments.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A position in a source file.
///
/// Lines and columns are 1-based; the column refers to a character, not a
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based).
    pub column: usize,
}

impl Position {
    /// Creates a position at the given line and column.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Creates a position at the start of input.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Main error type for all configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file could not be opened, read, written, or enumerated. Also
    /// reported when the include depth limit is exceeded.
    #[error("I/O error on '{}': {source}", path.display())]
    FileIo {
        /// The path the operation failed on.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A tokenizer or grammar violation.
    #[error("parse error: {message} ({}:{line}:{column})", file.display())]
    Parse {
        /// Description of the violation.
        message: String,
        /// The file being parsed.
        file: PathBuf,
        /// Line of the offending token (1-based).
        line: usize,
        /// Column of the offending token (1-based).
        column: usize,
    },

    /// A component of a lookup path did not resolve.
    #[error("setting not found: '{path}'")]
    SettingNotFound {
        /// The full path as requested by the caller.
        path: String,
    },

    /// An insertion would duplicate a name within a group.
    #[error("setting name already in use: '{path}'")]
    SettingName {
        /// Path of the offending insertion.
        path: String,
    },

    /// A conversion or operation is not supported by the setting's type.
    #[error("type error: {message}")]
    SettingType {
        /// Description of the mismatch.
        message: String,
    },

    /// A malformed argument: empty or dot-delimited-wrong path, negative
    /// index, empty name or filename.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConfigError::FileIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(
        message: impl Into<String>,
        file: impl Into<PathBuf>,
        position: Position,
    ) -> Self {
        ConfigError::Parse {
            message: message.into(),
            file: file.into(),
            line: position.line,
            column: position.column,
        }
    }

    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        ConfigError::SettingNotFound { path: path.into() }
    }

    pub(crate) fn name_clash(path: impl Into<String>) -> Self {
        ConfigError::SettingName { path: path.into() }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        ConfigError::SettingType {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        ConfigError::InvalidArgument {
            message: message.into(),
        }
    }

    /// The source position of a parse error, if this is one.
    pub fn position(&self) -> Option<Position> {
        match self {
            ConfigError::Parse { line, column, .. } => Some(Position::new(*line, *column)),
            _ => None,
        }
    }

    /// The file a parse or I/O error refers to, if any.
    pub fn file(&self) -> Option<&Path> {
        match self {
            ConfigError::Parse { file, .. } => Some(file),
            ConfigError::FileIo { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
