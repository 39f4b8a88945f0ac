//! Error types for configuration reading.

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced while reading configuration text.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading a configuration file.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// A non-blank, non-comment line that is neither a section header nor a
    /// `key = value` pair.
    #[error("malformed line at line {line}")]
    MalformedLine {
        /// 0-indexed line number of the offending line.
        line: usize,
    },
}
