//! Engine error types.

use std::path::PathBuf;

/// Errors raised while rendering a single source file.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Format identifier not recognised.
    #[error("unknown output format '{0}' (valid: png, svg, pdf, txt)")]
    UnknownFormat(String),

    /// Charset name not supported.
    #[error("unsupported charset '{0}' (valid: UTF-8, US-ASCII, ISO-8859-1)")]
    UnsupportedCharset(String),

    /// Source text cannot be split into diagram blocks.
    #[error("invalid source {}: {message}", path.display())]
    InvalidSource {
        /// Source file.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// Text cannot be written in the requested charset.
    #[error("character {ch:?} cannot be encoded as {charset}")]
    Unencodable {
        /// Charset name.
        charset: &'static str,
        /// First offending character.
        ch: char,
    },

    /// Rendering service failed.
    #[error("block {index}: HTTP error: {message}")]
    Http {
        /// Block index within the source file.
        index: usize,
        /// Transport error or server response.
        message: String,
    },

    /// Rendering service returned something that is not a PNG.
    #[error("block {index}: invalid PNG data")]
    InvalidPng {
        /// Block index within the source file.
        index: usize,
    },

    /// Reading a source or writing an artifact failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
