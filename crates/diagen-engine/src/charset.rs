//! Source and sidecar text encodings.

use std::path::Path;

use crate::EngineError;

const UTF8_BOM: &str = "\u{feff}";

/// Supported text encodings.
///
/// Only encodings that map bytes to chars without tables are handled here.
/// Everything else (UTF-16, Windows-125x, `Shift_JIS` and other multi-byte or
/// table-driven sets) is rejected by [`Charset::parse`], which fails the
/// affected tasks and is reported by `diagen check-config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Ascii,
    Latin1,
}

impl Charset {
    /// Parse a charset name such as `UTF-8`, `utf8`, `US-ASCII` or `ISO-8859-1`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsupportedCharset`] for other names.
    pub fn parse(name: &str) -> Result<Self, EngineError> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "utf8" => Ok(Self::Utf8),
            "ascii" | "usascii" => Ok(Self::Ascii),
            "iso88591" | "latin1" => Ok(Self::Latin1),
            _ => Err(EngineError::UnsupportedCharset(name.to_owned())),
        }
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Ascii => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode file content. `path` is only used in error messages.
    ///
    /// A leading UTF-8 byte order mark is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSource`] if the bytes are not valid in
    /// this charset.
    pub fn decode(self, bytes: &[u8], path: &Path) -> Result<String, EngineError> {
        let invalid = |message: String| EngineError::InvalidSource {
            path: path.to_path_buf(),
            message,
        };
        match self {
            Self::Utf8 => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| invalid(format!("not valid UTF-8: {e}")))?;
                Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text).to_owned())
            }
            Self::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(invalid(format!("non-ASCII byte at offset {pos}")));
                }
                // All bytes are ASCII, so this cannot fail.
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Encode text for writing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unencodable`] for the first character outside
    /// the charset.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EngineError> {
        let limit = match self {
            Self::Utf8 => return Ok(text.as_bytes().to_vec()),
            Self::Ascii => 0x7f,
            Self::Latin1 => 0xff,
        };
        text.chars()
            .map(|ch| {
                u8::try_from(u32::from(ch))
                    .ok()
                    .filter(|&b| u32::from(b) <= limit)
                    .ok_or(EngineError::Unencodable {
                        charset: self.name(),
                        ch,
                    })
            })
            .collect()
    }
}
