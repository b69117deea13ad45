//! Output formats.

use std::fmt;
use std::str::FromStr;

use crate::EngineError;

/// Output format for rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Raster image.
    Png,
    /// Vector image.
    Svg,
    /// PDF document.
    Pdf,
    /// ASCII art.
    Txt,
}

impl OutputFormat {
    /// Parse a format identifier, ignoring case.
    ///
    /// `utxt` and `atxt` are accepted as aliases of [`OutputFormat::Txt`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownFormat`] for anything else.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "pdf" => Ok(Self::Pdf),
            "txt" | "utxt" | "atxt" => Ok(Self::Txt),
            _ => Err(EngineError::UnknownFormat(s.to_owned())),
        }
    }

    /// File extension of artifacts in this format (without the dot).
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
            Self::Txt => "txt",
        }
    }

    /// Kroki output type segment.
    #[must_use]
    pub fn kroki_type(self) -> &'static str {
        // Kroki names its output types after the extensions.
        self.extension()
    }
}

impl FromStr for OutputFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(OutputFormat::parse("PNG").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::parse("Svg").unwrap(), OutputFormat::Svg);
        assert_eq!(OutputFormat::parse("pdf").unwrap(), OutputFormat::Pdf);
    }

    #[test]
    fn test_parse_text_aliases() {
        for alias in ["txt", "utxt", "ATXT"] {
            assert_eq!(OutputFormat::parse(alias).unwrap(), OutputFormat::Txt);
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = OutputFormat::parse("gif").unwrap_err();
        assert!(matches!(err, EngineError::UnknownFormat(ref f) if f == "gif"));
        assert!(err.to_string().contains("gif"));
    }

    #[test]
    fn test_from_str() {
        let format: OutputFormat = "svg".parse().unwrap();
        assert_eq!(format, OutputFormat::Svg);
        assert_eq!(format.to_string(), "svg");
    }
}
