//! Error types for the query pipeline.
//!
//! Every stage of `xq` (argument resolution, input resolution, parsing,
//! querying and output) reports failures through a single [`XqError`] value.
//! All failures are terminal for the invocation: nothing is retried, and the
//! `Display` output of an error is what the command-line front end prints.

use std::fmt;
use std::io;

use thiserror::Error;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the decoded input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// Computes the line and column of a byte offset into `text`.
    ///
    /// Offsets past the end of `text` are clamped to its length; offsets that
    /// fall inside a multi-byte character are moved back to its first byte.
    #[must_use]
    pub fn from_offset(text: &str, byte_offset: usize) -> Self {
        let mut offset = byte_offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
            byte_offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The underlying cause of an [`XqError::InvalidSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// Opening or reading a local file (or stdin) failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The HTTP request failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The HTTP response status was not in the 2xx range.
    #[error("unexpected http status {0}")]
    HttpStatus(reqwest::StatusCode),

    /// The source is a URI whose scheme `xq` cannot fetch.
    #[error("unsupported url scheme `{0}`")]
    UnsupportedScheme(String),

    /// The source looks like an `http`, `https` or `file` URI but is not a
    /// valid one.
    #[error("malformed url: {0}")]
    MalformedUrl(#[from] url::ParseError),
}

impl SourceError {
    /// Returns the I/O error kind if this is a filesystem or stdin failure.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// The error type returned by every `xq` operation.
#[derive(Debug, Error)]
pub enum XqError {
    /// No source could be resolved (empty source specifier).
    #[error("no input")]
    NoInput,

    /// The byte stream could not be acquired or read.
    #[error("invalid source `{spec}`: {reason}")]
    InvalidSource {
        /// The source specifier as given by the caller.
        spec: String,
        /// What went wrong.
        #[source]
        reason: SourceError,
    },

    /// The resolved XPath expression was empty.
    #[error("missing xpath expression argument")]
    MissingXpathExpression,

    /// The document could not be decoded or parsed.
    #[error("xmlparse error at {location}: {message}")]
    MalformedDocument {
        /// The parser diagnostic.
        message: String,
        /// Where in the decoded input the failure occurred.
        location: SourceLocation,
    },

    /// The XPath expression is empty, syntactically invalid, or failed to
    /// evaluate.
    #[error("xmlquery error: {0}")]
    InvalidExpression(String),

    /// Writing a serialized match failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl XqError {
    /// Builds an [`XqError::InvalidSource`] for the given specifier.
    pub fn invalid_source(spec: impl Into<String>, reason: impl Into<SourceError>) -> Self {
        Self::InvalidSource {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is an output failure caused by the reader
    /// of stdout going away (e.g. `xq ... | head -1`).
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Output(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_source_location_from_offset() {
        let text = "<a>\n  <b>\n</a>";
        let loc = SourceLocation::from_offset(text, 6);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 3);
        assert_eq!(loc.byte_offset, 6);
    }

    #[test]
    fn test_source_location_counts_characters() {
        // "é" is two bytes but one column
        let text = "<é>x";
        let loc = SourceLocation::from_offset(text, 3);
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 3);
    }

    #[test]
    fn test_source_location_offset_past_end() {
        let loc = SourceLocation::from_offset("<", 10);
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 2);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(XqError::NoInput.to_string(), "no input");
        assert_eq!(
            XqError::MissingXpathExpression.to_string(),
            "missing xpath expression argument"
        );
        assert_eq!(
            XqError::InvalidExpression("XPath was empty".to_string()).to_string(),
            "xmlquery error: XPath was empty"
        );
    }

    #[test]
    fn test_invalid_source_display() {
        let err = XqError::invalid_source("ftp://", SourceError::UnsupportedScheme("ftp".into()));
        assert_eq!(
            err.to_string(),
            "invalid source `ftp://`: unsupported url scheme `ftp`"
        );
    }

    #[test]
    fn test_http_status_display() {
        let err = XqError::invalid_source(
            "http://host/a.xml",
            SourceError::HttpStatus(reqwest::StatusCode::MULTIPLE_CHOICES),
        );
        assert_eq!(
            err.to_string(),
            "invalid source `http://host/a.xml`: unexpected http status 300 Multiple Choices"
        );
    }

    #[test]
    fn test_invalid_source_keeps_io_cause() {
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = XqError::invalid_source("note.xml", io);
        match &err {
            XqError::InvalidSource { reason, .. } => {
                assert_eq!(reason.io_kind(), Some(io::ErrorKind::NotFound));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let _: &dyn std::error::Error = &err;
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_broken_pipe_detection() {
        let err = XqError::Output(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(err.is_broken_pipe());
        assert!(!XqError::NoInput.is_broken_pipe());
    }
}
