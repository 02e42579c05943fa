//! # xq
//!
//! Runs an XPath 1.0 expression against an XML document and prints every
//! match on its own line. The document is read from a local file, a
//! `file://` URI, an `http(s)://` URI or standard input.
//!
//! ## Quick Start
//!
//! ```
//! use xq::{Config, run};
//!
//! let dir = std::env::temp_dir().join(format!("xq-doc-{}", std::process::id()));
//! std::fs::create_dir_all(&dir).unwrap();
//! let path = dir.join("note.xml");
//! std::fs::write(&path, "<note id=\"1\"><to>Tove</to></note>").unwrap();
//!
//! let mut out = Vec::new();
//! let lines = run(path.to_str().unwrap(), "/note/to", &Config::default(), &mut out).unwrap();
//! assert_eq!(lines, 1);
//! assert_eq!(out, b"<to>Tove</to>\n");
//! # std::fs::remove_dir_all(&dir).unwrap();
//! ```

pub mod args;
pub mod config;
pub mod encoding;
pub mod error;
pub mod query;
pub mod serial;
pub mod source;

use std::io::Write;

use tracing::debug;

// Re-export primary types at the crate root for convenience.
pub use config::{BuildInfo, Config, FetchOptions};
pub use error::XqError;
pub use query::{Document, Expression, Match};

/// Resolves `source`, evaluates `expression` against it and writes one line
/// per match to `out`.
///
/// The expression is compiled before the source is opened, and nothing is
/// written until both parsing and evaluation have succeeded. Returns the
/// number of lines written.
///
/// # Errors
///
/// - [`XqError::InvalidExpression`] for an empty, malformed or failing
///   expression.
/// - [`XqError::NoInput`] or [`XqError::InvalidSource`] when the source
///   cannot be opened or read.
/// - [`XqError::MalformedDocument`] when the input is not well-formed XML.
/// - [`XqError::Output`] when writing to `out` fails.
pub fn run<W: Write + ?Sized>(
    source: &str,
    expression: &str,
    config: &Config,
    out: &mut W,
) -> Result<usize, XqError> {
    let expression = Expression::compile(expression)?;
    let input = crate::source::open(source, &config.fetch)?;
    let document = Document::parse(input)?;
    let matches = document.evaluate(&expression)?;
    let lines = serial::write_matches(out, document.prolog(), &matches)?;
    debug!(source, lines, "done");
    Ok(lines)
}
