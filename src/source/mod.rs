//! Input resolution: from a source specifier to a readable byte stream.
//!
//! Resolution happens in two steps. [`classify`] is a pure function that maps
//! the specifier onto a [`Source`] variant; [`open`] dispatches on that
//! variant and acquires the stream. Keeping the two apart makes the
//! precedence rules below testable without touching the filesystem or the
//! network:
//!
//! 1. `-` is standard input, the empty string is no input at all.
//! 2. Anything that parses as an absolute URI is handled by scheme: `http` and
//!    `https` are fetched, `file` becomes a local path built from the host and
//!    path components (so both `file://./note.xml` and `file:///tmp/note.xml`
//!    work), and every other scheme is rejected.
//! 3. Everything else is a local filesystem path.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use tracing::debug;
use url::Url;

use crate::config::FetchOptions;
use crate::error::{SourceError, XqError};

/// The source specifier that selects standard input.
pub const STDIN_SENTINEL: &str = "-";

/// The classification of a source specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Read the process's standard input.
    Stdin,
    /// Fetch an `http://` or `https://` URL.
    Http(Url),
    /// Open the local file named by a `file://` URL.
    File(PathBuf),
    /// Open a plain local path, relative to the working directory or absolute.
    Path(PathBuf),
    /// A URI with a scheme that cannot be fetched (the scheme, lowercased).
    Unsupported(String),
    /// A string with an `http`, `https` or `file` scheme that is not a valid URL.
    MalformedUrl(url::ParseError),
    /// Nothing to read from.
    Empty,
}

/// Classifies a source specifier.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use xq::source::{classify, Source};
///
/// assert_eq!(classify("-"), Source::Stdin);
/// assert_eq!(classify("./note.xml"), Source::Path(PathBuf::from("./note.xml")));
/// assert_eq!(classify("file://./note.xml"), Source::File(PathBuf::from("./note.xml")));
/// assert!(matches!(classify("https://example.org/feed.xml"), Source::Http(_)));
/// assert_eq!(classify("ftp://example.org/a.xml"), Source::Unsupported("ftp".into()));
/// ```
#[must_use]
pub fn classify(spec: &str) -> Source {
    if spec.is_empty() {
        return Source::Empty;
    }
    if spec == STDIN_SENTINEL {
        return Source::Stdin;
    }

    match Url::parse(spec) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Source::Http(url),
            "file" => Source::File(file_url_path(spec, &url)),
            // A drive letter such as `C:\data\note.xml`
            scheme if scheme.len() == 1 => Source::Path(PathBuf::from(spec)),
            scheme => Source::Unsupported(scheme.to_string()),
        },
        Err(err) => match scheme_prefix(spec) {
            Some(scheme) if scheme.len() > 1 => {
                let scheme = scheme.to_ascii_lowercase();
                if matches!(scheme.as_str(), "http" | "https" | "file") {
                    Source::MalformedUrl(err)
                } else {
                    Source::Unsupported(scheme)
                }
            }
            _ => Source::Path(PathBuf::from(spec)),
        },
    }
}

/// Returns the scheme of `spec` if it starts with one (`ALPHA *( ALPHA /
/// DIGIT / "+" / "-" / "." ) ":"`).
fn scheme_prefix(spec: &str) -> Option<&str> {
    let colon = spec.find(':')?;
    let scheme = &spec[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some(scheme)
    } else {
        None
    }
}

/// Builds a local path from a `file://` URL by concatenating its host and
/// its percent-decoded path.
fn file_url_path(spec: &str, url: &Url) -> PathBuf {
    let mut path = String::new();
    let host = raw_host(spec, url);
    path.push_str(host);
    // `file://name.xml` parses with host `name.xml` and path `/`
    if host.is_empty() || url.path() != "/" {
        path.push_str(&percent_decode_str(url.path()).decode_utf8_lossy());
    }
    if cfg!(windows) {
        path = path.replace('/', "\\");
    }
    PathBuf::from(path)
}

/// Returns the host of a `file://` URL as written in `spec`.
///
/// `Url` lowercases hosts, which would change the file name in
/// `file://Note.xml`.
fn raw_host<'a>(spec: &'a str, url: &'a Url) -> &'a str {
    let host = url.host_str().unwrap_or_default();
    let written = spec
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("file://"))
        .and_then(|_| spec[7..].split(['/', '\\', '?', '#']).next());
    match written {
        Some(written) if written.eq_ignore_ascii_case(host) => written,
        _ => host,
    }
}

/// An open, readable document source.
///
/// The stream owns its underlying resource (file handle, HTTP response body
/// or stdin handle) and releases it when dropped.
pub struct InputStream {
    name: String,
    reader: Box<dyn Read>,
}

impl InputStream {
    /// Wraps a reader. `name` is the source specifier it was opened from and
    /// is used in error messages.
    pub fn new(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// The source specifier this stream was opened from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the remaining bytes and releases the stream.
    ///
    /// # Errors
    ///
    /// Returns [`XqError::InvalidSource`] if reading fails.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, XqError> {
        let mut buf = Vec::new();
        match self.reader.read_to_end(&mut buf) {
            Ok(n) => {
                debug!(source = %self.name, bytes = n, "read input");
                Ok(buf)
            }
            Err(e) => Err(XqError::invalid_source(self.name.as_str(), e)),
        }
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Drop for InputStream {
    fn drop(&mut self) {
        debug!(source = %self.name, "released input");
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStream")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Resolves a source specifier into an open [`InputStream`].
///
/// # Errors
///
/// - [`XqError::NoInput`] for an empty specifier.
/// - [`XqError::InvalidSource`] when a file cannot be opened, an HTTP request
///   fails or returns a non-success status, or the URL scheme is unsupported.
pub fn open(spec: &str, options: &FetchOptions) -> Result<InputStream, XqError> {
    let source = classify(spec);
    debug!(source = spec, kind = ?source, "classified source");

    match source {
        Source::Stdin => Ok(InputStream::new(spec, io::stdin())),
        Source::Http(url) => fetch(spec, url, options),
        Source::File(path) | Source::Path(path) => {
            let file = File::open(&path).map_err(|e| XqError::invalid_source(spec, e))?;
            Ok(InputStream::new(spec, file))
        }
        Source::Unsupported(scheme) => Err(XqError::invalid_source(
            spec,
            SourceError::UnsupportedScheme(scheme),
        )),
        Source::MalformedUrl(err) => Err(XqError::invalid_source(spec, err)),
        Source::Empty => Err(XqError::NoInput),
    }
}

/// Issues a blocking GET and returns the response body as the stream.
fn fetch(spec: &str, url: Url, options: &FetchOptions) -> Result<InputStream, XqError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(options.timeout)
        .user_agent(options.user_agent.as_str())
        .build()
        .map_err(|e| XqError::invalid_source(spec, e))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| XqError::invalid_source(spec, e))?;
    let status = response.status();
    debug!(source = spec, status = %status, "fetched remote source");
    if !status.is_success() {
        return Err(XqError::invalid_source(spec, SourceError::HttpStatus(status)));
    }

    Ok(InputStream::new(spec, response))
}
