//! Merging of aliased command-line values.
//!
//! The front end accepts both a long and a short spelling for the source
//! (`--file`/`-f`) and the expression (`--xpath`/`-x`). They are declared as
//! separate options, so both may be given; [`resolve`] decides which value
//! wins and fills in defaults.

use crate::error::XqError;
use crate::source::STDIN_SENTINEL;

/// The source specifier and expression chosen for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arguments {
    /// Where to read the document from. Never empty: an unset source
    /// becomes [`STDIN_SENTINEL`].
    pub source: String,
    /// The XPath expression. Never empty.
    pub xpath: String,
    /// `true` when no source was given and stdin was picked by default.
    pub source_defaulted: bool,
}

/// Picks the value of an option given under two spellings.
///
/// The short spelling is taken first and the long spelling overrides it, so
/// the long one wins when both are present. Empty strings count as unset.
fn pick(long: Option<&str>, short: Option<&str>) -> String {
    let mut value = String::new();
    if let Some(s) = short.filter(|s| !s.is_empty()) {
        value = s.to_string();
    }
    if let Some(l) = long.filter(|l| !l.is_empty()) {
        value = l.to_string();
    }
    value
}

/// Resolves the raw `--file`, `-f`, `--xpath` and `-x` values.
///
/// # Errors
///
/// Returns [`XqError::MissingXpathExpression`] when neither expression
/// spelling carries a value.
///
/// # Examples
///
/// ```
/// use xq::args::resolve;
///
/// let args = resolve(Some("a.xml"), Some("b.xml"), None, Some("/root")).unwrap();
/// assert_eq!(args.source, "a.xml");
/// assert_eq!(args.xpath, "/root");
///
/// let args = resolve(None, None, Some("//item"), None).unwrap();
/// assert_eq!(args.source, "-");
/// ```
pub fn resolve(
    file: Option<&str>,
    f: Option<&str>,
    xpath: Option<&str>,
    x: Option<&str>,
) -> Result<Arguments, XqError> {
    let mut source = pick(file, f);
    let source_defaulted = source.is_empty();
    if source_defaulted {
        source = STDIN_SENTINEL.to_string();
    }

    let xpath = pick(xpath, x);
    if xpath.is_empty() {
        return Err(XqError::MissingXpathExpression);
    }

    Ok(Arguments {
        source,
        xpath,
        source_defaulted,
    })
}
