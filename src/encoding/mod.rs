//! Encoding detection and the XML declaration.
//!
//! The query engine works on UTF-8 text, so the raw bytes of a source are
//! decoded first:
//!
//! 1. A Byte Order Mark decides the encoding outright and is stripped.
//! 2. Without a BOM the input is expected to be UTF-8. If its XML declaration
//!    names another ASCII-compatible encoding (`ISO-8859-1`, `windows-1252`,
//!    `Shift_JIS`, ...), the bytes are transcoded with `encoding_rs`.
//! 3. Anything else that is not valid UTF-8 is rejected.
//!
//! The declaration itself is also what `xq` prints in front of the document
//! when the whole document is selected, see [`XmlDeclaration`].

use std::fmt;

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

use crate::error::SourceLocation;

/// An error that occurs while decoding document bytes.
#[derive(Debug, Clone, Error)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    /// A human-readable description of the encoding error.
    pub message: String,
    /// Where decoding stopped.
    pub location: SourceLocation,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: SourceLocation::default(),
        }
    }
}

/// The pseudo-attributes of an `<?xml ...?>` declaration, in source order.
///
/// # Examples
///
/// ```
/// use xq::encoding::XmlDeclaration;
///
/// let decl = XmlDeclaration::parse("<?xml version='1.0'  encoding=\"UTF-8\" ?><a/>").unwrap();
/// assert_eq!(decl.encoding(), Some("UTF-8"));
/// assert_eq!(decl.to_string(), "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
///
/// assert_eq!(XmlDeclaration::default().to_string(), "<?xml version=\"1.0\"?>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    attributes: Vec<(String, String)>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            attributes: vec![("version".to_string(), "1.0".to_string())],
        }
    }
}

impl XmlDeclaration {
    /// Parses the declaration at the very start of `text`, if there is one.
    ///
    /// Returns `None` when `text` does not start with a declaration or the
    /// declaration is malformed.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix("<?xml")?;
        if !rest.starts_with(is_xml_space) {
            return None;
        }
        let body = &rest[..rest.find("?>")?];

        let mut attributes = Vec::new();
        let mut cursor = body.trim_start_matches(is_xml_space);
        while !cursor.is_empty() {
            let name_end = cursor.find(|c: char| c == '=' || is_xml_space(c))?;
            let name = &cursor[..name_end];
            if name.is_empty() {
                return None;
            }
            let after_name = cursor[name_end..].trim_start_matches(is_xml_space);
            let after_eq = after_name
                .strip_prefix('=')?
                .trim_start_matches(is_xml_space);
            let quote = after_eq.chars().next().filter(|&q| q == '"' || q == '\'')?;
            let value_start = &after_eq[1..];
            let value_end = value_start.find(quote)?;
            attributes.push((name.to_string(), value_start[..value_end].to_string()));
            cursor = value_start[value_end + 1..].trim_start_matches(is_xml_space);
        }

        if attributes.is_empty() {
            return None;
        }
        Some(Self { attributes })
    }

    /// Returns the value of a pseudo-attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the declared encoding label.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.get("encoding")
    }

    /// Replaces the declared encoding label. A declaration without an
    /// `encoding` pseudo-attribute is left as is.
    pub fn set_encoding(&mut self, label: &str) {
        if let Some((_, value)) = self.attributes.iter_mut().find(|(n, _)| n == "encoding") {
            *value = label.to_string();
        }
    }
}

impl fmt::Display for XmlDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<?xml")?;
        for (name, value) in &self.attributes {
            write!(f, " {name}=\"{value}\"")?;
        }
        f.write_str("?>")
    }
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Decodes raw document bytes into a UTF-8 string.
///
/// # Errors
///
/// Returns [`EncodingError`] if the bytes are malformed for the detected
/// encoding or the declared encoding is unknown.
///
/// # Examples
///
/// ```
/// use xq::encoding::decode_to_utf8;
///
/// let text = decode_to_utf8(b"\xEF\xBB\xBF<root/>").unwrap();
/// assert_eq!(text, "<root/>");
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    decode(bytes).map(|(text, _)| text)
}

/// Decodes raw document bytes into a UTF-8 string and reports the encoding
/// they were read as.
///
/// # Errors
///
/// Same as [`decode_to_utf8`].
///
/// # Examples
///
/// ```
/// use xq::encoding::decode;
///
/// let (text, encoding) = decode(b"<?xml version='1.0' encoding='ISO-8859-1'?><a>\xE9</a>").unwrap();
/// assert_eq!(text, "<?xml version='1.0' encoding='ISO-8859-1'?><a>\u{e9}</a>");
/// assert_eq!(encoding.name(), "windows-1252");
/// ```
pub fn decode(bytes: &[u8]) -> Result<(String, &'static Encoding), EncodingError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return transcode(&bytes[bom_len..], encoding);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => match foreign_encoding(text)? {
            Some(encoding) => transcode(bytes, encoding),
            None => Ok((text.to_string(), UTF_8)),
        },
        Err(utf8_error) => {
            // The declaration is ASCII, so it can be read before the first
            // non-ASCII byte even when the rest is in a legacy encoding.
            let ascii_len = bytes
                .iter()
                .position(|b| !b.is_ascii())
                .unwrap_or(bytes.len());
            let head = std::str::from_utf8(&bytes[..ascii_len]).unwrap_or_default();
            match foreign_encoding(head)? {
                Some(encoding) => transcode(bytes, encoding),
                None => {
                    let valid = &bytes[..utf8_error.valid_up_to()];
                    let valid = std::str::from_utf8(valid).unwrap_or_default();
                    Err(EncodingError {
                        message: "input is not valid UTF-8".to_string(),
                        location: SourceLocation::from_offset(valid, valid.len()),
                    })
                }
            }
        }
    }
}

/// Looks up the encoding named in the declaration of `text`. Returns `None`
/// when there is none or it is UTF-8 (or a multi-byte encoding that cannot
/// have produced ASCII-readable text without a BOM).
fn foreign_encoding(text: &str) -> Result<Option<&'static Encoding>, EncodingError> {
    let Some(label) = XmlDeclaration::parse(text).and_then(|d| d.encoding().map(str::to_owned))
    else {
        return Ok(None);
    };
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))?;
    if encoding == UTF_8 || !encoding.is_ascii_compatible() {
        Ok(None)
    } else {
        Ok(Some(encoding))
    }
}

/// Transcodes `bytes` from `encoding` into a UTF-8 `String`, rejecting
/// malformed sequences.
fn transcode(
    bytes: &[u8],
    encoding: &'static Encoding,
) -> Result<(String, &'static Encoding), EncodingError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| (text.into_owned(), encoding))
        .ok_or_else(|| {
            EncodingError::new(format!(
                "malformed byte sequence for encoding {}",
                encoding.name()
            ))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        let bytes = b"<?xml version=\"1.0\"?><root>hello</root>";
        let result = decode_to_utf8(bytes).unwrap();
        assert_eq!(result, "<?xml version=\"1.0\"?><root>hello</root>");
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let bytes = b"\xEF\xBB\xBF<?xml version=\"1.0\"?><root/>";
        let result = decode_to_utf8(bytes).unwrap();
        assert_eq!(result, "<?xml version=\"1.0\"?><root/>");
    }

    #[test]
    fn test_decode_utf16le_with_bom() {
        let bytes = b"\xFF\xFE<\x00a\x00/\x00>\x00";
        assert_eq!(decode_to_utf8(bytes).unwrap(), "<a/>");
    }

    #[test]
    fn test_decode_utf16be_with_bom() {
        let bytes = b"\xFE\xFF\x00<\x00a\x00/\x00>";
        assert_eq!(decode_to_utf8(bytes).unwrap(), "<a/>");
    }

    #[test]
    fn test_decode_latin1() {
        // 0xE9 is 'e' with acute accent in ISO-8859-1
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
        bytes.extend_from_slice(b"<root>caf\xE9</root>");

        let result = decode_to_utf8(&bytes).unwrap();
        assert!(result.contains("<root>caf\u{00E9}</root>"));
    }

    #[test]
    fn test_decode_reports_source_encoding() {
        let (_, encoding) = decode(b"<a/>").unwrap();
        assert_eq!(encoding, UTF_8);
        let (_, encoding) = decode(b"\xFF\xFE<\x00a\x00/\x00>\x00").unwrap();
        assert_eq!(encoding, encoding_rs::UTF_16LE);
        let (_, encoding) =
            decode(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xE9</a>").unwrap();
        assert_eq!(encoding, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_decode_declared_legacy_encoding_on_ascii_input() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><a>x</a>";
        let result = decode_to_utf8(bytes).unwrap();
        assert_eq!(result, std::str::from_utf8(bytes).unwrap());
    }

    #[test]
    fn test_decode_declared_utf16_without_bom_is_read_as_utf8() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>";
        assert_eq!(
            decode_to_utf8(bytes).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>"
        );
    }

    #[test]
    fn test_decode_unknown_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"UNKNOWN-ENCODING-42\"?><a/>";
        let err = decode_to_utf8(bytes).unwrap_err();
        assert!(err.message.contains("unsupported encoding"));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let bytes = b"<a>\n\x80\x81</a>";
        let err = decode_to_utf8(bytes).unwrap_err();
        assert_eq!(err.message, "input is not valid UTF-8");
        assert_eq!(err.location.line, 2);
        assert_eq!(err.location.column, 1);
    }

    #[test]
    fn test_encoding_error_display() {
        let err = EncodingError::new("test error");
        assert_eq!(err.to_string(), "encoding error: test error");
    }

    #[test]
    fn test_declaration_absent() {
        assert_eq!(XmlDeclaration::parse("<root/>"), None);
        assert_eq!(XmlDeclaration::parse("<?xml-stylesheet href='a'?><root/>"), None);
        assert_eq!(XmlDeclaration::parse(" <?xml version='1.0'?>"), None);
    }

    #[test]
    fn test_declaration_attributes_in_order() {
        let decl = XmlDeclaration::parse(
            "<?xml version=\"1.0\" encoding='ISO-8859-1' standalone=\"yes\"?>\n<r/>",
        )
        .unwrap();
        assert_eq!(decl.get("version"), Some("1.0"));
        assert_eq!(decl.encoding(), Some("ISO-8859-1"));
        assert_eq!(decl.get("standalone"), Some("yes"));
        assert_eq!(
            decl.to_string(),
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\" standalone=\"yes\"?>"
        );
    }

    #[test]
    fn test_declaration_set_encoding() {
        let mut decl =
            XmlDeclaration::parse("<?xml version=\"1.0\" encoding=\"UTF-16\" standalone=\"no\"?>")
                .unwrap();
        decl.set_encoding("UTF-8");
        assert_eq!(
            decl.to_string(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>"
        );

        let mut decl = XmlDeclaration::default();
        decl.set_encoding("UTF-8");
        assert_eq!(decl, XmlDeclaration::default());
    }

    #[test]
    fn test_declaration_malformed() {
        assert_eq!(XmlDeclaration::parse("<?xml version=1.0?>"), None);
        assert_eq!(XmlDeclaration::parse("<?xml version=\"1.0\""), None);
        assert_eq!(XmlDeclaration::parse("<?xml ?>"), None);
    }
}
