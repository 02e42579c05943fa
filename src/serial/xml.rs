//! XML serializer.
//!
//! Turns each [`Match`] into the single line `xq` prints for it:
//!
//! - an attribute prints its value, a namespace node its URI
//! - a scalar prints its string value
//! - any other node prints as an XML fragment, and the document root is
//!   preceded by the document's prolog
//!
//! Elements always get an explicit end tag, so an empty `<abc/>` in the
//! input prints as `<abc></abc>`.

use std::fmt::Write as _;
use std::io::Write;

use sxd_document::dom::{self, ChildOfElement, ChildOfRoot, ParentOfChild};

use crate::encoding::XmlDeclaration;
use crate::error::XqError;
use crate::query::{Match, Node};

/// Writes one line per match to `out`, in order, and flushes it.
///
/// Returns the number of lines written.
///
/// # Errors
///
/// Returns [`XqError::Output`] if writing or flushing fails.
///
/// # Examples
///
/// ```
/// use xq::query::{Document, Expression};
/// use xq::serial::write_matches;
///
/// let doc = Document::parse_str("<r><i n='1'/><i n='2'/></r>").unwrap();
/// let matches = doc.evaluate(&Expression::compile("//i").unwrap()).unwrap();
///
/// let mut out = Vec::new();
/// let lines = write_matches(&mut out, doc.prolog(), &matches).unwrap();
/// assert_eq!(lines, 2);
/// assert_eq!(out, b"<i n=\"1\"></i>\n<i n=\"2\"></i>\n");
/// ```
pub fn write_matches<W: Write + ?Sized>(
    out: &mut W,
    prolog: &XmlDeclaration,
    matches: &[Match<'_>],
) -> Result<usize, XqError> {
    let mut lines = 0;
    for item in matches {
        writeln!(out, "{}", serialize_match(item, prolog)).map_err(XqError::Output)?;
        lines += 1;
    }
    out.flush().map_err(XqError::Output)?;
    Ok(lines)
}

/// Serializes a single match without the trailing newline.
#[must_use]
pub fn serialize_match(item: &Match<'_>, prolog: &XmlDeclaration) -> String {
    match item {
        Match::Node(node) => serialize_node(*node, prolog),
        Match::Value(value) => value.clone(),
    }
}

/// Serializes a node. `prolog` is only used when `node` is the document
/// root.
#[must_use]
pub fn serialize_node(node: Node<'_>, prolog: &XmlDeclaration) -> String {
    let mut out = String::new();
    match node {
        Node::Root(root) => {
            let _ = write!(out, "{prolog}");
            for child in root.children() {
                match child {
                    ChildOfRoot::Element(e) => write_element(&mut out, e),
                    ChildOfRoot::Comment(c) => write_comment(&mut out, c),
                    ChildOfRoot::ProcessingInstruction(pi) => write_pi(&mut out, pi),
                }
            }
        }
        Node::Element(e) => write_element(&mut out, e),
        Node::Attribute(attr) => out.push_str(attr.value()),
        Node::Namespace(ns) => out.push_str(ns.uri()),
        Node::Text(text) => write_escaped_text(&mut out, text.text()),
        Node::Comment(c) => write_comment(&mut out, c),
        Node::ProcessingInstruction(pi) => write_pi(&mut out, pi),
    }
    out
}

fn write_element(out: &mut String, element: dom::Element<'_>) {
    out.push('<');
    write_element_name(out, element);

    for (prefix, uri) in declared_namespaces(element) {
        match prefix {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        write_escaped_attr(out, uri);
        out.push('"');
    }

    for attr in element.attributes() {
        out.push(' ');
        let name = attr.name();
        if let Some(uri) = name.namespace_uri() {
            if let Some(pfx) = element.prefix_for_namespace_uri(uri, attr.preferred_prefix()) {
                out.push_str(pfx);
                out.push(':');
            }
        }
        out.push_str(name.local_part());
        out.push_str("=\"");
        write_escaped_attr(out, attr.value());
        out.push('"');
    }
    out.push('>');

    for child in element.children() {
        match child {
            ChildOfElement::Element(e) => write_element(out, e),
            ChildOfElement::Text(t) => write_escaped_text(out, t.text()),
            ChildOfElement::Comment(c) => write_comment(out, c),
            ChildOfElement::ProcessingInstruction(pi) => write_pi(out, pi),
        }
    }

    out.push_str("</");
    write_element_name(out, element);
    out.push('>');
}

fn write_element_name(out: &mut String, element: dom::Element<'_>) {
    if let Some(pfx) = element_prefix(element) {
        out.push_str(pfx);
        out.push(':');
    }
    out.push_str(element.name().local_part());
}

/// The prefix an element is written with. `None` when it is in no namespace
/// or in the default namespace in effect.
fn element_prefix<'d>(element: dom::Element<'d>) -> Option<&'d str> {
    let uri = element.name().namespace_uri()?;
    if let Some(preferred) = element.preferred_prefix() {
        if element.namespace_uri_for_prefix(preferred) == Some(uri) {
            return Some(preferred);
        }
    }
    if element.recursive_default_namespace_uri() == Some(uri) {
        return None;
    }
    element.prefix_for_namespace_uri(uri, None)
}

/// Namespace declarations introduced by `element` itself, default namespace
/// first, then prefixes sorted by name.
fn declared_namespaces<'d>(element: dom::Element<'d>) -> Vec<(Option<&'d str>, &'d str)> {
    let mut declared = Vec::new();

    match element.default_namespace_uri() {
        Some(uri) => declared.push((None, uri)),
        // An unqualified element below a default namespace can only come
        // from an `xmlns=""` reset.
        None if element.name().namespace_uri().is_none()
            && element.recursive_default_namespace_uri().is_some() =>
        {
            declared.push((None, ""));
        }
        None => {}
    }

    let inherited = match element.parent() {
        Some(ParentOfChild::Element(parent)) => parent.namespaces_in_scope(),
        _ => Vec::new(),
    };
    let mut prefixed: Vec<_> = element
        .namespaces_in_scope()
        .into_iter()
        .filter(|ns| ns.prefix() != "xml")
        .filter(|ns| {
            !inherited
                .iter()
                .any(|i| i.prefix() == ns.prefix() && i.uri() == ns.uri())
        })
        .map(|ns| (ns.prefix(), ns.uri()))
        .collect();
    prefixed.sort_unstable();
    declared.extend(prefixed.into_iter().map(|(p, uri)| (Some(p), uri)));
    declared
}

fn write_comment(out: &mut String, comment: dom::Comment<'_>) {
    out.push_str("<!--");
    out.push_str(comment.text());
    out.push_str("-->");
}

fn write_pi(out: &mut String, pi: dom::ProcessingInstruction<'_>) {
    out.push_str("<?");
    out.push_str(pi.target());
    if let Some(value) = pi.value() {
        out.push(' ');
        out.push_str(value);
    }
    out.push_str("?>");
}

/// Writes a hexadecimal character reference (`&#xHH;`) for a Unicode code point.
fn write_hex_char_ref(out: &mut String, ch: char) {
    let _ = write!(out, "&#x{:X};", ch as u32);
}

/// Escapes text content:
/// - `<`, `>`, `&` are escaped with named entity references
/// - `\r` is encoded as `&#13;`
/// - `\t` and `\n` are passed through
/// - other control characters below 0x20 are hex-encoded
fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            '\t' | '\n' => out.push(ch),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value for a double-quoted attribute.
fn write_escaped_attr(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if (c as u32) < 0x20 => write_hex_char_ref(out, c),
            _ => out.push(ch),
        }
    }
}
