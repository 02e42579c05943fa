//! XPath evaluation over a parsed document.
//!
//! A [`Document`] is built once from an [`InputStream`] and is immutable
//! afterwards. An [`Expression`] is compiled independently, so a bad
//! expression is reported without touching the input at all.
//!
//! Evaluation yields a list of [`Match`]es: the selected nodes in document
//! order, or a single scalar when the expression computes a string, number
//! or boolean.
//!
//! Every namespace prefix declared anywhere in the document is made
//! available to expressions, so `/ns:root/ns:item` works without extra
//! configuration. Elements in a default namespace have no prefix to bind and
//! must be selected with `local-name()`.

use std::collections::HashSet;

use encoding_rs::UTF_8;
use sxd_document::dom::{self, ChildOfElement, ChildOfRoot};
use sxd_document::Package;
use sxd_xpath::{Context, Factory, Value, XPath};
use tracing::debug;

use crate::encoding::{decode, XmlDeclaration};
use crate::error::{SourceLocation, XqError};
use crate::source::InputStream;

pub use sxd_xpath::nodeset::Node;

/// A compiled XPath 1.0 expression.
pub struct Expression {
    text: String,
    xpath: XPath,
}

impl Expression {
    /// Compiles `text`.
    ///
    /// # Errors
    ///
    /// Returns [`XqError::InvalidExpression`] if `text` is empty, blank, or
    /// not a valid XPath 1.0 expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use xq::query::Expression;
    ///
    /// assert!(Expression::compile("//item[@id='2']").is_ok());
    /// assert!(Expression::compile("").is_err());
    /// ```
    pub fn compile(text: &str) -> Result<Self, XqError> {
        let xpath = Factory::new()
            .build(text)
            .map_err(|e| XqError::InvalidExpression(e.to_string()))?
            .ok_or_else(|| XqError::InvalidExpression("XPath was empty".to_string()))?;
        Ok(Self {
            text: text.to_string(),
            xpath,
        })
    }

    /// The expression as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Expression").field(&self.text).finish()
    }
}

/// One result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Match<'d> {
    /// A node selected from the document.
    Node(Node<'d>),
    /// The string value of a scalar result (`true`, `3`, `NaN`, ...).
    Value(String),
}

/// A parsed XML document.
pub struct Document {
    package: Package,
    prolog: XmlDeclaration,
}

impl Document {
    /// Reads `input` to the end and parses it.
    ///
    /// The stream is consumed, so it is released exactly once whether or not
    /// parsing succeeds.
    ///
    /// # Errors
    ///
    /// - [`XqError::InvalidSource`] if reading the stream fails.
    /// - [`XqError::MalformedDocument`] if the bytes cannot be decoded or are
    ///   not well-formed XML.
    pub fn parse(input: InputStream) -> Result<Self, XqError> {
        let name = input.name().to_string();
        let bytes = input.into_bytes()?;
        let (text, encoding) = decode(&bytes).map_err(|e| XqError::MalformedDocument {
            message: e.to_string(),
            location: e.location,
        })?;
        let mut document = Self::parse_str(&text)?;
        // The text is UTF-8 now, whatever the declaration said.
        if encoding != UTF_8 {
            document.prolog.set_encoding("UTF-8");
        }
        debug!(source = %name, encoding = encoding.name(), "parsed document");
        Ok(document)
    }

    /// Parses an in-memory document.
    ///
    /// # Errors
    ///
    /// Returns [`XqError::MalformedDocument`] if `text` is not well-formed
    /// XML.
    ///
    /// # Examples
    ///
    /// ```
    /// use xq::query::Document;
    ///
    /// let doc = Document::parse_str("<abc id='1'/>").unwrap();
    /// assert_eq!(doc.prolog().to_string(), "<?xml version=\"1.0\"?>");
    /// assert!(Document::parse_str("<").is_err());
    /// ```
    pub fn parse_str(text: &str) -> Result<Self, XqError> {
        let package =
            sxd_document::parser::parse(text).map_err(|e| XqError::MalformedDocument {
                message: e.to_string(),
                location: SourceLocation::from_offset(text, e.location()),
            })?;
        Ok(Self {
            package,
            prolog: XmlDeclaration::parse(text).unwrap_or_default(),
        })
    }

    /// The declaration written in front of the document when the document
    /// root itself is selected.
    #[must_use]
    pub fn prolog(&self) -> &XmlDeclaration {
        &self.prolog
    }

    /// Evaluates `expression` with the document root as context node.
    ///
    /// # Errors
    ///
    /// Returns [`XqError::InvalidExpression`] if evaluation fails, e.g. on an
    /// unknown function or an unbound variable or prefix.
    pub fn evaluate(&self, expression: &Expression) -> Result<Vec<Match<'_>>, XqError> {
        let document = self.package.as_document();
        let mut context = Context::new();
        let bound = register_namespaces(&mut context, document);
        if let Some(prefix) = qualified_prefixes(expression.as_str())
            .into_iter()
            .find(|p| !bound.contains(p))
        {
            return Err(XqError::InvalidExpression(format!(
                "undefined namespace prefix `{prefix}`"
            )));
        }

        let value = expression
            .xpath
            .evaluate(&context, document.root())
            .map_err(|e| XqError::InvalidExpression(e.to_string()))?;

        let matches: Vec<Match<'_>> = match value {
            Value::Nodeset(nodes) => nodes.document_order().into_iter().map(Match::Node).collect(),
            scalar => vec![Match::Value(scalar.string())],
        };
        debug!(expression = expression.as_str(), matches = matches.len(), "evaluated");
        Ok(matches)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("prolog", &self.prolog)
            .finish_non_exhaustive()
    }
}

/// Binds every prefix in scope on any element and returns the bound
/// prefixes. Where a prefix is bound to different URIs in different places,
/// the first binding in document order wins.
fn register_namespaces<'d>(
    context: &mut Context<'d>,
    document: dom::Document<'d>,
) -> HashSet<&'d str> {
    let mut bound = HashSet::new();
    let mut pending: Vec<dom::Element<'d>> = document
        .root()
        .children()
        .into_iter()
        .rev()
        .filter_map(ChildOfRoot::element)
        .collect();

    while let Some(element) = pending.pop() {
        let mut in_scope = element.namespaces_in_scope();
        in_scope.sort_by_key(|ns| ns.prefix());
        for ns in in_scope {
            if bound.insert(ns.prefix()) {
                context.set_namespace(ns.prefix(), ns.uri());
            }
        }
        pending.extend(
            element
                .children()
                .into_iter()
                .rev()
                .filter_map(ChildOfElement::element),
        );
    }
    bound
}

/// Lists the prefixes of the qualified names in an XPath expression
/// (`ns` in `ns:item`, `ns:*` or `child::ns:item`). String literals are
/// skipped.
///
/// The engine aborts on a name test whose prefix has no binding, so these
/// are checked up front.
fn qualified_prefixes(expression: &str) -> Vec<&str> {
    let mut prefixes = Vec::new();
    let mut chars = expression.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c == '\'' || c == '"' {
            for (_, d) in chars.by_ref() {
                if d == c {
                    break;
                }
            }
        } else if c.is_alphabetic() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some(&(i, d)) = chars.peek() {
                if !is_name_char(d) {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            let rest = &expression[end..];
            if let Some(local) = rest.strip_prefix(':') {
                if local.starts_with(|d: char| d.is_alphabetic() || d == '_' || d == '*') {
                    prefixes.push(&expression[start..end]);
                }
            }
        }
    }
    prefixes
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}
