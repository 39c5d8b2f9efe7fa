//! SPARQL argument escaping.
//!
//! Every URI and literal that ends up inside a query or update passes through
//! this module, so callers never splice raw strings into SPARQL text. Output is
//! the N-Triples lexical form of the value, which SPARQL accepts verbatim.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{RdfGraphError, Result};

/// Delimiter used by [`serialize_uris`] callers that have no preference.
pub const DEFAULT_DELIMITER: &str = ", ";

static ENCLOSED_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^<(.+)>$").expect("Invalid regex pattern"));

static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").expect("Invalid regex pattern")
});

/// Lexical form a value is serialized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// IRI reference, `<...>`
    Uri,
    /// Plain or language-tagged string literal, `"..."`
    Literal,
}

/// Serialize a value in the given format.
///
/// URIs already wrapped in `<` `>` are unwrapped first, so serializing the
/// output of this function again yields the same string. Literals are always
/// treated as raw values. `lang` only applies to literals.
pub fn serialize_value(value: &str, format: ValueFormat, lang: Option<&str>) -> Result<String> {
    match format {
        ValueFormat::Uri => Ok(format!("<{}>", escape_iri(unwrap_enclosed(value)))),
        ValueFormat::Literal => {
            let mut out = format!("\"{}\"", escape_string(value));
            if let Some(lang) = lang.filter(|l| !l.is_empty()) {
                if !LANGUAGE_TAG.is_match(lang) {
                    return Err(RdfGraphError::InvalidLanguageTag(lang.to_string()));
                }
                out.push('@');
                out.push_str(lang);
            }
            Ok(out)
        }
    }
}

/// Serialize a URI query argument.
///
/// A URI enclosed in one pair of angle brackets is unwrapped before being
/// re-serialized, which prevents double wrapping. Unwrapping only happens when
/// the whole string is enclosed; stray brackets elsewhere get escaped.
pub fn uri(raw: &str) -> String {
    format!("<{}>", escape_iri(unwrap_enclosed(raw)))
}

/// Like [`uri`], but rejects anything that is not a valid absolute resource.
pub fn resource(raw: &str) -> Result<String> {
    if !is_valid_resource(raw) {
        return Err(RdfGraphError::InvalidResourceUri(raw.to_string()));
    }
    Ok(uri(raw))
}

/// Serialize every URI in `uris`, preserving order.
pub fn to_resource_uris<I, S>(uris: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    uris.into_iter().map(|u| uri(u.as_ref())).collect()
}

/// Serialize URIs and join them with `delimiter`.
pub fn serialize_uris<I, S>(uris: I, delimiter: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    to_resource_uris(uris).join(delimiter)
}

/// Serialize a plain string literal.
pub fn literal(value: &str) -> String {
    format!("\"{}\"", escape_string(value))
}

/// Serialize a list of plain string literals, preserving order.
pub fn literals<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values.into_iter().map(|v| literal(v.as_ref())).collect()
}

/// Serialize a literal with an explicit datatype, e.g. `xsd:dateTime`.
pub fn typed_literal(value: &str, datatype: &str) -> Result<String> {
    Ok(format!("{}^^{}", literal(value), resource(datatype)?))
}

/// Check whether `uri` is a valid absolute resource URI.
///
/// Hierarchical URIs need a host, opaque ones must be `urn:<nid>:<nss>`.
/// Surrounding `<` `>` characters are ignored.
pub fn is_valid_resource(uri: &str) -> bool {
    let bare = uri.trim_matches(|c| c == '<' || c == '>');
    if bare.is_empty() || bare.chars().any(needs_iri_escape) {
        return false;
    }
    match Url::parse(bare) {
        // Opaque URIs are only accepted as URNs
        Ok(url) if url.cannot_be_a_base() => {
            url.scheme() == "urn" && url.path().contains(':')
        }
        Ok(url) => url.host_str().is_some_and(|host| !host.is_empty()),
        Err(_) => false,
    }
}

/// Check that every URI is a valid resource. Stops at the first invalid one.
pub fn is_valid_resources<I, S>(uris: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    uris.into_iter().all(|u| is_valid_resource(u.as_ref()))
}

/// Recover the string value of a serialized literal.
///
/// Accepts the output of [`literal`], [`typed_literal`] or a language-tagged
/// [`serialize_value`]. Returns `None` if `serialized` is not a literal.
pub fn unescape_literal(serialized: &str) -> Option<String> {
    let body = serialized.strip_prefix('"')?;
    let mut value = String::with_capacity(body.len());
    let mut chars = body.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => {
                let rest = &body[idx + 1..];
                if rest.is_empty() || rest.starts_with('@') || rest.starts_with("^^") {
                    return Some(value);
                }
                return None;
            }
            '\\' => {
                let (_, esc) = chars.next()?;
                match esc {
                    't' => value.push('\t'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    'u' | 'U' => {
                        let width = if esc == 'u' { 4 } else { 8 };
                        let mut hex = String::with_capacity(width);
                        for _ in 0..width {
                            hex.push(chars.next()?.1);
                        }
                        let code = u32::from_str_radix(&hex, 16).ok()?;
                        value.push(char::from_u32(code)?);
                    }
                    _ => return None,
                }
            }
            _ => value.push(c),
        }
    }

    // No closing quote
    None
}

fn unwrap_enclosed(raw: &str) -> &str {
    match ENCLOSED_URI.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw,
    }
}

/// Characters not allowed inside a SPARQL IRIREF.
fn needs_iri_escape(c: char) -> bool {
    c <= ' ' || c == '\u{7f}' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
}

fn escape_iri(iri: &str) -> String {
    if !iri.chars().any(needs_iri_escape) {
        return iri.to_string();
    }

    let mut escaped = String::with_capacity(iri.len() + 8);
    let mut buf = [0u8; 4];
    for ch in iri.chars() {
        if needs_iri_escape(ch) {
            for byte in ch.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", byte));
            }
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

fn escape_string(s: &str) -> String {
    if !s.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
        return s.to_string();
    }

    let mut escaped = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\u{8}' => escaped.push_str("\\b"),
            '\u{c}' => escaped.push_str("\\f"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04X}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}
