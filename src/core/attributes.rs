//! XML Attribute Parsing
//!
//! Splits the raw attribute region of a start tag into name/value pairs.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use super::tokenizer::ParseError;
use memchr::memchr;
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Qualified name as written (may include a prefix)
    pub name: &'a [u8],
    /// Value with entity references decoded
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attribute<'a> {
    /// `(prefix, local_name)`
    pub fn split_name(&self) -> (Option<&'a [u8]>, &'a [u8]) {
        split_name(self.name)
    }

    /// Namespace declaration carried by this attribute, as `(prefix, uri)`.
    /// The default namespace uses an empty prefix.
    pub fn namespace_declaration(&self) -> Option<(&'a [u8], &[u8])> {
        match self.split_name() {
            (None, b"xmlns") => Some((&b""[..], self.value.as_ref())),
            (Some(b"xmlns"), prefix) => Some((prefix, self.value.as_ref())),
            _ => None,
        }
    }
}

/// Split a qualified name into prefix and local name at the colon
pub fn split_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match memchr(b':', name) {
        Some(colon) => (Some(&name[..colon]), &name[colon + 1..]),
        None => (None, name),
    }
}

/// Parse attributes from the content between the element name and the
/// closing '>' (or '/>'). `offset` is the absolute position of `input`,
/// used for error reporting.
pub fn parse_attributes(input: &[u8], offset: usize) -> Result<Vec<Attribute<'_>>, ParseError> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    loop {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            return Ok(attrs);
        }

        let name_start = pos;
        if !is_name_start_char(input[pos]) {
            return Err(ParseError::new("Invalid attribute name", offset + pos));
        }
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if input.get(pos) != Some(&b'=') {
            return Err(ParseError::new("Attribute value required", offset + name_start));
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        let quote = match input.get(pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err(ParseError::new("Attribute value must be quoted", offset + pos)),
        };
        pos += 1;
        let value_start = pos;
        let value_len = memchr(quote, &input[value_start..])
            .ok_or_else(|| ParseError::new("Attribute value has mismatched quotes", offset + value_start))?;
        pos = value_start + value_len + 1;

        if attrs.iter().any(|a: &Attribute<'_>| a.name == name) {
            return Err(ParseError::new(
                format!("Duplicate attribute: {}", String::from_utf8_lossy(name)),
                offset + name_start,
            ));
        }
        attrs.push(Attribute {
            name,
            value: decode_text(&input[value_start..value_start + value_len]),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_attributes() {
        let attrs = parse_attributes(b" id=\"test\" class='foo'", 0).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, b"id");
        assert_eq!(attrs[0].value.as_ref(), b"test");
        assert_eq!(attrs[1].name, b"class");
        assert_eq!(attrs[1].value.as_ref(), b"foo");
    }

    #[test]
    fn test_namespace_declarations() {
        let attrs = parse_attributes(b" xmlns=\"urn:d\" xmlns:x=\"urn:x\" x:a=\"1\"", 0).unwrap();
        assert_eq!(attrs[0].namespace_declaration(), Some((b"" as &[u8], b"urn:d" as &[u8])));
        assert_eq!(attrs[1].namespace_declaration(), Some((b"x" as &[u8], b"urn:x" as &[u8])));
        assert_eq!(attrs[2].namespace_declaration(), None);
        assert_eq!(attrs[2].split_name(), (Some(b"x" as &[u8]), b"a" as &[u8]));
    }

    #[test]
    fn test_entity_in_value() {
        let attrs = parse_attributes(b" title=\"&lt;hello&gt;\"", 0).unwrap();
        assert_eq!(attrs[0].value.as_ref(), b"<hello>");
    }

    #[test]
    fn test_whitespace_handling() {
        let attrs = parse_attributes(b"  id  =  \"test\"  ", 0).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].value.as_ref(), b"test");
    }

    #[test]
    fn test_malformed_attributes() {
        assert!(parse_attributes(b" novalue", 0).is_err());
        assert!(parse_attributes(b" a=unquoted", 0).is_err());
        let err = parse_attributes(b" a=\"1\" a=\"2\"", 10).unwrap_err();
        assert_eq!(err.position, 17);
    }
}
