//! Pull reader over an in-memory document
//!
//! Wraps the [`Tokenizer`] and turns its tokens into cursor events:
//! namespace resolution, empty-tag expansion into a start/end pair,
//! well-formedness of the element structure and the XML declaration.

use super::cursor::{EventKind, XmlCursor};
use super::namespace::NamespaceResolver;
use crate::core::attributes::{parse_attributes, split_name};
use crate::core::scanner::is_whitespace;
use crate::core::tokenizer::{ParseError, TokenKind, Tokenizer};
use crate::error::Result;

/// Attribute of the current start tag, resolved
#[derive(Debug, Clone, Default)]
struct CursorAttribute {
    prefix: String,
    local_name: String,
    namespace_uri: Option<String>,
    value: String,
}

/// Streaming XML reader implementing [`XmlCursor`]
pub struct XmlStreamReader<'a> {
    tokenizer: Tokenizer<'a>,
    resolver: NamespaceResolver,
    /// Qualified names of open elements
    open: Vec<String>,
    /// An empty-element tag still owes its EndElement
    pending_end: bool,
    root_closed: bool,
    event: EventKind,
    prefix: String,
    local_name: String,
    namespace_uri: Option<String>,
    attributes: Vec<CursorAttribute>,
    namespaces: Vec<(String, String)>,
    text: String,
    pi_target: String,
    xml_version: Option<String>,
    encoding: Option<String>,
}

impl<'a> XmlStreamReader<'a> {
    /// Reader over a UTF-8 document (`&str`, `&[u8]`, `&Vec<u8>`, ...)
    pub fn new<T: AsRef<[u8]> + ?Sized>(input: &'a T) -> Self {
        XmlStreamReader {
            tokenizer: Tokenizer::new(input.as_ref()),
            resolver: NamespaceResolver::new(),
            open: Vec::with_capacity(32),
            pending_end: false,
            root_closed: false,
            event: EventKind::StartDocument,
            prefix: String::new(),
            local_name: String::new(),
            namespace_uri: None,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            text: String::new(),
            pi_target: String::new(),
            xml_version: None,
            encoding: None,
        }
    }

    /// Current element depth (number of open elements)
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn clear(&mut self) {
        self.prefix.clear();
        self.local_name.clear();
        self.namespace_uri = None;
        self.attributes.clear();
        self.namespaces.clear();
        self.text.clear();
        self.pi_target.clear();
    }

    fn set_name(&mut self, qname: &str) {
        match qname.split_once(':') {
            Some((prefix, local)) => {
                self.prefix.push_str(prefix);
                self.local_name.push_str(local);
            }
            None => self.local_name.push_str(qname),
        }
        self.namespace_uri = self.resolver.resolve(&self.prefix).map(str::to_string);
    }

    fn start_element(&mut self, name: &[u8], attrs: &[u8], attr_offset: usize, at: usize) -> Result<()> {
        if self.root_closed {
            return Err(ParseError::new("Content after the root element", at).into());
        }
        let qname = utf8(name, at)?;
        let parsed = parse_attributes(attrs, attr_offset)?;

        self.resolver.push_scope();
        for attr in &parsed {
            if let Some((prefix, uri)) = attr.namespace_declaration() {
                let prefix = utf8(prefix, at)?;
                let uri = utf8(uri, at)?;
                self.resolver.declare(prefix, uri);
                self.namespaces.push((prefix.to_string(), uri.to_string()));
            }
        }

        for attr in &parsed {
            if attr.namespace_declaration().is_some() {
                continue;
            }
            let (prefix, local) = split_name(attr.name);
            let prefix = match prefix {
                Some(p) => utf8(p, at)?,
                None => "",
            };
            // Unprefixed attributes are never in the default namespace
            let namespace_uri = if prefix.is_empty() {
                None
            } else {
                self.resolver.resolve(prefix).map(str::to_string)
            };
            self.attributes.push(CursorAttribute {
                prefix: prefix.to_string(),
                local_name: utf8(local, at)?.to_string(),
                namespace_uri,
                value: utf8(&attr.value, at)?.to_string(),
            });
        }

        self.set_name(qname);
        self.open.push(qname.to_string());
        self.event = EventKind::StartElement;
        Ok(())
    }

    fn end_element(&mut self, qname: String) {
        self.set_name(&qname);
        self.resolver.pop_scope();
        if self.open.is_empty() {
            self.root_closed = true;
        }
        self.event = EventKind::EndElement;
    }

    fn record_declaration(&mut self, attrs: &[u8], offset: usize) -> Result<()> {
        for attr in parse_attributes(attrs, offset)? {
            let value = utf8(&attr.value, offset)?.to_string();
            match attr.name {
                b"version" => self.xml_version = Some(value),
                b"encoding" => self.encoding = Some(value),
                _ => {}
            }
        }
        Ok(())
    }
}

fn utf8(bytes: &[u8], position: usize) -> std::result::Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|_| ParseError::new("Invalid UTF-8", position))
}

impl XmlCursor for XmlStreamReader<'_> {
    fn advance(&mut self) -> Result<EventKind> {
        if self.event == EventKind::EndDocument {
            return Ok(EventKind::EndDocument);
        }
        self.clear();

        if self.pending_end {
            self.pending_end = false;
            let qname = self.open.pop().unwrap_or_default();
            self.end_element(qname);
            return Ok(self.event);
        }

        loop {
            let token = self.tokenizer.next_token()?;
            let at = token.span.0;
            match token.kind {
                TokenKind::StartTag | TokenKind::EmptyTag => {
                    let name = token.name.unwrap_or_default();
                    let attrs = token.attributes.unwrap_or_default();
                    let attr_offset = at + 1 + name.len();
                    self.start_element(name, attrs, attr_offset, at)?;
                    self.pending_end = token.kind == TokenKind::EmptyTag;
                    return Ok(self.event);
                }
                TokenKind::EndTag => {
                    let name = utf8(token.name.unwrap_or_default(), at)?;
                    match self.open.pop() {
                        Some(open) if open == name => {
                            self.end_element(open);
                            return Ok(self.event);
                        }
                        Some(open) => {
                            return Err(ParseError::new(
                                format!("Mismatched end tag: expected </{}>, found </{}>", open, name),
                                at,
                            )
                            .into());
                        }
                        None => {
                            return Err(ParseError::new(format!("Unexpected end tag </{}>", name), at).into());
                        }
                    }
                }
                TokenKind::Text => {
                    let content = token.content.unwrap_or_default();
                    if self.open.is_empty() {
                        if content.iter().all(|&b| is_whitespace(b)) {
                            continue;
                        }
                        return Err(ParseError::new("Text outside the root element", at).into());
                    }
                    self.text.push_str(utf8(&content, at)?);
                    self.event = EventKind::Text;
                    return Ok(self.event);
                }
                TokenKind::CData => {
                    if self.open.is_empty() {
                        return Err(ParseError::new("CDATA outside the root element", at).into());
                    }
                    self.text.push_str(utf8(&token.content.unwrap_or_default(), at)?);
                    self.event = EventKind::CData;
                    return Ok(self.event);
                }
                TokenKind::Comment => {
                    self.text.push_str(utf8(&token.content.unwrap_or_default(), at)?);
                    self.event = EventKind::Comment;
                    return Ok(self.event);
                }
                TokenKind::ProcessingInstruction => {
                    self.pi_target.push_str(utf8(token.name.unwrap_or_default(), at)?);
                    self.text.push_str(utf8(&token.content.unwrap_or_default(), at)?);
                    self.event = EventKind::ProcessingInstruction;
                    return Ok(self.event);
                }
                TokenKind::DocType => {
                    if !self.open.is_empty() || self.root_closed {
                        return Err(ParseError::new("DOCTYPE must precede the root element", at).into());
                    }
                    self.text.push_str(utf8(&token.content.unwrap_or_default(), at)?);
                    self.event = EventKind::DocType;
                    return Ok(self.event);
                }
                TokenKind::XmlDeclaration => {
                    // "<?xml" is 5 bytes before the pseudo-attributes
                    self.record_declaration(token.attributes.unwrap_or_default(), at + 5)?;
                }
                TokenKind::Eof => {
                    if let Some(open) = self.open.last() {
                        return Err(ParseError::new(format!("Unclosed tag <{}>", open), at).into());
                    }
                    if !self.root_closed {
                        return Err(ParseError::new("Document has no root element", at).into());
                    }
                    self.event = EventKind::EndDocument;
                    return Ok(self.event);
                }
            }
        }
    }

    fn event_kind(&self) -> EventKind {
        self.event
    }

    fn local_name(&self) -> &str {
        &self.local_name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    fn attribute_local_name(&self, index: usize) -> &str {
        self.attributes.get(index).map_or("", |a| a.local_name.as_str())
    }

    fn attribute_prefix(&self, index: usize) -> &str {
        self.attributes.get(index).map_or("", |a| a.prefix.as_str())
    }

    fn attribute_namespace_uri(&self, index: usize) -> Option<&str> {
        self.attributes.get(index).and_then(|a| a.namespace_uri.as_deref())
    }

    fn attribute_value(&self, index: usize) -> &str {
        self.attributes.get(index).map_or("", |a| a.value.as_str())
    }

    fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    fn namespace_prefix(&self, index: usize) -> &str {
        self.namespaces.get(index).map_or("", |(p, _)| p.as_str())
    }

    fn namespace_uri_at(&self, index: usize) -> &str {
        self.namespaces.get(index).map_or("", |(_, u)| u.as_str())
    }

    fn text(&self) -> &str {
        match self.event {
            EventKind::ProcessingInstruction => "",
            _ => &self.text,
        }
    }

    fn pi_target(&self) -> &str {
        &self.pi_target
    }

    fn pi_data(&self) -> &str {
        match self.event {
            EventKind::ProcessingInstruction => &self.text,
            _ => "",
        }
    }

    fn xml_version(&self) -> Option<&str> {
        self.xml_version.as_deref()
    }

    fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    fn position(&self) -> usize {
        self.tokenizer.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OmError;

    fn events(input: &str) -> Vec<EventKind> {
        let mut reader = XmlStreamReader::new(input);
        let mut out = Vec::new();
        loop {
            let kind = reader.advance().unwrap();
            out.push(kind);
            if kind == EventKind::EndDocument {
                return out;
            }
        }
    }

    #[test]
    fn test_empty_tag_expands() {
        assert_eq!(
            events("<a><b/></a>"),
            vec![
                EventKind::StartElement,
                EventKind::StartElement,
                EventKind::EndElement,
                EventKind::EndElement,
                EventKind::EndDocument,
            ]
        );
    }

    #[test]
    fn test_namespaces_resolved() {
        let mut reader = XmlStreamReader::new(r#"<p:a xmlns:p="urn:p" xmlns="urn:d" p:x="1" y="2"><b/></p:a>"#);
        reader.advance().unwrap();
        assert_eq!(reader.local_name(), "a");
        assert_eq!(reader.prefix(), "p");
        assert_eq!(reader.namespace_uri(), Some("urn:p"));
        assert_eq!(reader.namespace_count(), 2);
        assert_eq!(reader.namespace_prefix(1), "");
        assert_eq!(reader.namespace_uri_at(1), "urn:d");
        assert_eq!(reader.attribute_count(), 2);
        assert_eq!(reader.attribute_namespace_uri(0), Some("urn:p"));
        assert_eq!(reader.attribute_namespace_uri(1), None);
        assert_eq!(reader.attribute_value(1), "2");

        reader.advance().unwrap();
        assert_eq!(reader.local_name(), "b");
        assert_eq!(reader.namespace_uri(), Some("urn:d"));

        assert_eq!(reader.advance().unwrap(), EventKind::EndElement);
        assert_eq!(reader.advance().unwrap(), EventKind::EndElement);
        assert_eq!(reader.namespace_uri(), Some("urn:p"));
    }

    #[test]
    fn test_unbound_prefix_has_no_uri() {
        let mut reader = XmlStreamReader::new("<q:a/>");
        reader.advance().unwrap();
        assert_eq!(reader.prefix(), "q");
        assert_eq!(reader.namespace_uri(), None);
    }

    #[test]
    fn test_declaration_recorded() {
        let mut reader = XmlStreamReader::new(r#"<?xml version="1.0" encoding="UTF-8"?><a/>"#);
        reader.advance().unwrap();
        assert_eq!(reader.xml_version(), Some("1.0"));
        assert_eq!(reader.encoding(), Some("UTF-8"));
    }

    #[test]
    fn test_text_pi_comment() {
        let mut reader = XmlStreamReader::new("<a>x<?t d?><!--c--><![CDATA[<y>]]></a>");
        reader.advance().unwrap();
        assert_eq!(reader.advance().unwrap(), EventKind::Text);
        assert_eq!(reader.text(), "x");
        assert_eq!(reader.advance().unwrap(), EventKind::ProcessingInstruction);
        assert_eq!(reader.pi_target(), "t");
        assert_eq!(reader.pi_data(), "d");
        assert_eq!(reader.advance().unwrap(), EventKind::Comment);
        assert_eq!(reader.text(), "c");
        assert_eq!(reader.advance().unwrap(), EventKind::CData);
        assert_eq!(reader.text(), "<y>");
    }

    #[test]
    fn test_mismatched_end_tag() {
        let mut reader = XmlStreamReader::new("<a><b></a>");
        reader.advance().unwrap();
        reader.advance().unwrap();
        let err = reader.advance().unwrap_err();
        assert!(matches!(err, OmError::MalformedContent { position: 6, .. }));
    }

    #[test]
    fn test_truncated_document() {
        let mut reader = XmlStreamReader::new("<a><b>");
        reader.advance().unwrap();
        reader.advance().unwrap();
        assert!(matches!(reader.advance(), Err(OmError::MalformedContent { .. })));
    }

    #[test]
    fn test_end_document_repeats() {
        let mut reader = XmlStreamReader::new("<a/>\n");
        while reader.advance().unwrap() != EventKind::EndDocument {}
        assert_eq!(reader.advance().unwrap(), EventKind::EndDocument);
    }

    #[test]
    fn test_second_root_rejected() {
        let mut reader = XmlStreamReader::new("<a/><b/>");
        reader.advance().unwrap();
        reader.advance().unwrap();
        assert!(reader.advance().is_err());
    }
}
