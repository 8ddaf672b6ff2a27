//! XML Tokenizer - State machine for XML token extraction
//!
//! Pull-style tokenizer over a byte slice. Produces one token per call:
//! - Element start/end/empty tags
//! - Text content (entity references decoded)
//! - CDATA sections
//! - Comments
//! - Processing instructions and the XML declaration
//! - DOCTYPE declarations (passed through verbatim)
//!
//! Markup that cannot be tokenized is reported as a [`ParseError`] carrying
//! the byte offset where the construct started.

use super::entities::decode_text;
use super::scanner::{is_whitespace, Scanner};
use std::borrow::Cow;

/// Current parsing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Nothing consumed yet
    Init,
    /// Between markup constructs
    InsideText,
    /// End of input reached
    Done,
}

/// Type of XML token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<element ...>`
    StartTag,
    /// `</element>`
    EndTag,
    /// `<element .../>`
    EmptyTag,
    Text,
    /// `<![CDATA[...]]>`
    CData,
    /// `<!--...-->`
    Comment,
    /// `<?target data?>`
    ProcessingInstruction,
    /// `<?xml ...?>`
    XmlDeclaration,
    /// `<!DOCTYPE ...>`
    DocType,
    Eof,
}

/// A single token
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw span in input (start, end)
    pub span: (usize, usize),
    /// Tag name or PI target
    pub name: Option<&'a [u8]>,
    /// Raw attribute region of a start/empty tag or XML declaration
    pub attributes: Option<&'a [u8]>,
    /// Text, CDATA, comment, PI data or DOCTYPE body
    pub content: Option<Cow<'a, [u8]>>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            attributes: None,
            content: None,
        }
    }

    fn with_name(mut self, name: &'a [u8]) -> Self {
        self.name = Some(name);
        self
    }

    fn with_attributes(mut self, attributes: &'a [u8]) -> Self {
        self.attributes = Some(attributes);
        self
    }

    fn with_content(mut self, content: Cow<'a, [u8]>) -> Self {
        self.content = Some(content);
        self
    }
}

/// Markup the tokenizer could not make sense of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

/// XML tokenizer implementing a pull-parser pattern
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    state: ParseState,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            state: ParseState::Init,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Get the next token. Returns `Eof` once, then keeps returning `Eof`.
    pub fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        if self.state == ParseState::Init {
            // Skip a UTF-8 byte order mark and leading whitespace
            if self.scanner.starts_with(b"\xEF\xBB\xBF") {
                self.scanner.advance(3);
            }
            self.scanner.skip_whitespace();
            self.state = ParseState::InsideText;
        }

        let here = self.scanner.position();
        if self.state == ParseState::Done || self.scanner.is_eof() {
            self.state = ParseState::Done;
            return Ok(Token::new(TokenKind::Eof, (here, here)));
        }

        match self.scanner.peek() {
            Some(b'<') => self.parse_markup(),
            _ => Ok(self.parse_text()),
        }
    }

    fn parse_markup(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.scanner.position();
        self.scanner.advance(1); // Skip '<'

        match self.scanner.peek() {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            Some(_) => self.parse_start_tag(start),
            None => Err(ParseError::new("Unexpected end of input after '<'", start)),
        }
    }

    fn parse_start_tag(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| ParseError::new("Invalid element name", start))?;
        let attr_start = self.scanner.position();

        let end = self
            .scanner
            .find_tag_end_quoted()
            .ok_or_else(|| ParseError::new("Unterminated start tag", start))?;

        let is_empty = end > attr_start && self.scanner.slice(end - 1, end) == b"/";
        let attr_end = if is_empty { end - 1 } else { end };

        self.scanner.set_position(end + 1);

        let kind = if is_empty { TokenKind::EmptyTag } else { TokenKind::StartTag };
        Ok(Token::new(kind, (start, end + 1))
            .with_name(name)
            .with_attributes(self.scanner.slice(attr_start, attr_end)))
    }

    fn parse_end_tag(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '/'

        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| ParseError::new("Invalid element name in end tag", start))?;

        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'>') {
            return Err(ParseError::new("End tag cannot have attributes or other content", start));
        }
        self.scanner.advance(1);

        Ok(Token::new(TokenKind::EndTag, (start, self.scanner.position())).with_name(name))
    }

    /// Comment, CDATA or DOCTYPE
    fn parse_bang_markup(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '!'

        if self.scanner.starts_with(b"--") {
            self.scanner.advance(2);
            let (content, end) = self.read_until(b"-->", start, "Unterminated comment")?;
            Ok(Token::new(TokenKind::Comment, (start, end)).with_content(Cow::Borrowed(content)))
        } else if self.scanner.starts_with(b"[CDATA[") {
            self.scanner.advance(7);
            let (content, end) = self.read_until(b"]]>", start, "Unterminated CDATA section")?;
            Ok(Token::new(TokenKind::CData, (start, end)).with_content(Cow::Borrowed(content)))
        } else if self.scanner.starts_with(b"DOCTYPE") {
            self.parse_doctype(start)
        } else {
            Err(ParseError::new("Invalid declaration - expected comment, CDATA, or DOCTYPE", start))
        }
    }

    /// Consume up to and including `terminator`, returning the bytes before it
    fn read_until(
        &mut self,
        terminator: &[u8],
        start: usize,
        message: &'static str,
    ) -> Result<(&'a [u8], usize), ParseError> {
        let content_start = self.scanner.position();
        let pos = self
            .scanner
            .find_seq(terminator)
            .ok_or_else(|| ParseError::new(message, start))?;
        self.scanner.set_position(pos + terminator.len());
        Ok((self.scanner.slice(content_start, pos), self.scanner.position()))
    }

    /// `<!DOCTYPE name ... [internal subset]>`; the body between the keyword
    /// and the closing '>' is kept verbatim
    fn parse_doctype(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(7); // Skip "DOCTYPE"
        self.scanner.skip_whitespace();
        let body_start = self.scanner.position();

        let mut bracket_depth = 0usize;
        let mut quote: Option<u8> = None;
        for (offset, &b) in self.scanner.remaining().iter().enumerate() {
            match (quote, b) {
                (Some(q), _) if q == b => quote = None,
                (Some(_), _) => {}
                (None, b'"') | (None, b'\'') => quote = Some(b),
                (None, b'[') => bracket_depth += 1,
                (None, b']') => bracket_depth = bracket_depth.saturating_sub(1),
                (None, b'>') if bracket_depth == 0 => {
                    let end = body_start + offset;
                    let mut body = self.scanner.slice(body_start, end);
                    while body.last().is_some_and(|&b| is_whitespace(b)) {
                        body = &body[..body.len() - 1];
                    }
                    self.scanner.set_position(end + 1);
                    return Ok(Token::new(TokenKind::DocType, (start, end + 1))
                        .with_content(Cow::Borrowed(body)));
                }
                _ => {}
            }
        }
        Err(ParseError::new("Unterminated DOCTYPE declaration", start))
    }

    fn parse_pi(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        self.scanner.advance(1); // Skip '?'

        let name = self
            .scanner
            .read_name()
            .ok_or_else(|| ParseError::new("Invalid processing instruction target", start))?;
        let data_start = self.scanner.position();
        let (data, end) = self.read_until(b"?>", start, "Unterminated processing instruction")?;

        if name == b"xml" {
            return Ok(Token::new(TokenKind::XmlDeclaration, (start, end))
                .with_name(name)
                .with_attributes(self.scanner.slice(data_start, end - 2)));
        }

        let mut data = data;
        while data.first().is_some_and(|&b| is_whitespace(b)) {
            data = &data[1..];
        }
        Ok(Token::new(TokenKind::ProcessingInstruction, (start, end))
            .with_name(name)
            .with_content(Cow::Borrowed(data)))
    }

    fn parse_text(&mut self) -> Token<'a> {
        let start = self.scanner.position();
        let end = self
            .scanner
            .find_tag_start()
            .unwrap_or(start + self.scanner.remaining().len());

        let content = self.scanner.slice(start, end);
        self.scanner.set_position(end);

        Token::new(TokenKind::Text, (start, end)).with_content(decode_text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &[u8]) -> Vec<TokenKind> {
        let mut tok = Tokenizer::new(input);
        let mut out = Vec::new();
        loop {
            let t = tok.next_token().unwrap();
            out.push(t.kind);
            if t.kind == TokenKind::Eof {
                return out;
            }
        }
    }

    #[test]
    fn test_simple_element() {
        let mut tok = Tokenizer::new(b"<root>content</root>");

        let t1 = tok.next_token().unwrap();
        assert_eq!(t1.kind, TokenKind::StartTag);
        assert_eq!(t1.name, Some(b"root" as &[u8]));

        let t2 = tok.next_token().unwrap();
        assert_eq!(t2.kind, TokenKind::Text);
        assert_eq!(t2.content.as_deref(), Some(b"content" as &[u8]));

        let t3 = tok.next_token().unwrap();
        assert_eq!(t3.kind, TokenKind::EndTag);
        assert_eq!(t3.name, Some(b"root" as &[u8]));

        assert_eq!(tok.next_token().unwrap().kind, TokenKind::Eof);
        assert_eq!(tok.state(), ParseState::Done);
    }

    #[test]
    fn test_empty_element_attributes() {
        let mut tok = Tokenizer::new(b"<br id=\"a/b\"/>");
        let t = tok.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::EmptyTag);
        assert_eq!(t.name, Some(b"br" as &[u8]));
        assert_eq!(t.attributes, Some(b" id=\"a/b\"" as &[u8]));
    }

    #[test]
    fn test_cdata_and_comment() {
        let mut tok = Tokenizer::new(b"<![CDATA[<script>]]><!-- c -->");
        let t = tok.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::CData);
        assert_eq!(t.content.as_deref(), Some(b"<script>" as &[u8]));
        let t = tok.next_token().unwrap();
        assert_eq!(t.kind, TokenKind::Comment);
        assert_eq!(t.content.as_deref(), Some(b" c " as &[u8]));
    }

    #[test]
    fn test_declaration_doctype_pi() {
        let input = b"<?xml version=\"1.0\"?>\n<!DOCTYPE root [<!ENTITY e \"x>\">]>\n<?pi some data?><root/>";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::XmlDeclaration,
                TokenKind::Text,
                TokenKind::DocType,
                TokenKind::Text,
                TokenKind::ProcessingInstruction,
                TokenKind::EmptyTag,
                TokenKind::Eof,
            ]
        );

        let mut tok = Tokenizer::new(b"<!DOCTYPE root [<!ENTITY e \"x>\">]><?pi some data?>");
        let t = tok.next_token().unwrap();
        assert_eq!(t.content.as_deref(), Some(b"root [<!ENTITY e \"x>\">]" as &[u8]));
        let t = tok.next_token().unwrap();
        assert_eq!(t.name, Some(b"pi" as &[u8]));
        assert_eq!(t.content.as_deref(), Some(b"some data" as &[u8]));
    }

    #[test]
    fn test_text_entities_decoded() {
        let mut tok = Tokenizer::new(b"<a>1 &lt; 2</a>");
        tok.next_token().unwrap();
        let t = tok.next_token().unwrap();
        assert_eq!(t.content.as_deref(), Some(b"1 < 2" as &[u8]));
    }

    #[test]
    fn test_unterminated_markup_is_error() {
        let mut tok = Tokenizer::new(b"<a><!-- never closed");
        tok.next_token().unwrap();
        let err = tok.next_token().unwrap_err();
        assert_eq!(err.position, 3);

        let mut tok = Tokenizer::new(b"<a attr=\"x");
        assert!(tok.next_token().is_err());
    }
}
