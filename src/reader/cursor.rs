//! Pull-parser cursor contract
//!
//! The object model never tokenizes XML itself. It drives an [`XmlCursor`]
//! one event at a time and reads the data of the current event through the
//! accessors below. Accessors for data that does not belong to the current
//! event return empty values.

use crate::error::Result;

/// Kind of event at the current cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Before the first `advance()`
    StartDocument,
    StartElement,
    EndElement,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
    DocType,
    EndDocument,
}

impl EventKind {
    /// Text-like events that become leaf nodes
    #[inline]
    pub fn is_leaf_content(self) -> bool {
        matches!(
            self,
            EventKind::Text
                | EventKind::CData
                | EventKind::Comment
                | EventKind::ProcessingInstruction
                | EventKind::DocType
        )
    }
}

/// Forward-only, event-driven XML parser
pub trait XmlCursor {
    /// Move to the next event and return its kind. Structural errors
    /// (mismatched end tag, truncated markup) are returned as
    /// `OmError::MalformedContent`. Once `EndDocument` is reached, further
    /// calls keep returning it.
    fn advance(&mut self) -> Result<EventKind>;

    fn event_kind(&self) -> EventKind;

    /// Local name at StartElement/EndElement
    fn local_name(&self) -> &str;

    /// Prefix at StartElement/EndElement, empty when unprefixed
    fn prefix(&self) -> &str;

    /// Resolved namespace of the element, `None` when unbound or absent
    fn namespace_uri(&self) -> Option<&str>;

    fn attribute_count(&self) -> usize;
    fn attribute_local_name(&self, index: usize) -> &str;
    fn attribute_prefix(&self, index: usize) -> &str;
    fn attribute_namespace_uri(&self, index: usize) -> Option<&str>;
    fn attribute_value(&self, index: usize) -> &str;

    /// Namespace declarations made on the current start tag
    fn namespace_count(&self) -> usize;
    fn namespace_prefix(&self, index: usize) -> &str;
    fn namespace_uri_at(&self, index: usize) -> &str;

    /// Character data of Text/CData/Comment, or the DOCTYPE body
    fn text(&self) -> &str;

    fn pi_target(&self) -> &str;
    fn pi_data(&self) -> &str;

    /// Version from the XML declaration, once it has been read
    fn xml_version(&self) -> Option<&str> {
        None
    }

    /// Encoding from the XML declaration, once it has been read
    fn encoding(&self) -> Option<&str> {
        None
    }

    /// Byte offset in the input, for error reports; 0 when unknown
    fn position(&self) -> usize {
        0
    }
}

impl<C: XmlCursor + ?Sized> XmlCursor for Box<C> {
    fn advance(&mut self) -> Result<EventKind> {
        (**self).advance()
    }
    fn event_kind(&self) -> EventKind {
        (**self).event_kind()
    }
    fn local_name(&self) -> &str {
        (**self).local_name()
    }
    fn prefix(&self) -> &str {
        (**self).prefix()
    }
    fn namespace_uri(&self) -> Option<&str> {
        (**self).namespace_uri()
    }
    fn attribute_count(&self) -> usize {
        (**self).attribute_count()
    }
    fn attribute_local_name(&self, index: usize) -> &str {
        (**self).attribute_local_name(index)
    }
    fn attribute_prefix(&self, index: usize) -> &str {
        (**self).attribute_prefix(index)
    }
    fn attribute_namespace_uri(&self, index: usize) -> Option<&str> {
        (**self).attribute_namespace_uri(index)
    }
    fn attribute_value(&self, index: usize) -> &str {
        (**self).attribute_value(index)
    }
    fn namespace_count(&self) -> usize {
        (**self).namespace_count()
    }
    fn namespace_prefix(&self, index: usize) -> &str {
        (**self).namespace_prefix(index)
    }
    fn namespace_uri_at(&self, index: usize) -> &str {
        (**self).namespace_uri_at(index)
    }
    fn text(&self) -> &str {
        (**self).text()
    }
    fn pi_target(&self) -> &str {
        (**self).pi_target()
    }
    fn pi_data(&self) -> &str {
        (**self).pi_data()
    }
    fn xml_version(&self) -> Option<&str> {
        (**self).xml_version()
    }
    fn encoding(&self) -> Option<&str> {
        (**self).encoding()
    }
    fn position(&self) -> usize {
        (**self).position()
    }
}

/// Cursor with no input. Used by documents that are built programmatically.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyCursor;

impl XmlCursor for EmptyCursor {
    fn advance(&mut self) -> Result<EventKind> {
        Ok(EventKind::EndDocument)
    }
    fn event_kind(&self) -> EventKind {
        EventKind::EndDocument
    }
    fn local_name(&self) -> &str {
        ""
    }
    fn prefix(&self) -> &str {
        ""
    }
    fn namespace_uri(&self) -> Option<&str> {
        None
    }
    fn attribute_count(&self) -> usize {
        0
    }
    fn attribute_local_name(&self, _index: usize) -> &str {
        ""
    }
    fn attribute_prefix(&self, _index: usize) -> &str {
        ""
    }
    fn attribute_namespace_uri(&self, _index: usize) -> Option<&str> {
        None
    }
    fn attribute_value(&self, _index: usize) -> &str {
        ""
    }
    fn namespace_count(&self) -> usize {
        0
    }
    fn namespace_prefix(&self, _index: usize) -> &str {
        ""
    }
    fn namespace_uri_at(&self, _index: usize) -> &str {
        ""
    }
    fn text(&self) -> &str {
        ""
    }
    fn pi_target(&self) -> &str {
        ""
    }
    fn pi_data(&self) -> &str {
        ""
    }
}
