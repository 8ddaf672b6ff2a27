//! Object model node representation
//!
//! Nodes live in the [`Tree`](super::tree::Tree) arena and refer to each
//! other through [`NodeId`] indices.

use super::namespace::Namespace;
use super::strings::StrId;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The Document node of every tree
    pub const DOCUMENT: NodeId = NodeId(0);

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type of node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    /// Character data; CDATA sections are Text with the cdata flag set
    Text,
    Comment,
    ProcessingInstruction,
    DocType,
    /// Owned by exactly one Element, never part of a child list
    Attribute,
    /// MTOM/XOP reference to externally stored binary content
    BinaryReference,
}

impl NodeKind {
    /// Whether nodes of this kind can have children
    #[inline]
    pub fn is_container(self) -> bool {
        match self {
            NodeKind::Document | NodeKind::Element => true,
            NodeKind::Text
            | NodeKind::Comment
            | NodeKind::ProcessingInstruction
            | NodeKind::DocType
            | NodeKind::Attribute
            | NodeKind::BinaryReference => false,
        }
    }
}

/// Element payload
#[derive(Debug, Clone)]
pub struct ElementData {
    pub local_name: StrId,
    pub namespace: Option<Namespace>,
    /// Namespace bindings declared on this element; prefixes are unique
    pub declared: Vec<Namespace>,
    /// Attribute nodes in document order
    pub attributes: Vec<NodeId>,
}

/// Attribute payload
#[derive(Debug, Clone)]
pub struct AttributeData {
    pub local_name: StrId,
    pub namespace: Option<Namespace>,
    pub value: String,
}

/// Kind-specific node data
#[derive(Debug, Clone)]
pub enum NodeData {
    Document {
        version: Option<String>,
        encoding: Option<String>,
    },
    Element(ElementData),
    Text {
        content: String,
        cdata: bool,
    },
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
    DocType(String),
    Attribute(AttributeData),
    BinaryReference {
        content_id: String,
        content_type: Option<String>,
    },
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct Node {
    /// Owning container; the owner element for attributes
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// No further children will come from the parser. Always true for leaves.
    pub complete: bool,
    /// Content was streamed out by a consuming serialization
    pub consumed: bool,
    pub data: NodeData,
}

impl Node {
    fn with_data(data: NodeData, complete: bool) -> Self {
        Node {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            complete,
            consumed: false,
            data,
        }
    }

    /// Incomplete Document node
    pub fn document() -> Self {
        Self::with_data(
            NodeData::Document {
                version: None,
                encoding: None,
            },
            false,
        )
    }

    /// Element node; parser-created elements start incomplete
    pub fn element(data: ElementData, complete: bool) -> Self {
        Self::with_data(NodeData::Element(data), complete)
    }

    /// Leaf node, always complete
    pub fn leaf(data: NodeData) -> Self {
        debug_assert!(!matches!(data, NodeData::Document { .. } | NodeData::Element(_)));
        Self::with_data(data, true)
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Document { .. } => NodeKind::Document,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text { .. } => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
            NodeData::DocType(_) => NodeKind::DocType,
            NodeData::Attribute(_) => NodeKind::Attribute,
            NodeData::BinaryReference { .. } => NodeKind::BinaryReference,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&AttributeData> {
        match &self.data {
            NodeData::Attribute(a) => Some(a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_starts_incomplete() {
        let doc = Node::document();
        assert_eq!(doc.kind(), NodeKind::Document);
        assert!(doc.parent.is_none());
        assert!(!doc.complete);
    }

    #[test]
    fn test_leaves_are_complete() {
        let text = Node::leaf(NodeData::Text {
            content: "hi".to_string(),
            cdata: false,
        });
        assert!(text.complete);
        assert_eq!(text.kind(), NodeKind::Text);
        assert!(!text.kind().is_container());
    }

    #[test]
    fn test_container_kinds() {
        assert!(NodeKind::Document.is_container());
        assert!(NodeKind::Element.is_container());
        assert!(!NodeKind::Attribute.is_container());
        assert!(!NodeKind::BinaryReference.is_container());
    }
}
