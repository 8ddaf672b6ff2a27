//! Document - lazily built object model
//!
//! A [`Document`] owns the node arena and the [`Builder`] that grows it.
//! Read operations that need a relationship the tree does not have yet step
//! the builder until it appears, or until it is clear it never will.

use std::fmt;

use super::builder::{Builder, BuilderOptions, StepOutcome};
use super::node::{Node, NodeData, NodeId, NodeKind};
use super::tree::Tree;
use crate::error::{OmError, Result};
use crate::reader::{EmptyCursor, XmlCursor};

/// Object model over a pull parser
pub struct Document<C = EmptyCursor> {
    pub(crate) tree: Tree,
    pub(crate) builder: Builder<C>,
}

impl<C> fmt::Debug for Document<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.tree.live_count())
            .field("builder", &self.builder)
            .finish()
    }
}

impl Document<EmptyCursor> {
    /// Empty, complete document for programmatic construction
    pub fn new() -> Self {
        let mut tree = Tree::new();
        if let Some(doc) = tree.get_mut(NodeId::DOCUMENT) {
            doc.complete = true;
        }
        Document {
            tree,
            builder: Builder::finished(EmptyCursor),
        }
    }
}

impl Default for Document<EmptyCursor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: XmlCursor> Document<C> {
    /// Document that builds itself from `cursor` on demand
    pub fn open(cursor: C) -> Self {
        Self::open_with(cursor, BuilderOptions::default())
    }

    pub fn open_with(cursor: C, options: BuilderOptions) -> Self {
        Document {
            tree: Tree::new(),
            builder: Builder::new(cursor, options),
        }
    }

    pub fn builder(&self) -> &Builder<C> {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut Builder<C> {
        &mut self.builder
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Advance the builder by one parser event
    pub fn step(&mut self) -> Result<StepOutcome> {
        self.builder.step(&mut self.tree)
    }

    /// The Document node
    pub fn root(&self) -> NodeId {
        NodeId::DOCUMENT
    }

    /// First element child of the Document
    pub fn document_element(&mut self) -> Result<Option<NodeId>> {
        self.first_child_element(NodeId::DOCUMENT)
    }

    // ---------------------------------------------------------------
    // Inspection: never touches the parser
    // ---------------------------------------------------------------

    pub fn node_kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.tree.node(id)?.kind())
    }

    /// Leaves are always complete; containers once their end marker was read
    pub fn is_complete(&self, id: NodeId) -> Result<bool> {
        Ok(self.tree.node(id)?.complete)
    }

    pub fn is_consumed(&self, id: NodeId) -> Result<bool> {
        Ok(self.tree.node(id)?.consumed)
    }

    /// Local name of an element or attribute
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        let local = match &self.tree.get(id)?.data {
            NodeData::Element(e) => e.local_name,
            NodeData::Attribute(a) => a.local_name,
            _ => return None,
        };
        Some(self.tree.strings.get(local))
    }

    /// Namespace URI of an element or attribute
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        let namespace = match &self.tree.get(id)?.data {
            NodeData::Element(e) => e.namespace,
            NodeData::Attribute(a) => a.namespace,
            _ => None,
        }?;
        Some(self.tree.strings.get(namespace.uri))
    }

    /// Prefix recorded for an element or attribute name; `Some("")` for the
    /// default namespace, `None` when no prefix is known
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        let namespace = match &self.tree.get(id)?.data {
            NodeData::Element(e) => e.namespace,
            NodeData::Attribute(a) => a.namespace,
            _ => None,
        }?;
        namespace.prefix.map(|p| self.tree.strings.get(p))
    }

    /// Character data of a leaf: text, comment, PI data, DOCTYPE body or
    /// attribute value
    pub fn value(&self, id: NodeId) -> Option<&str> {
        match &self.tree.get(id)?.data {
            NodeData::Text { content, .. } => Some(content.as_str()),
            NodeData::Comment(text) | NodeData::DocType(text) => Some(text.as_str()),
            NodeData::ProcessingInstruction { data, .. } => Some(data.as_str()),
            NodeData::Attribute(a) => Some(a.value.as_str()),
            _ => None,
        }
    }

    pub fn pi_target(&self, id: NodeId) -> Option<&str> {
        match &self.tree.get(id)?.data {
            NodeData::ProcessingInstruction { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }

    /// Whether a text node came from a CDATA section
    pub fn is_cdata(&self, id: NodeId) -> bool {
        matches!(self.tree.get(id).map(|n| &n.data), Some(NodeData::Text { cdata: true, .. }))
    }

    pub fn content_id(&self, id: NodeId) -> Option<&str> {
        match &self.tree.get(id)?.data {
            NodeData::BinaryReference { content_id, .. } => Some(content_id.as_str()),
            _ => None,
        }
    }

    pub fn content_type(&self, id: NodeId) -> Option<&str> {
        match &self.tree.get(id)?.data {
            NodeData::BinaryReference { content_type, .. } => content_type.as_deref(),
            _ => None,
        }
    }

    /// Bytes behind a binary reference, from the configured attachment store
    pub fn binary_data(&self, id: NodeId) -> Option<&[u8]> {
        self.builder.attachments()?.data(self.content_id(id)?)
    }

    /// Version from the XML declaration
    pub fn xml_version(&self) -> Option<&str> {
        match &self.tree.get(NodeId::DOCUMENT)?.data {
            NodeData::Document { version, .. } => version.as_deref(),
            _ => None,
        }
    }

    /// Encoding from the XML declaration
    pub fn encoding(&self) -> Option<&str> {
        match &self.tree.get(NodeId::DOCUMENT)?.data {
            NodeData::Document { encoding, .. } => encoding.as_deref(),
            _ => None,
        }
    }

    pub fn lookup_namespace_uri(&self, id: NodeId, prefix: &str) -> Option<&str> {
        self.tree.lookup_namespace_uri(id, prefix)
    }

    pub fn lookup_prefix(&self, id: NodeId, uri: &str) -> Option<&str> {
        self.tree.lookup_prefix(id, uri)
    }

    /// `(prefix, uri)` bindings declared on an element
    pub fn declared_namespaces(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.tree.declared_namespaces(id)
    }

    /// Attribute nodes of an element, in document order. Attributes are
    /// populated when the element is created, so this never steps.
    pub fn attributes(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .tree
            .node(id)?
            .as_element()
            .map(|e| e.attributes.clone())
            .unwrap_or_default())
    }

    /// Attribute lookup by namespace and local name
    pub fn attribute(&self, id: NodeId, namespace_uri: Option<&str>, local_name: &str) -> Result<Option<NodeId>> {
        let Some(element) = self.tree.node(id)?.as_element() else {
            return Ok(None);
        };
        Ok(element
            .attributes
            .iter()
            .copied()
            .find(|&a| self.has_name(a, namespace_uri, local_name)))
    }

    pub fn attribute_value(&self, id: NodeId, namespace_uri: Option<&str>, local_name: &str) -> Result<Option<&str>> {
        Ok(self
            .attribute(id, namespace_uri, local_name)?
            .and_then(|a| self.value(a)))
    }

    /// Whether an element or attribute has the given expanded name. An empty
    /// namespace URI is the same as none.
    pub fn has_name(&self, id: NodeId, namespace_uri: Option<&str>, local_name: &str) -> bool {
        self.local_name(id) == Some(local_name)
            && self.namespace_uri(id).filter(|u| !u.is_empty()) == namespace_uri.filter(|u| !u.is_empty())
    }

    // ---------------------------------------------------------------
    // Navigation: steps the builder when a relationship is missing
    // ---------------------------------------------------------------

    pub(crate) fn open_node(&self, id: NodeId) -> Result<&Node> {
        let node = self.tree.node(id)?;
        if node.consumed {
            return Err(OmError::Consumed);
        }
        Ok(node)
    }

    /// Step until `find` returns a node, or until `growing` says no more
    /// relevant nodes can arrive
    fn materialize(
        &mut self,
        find: impl Fn(&Tree) -> Option<NodeId>,
        growing: impl Fn(&Tree) -> bool,
    ) -> Result<Option<NodeId>> {
        loop {
            if let Some(found) = find(&self.tree) {
                return Ok(Some(found));
            }
            if self.builder.is_done() || !growing(&self.tree) {
                self.finish_epilog()?;
                return Ok(None);
            }
            match self.builder.step(&mut self.tree) {
                Ok(_) => {}
                Err(OmError::ExhaustedBuilder) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Once the document element is closed only the epilog remains, so a
    /// navigation that came back empty reads it and finishes the builder.
    fn finish_epilog(&mut self) -> Result<()> {
        while self.builder.root_closed()
            && !self.builder.is_done()
            && !self.builder.parser_accessed()
            && !self.builder.has_failed()
        {
            self.builder.step(&mut self.tree)?;
        }
        Ok(())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.tree.node(id)?.parent)
    }

    /// Previous siblings are always materialized
    pub fn previous_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.tree.node(id)?.prev_sibling)
    }

    pub fn first_child(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        self.open_node(id)?;
        self.materialize(
            |tree| tree.get(id).and_then(|n| n.first_child),
            |tree| tree.get(id).is_some_and(|n| !n.complete),
        )
    }

    pub fn next_sibling(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        self.tree.node(id)?;
        self.materialize(
            |tree| tree.get(id).and_then(|n| n.next_sibling),
            |tree| {
                tree.get(id)
                    .and_then(|n| n.parent)
                    .and_then(|p| tree.get(p))
                    .is_some_and(|p| !p.complete)
            },
        )
    }

    pub fn last_child(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        self.build(id)?;
        Ok(self.tree.node(id)?.last_child)
    }

    /// All children, building the node as far as its end marker
    pub fn children(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut child = self.first_child(id)?;
        while let Some(c) = child {
            out.push(c);
            child = self.next_sibling(c)?;
        }
        Ok(out)
    }

    /// Materialize the whole subtree of `id`
    pub fn build(&mut self, id: NodeId) -> Result<()> {
        self.open_node(id)?;
        while !self.tree.node(id)?.complete {
            match self.builder.step(&mut self.tree) {
                Ok(_) => {}
                Err(OmError::ExhaustedBuilder) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read the rest of the document
    pub fn build_all(&mut self) -> Result<()> {
        while !self.builder.is_done() {
            self.builder.step(&mut self.tree)?;
        }
        Ok(())
    }

    /// Concatenated text and CDATA children
    pub fn text(&mut self, id: NodeId) -> Result<String> {
        let mut out = String::new();
        for child in self.children(id)? {
            if let Some(NodeData::Text { content, .. }) = self.tree.get(child).map(|n| &n.data) {
                out.push_str(content);
            }
        }
        Ok(out)
    }

    pub fn first_child_element(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        let mut child = self.first_child(id)?;
        while let Some(c) = child {
            if self.tree.node(c)?.is_element() {
                return Ok(Some(c));
            }
            child = self.next_sibling(c)?;
        }
        Ok(None)
    }

    pub fn next_sibling_element(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        let mut sibling = self.next_sibling(id)?;
        while let Some(s) = sibling {
            if self.tree.node(s)?.is_element() {
                return Ok(Some(s));
            }
            sibling = self.next_sibling(s)?;
        }
        Ok(None)
    }

    pub fn child_elements(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut child = self.first_child_element(id)?;
        while let Some(c) = child {
            out.push(c);
            child = self.next_sibling_element(c)?;
        }
        Ok(out)
    }

    /// First child element with the given expanded name. Stops building as
    /// soon as it is found.
    pub fn first_child_with_name(
        &mut self,
        id: NodeId,
        namespace_uri: Option<&str>,
        local_name: &str,
    ) -> Result<Option<NodeId>> {
        let mut child = self.first_child_element(id)?;
        while let Some(c) = child {
            if self.has_name(c, namespace_uri, local_name) {
                return Ok(Some(c));
            }
            child = self.next_sibling_element(c)?;
        }
        Ok(None)
    }

    /// Where the frontier goes when `id` leaves the tree
    pub(crate) fn retreat_target(&self, id: NodeId) -> NodeId {
        self.tree
            .get(id)
            .and_then(|n| n.prev_sibling.or(n.parent))
            .unwrap_or(NodeId::DOCUMENT)
    }

    /// Unlink and free a node that has been written out
    pub(crate) fn release(&mut self, id: NodeId) {
        if self.builder.frontier == id {
            self.builder.frontier = self.retreat_target(id);
        }
        self.tree.unlink(id);
        self.tree.free_subtree(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::XmlStreamReader;

    fn open(xml: &str) -> Document<XmlStreamReader<'_>> {
        Document::open(XmlStreamReader::new(xml))
    }

    #[test]
    fn test_lazy_first_child() {
        let mut doc = open("<a><b>hi</b><c/></a>");
        let a = doc.document_element().unwrap().unwrap();
        assert_eq!(doc.local_name(a), Some("a"));
        assert!(!doc.is_complete(a).unwrap());

        let b = doc.first_child(a).unwrap().unwrap();
        assert_eq!(doc.local_name(b), Some("b"));
        // Only a and b exist so far
        assert_eq!(doc.tree().live_count(), 3);
    }

    #[test]
    fn test_next_sibling_none_at_end() {
        let mut doc = open("<a><b/><c/></a>");
        let a = doc.document_element().unwrap().unwrap();
        let kids = doc.children(a).unwrap();
        assert_eq!(kids.len(), 2);
        assert!(doc.is_complete(a).unwrap());
        assert_eq!(doc.next_sibling(kids[1]).unwrap(), None);
        assert_eq!(doc.previous_sibling(kids[1]).unwrap(), Some(kids[0]));
    }

    #[test]
    fn test_text_and_attributes() {
        let mut doc = open(r#"<a x="1" p:y="2" xmlns:p="urn:p">one<![CDATA[<two>]]><!--c-->three</a>"#);
        let a = doc.document_element().unwrap().unwrap();
        assert_eq!(doc.attribute_value(a, None, "x").unwrap(), Some("1"));
        assert_eq!(doc.attribute_value(a, Some("urn:p"), "y").unwrap(), Some("2"));
        assert_eq!(doc.attribute_value(a, None, "y").unwrap(), None);
        assert_eq!(doc.text(a).unwrap(), "one<two>three");
        assert_eq!(doc.lookup_namespace_uri(a, "p"), Some("urn:p"));
        assert_eq!(doc.lookup_prefix(a, "urn:p"), Some("p"));
    }

    #[test]
    fn test_first_child_with_name_stops_early() {
        let mut doc = open("<a><x/><y/><z><deep/></z></a>");
        let a = doc.document_element().unwrap().unwrap();
        let y = doc.first_child_with_name(a, None, "y").unwrap().unwrap();
        assert_eq!(doc.local_name(y), Some("y"));
        assert!(!doc.is_complete(a).unwrap());
        assert_eq!(doc.first_child_with_name(a, None, "missing").unwrap(), None);
        assert!(doc.is_complete(a).unwrap());
    }

    #[test]
    fn test_last_child_builds() {
        let mut doc = open("<a><b/>tail</a>");
        let a = doc.document_element().unwrap().unwrap();
        let last = doc.last_child(a).unwrap().unwrap();
        assert_eq!(doc.node_kind(last).unwrap(), NodeKind::Text);
        assert_eq!(doc.value(last), Some("tail"));
    }

    #[test]
    fn test_malformed_propagates() {
        let mut doc = open("<a><b></a>");
        let a = doc.document_element().unwrap().unwrap();
        let b = doc.first_child(a).unwrap().unwrap();
        assert!(matches!(doc.next_sibling(b), Err(OmError::MalformedContent { .. })));
    }

    #[test]
    fn test_build_all_marks_document_complete() {
        let mut doc = open("<?xml version=\"1.0\"?><a><b/></a>");
        doc.build_all().unwrap();
        assert!(doc.builder().is_done());
        assert!(doc.is_complete(doc.root()).unwrap());
        assert_eq!(doc.xml_version(), Some("1.0"));
        assert!(matches!(doc.step(), Err(OmError::ExhaustedBuilder)));
    }
}
