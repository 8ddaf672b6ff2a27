//! Discard, detach and programmatic construction
//!
//! Factory nodes are created complete and free-standing; they enter the
//! tree through `add_child` or the `insert_sibling_*` operations.

use tracing::debug;

use super::document::Document;
use super::namespace::Namespace;
use super::node::{AttributeData, ElementData, Node, NodeData, NodeId, NodeKind};
use crate::error::{OmError, Result};
use crate::reader::XmlCursor;

impl<C: XmlCursor> Document<C> {
    /// Remove an element that has not been fully read, skipping its
    /// remaining content in the parser without building it.
    pub fn discard(&mut self, id: NodeId) -> Result<()> {
        let node = self.tree.node(id)?;
        if !node.is_element() {
            return Err(OmError::InvalidOperation("only elements can be discarded"));
        }
        if node.complete {
            return Err(OmError::AlreadyComplete);
        }

        // An incomplete element is on the open path: count the open
        // containers from the frontier up to and including it
        let mut depth = 0;
        let mut current = Some(self.builder.frontier);
        loop {
            let Some(n) = current else {
                return Err(OmError::InvalidBuilderState("element is not on the open path"));
            };
            let node = self.tree.node(n)?;
            if node.kind().is_container() && !node.complete {
                depth += 1;
            }
            if n == id {
                break;
            }
            current = node.parent;
        }

        self.builder.skip(depth)?;
        debug!(?id, depth, "discarded incomplete element");

        self.builder.frontier = self.retreat_target(id);
        self.tree.node_mut(id)?.complete = true;
        self.tree.unlink(id);
        self.tree.free_subtree(id);
        Ok(())
    }

    /// Unlink a node and return it as a free-standing root. An incomplete
    /// node is built to completion first.
    pub fn detach(&mut self, id: NodeId) -> Result<NodeId> {
        match self.tree.node(id)?.kind() {
            NodeKind::Document => return Err(OmError::InvalidOperation("the document node cannot be detached")),
            NodeKind::Attribute => return Err(OmError::InvalidOperation("attributes cannot be detached")),
            _ => {}
        }
        if !self.tree.node(id)?.complete {
            self.build(id)?;
        }
        if self.tree.node(id)?.parent.is_none() {
            return Ok(id);
        }
        if self.builder.frontier == id {
            self.builder.frontier = self.retreat_target(id);
        }
        self.tree.unlink(id);
        debug!(?id, "detached node");
        Ok(id)
    }

    // ---------------------------------------------------------------
    // Factory
    // ---------------------------------------------------------------

    /// New element. `prefix` of `None` lets the serializer choose one;
    /// `Some("")` asks for the default namespace.
    pub fn create_element(&mut self, local_name: &str, namespace_uri: Option<&str>, prefix: Option<&str>) -> NodeId {
        let strings = &mut self.tree.strings;
        let namespace = namespace_uri
            .filter(|uri| !uri.is_empty())
            .map(|uri| Namespace::intern(strings, uri, prefix));
        let local_name = strings.intern(local_name);
        self.tree.alloc(Node::element(
            ElementData {
                local_name,
                namespace,
                declared: Vec::new(),
                attributes: Vec::new(),
            },
            true,
        ))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.tree.alloc(Node::leaf(NodeData::Text {
            content: text.to_string(),
            cdata: false,
        }))
    }

    pub fn create_cdata(&mut self, text: &str) -> NodeId {
        self.tree.alloc(Node::leaf(NodeData::Text {
            content: text.to_string(),
            cdata: true,
        }))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.tree.alloc(Node::leaf(NodeData::Comment(text.to_string())))
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> NodeId {
        self.tree.alloc(Node::leaf(NodeData::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        }))
    }

    pub fn create_doctype(&mut self, body: &str) -> NodeId {
        self.tree.alloc(Node::leaf(NodeData::DocType(body.to_string())))
    }

    pub fn create_binary_reference(&mut self, content_id: &str, content_type: Option<&str>) -> NodeId {
        self.tree.alloc(Node::leaf(NodeData::BinaryReference {
            content_id: content_id.to_string(),
            content_type: content_type.map(str::to_string),
        }))
    }

    /// Set an attribute, replacing one with the same expanded name
    pub fn add_attribute(
        &mut self,
        element: NodeId,
        local_name: &str,
        namespace_uri: Option<&str>,
        prefix: Option<&str>,
        value: &str,
    ) -> Result<NodeId> {
        if !self.tree.node(element)?.is_element() {
            return Err(OmError::InvalidOperation("attributes can only be added to elements"));
        }
        let namespace_uri = namespace_uri.filter(|uri| !uri.is_empty());
        if let Some(existing) = self.attribute(element, namespace_uri, local_name)? {
            let strings = &mut self.tree.strings;
            let namespace = namespace_uri.map(|uri| Namespace::intern(strings, uri, prefix));
            if let NodeData::Attribute(attr) = &mut self.tree.node_mut(existing)?.data {
                attr.value = value.to_string();
                attr.namespace = namespace;
            }
            return Ok(existing);
        }

        let strings = &mut self.tree.strings;
        let data = AttributeData {
            local_name: strings.intern(local_name),
            namespace: namespace_uri.map(|uri| Namespace::intern(strings, uri, prefix)),
            value: value.to_string(),
        };
        let id = self.tree.alloc(Node::leaf(NodeData::Attribute(data)));
        self.tree.node_mut(id)?.parent = Some(element);
        if let Some(e) = self.tree.node_mut(element)?.as_element_mut() {
            e.attributes.push(id);
        }
        Ok(id)
    }

    /// Remove an attribute by expanded name; returns whether one was removed
    pub fn remove_attribute(&mut self, element: NodeId, namespace_uri: Option<&str>, local_name: &str) -> Result<bool> {
        let Some(attr) = self.attribute(element, namespace_uri, local_name)? else {
            return Ok(false);
        };
        if let Some(e) = self.tree.node_mut(element)?.as_element_mut() {
            e.attributes.retain(|&a| a != attr);
        }
        self.tree.free_subtree(attr);
        Ok(true)
    }

    /// Declare `prefix` (empty for the default namespace) on an element,
    /// replacing an earlier declaration of the same prefix
    pub fn declare_namespace(&mut self, element: NodeId, prefix: &str, uri: &str) -> Result<()> {
        let binding = Namespace::intern(&mut self.tree.strings, uri, Some(prefix));
        let Some(e) = self.tree.node_mut(element)?.as_element_mut() else {
            return Err(OmError::InvalidOperation("namespaces can only be declared on elements"));
        };
        e.declared.retain(|b| b.prefix != binding.prefix);
        e.declared.push(binding);
        Ok(())
    }

    /// Replace all children of an element with a single text node
    pub fn set_text(&mut self, element: NodeId, text: &str) -> Result<NodeId> {
        if !self.tree.node(element)?.is_element() {
            return Err(OmError::InvalidOperation("text can only be set on elements"));
        }
        self.build(element)?;
        while let Some(child) = self.tree.node(element)?.first_child {
            self.tree.unlink(child);
            self.tree.free_subtree(child);
        }
        let id = self.create_text(text);
        self.tree.append_child(element, id);
        Ok(id)
    }

    fn check_insertable(&self, node: NodeId) -> Result<()> {
        match self.tree.node(node)?.kind() {
            NodeKind::Document => Err(OmError::InvalidOperation("the document node cannot be inserted")),
            NodeKind::Attribute => Err(OmError::InvalidOperation("attributes are not children")),
            _ => Ok(()),
        }
    }

    /// Append `child` to a container, detaching it from its current parent
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.tree.node(parent)?.kind().is_container() {
            return Err(OmError::InvalidOperation("leaf nodes cannot have children"));
        }
        self.check_insertable(child)?;
        if self.tree.is_ancestor_or_self(child, parent) {
            return Err(OmError::InvalidOperation("a node cannot be added to its own subtree"));
        }
        self.build(parent)?;
        self.detach(child)?;
        self.tree.append_child(parent, child);
        Ok(())
    }

    /// Insert `node` directly after `anchor`
    pub fn insert_sibling_after(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        let parent = self.sibling_parent(anchor, node)?;
        self.build(parent)?;
        self.detach(node)?;
        self.tree.insert_after(anchor, node);
        Ok(())
    }

    /// Insert `node` directly before `anchor`
    pub fn insert_sibling_before(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        let parent = self.sibling_parent(anchor, node)?;
        self.build(parent)?;
        self.detach(node)?;
        self.tree.insert_before(anchor, node);
        Ok(())
    }

    fn sibling_parent(&self, anchor: NodeId, node: NodeId) -> Result<NodeId> {
        self.check_insertable(anchor)?;
        self.check_insertable(node)?;
        if anchor == node || self.tree.is_ancestor_or_self(node, anchor) {
            return Err(OmError::InvalidOperation("a node cannot be added to its own subtree"));
        }
        self.tree
            .node(anchor)?
            .parent
            .ok_or(OmError::InvalidOperation("a root node has no siblings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::XmlStreamReader;

    fn open(xml: &str) -> Document<XmlStreamReader<'_>> {
        Document::open(XmlStreamReader::new(xml))
    }

    fn names<C: XmlCursor>(doc: &mut Document<C>, id: NodeId) -> Vec<String> {
        doc.child_elements(id)
            .unwrap()
            .into_iter()
            .map(|c| doc.local_name(c).unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_discard_skips_unread_content() {
        let mut doc = open("<a><b><x/></b><c/></a>");
        let a = doc.document_element().unwrap().unwrap();
        let b = doc.first_child(a).unwrap().unwrap();
        let before = doc.tree().live_count();

        doc.discard(b).unwrap();
        assert_eq!(doc.tree().live_count(), before - 1);
        assert_eq!(names(&mut doc, a), vec!["c"]);
        assert!(doc.is_complete(a).unwrap());
    }

    #[test]
    fn test_discard_from_deep_frontier() {
        let mut doc = open("<a><b><x><y/></x><z/></b><c/></a>");
        let a = doc.document_element().unwrap().unwrap();
        let b = doc.first_child(a).unwrap().unwrap();
        let x = doc.first_child(b).unwrap().unwrap();
        doc.first_child(x).unwrap().unwrap();

        doc.discard(b).unwrap();
        assert_eq!(names(&mut doc, a), vec!["c"]);
    }

    #[test]
    fn test_discard_complete_fails() {
        let mut doc = open("<a><b/><c/></a>");
        let a = doc.document_element().unwrap().unwrap();
        let b = doc.first_child(a).unwrap().unwrap();
        doc.next_sibling(b).unwrap();
        assert!(matches!(doc.discard(b), Err(OmError::AlreadyComplete)));
    }

    #[test]
    fn test_detach_builds_then_unlinks() {
        let mut doc = open("<a><b><x/></b><c/></a>");
        let a = doc.document_element().unwrap().unwrap();
        let b = doc.first_child(a).unwrap().unwrap();
        let detached = doc.detach(b).unwrap();
        assert!(doc.is_complete(detached).unwrap());
        assert_eq!(doc.parent(detached).unwrap(), None);
        assert_eq!(names(&mut doc, detached), vec!["x"]);
        assert_eq!(names(&mut doc, a), vec!["c"]);

        assert!(matches!(doc.detach(doc.root()), Err(OmError::InvalidOperation(_))));
    }

    #[test]
    fn test_factory_and_insertion() {
        let mut doc = Document::new();
        let root = doc.create_element("root", Some("urn:r"), Some("r"));
        doc.add_child(doc.root(), root).unwrap();
        let b = doc.create_element("b", None, None);
        let a = doc.create_element("a", None, None);
        let c = doc.create_element("c", None, None);
        doc.add_child(root, b).unwrap();
        doc.insert_sibling_before(b, a).unwrap();
        doc.insert_sibling_after(b, c).unwrap();
        assert_eq!(names(&mut doc, root), vec!["a", "b", "c"]);

        doc.add_attribute(a, "k", None, None, "1").unwrap();
        doc.add_attribute(a, "k", None, None, "2").unwrap();
        assert_eq!(doc.attributes(a).unwrap().len(), 1);
        assert_eq!(doc.attribute_value(a, None, "k").unwrap(), Some("2"));

        doc.set_text(c, "hello").unwrap();
        assert_eq!(doc.text(c).unwrap(), "hello");

        let text = doc.create_text("t");
        assert!(matches!(doc.add_child(text, a), Err(OmError::InvalidOperation(_))));
        assert!(matches!(doc.add_child(a, root), Err(OmError::InvalidOperation(_))));
        assert!(matches!(doc.insert_sibling_after(root, text), Ok(())));
    }

    #[test]
    fn test_add_child_moves_node() {
        let mut doc = Document::new();
        let root = doc.create_element("root", None, None);
        doc.add_child(doc.root(), root).unwrap();
        let x = doc.create_element("x", None, None);
        let y = doc.create_element("y", None, None);
        doc.add_child(root, x).unwrap();
        doc.add_child(root, y).unwrap();
        doc.add_child(y, x).unwrap();
        assert_eq!(names(&mut doc, root), vec!["y"]);
        assert_eq!(names(&mut doc, y), vec!["x"]);
    }

    #[test]
    fn test_declare_namespace_replaces_prefix() {
        let mut doc = Document::new();
        let e = doc.create_element("e", None, None);
        doc.declare_namespace(e, "p", "urn:1").unwrap();
        doc.declare_namespace(e, "p", "urn:2").unwrap();
        assert_eq!(doc.declared_namespaces(e), vec![("p", "urn:2")]);
        assert!(doc.remove_attribute(e, None, "missing").is_ok());
    }
}
