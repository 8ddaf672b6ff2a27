//! DOM-style view
//!
//! A thin adapter exposing DOM naming (node type codes, qualified names,
//! `*ByTagNameNS`) on top of a [`Document`]. It has no state of its own:
//! every call goes through the lazy façade, so the parser is only advanced
//! as far as the call needs.

use super::document::Document;
use super::node::{NodeData, NodeId, NodeKind};
use crate::error::{OmError, Result};
use crate::reader::XmlCursor;

/// DOM node type codes
pub mod node_type {
    pub const ELEMENT: u16 = 1;
    pub const ATTRIBUTE: u16 = 2;
    pub const TEXT: u16 = 3;
    pub const CDATA_SECTION: u16 = 4;
    pub const PROCESSING_INSTRUCTION: u16 = 7;
    pub const COMMENT: u16 = 8;
    pub const DOCUMENT: u16 = 9;
    pub const DOCUMENT_TYPE: u16 = 10;
}

pub struct DomView<'d, C: XmlCursor> {
    doc: &'d mut Document<C>,
}

impl<'d, C: XmlCursor> DomView<'d, C> {
    pub fn new(doc: &'d mut Document<C>) -> Self {
        DomView { doc }
    }

    pub fn document(&mut self) -> &mut Document<C> {
        &mut *self.doc
    }

    pub fn document_element(&mut self) -> Result<Option<NodeId>> {
        self.doc.document_element()
    }

    /// A binary reference reports itself as an element (`xop:Include`)
    pub fn node_type(&self, id: NodeId) -> Result<u16> {
        Ok(match self.doc.node_kind(id)? {
            NodeKind::Element | NodeKind::BinaryReference => node_type::ELEMENT,
            NodeKind::Attribute => node_type::ATTRIBUTE,
            NodeKind::Text if self.doc.is_cdata(id) => node_type::CDATA_SECTION,
            NodeKind::Text => node_type::TEXT,
            NodeKind::ProcessingInstruction => node_type::PROCESSING_INSTRUCTION,
            NodeKind::Comment => node_type::COMMENT,
            NodeKind::Document => node_type::DOCUMENT,
            NodeKind::DocType => node_type::DOCUMENT_TYPE,
        })
    }

    /// Qualified name for elements and attributes, `#text` and friends for
    /// the rest
    pub fn node_name(&self, id: NodeId) -> Result<String> {
        Ok(match self.doc.node_kind(id)? {
            NodeKind::Element | NodeKind::Attribute => {
                let local = self.doc.local_name(id).unwrap_or_default();
                match self.doc.prefix(id).filter(|p| !p.is_empty()) {
                    Some(prefix) => format!("{}:{}", prefix, local),
                    None => local.to_string(),
                }
            }
            NodeKind::BinaryReference => "xop:Include".to_string(),
            NodeKind::Text if self.doc.is_cdata(id) => "#cdata-section".to_string(),
            NodeKind::Text => "#text".to_string(),
            NodeKind::Comment => "#comment".to_string(),
            NodeKind::Document => "#document".to_string(),
            NodeKind::ProcessingInstruction => self.doc.pi_target(id).unwrap_or_default().to_string(),
            NodeKind::DocType => self
                .doc
                .value(id)
                .and_then(|body| body.split_whitespace().next())
                .unwrap_or_default()
                .to_string(),
        })
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.doc.local_name(id)
    }

    /// `None` for names without a namespace
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.doc.namespace_uri(id).filter(|uri| !uri.is_empty())
    }

    pub fn parent_node(&self, id: NodeId) -> Result<Option<NodeId>> {
        if self.doc.node_kind(id)? == NodeKind::Attribute {
            return Ok(None);
        }
        self.doc.parent(id)
    }

    pub fn child_nodes(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.doc.children(id)
    }

    pub fn first_child(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        self.doc.first_child(id)
    }

    pub fn next_sibling(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        self.doc.next_sibling(id)
    }

    /// Descendant elements in document order matching the expanded name.
    /// `"*"` matches any namespace (including none) or any local name.
    pub fn get_elements_by_tag_name_ns(
        &mut self,
        root: NodeId,
        namespace_uri: &str,
        local_name: &str,
    ) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = self.doc.child_elements(root)?;
        stack.reverse();
        while let Some(id) = stack.pop() {
            let ns_match = namespace_uri == "*"
                || self.namespace_uri(id).unwrap_or_default() == namespace_uri;
            let name_match = local_name == "*" || self.doc.local_name(id) == Some(local_name);
            if ns_match && name_match {
                out.push(id);
            }
            let mut children = self.doc.child_elements(id)?;
            children.reverse();
            stack.extend(children);
        }
        Ok(out)
    }

    /// Attribute value, or `None` when the attribute is absent
    pub fn get_attribute_ns(&self, element: NodeId, namespace_uri: Option<&str>, local_name: &str) -> Result<Option<&str>> {
        self.doc.attribute_value(element, namespace_uri, local_name)
    }

    pub fn has_attribute_ns(&self, element: NodeId, namespace_uri: Option<&str>, local_name: &str) -> Result<bool> {
        Ok(self.doc.attribute(element, namespace_uri, local_name)?.is_some())
    }

    /// `qualified_name` may carry a prefix (`p:name`)
    pub fn set_attribute_ns(
        &mut self,
        element: NodeId,
        namespace_uri: Option<&str>,
        qualified_name: &str,
        value: &str,
    ) -> Result<NodeId> {
        let (prefix, local) = match qualified_name.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qualified_name),
        };
        if prefix.is_some() && namespace_uri.filter(|u| !u.is_empty()).is_none() {
            return Err(OmError::InvalidOperation("a prefixed attribute needs a namespace"));
        }
        self.doc.add_attribute(element, local, namespace_uri, prefix, value)
    }

    pub fn remove_attribute_ns(&mut self, element: NodeId, namespace_uri: Option<&str>, local_name: &str) -> Result<bool> {
        self.doc.remove_attribute(element, namespace_uri, local_name)
    }

    /// Concatenated character data of all descendant text nodes; the value
    /// itself for leaves
    pub fn text_content(&mut self, id: NodeId) -> Result<String> {
        if !self.doc.node_kind(id)?.is_container() {
            return Ok(self.doc.value(id).unwrap_or_default().to_string());
        }
        let mut out = String::new();
        let mut stack = self.doc.children(id)?;
        stack.reverse();
        while let Some(child) = stack.pop() {
            let node = self.doc.tree().node(child)?;
            if let NodeData::Text { content, .. } = &node.data {
                out.push_str(content);
            } else if node.is_element() {
                let mut children = self.doc.children(child)?;
                children.reverse();
                stack.extend(children);
            }
        }
        Ok(out)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        self.doc.add_child(parent, child)?;
        Ok(child)
    }

    pub fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> Result<NodeId> {
        match reference {
            Some(anchor) => {
                if self.doc.parent(anchor)? != Some(parent) {
                    return Err(OmError::InvalidOperation("reference node is not a child of the parent"));
                }
                self.doc.insert_sibling_before(anchor, node)?;
            }
            None => self.doc.add_child(parent, node)?,
        }
        Ok(node)
    }

    /// Detach `child` from `parent`; the node stays usable
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        if self.doc.parent(child)? != Some(parent) || self.doc.node_kind(child)? == NodeKind::Attribute {
            return Err(OmError::InvalidOperation("node is not a child of the parent"));
        }
        self.doc.detach(child)
    }

    pub fn create_element_ns(&mut self, namespace_uri: Option<&str>, qualified_name: &str) -> NodeId {
        let (prefix, local) = match qualified_name.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (namespace_uri.map(|_| ""), qualified_name),
        };
        self.doc.create_element(local, namespace_uri, prefix)
    }

    pub fn create_text_node(&mut self, text: &str) -> NodeId {
        self.doc.create_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::XmlStreamReader;

    const XML: &str = r#"<r xmlns="urn:r" xmlns:x="urn:x"><x:a id="1">one</x:a><b><x:a id="2"><![CDATA[two]]></x:a></b><!--c--></r>"#;

    #[test]
    fn test_node_types_and_names() {
        let mut doc = Document::open(XmlStreamReader::new(XML));
        let mut view = DomView::new(&mut doc);
        let r = view.document_element().unwrap().unwrap();
        let kids = view.child_nodes(r).unwrap();
        assert_eq!(view.node_type(r).unwrap(), node_type::ELEMENT);
        assert_eq!(view.node_name(kids[0]).unwrap(), "x:a");
        assert_eq!(view.node_name(kids[2]).unwrap(), "#comment");
        assert_eq!(view.node_type(kids[2]).unwrap(), node_type::COMMENT);
        assert_eq!(view.namespace_uri(kids[1]), Some("urn:r"));
        assert_eq!(view.node_type(NodeId::DOCUMENT).unwrap(), node_type::DOCUMENT);
    }

    #[test]
    fn test_elements_by_tag_name_ns() {
        let mut doc = Document::open(XmlStreamReader::new(XML));
        let mut view = DomView::new(&mut doc);
        let r = view.document_element().unwrap().unwrap();

        let found = view.get_elements_by_tag_name_ns(r, "urn:x", "a").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(view.get_attribute_ns(found[1], None, "id").unwrap(), Some("2"));

        assert_eq!(view.get_elements_by_tag_name_ns(r, "*", "*").unwrap().len(), 3);
        assert_eq!(view.get_elements_by_tag_name_ns(r, "urn:r", "*").unwrap().len(), 1);
    }

    #[test]
    fn test_text_content_and_cdata() {
        let mut doc = Document::open(XmlStreamReader::new(XML));
        let mut view = DomView::new(&mut doc);
        let r = view.document_element().unwrap().unwrap();
        assert_eq!(view.text_content(r).unwrap(), "onetwo");
        let inner = view.get_elements_by_tag_name_ns(r, "urn:x", "a").unwrap()[1];
        let cdata = view.first_child(inner).unwrap().unwrap();
        assert_eq!(view.node_type(cdata).unwrap(), node_type::CDATA_SECTION);
    }

    #[test]
    fn test_attribute_edits() {
        let mut doc = Document::open(XmlStreamReader::new(XML));
        let mut view = DomView::new(&mut doc);
        let r = view.document_element().unwrap().unwrap();
        view.set_attribute_ns(r, Some("urn:x"), "x:flag", "yes").unwrap();
        assert!(view.has_attribute_ns(r, Some("urn:x"), "flag").unwrap());
        assert!(view.set_attribute_ns(r, None, "y:bad", "1").is_err());
        assert!(view.remove_attribute_ns(r, Some("urn:x"), "flag").unwrap());
        assert!(!view.has_attribute_ns(r, Some("urn:x"), "flag").unwrap());
    }

    #[test]
    fn test_append_and_remove_child() {
        let mut doc = Document::open(XmlStreamReader::new("<r><a/></r>"));
        let mut view = DomView::new(&mut doc);
        let r = view.document_element().unwrap().unwrap();
        let a = view.first_child(r).unwrap().unwrap();

        let n = view.create_element_ns(Some("urn:n"), "n:new");
        let t = view.create_text_node("t");
        view.append_child(n, t).unwrap();
        view.append_child(r, n).unwrap();
        assert_eq!(view.child_nodes(r).unwrap(), vec![a, n]);

        assert!(view.remove_child(n, a).is_err());
        view.remove_child(r, a).unwrap();
        assert_eq!(view.child_nodes(r).unwrap(), vec![n]);
        assert_eq!(view.parent_node(a).unwrap(), None);
        assert_eq!(view.text_content(r).unwrap(), "t");
    }
}
