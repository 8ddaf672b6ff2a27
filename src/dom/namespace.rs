//! Namespace Scope
//!
//! A namespace is an interned (URI, prefix) pair. Prefix→URI lookups walk the
//! declared bindings up the ancestor chain, the same way the reader's
//! resolver walks its binding stack.

use super::node::NodeId;
use super::strings::{StrId, StringPool};
use super::tree::Tree;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
    pub const XOP: &str = "http://www.w3.org/2004/08/xop/include";
}

/// Interned namespace: URI plus prefix.
///
/// `prefix == None` means no prefix was specified (the serializer picks
/// one); `Some(0)` is the default (empty) prefix. A declared binding with
/// URI 0 undeclares the default namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub uri: StrId,
    pub prefix: Option<StrId>,
}

impl Namespace {
    pub fn intern(strings: &mut StringPool, uri: &str, prefix: Option<&str>) -> Self {
        Namespace {
            uri: strings.intern(uri),
            prefix: prefix.map(|p| strings.intern(p)),
        }
    }

    /// Prefix as written, empty for the default or unspecified prefix
    pub fn prefix_str<'a>(&self, strings: &'a StringPool) -> &'a str {
        self.prefix.map_or("", |p| strings.get(p))
    }
}

impl Tree {
    /// Resolve `prefix` to a URI from `node` upward. The empty prefix
    /// resolves the default namespace; `xml` is always bound.
    pub fn lookup_namespace_uri(&self, node: NodeId, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(ns::XML);
        }
        let prefix_id = self.strings.find(prefix)?;
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.get(id)?;
            if let Some(element) = n.as_element() {
                if let Some(binding) = element.declared.iter().find(|b| b.prefix == Some(prefix_id)) {
                    return Some(self.strings.get(binding.uri)).filter(|uri| !uri.is_empty());
                }
            }
            current = n.parent;
        }
        None
    }

    /// Find a prefix in scope at `node` that is bound to `uri` and not
    /// shadowed by a closer declaration.
    pub fn lookup_prefix(&self, node: NodeId, uri: &str) -> Option<&str> {
        if uri == ns::XML {
            return Some("xml");
        }
        let uri_id = self.strings.find(uri)?;
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.get(id)?;
            if let Some(element) = n.as_element() {
                for binding in element.declared.iter().filter(|b| b.uri == uri_id) {
                    let prefix = binding.prefix_str(&self.strings);
                    if self.lookup_namespace_uri(node, prefix) == Some(uri) {
                        return Some(prefix);
                    }
                }
            }
            current = n.parent;
        }
        None
    }

    /// `(prefix, uri)` pairs declared on an element, in declaration order
    pub fn declared_namespaces(&self, node: NodeId) -> Vec<(&str, &str)> {
        self.get(node)
            .and_then(|n| n.as_element())
            .map(|e| {
                e.declared
                    .iter()
                    .map(|b| (b.prefix_str(&self.strings), self.strings.get(b.uri)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::{ElementData, Node};

    fn element(tree: &mut Tree, name: &str, declared: &[(&str, &str)]) -> NodeId {
        let local_name = tree.strings.intern(name);
        let declared = declared
            .iter()
            .map(|&(p, u)| Namespace::intern(&mut tree.strings, u, Some(p)))
            .collect();
        tree.alloc(Node::element(
            ElementData {
                local_name,
                namespace: None,
                declared,
                attributes: Vec::new(),
            },
            true,
        ))
    }

    #[test]
    fn test_lookup_up_ancestors() {
        let mut tree = Tree::new();
        let outer = element(&mut tree, "a", &[("", "urn:d"), ("p", "urn:p")]);
        let inner = element(&mut tree, "b", &[("p", "urn:q")]);
        tree.append_child(NodeId::DOCUMENT, outer);
        tree.append_child(outer, inner);

        assert_eq!(tree.lookup_namespace_uri(inner, ""), Some("urn:d"));
        assert_eq!(tree.lookup_namespace_uri(inner, "p"), Some("urn:q"));
        assert_eq!(tree.lookup_namespace_uri(outer, "p"), Some("urn:p"));
        assert_eq!(tree.lookup_namespace_uri(inner, "zz"), None);
        assert_eq!(tree.lookup_namespace_uri(inner, "xml"), Some(ns::XML));
    }

    #[test]
    fn test_lookup_prefix_skips_shadowed() {
        let mut tree = Tree::new();
        let outer = element(&mut tree, "a", &[("p", "urn:p")]);
        let inner = element(&mut tree, "b", &[("p", "urn:q")]);
        tree.append_child(NodeId::DOCUMENT, outer);
        tree.append_child(outer, inner);

        assert_eq!(tree.lookup_prefix(outer, "urn:p"), Some("p"));
        assert_eq!(tree.lookup_prefix(inner, "urn:p"), None);
        assert_eq!(tree.lookup_prefix(inner, "urn:q"), Some("p"));
    }

    #[test]
    fn test_undeclared_default() {
        let mut tree = Tree::new();
        let outer = element(&mut tree, "a", &[("", "urn:d")]);
        let inner = element(&mut tree, "b", &[("", "")]);
        tree.append_child(NodeId::DOCUMENT, outer);
        tree.append_child(outer, inner);
        assert_eq!(tree.lookup_namespace_uri(inner, ""), None);
        assert_eq!(tree.declared_namespaces(outer), vec![("", "urn:d")]);
    }
}
