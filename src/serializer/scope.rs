//! Writer-side namespace scope
//!
//! The serializer does not trust the prefixes recorded in the tree: nodes
//! may have been moved between documents or created without a prefix. It
//! keeps its own prefix→URI bindings, one frame per open element, and
//! decides per name which prefix to write and which declarations to add.

use crate::dom::namespace::ns;

/// Prefix bindings in effect at the current output position
#[derive(Debug)]
pub struct NamespaceScope {
    /// (prefix, uri); an empty URI on the empty prefix undeclares the default
    bindings: Vec<(String, String)>,
    /// Binding count when each open frame started
    frames: Vec<usize>,
    counter: u32,
    stem: String,
}

impl NamespaceScope {
    /// Scope with only `xml` bound; generated prefixes are `{stem}1`,
    /// `{stem}2`, ...
    pub fn new(stem: &str) -> Self {
        NamespaceScope {
            bindings: vec![("xml".to_string(), ns::XML.to_string())],
            frames: Vec::with_capacity(32),
            counter: 0,
            stem: stem.to_string(),
        }
    }

    pub fn push(&mut self) {
        self.frames.push(self.bindings.len());
    }

    pub fn pop(&mut self) {
        if let Some(len) = self.frames.pop() {
            self.bindings.truncate(len);
        }
    }

    /// URI bound to `prefix`; `None` when unbound or undeclared
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, u)| u.as_str())
            .filter(|u| !u.is_empty())
    }

    /// Bind `prefix` in the current frame unless the binding is already in
    /// effect. Returns whether a declaration must be written.
    pub fn bind(&mut self, prefix: &str, uri: &str) -> bool {
        if prefix == "xml" || prefix == "xmlns" {
            return false;
        }
        let current = self.resolve(prefix).unwrap_or("");
        if current == uri {
            return false;
        }
        self.bindings.push((prefix.to_string(), uri.to_string()));
        true
    }

    /// Declarations added in the current frame, in order
    pub fn frame_declarations(&self) -> &[(String, String)] {
        let start = self.frames.last().copied().unwrap_or(0);
        &self.bindings[start..]
    }

    fn drop_frame_default(&mut self) {
        let start = self.frames.last().copied().unwrap_or(0);
        let mut frame = self.bindings.split_off(start);
        frame.retain(|(p, _)| !p.is_empty());
        self.bindings.append(&mut frame);
    }

    /// An unshadowed prefix currently bound to `uri`
    fn bound_prefix(&self, uri: &str, allow_default: bool) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .filter(|(p, u)| u == uri && (allow_default || !p.is_empty()))
            .map(|(p, _)| p.as_str())
            .find(|p| self.resolve(p) == Some(uri))
    }

    fn generate(&mut self) -> String {
        loop {
            self.counter += 1;
            let prefix = format!("{}{}", self.stem, self.counter);
            if self.resolve(&prefix).is_none() {
                return prefix;
            }
        }
    }

    /// Prefix to write for a name in `uri`, adding a binding to the current
    /// frame when none is in effect. `original` is the prefix recorded on
    /// the node. The default prefix never applies to attributes.
    pub fn prefix_for(&mut self, uri: Option<&str>, original: Option<&str>, attribute: bool) -> String {
        let uri = uri.filter(|u| !u.is_empty());
        let original = original.filter(|p| !attribute || !p.is_empty());

        let Some(uri) = uri else {
            if !attribute {
                // A default declared on this element itself cannot apply to
                // its unqualified name
                self.drop_frame_default();
                if self.resolve("").is_some() {
                    self.bind("", "");
                }
            }
            return String::new();
        };

        if let Some(p) = original {
            if self.resolve(p) == Some(uri) {
                return p.to_string();
            }
        }
        if let Some(p) = self.bound_prefix(uri, !attribute) {
            return p.to_string();
        }
        if let Some(p) = original {
            if self.resolve(p).is_none() && p != "xmlns" {
                self.bind(p, uri);
                return p.to_string();
            }
        }
        let prefix = self.generate();
        self.bind(&prefix, uri);
        prefix
    }
}
