//! Node arena
//!
//! Slots are `Option<Node>` so that released nodes can be recycled through
//! a free list. Slot 0 always holds the Document node.

use super::node::{Node, NodeId};
use super::strings::StringPool;
use crate::error::{OmError, Result};

/// Arena-based node storage
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<u32>,
    pub(crate) strings: StringPool,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Tree holding only an incomplete Document node
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(256);
        nodes.push(Some(Node::document()));
        Tree {
            nodes,
            free: Vec::new(),
            strings: StringPool::new(),
        }
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Node lookup for public operations; a released slot is an error
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(OmError::InvalidOperation("node handle is no longer valid"))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.get_mut(id).ok_or(OmError::InvalidOperation("node handle is no longer valid"))
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Store a node, reusing a released slot when one is available
    pub fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId((self.nodes.len() - 1) as u32)
            }
        }
    }

    /// Link `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let prev = self.get(parent).and_then(|p| p.last_child);
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
            c.prev_sibling = prev;
            c.next_sibling = None;
        }
        match prev {
            Some(prev) => {
                if let Some(p) = self.get_mut(prev) {
                    p.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.first_child = Some(child);
                }
            }
        }
        if let Some(p) = self.get_mut(parent) {
            p.last_child = Some(child);
        }
    }

    /// Link `node` right after `anchor`, under the anchor's parent
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        let Some(a) = self.get(anchor) else { return };
        let (parent, next) = (a.parent, a.next_sibling);
        if let Some(n) = self.get_mut(node) {
            n.parent = parent;
            n.prev_sibling = Some(anchor);
            n.next_sibling = next;
        }
        if let Some(a) = self.get_mut(anchor) {
            a.next_sibling = Some(node);
        }
        match next {
            Some(next) => {
                if let Some(n) = self.get_mut(next) {
                    n.prev_sibling = Some(node);
                }
            }
            None => {
                if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
                    p.last_child = Some(node);
                }
            }
        }
    }

    /// Link `node` right before `anchor`, under the anchor's parent
    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) {
        let Some(a) = self.get(anchor) else { return };
        let (parent, prev) = (a.parent, a.prev_sibling);
        if let Some(n) = self.get_mut(node) {
            n.parent = parent;
            n.prev_sibling = prev;
            n.next_sibling = Some(anchor);
        }
        if let Some(a) = self.get_mut(anchor) {
            a.prev_sibling = Some(node);
        }
        match prev {
            Some(prev) => {
                if let Some(p) = self.get_mut(prev) {
                    p.next_sibling = Some(node);
                }
            }
            None => {
                if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
                    p.first_child = Some(node);
                }
            }
        }
    }

    /// Remove a node from its parent's child list. The subtree below it
    /// stays intact.
    pub fn unlink(&mut self, id: NodeId) {
        let Some(n) = self.get(id) else { return };
        let (parent, prev, next) = (n.parent, n.prev_sibling, n.next_sibling);

        match prev {
            Some(prev) => {
                if let Some(p) = self.get_mut(prev) {
                    p.next_sibling = next;
                }
            }
            None => {
                if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
                    if p.first_child == Some(id) {
                        p.first_child = next;
                    }
                }
            }
        }
        match next {
            Some(next) => {
                if let Some(n) = self.get_mut(next) {
                    n.prev_sibling = prev;
                }
            }
            None => {
                if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
                    if p.last_child == Some(id) {
                        p.last_child = prev;
                    }
                }
            }
        }

        if let Some(n) = self.get_mut(id) {
            n.parent = None;
            n.prev_sibling = None;
            n.next_sibling = None;
        }
    }

    /// Free the slots of an unlinked subtree, attributes included
    pub fn free_subtree(&mut self, id: NodeId) {
        if id == NodeId::DOCUMENT {
            return;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.index()).and_then(Option::take) else {
                continue;
            };
            if let Some(element) = node.as_element() {
                stack.extend(element.attributes.iter().copied());
            }
            let mut child = node.first_child;
            while let Some(c) = child {
                child = self.get(c).and_then(|n| n.next_sibling);
                stack.push(c);
            }
            self.free.push(current.0);
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// Number of live nodes, the Document included
    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::NodeData;

    fn text(tree: &mut Tree, s: &str) -> NodeId {
        tree.alloc(Node::leaf(NodeData::Text {
            content: s.to_string(),
            cdata: false,
        }))
    }

    fn children(tree: &Tree, parent: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut child = tree.get(parent).and_then(|n| n.first_child);
        while let Some(c) = child {
            out.push(c);
            child = tree.get(c).and_then(|n| n.next_sibling);
        }
        out
    }

    #[test]
    fn test_append_and_insert() {
        let mut tree = Tree::new();
        let a = text(&mut tree, "a");
        let b = text(&mut tree, "b");
        let c = text(&mut tree, "c");
        tree.append_child(NodeId::DOCUMENT, b);
        tree.insert_before(b, a);
        tree.insert_after(b, c);

        assert_eq!(children(&tree, NodeId::DOCUMENT), vec![a, b, c]);
        let doc = tree.get(NodeId::DOCUMENT).unwrap();
        assert_eq!(doc.first_child, Some(a));
        assert_eq!(doc.last_child, Some(c));
    }

    #[test]
    fn test_unlink_relinks_siblings() {
        let mut tree = Tree::new();
        let ids: Vec<_> = ["a", "b", "c"].iter().map(|s| text(&mut tree, s)).collect();
        for &id in &ids {
            tree.append_child(NodeId::DOCUMENT, id);
        }
        tree.unlink(ids[1]);
        assert_eq!(children(&tree, NodeId::DOCUMENT), vec![ids[0], ids[2]]);
        assert_eq!(tree.get(ids[2]).unwrap().prev_sibling, Some(ids[0]));
        assert!(tree.get(ids[1]).unwrap().parent.is_none());

        tree.unlink(ids[2]);
        assert_eq!(tree.get(NodeId::DOCUMENT).unwrap().last_child, Some(ids[0]));
    }

    #[test]
    fn test_free_list_recycles_slots() {
        let mut tree = Tree::new();
        let a = text(&mut tree, "a");
        tree.append_child(NodeId::DOCUMENT, a);
        assert_eq!(tree.live_count(), 2);

        tree.unlink(a);
        tree.free_subtree(a);
        assert_eq!(tree.live_count(), 1);
        assert!(tree.node(a).is_err());

        let b = text(&mut tree, "b");
        assert_eq!(a, b);
        assert_eq!(tree.live_count(), 2);
    }
}
