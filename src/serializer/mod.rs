//! Streaming serializer
//!
//! Two entry points on [`Document`]:
//! - `serialize`: builds the subtree, then writes it; the tree is unchanged
//! - `serialize_and_consume`: writes what is already built, then fuses the
//!   rest of the parser output straight into the writer, releasing every
//!   node as soon as it has been written

pub mod scope;
pub mod writer;

pub use scope::NamespaceScope;
pub use writer::{StreamWriter, XmlWriter};

use tracing::{debug, trace};

use crate::dom::builder::StepOutcome;
use crate::dom::namespace::ns;
use crate::dom::node::{NodeData, NodeId};
use crate::dom::tree::Tree;
use crate::dom::Document;
use crate::error::{OmError, Result};
use crate::reader::XmlCursor;
use crate::xop::href_for_content_id;

/// Serializer configuration
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Write the XML declaration when serializing the Document node
    pub xml_declaration: bool,
    /// Stem of generated prefixes (`ns1`, `ns2`, ...)
    pub prefix_stem: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            xml_declaration: false,
            prefix_stem: "ns".to_string(),
        }
    }
}

impl WriterOptions {
    pub fn with_xml_declaration(mut self, on: bool) -> Self {
        self.xml_declaration = on;
        self
    }

    pub fn with_prefix_stem(mut self, stem: impl Into<String>) -> Self {
        self.prefix_stem = stem.into();
        self
    }
}

/// Start tag of an element: name, attributes, then the declarations the
/// output scope is missing
fn open_element<W: XmlWriter>(tree: &Tree, scope: &mut NamespaceScope, writer: &mut W, id: NodeId) -> Result<()> {
    let strings = tree.strings();
    let Some(element) = tree.node(id)?.as_element() else {
        return Ok(());
    };
    scope.push();

    for binding in &element.declared {
        scope.bind(binding.prefix_str(strings), strings.get(binding.uri));
    }

    let prefix = scope.prefix_for(
        element.namespace.map(|n| strings.get(n.uri)),
        element.namespace.and_then(|n| n.prefix).map(|p| strings.get(p)),
        false,
    );

    let mut attributes = Vec::with_capacity(element.attributes.len());
    for &attr_id in &element.attributes {
        let Some(attr) = tree.node(attr_id)?.as_attribute() else {
            continue;
        };
        let attr_prefix = scope.prefix_for(
            attr.namespace.map(|n| strings.get(n.uri)),
            attr.namespace.and_then(|n| n.prefix).map(|p| strings.get(p)),
            true,
        );
        attributes.push((attr_prefix, strings.get(attr.local_name), attr.value.as_str()));
    }

    writer.write_start_element(&prefix, strings.get(element.local_name))?;
    for (attr_prefix, local_name, value) in &attributes {
        writer.write_attribute(attr_prefix, local_name, value)?;
    }
    write_declarations(scope, writer)
}

fn write_declarations<W: XmlWriter>(scope: &NamespaceScope, writer: &mut W) -> Result<()> {
    for (prefix, uri) in scope.frame_declarations() {
        if prefix.is_empty() {
            writer.write_default_namespace(uri)?;
        } else {
            writer.write_namespace(prefix, uri)?;
        }
    }
    Ok(())
}

fn close_element<W: XmlWriter>(scope: &mut NamespaceScope, writer: &mut W) -> Result<()> {
    writer.write_end_element()?;
    scope.pop();
    Ok(())
}

fn write_leaf<W: XmlWriter>(tree: &Tree, scope: &mut NamespaceScope, writer: &mut W, id: NodeId) -> Result<()> {
    match &tree.node(id)?.data {
        NodeData::Text { content, cdata: false } => writer.write_characters(content),
        NodeData::Text { content, cdata: true } => writer.write_cdata(content),
        NodeData::Comment(text) => writer.write_comment(text),
        NodeData::ProcessingInstruction { target, data } => writer.write_processing_instruction(target, data),
        NodeData::DocType(body) => writer.write_doctype(body),
        NodeData::BinaryReference { content_id, .. } => {
            scope.push();
            let prefix = scope.prefix_for(Some(ns::XOP), Some("xop"), false);
            writer.write_start_element(&prefix, "Include")?;
            writer.write_attribute("", "href", &href_for_content_id(content_id))?;
            write_declarations(scope, writer)?;
            close_element(scope, writer)
        }
        NodeData::Document { .. } | NodeData::Element(_) | NodeData::Attribute(_) => Ok(()),
    }
}

fn write_prolog<W: XmlWriter>(tree: &Tree, writer: &mut W, options: &WriterOptions) -> Result<()> {
    if !options.xml_declaration {
        return Ok(());
    }
    if let NodeData::Document { version, encoding } = &tree.node(NodeId::DOCUMENT)?.data {
        writer.write_xml_declaration(version.as_deref().unwrap_or("1.0"), encoding.as_deref())?;
    }
    Ok(())
}

/// Write a fully built subtree
fn write_subtree<W: XmlWriter>(
    tree: &Tree,
    scope: &mut NamespaceScope,
    writer: &mut W,
    root: NodeId,
    options: &WriterOptions,
) -> Result<()> {
    enum StackEntry {
        Enter(NodeId),
        Close,
    }

    let mut stack: Vec<StackEntry> = Vec::with_capacity(64);
    stack.push(StackEntry::Enter(root));

    while let Some(entry) = stack.pop() {
        match entry {
            StackEntry::Close => close_element(scope, writer)?,
            StackEntry::Enter(id) => {
                let node = tree.node(id)?;
                // its content was written away and released
                if node.consumed {
                    return Err(OmError::Consumed);
                }
                match &node.data {
                    NodeData::Document { .. } => write_prolog(tree, writer, options)?,
                    NodeData::Element(_) => {
                        open_element(tree, scope, writer, id)?;
                        stack.push(StackEntry::Close);
                    }
                    _ => {
                        write_leaf(tree, scope, writer, id)?;
                        continue;
                    }
                }
                // Children in reverse so the first is processed next
                let mut child = node.last_child;
                while let Some(c) = child {
                    stack.push(StackEntry::Enter(c));
                    child = tree.get(c).and_then(|n| n.prev_sibling);
                }
            }
        }
    }
    Ok(())
}

impl<C: XmlCursor> Document<C> {
    /// Build the subtree of `id` and write it
    pub fn serialize<W: XmlWriter>(&mut self, id: NodeId, writer: W) -> Result<()> {
        self.serialize_with(id, writer, &WriterOptions::default())
    }

    pub fn serialize_with<W: XmlWriter>(&mut self, id: NodeId, mut writer: W, options: &WriterOptions) -> Result<()> {
        self.build(id)?;
        debug!(?id, "serializing subtree");
        let mut scope = NamespaceScope::new(&options.prefix_stem);
        write_subtree(&self.tree, &mut scope, &mut writer, id, options)?;
        writer.flush()
    }

    /// Write `id` without building what has not been read yet. The unread
    /// part is pulled from the parser and written event by event; the node
    /// is marked consumed afterwards. On a complete node this is the same as
    /// `serialize` and leaves the tree intact.
    pub fn serialize_and_consume<W: XmlWriter>(&mut self, id: NodeId, writer: W) -> Result<()> {
        self.serialize_and_consume_with(id, writer, &WriterOptions::default())
    }

    pub fn serialize_and_consume_with<W: XmlWriter>(
        &mut self,
        id: NodeId,
        mut writer: W,
        options: &WriterOptions,
    ) -> Result<()> {
        if self.open_node(id)?.complete {
            return self.serialize_with(id, writer, options);
        }

        debug!(?id, "serializing with pull-through");
        let cache = self.builder.cache;
        self.builder.cache = false;
        let result = self.pull_through(id, &mut writer, options);
        self.builder.cache = cache;
        result?;

        self.tree.node_mut(id)?.consumed = true;
        debug!(?id, live = self.tree.live_count(), "pull-through finished");
        writer.flush()
    }

    fn pull_through<W: XmlWriter>(&mut self, id: NodeId, writer: &mut W, options: &WriterOptions) -> Result<()> {
        let mut scope = NamespaceScope::new(&options.prefix_stem);

        // Already built part: complete children are written from the tree,
        // the one incomplete child continues the open path
        let mut current = id;
        loop {
            if current == NodeId::DOCUMENT {
                write_prolog(&self.tree, writer, options)?;
            } else {
                open_element(&self.tree, &mut scope, writer, current)?;
            }
            let mut open_child = None;
            let mut child = self.tree.node(current)?.first_child;
            while let Some(c) = child {
                let node = self.tree.node(c)?;
                if !node.complete {
                    open_child = Some(c);
                    break;
                }
                child = node.next_sibling;
                write_subtree(&self.tree, &mut scope, writer, c, options)?;
            }
            match open_child {
                Some(c) if self.tree.node(c)?.consumed => return Err(OmError::Consumed),
                Some(c) => current = c,
                None => break,
            }
        }

        // Unread part: every event goes straight to the writer
        loop {
            let outcome = self.builder.step(&mut self.tree)?;
            trace!(?outcome, "pull-through");
            match outcome {
                StepOutcome::Created(n) => {
                    if self.tree.node(n)?.kind().is_container() {
                        open_element(&self.tree, &mut scope, writer, n)?;
                    } else {
                        write_leaf(&self.tree, &mut scope, writer, n)?;
                        self.release(n);
                    }
                }
                StepOutcome::Completed(n) => {
                    close_element(&mut scope, writer)?;
                    if n == id {
                        return Ok(());
                    }
                    self.release(n);
                }
                StepOutcome::Finished => return Ok(()),
                StepOutcome::Skipped => {}
            }
        }
    }
}
