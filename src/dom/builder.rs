//! Incremental builder
//!
//! Keeps the tree and the parser cursor in lock-step. Every [`Builder::step`]
//! reads exactly one cursor event and turns it into at most one tree change:
//! a node created under the frontier, or the nearest open container marked
//! complete.
//!
//! The frontier is the most recently created node. Every container between
//! the Document and the frontier is incomplete, and no other container is.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::namespace::{ns, Namespace};
use super::node::{AttributeData, ElementData, Node, NodeData, NodeId};
use super::strings::StringPool;
use super::tree::Tree;
use crate::error::{OmError, Result};
use crate::reader::{EventKind, XmlCursor};
use crate::xop::{content_id_from_href, AttachmentResolver};

/// Shared attachment store
pub type SharedResolver = Arc<dyn AttachmentResolver + Send + Sync>;

/// Builder configuration
#[derive(Clone)]
pub struct BuilderOptions {
    /// Initial cache mode
    pub cache: bool,
    /// Store consulted for `xop:Include` content ids
    pub attachments: Option<SharedResolver>,
    /// Turn `xop:Include` elements into binary references
    pub recognize_xop: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            cache: true,
            attachments: None,
            recognize_xop: true,
        }
    }
}

impl fmt::Debug for BuilderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderOptions")
            .field("cache", &self.cache)
            .field("attachments", &self.attachments.is_some())
            .field("recognize_xop", &self.recognize_xop)
            .finish()
    }
}

impl BuilderOptions {
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_attachments(mut self, resolver: impl AttachmentResolver + Send + Sync + 'static) -> Self {
        self.attachments = Some(Arc::new(resolver));
        self
    }

    pub fn with_xop(mut self, recognize: bool) -> Self {
        self.recognize_xop = recognize;
        self
    }
}

/// Result of a single builder step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A node was created and linked; it is the new frontier
    Created(NodeId),
    /// A container received its end marker
    Completed(NodeId),
    /// The event produced no tree change
    Skipped,
    /// The end of the document was reached
    Finished,
}

/// Drives an [`XmlCursor`] into a [`Tree`]
pub struct Builder<C> {
    cursor: C,
    pub(crate) frontier: NodeId,
    done: bool,
    pub(crate) cache: bool,
    parser_accessed: bool,
    prolog_read: bool,
    /// A parse error stopped the builder; the cursor position is unknown
    failed: bool,
    /// The document element has received its end marker
    root_closed: bool,
    options: BuilderOptions,
}

impl<C> fmt::Debug for Builder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("frontier", &self.frontier)
            .field("done", &self.done)
            .field("cache", &self.cache)
            .field("parser_accessed", &self.parser_accessed)
            .field("failed", &self.failed)
            .finish()
    }
}

impl<C: XmlCursor> Builder<C> {
    pub(crate) fn new(cursor: C, options: BuilderOptions) -> Self {
        Builder {
            cursor,
            frontier: NodeId::DOCUMENT,
            done: false,
            cache: options.cache,
            parser_accessed: false,
            prolog_read: false,
            failed: false,
            root_closed: false,
            options,
        }
    }

    /// Builder with nothing left to read
    pub(crate) fn finished(cursor: C) -> Self {
        let mut builder = Self::new(cursor, BuilderOptions::default());
        builder.done = true;
        builder.prolog_read = true;
        builder
    }

    /// The end of the document has been reached
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_caching(&self) -> bool {
        self.cache
    }

    pub fn parser_accessed(&self) -> bool {
        self.parser_accessed
    }

    /// A step or skip failed; no further events can be applied
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub(crate) fn root_closed(&self) -> bool {
        self.root_closed
    }

    /// Most recently created node
    pub fn frontier(&self) -> NodeId {
        self.frontier
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn attachments(&self) -> Option<&(dyn AttachmentResolver + Send + Sync)> {
        self.options.attachments.as_deref()
    }

    /// Switch cache mode. Re-enabling caching is refused once the parser has
    /// been handed out.
    pub fn set_cache(&mut self, cache: bool) -> Result<()> {
        if cache && self.parser_accessed {
            return Err(OmError::InvalidBuilderState(
                "caching cannot be re-enabled after the parser was handed out",
            ));
        }
        if cache != self.cache {
            debug!(cache, "builder cache mode changed");
        }
        self.cache = cache;
        Ok(())
    }

    /// Hand out the underlying cursor. Allowed once, and only with caching
    /// disabled; afterwards the builder can no longer step.
    pub fn external_parser(&mut self) -> Result<&mut C> {
        if self.cache {
            return Err(OmError::InvalidBuilderState(
                "the parser can only be handed out with caching disabled",
            ));
        }
        if self.parser_accessed {
            return Err(OmError::InvalidBuilderState("the parser was already handed out"));
        }
        self.parser_accessed = true;
        debug!("parser handed out to caller");
        Ok(&mut self.cursor)
    }

    fn ensure_cursor(&self) -> Result<()> {
        if self.parser_accessed {
            return Err(OmError::InvalidBuilderState(
                "the parser was handed out; the builder no longer knows its position",
            ));
        }
        if self.failed {
            return Err(OmError::InvalidBuilderState("the builder stopped at an earlier parse error"));
        }
        Ok(())
    }

    /// The cursor has moved past the event that failed, so nothing read
    /// after it can be placed in the tree
    fn poison<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(error = %e, "builder stopped");
            self.failed = true;
        }
        result
    }

    /// Read one event and apply it to the tree. A failed step leaves the
    /// tree structure unchanged.
    pub(crate) fn step(&mut self, tree: &mut Tree) -> Result<StepOutcome> {
        if self.done {
            return Err(OmError::ExhaustedBuilder);
        }
        self.ensure_cursor()?;
        let result = self.apply_next(tree);
        self.poison(result)
    }

    fn apply_next(&mut self, tree: &mut Tree) -> Result<StepOutcome> {
        let event = self.cursor.advance()?;
        if !self.prolog_read {
            self.read_prolog(tree)?;
        }

        let outcome = match event {
            EventKind::StartElement => match self.xop_include(tree)? {
                Some(outcome) => outcome,
                None => self.start_element(tree)?,
            },
            EventKind::EndElement => self.end_element(tree)?,
            EventKind::Text => self.add_leaf(
                tree,
                NodeData::Text {
                    content: self.cursor.text().to_string(),
                    cdata: false,
                },
            )?,
            EventKind::CData => self.add_leaf(
                tree,
                NodeData::Text {
                    content: self.cursor.text().to_string(),
                    cdata: true,
                },
            )?,
            EventKind::Comment => self.add_leaf(tree, NodeData::Comment(self.cursor.text().to_string()))?,
            EventKind::ProcessingInstruction => self.add_leaf(
                tree,
                NodeData::ProcessingInstruction {
                    target: self.cursor.pi_target().to_string(),
                    data: self.cursor.pi_data().to_string(),
                },
            )?,
            EventKind::DocType => self.add_leaf(tree, NodeData::DocType(self.cursor.text().to_string()))?,
            EventKind::EndDocument => {
                tree.node_mut(NodeId::DOCUMENT)?.complete = true;
                self.frontier = NodeId::DOCUMENT;
                self.done = true;
                StepOutcome::Finished
            }
            EventKind::StartDocument => StepOutcome::Skipped,
        };

        trace!(?event, ?outcome, "builder step");
        Ok(outcome)
    }

    /// Consume events by nesting depth only, without creating nodes, until
    /// `depth` end markers more than start markers have been read.
    pub(crate) fn skip(&mut self, depth: usize) -> Result<()> {
        self.ensure_cursor()?;
        let result = self.skip_events(depth);
        self.poison(result)
    }

    fn skip_events(&mut self, mut depth: usize) -> Result<()> {
        while depth > 0 {
            match self.cursor.advance()? {
                EventKind::StartElement => depth += 1,
                EventKind::EndElement => depth -= 1,
                EventKind::EndDocument => {
                    return Err(OmError::MalformedContent {
                        message: "document ended inside a skipped element".to_string(),
                        position: self.cursor.position(),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read_prolog(&mut self, tree: &mut Tree) -> Result<()> {
        if let NodeData::Document { version, encoding } = &mut tree.node_mut(NodeId::DOCUMENT)?.data {
            *version = self.cursor.xml_version().map(str::to_string);
            *encoding = self.cursor.encoding().map(str::to_string);
        }
        self.prolog_read = true;
        Ok(())
    }

    /// Container the next node is linked into: the frontier if it is still
    /// open, otherwise the frontier's parent.
    fn attachment_parent(&self, tree: &Tree) -> Result<NodeId> {
        let frontier = tree.node(self.frontier)?;
        if frontier.kind().is_container() && !frontier.complete {
            return Ok(self.frontier);
        }
        frontier
            .parent
            .ok_or(OmError::InvalidBuilderState("frontier has no open parent"))
    }

    fn link(&mut self, tree: &mut Tree, node: Node) -> Result<StepOutcome> {
        let parent = self.attachment_parent(tree)?;
        let id = tree.alloc(node);
        tree.append_child(parent, id);
        self.frontier = id;
        Ok(StepOutcome::Created(id))
    }

    fn add_leaf(&mut self, tree: &mut Tree, data: NodeData) -> Result<StepOutcome> {
        self.link(tree, Node::leaf(data))
    }

    fn start_element(&mut self, tree: &mut Tree) -> Result<StepOutcome> {
        let cursor = &self.cursor;
        let namespace = resolve(&mut tree.strings, cursor.prefix(), cursor.namespace_uri())?;

        let mut attributes = Vec::with_capacity(cursor.attribute_count());
        for i in 0..cursor.attribute_count() {
            attributes.push(AttributeData {
                local_name: tree.strings.intern(cursor.attribute_local_name(i)),
                namespace: resolve(
                    &mut tree.strings,
                    cursor.attribute_prefix(i),
                    cursor.attribute_namespace_uri(i),
                )?,
                value: cursor.attribute_value(i).to_string(),
            });
        }

        let mut declared: Vec<Namespace> = Vec::with_capacity(cursor.namespace_count());
        for i in 0..cursor.namespace_count() {
            let binding = Namespace::intern(
                &mut tree.strings,
                cursor.namespace_uri_at(i),
                Some(cursor.namespace_prefix(i)),
            );
            declared.retain(|b| b.prefix != binding.prefix);
            declared.push(binding);
        }

        let local_name = tree.strings.intern(cursor.local_name());
        let outcome = self.link(
            tree,
            Node::element(
                ElementData {
                    local_name,
                    namespace,
                    declared,
                    attributes: Vec::new(),
                },
                false,
            ),
        )?;

        if let StepOutcome::Created(id) = outcome {
            let mut ids = Vec::with_capacity(attributes.len());
            for attr in attributes {
                let attr_id = tree.alloc(Node::leaf(NodeData::Attribute(attr)));
                tree.node_mut(attr_id)?.parent = Some(id);
                ids.push(attr_id);
            }
            if let Some(element) = tree.node_mut(id)?.as_element_mut() {
                element.attributes = ids;
            }
        }
        Ok(outcome)
    }

    fn end_element(&mut self, tree: &mut Tree) -> Result<StepOutcome> {
        let target = self.attachment_parent(tree)?;
        if target == NodeId::DOCUMENT {
            return Err(OmError::InvalidBuilderState("end marker with no open element"));
        }
        let node = tree.node_mut(target)?;
        node.complete = true;
        if node.parent == Some(NodeId::DOCUMENT) {
            self.root_closed = true;
        }
        self.frontier = target;
        Ok(StepOutcome::Completed(target))
    }

    /// `xop:Include` with a known `cid:` reference becomes a binary
    /// reference; the rest of the include element is swallowed.
    fn xop_include(&mut self, tree: &mut Tree) -> Result<Option<StepOutcome>> {
        if !self.options.recognize_xop {
            return Ok(None);
        }
        let Some(resolver) = self.options.attachments.as_ref() else {
            return Ok(None);
        };
        let cursor = &self.cursor;
        if cursor.local_name() != "Include" || cursor.namespace_uri() != Some(ns::XOP) {
            return Ok(None);
        }

        let href = (0..cursor.attribute_count())
            .find(|&i| cursor.attribute_local_name(i) == "href" && cursor.attribute_namespace_uri(i).is_none())
            .map(|i| cursor.attribute_value(i));
        let Some(content_id) = href.and_then(content_id_from_href) else {
            return Ok(None);
        };
        let Some(content_type) = resolver.content_type(&content_id).map(str::to_string) else {
            warn!(%content_id, "xop:Include references an unknown attachment");
            return Ok(None);
        };

        self.attachment_parent(tree)?;
        self.skip(1)?;
        debug!(%content_id, "xop:Include replaced by binary reference");
        self.link(
            tree,
            Node::leaf(NodeData::BinaryReference {
                content_id,
                content_type: Some(content_type),
            }),
        )
        .map(Some)
    }
}

/// Namespace of an element or attribute name as reported by the cursor
fn resolve(strings: &mut StringPool, prefix: &str, uri: Option<&str>) -> Result<Option<Namespace>> {
    match uri {
        Some(uri) if !uri.is_empty() => Ok(Some(Namespace::intern(strings, uri, Some(prefix)))),
        _ if !prefix.is_empty() => Err(OmError::UnresolvedNamespace {
            prefix: prefix.to_string(),
        }),
        _ => Ok(None),
    }
}
