//! lazyom - Deferred XML object model
//!
//! The tree is built on demand from a pull parser: navigating to a node that
//! has not been read yet advances the parser just far enough to produce it.
//!
//! Layers:
//! - core: byte scanning, tokenizing, entity handling
//! - reader: the [`XmlCursor`] event contract and a namespace-aware reader
//! - dom: arena tree, incremental builder, navigation, discard/detach,
//!   programmatic construction and a DOM-style view
//! - serializer: [`XmlWriter`] output, with `serialize` (build then write)
//!   and `serialize_and_consume` (pull events straight through to the
//!   writer, releasing nodes as they are written)
//! - soap / xop: envelope policy and MTOM binary references
//!
//! ```
//! use lazyom::{Document, StreamWriter, XmlStreamReader};
//!
//! let mut doc = Document::open(XmlStreamReader::new("<a><b>1</b><c/></a>"));
//! let a = doc.document_element()?.unwrap();
//! let b = doc.first_child(a)?.unwrap();
//! assert_eq!(doc.text(b)?, "1");
//! // <c/> has not been read yet
//! assert!(!doc.is_complete(a)?);
//!
//! let mut out = StreamWriter::new(Vec::new());
//! doc.serialize_and_consume(a, &mut out)?;
//! assert_eq!(out.into_inner(), b"<a><b>1</b><c/></a>");
//! # Ok::<(), lazyom::OmError>(())
//! ```

pub mod alloc_stats;
pub mod core;
pub mod dom;
pub mod error;
pub mod reader;
pub mod serializer;
pub mod soap;
pub mod xop;

pub use dom::{Builder, BuilderOptions, Document, DomView, NodeId, NodeKind, StepOutcome};
pub use error::{OmError, Result};
pub use reader::{EmptyCursor, EventKind, XmlCursor, XmlStreamReader};
pub use serializer::{StreamWriter, WriterOptions, XmlWriter};
pub use soap::{SoapFactory, SoapVersion};
pub use xop::{AttachmentMap, AttachmentResolver};
