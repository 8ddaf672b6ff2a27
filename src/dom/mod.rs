//! Object model
//!
//! Arena-backed tree built on demand from a pull parser:
//! - NodeId (u32) indices for parent/sibling/child links
//! - String interning for names, prefixes and namespace URIs
//! - A builder that grows the tree one parser event at a time
//! - A DOM-style view over the same tree

pub mod builder;
pub mod document;
pub mod mutation;
pub mod namespace;
pub mod node;
pub mod strings;
pub mod tree;
pub mod view;

pub use builder::{Builder, BuilderOptions, SharedResolver, StepOutcome};
pub use document::Document;
pub use namespace::Namespace;
pub use node::{NodeId, NodeKind};
pub use strings::StringPool;
pub use tree::Tree;
pub use view::DomView;
