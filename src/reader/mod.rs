//! Pull parsing
//!
//! - [`XmlCursor`]: the event contract the object model builder consumes
//! - [`XmlStreamReader`]: namespace-aware reader over an in-memory document

pub mod cursor;
pub mod namespace;
pub mod stream;

pub use cursor::{EmptyCursor, EventKind, XmlCursor};
pub use stream::XmlStreamReader;
