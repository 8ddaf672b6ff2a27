//! Core XML parsing primitives
//!
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Tokenizer: State machine for XML token extraction
//! - Entities: Reference decoding (Cow, zero-copy when possible) and escaping
//! - Attributes: Attribute parsing and namespace declaration detection

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod tokenizer;
