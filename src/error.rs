//! Error taxonomy for building, navigating and serializing the object model

use crate::core::tokenizer::ParseError;

/// Errors raised by the builder, the navigation façade, discard/detach and
/// the serializer
#[derive(Debug, thiserror::Error)]
pub enum OmError {
    /// `step()` was called after the end of the document was reached
    #[error("builder is exhausted: the end of the document was already reached")]
    ExhaustedBuilder,

    /// Structural error reported by the underlying parser
    #[error("malformed content at byte {position}: {message}")]
    MalformedContent { message: String, position: usize },

    /// Illegal cache / parser-access transition
    #[error("invalid builder state: {0}")]
    InvalidBuilderState(&'static str),

    /// Discard attempted on an element that is already fully built
    #[error("element is already complete; detach it instead of discarding")]
    AlreadyComplete,

    /// A prefix is used without an enclosing declaration
    #[error("unresolved namespace prefix '{prefix}'")]
    UnresolvedNamespace { prefix: String },

    /// The node's content was streamed out by `serialize_and_consume`
    #[error("node content was consumed by a streaming serialization")]
    Consumed,

    /// The operation does not apply to this node
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// SOAP envelope structure violation
    #[error("SOAP structure error: {0}")]
    Soap(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ParseError> for OmError {
    fn from(err: ParseError) -> Self {
        OmError::MalformedContent {
            message: err.message,
            position: err.position,
        }
    }
}

pub type Result<T> = std::result::Result<T, OmError>;
