use gram_tl_wire::WireError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("No plan produces type {0}")]
    UnknownType(String),

    #[error("{0} declares no response type")]
    NoResponse(String),

    #[error("Expected {expected} value but found {found}")]
    Shape {
        expected: String,
        found:    String,
    },

    #[error("Dispatch for tag 0x{tag:08x} delegated more than {limit} times")]
    DelegationDepth { tag: u32, limit: usize },

    #[error("Objects nested more than {limit} levels deep")]
    NestingDepth { limit: usize },
}
