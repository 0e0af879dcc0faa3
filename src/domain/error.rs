//! Content-level errors (tree and value objects)

use thiserror::Error;

use crate::domain::arena::{NodeId, Relationship, ValueKind};

/// Errors raised by the content tree and its value objects.
/// These know nothing about templates or rows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("no current content item")]
    NoCurrentNode,

    #[error("value kind mismatch: expected {expected}, found {found}")]
    ValueKindMismatch { expected: ValueKind, found: ValueKind },

    #[error("incomplete {0}")]
    IncompleteValue(&'static str),

    #[error("invalid {what}: {reason}")]
    InvalidValue { what: &'static str, reason: String },

    #[error("cannot add {child} item with relationship {relationship} to {parent}")]
    RelationshipNotAllowed {
        parent: String,
        relationship: Relationship,
        child: ValueKind,
    },

    #[error("cannot allocate content tree storage")]
    AllocationFailed,
}

/// Result type for content tree operations.
pub type ContentResult<T> = Result<T, ContentError>;
