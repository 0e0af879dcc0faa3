//! Template-level errors (wraps content errors)

use thiserror::Error;

use crate::domain::ContentError;
use crate::template::slots::Row;

/// Errors of the template builder.
///
/// Every setter reports one of these instead of panicking; the caller
/// decides whether to retry, abort or continue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("illegal parameter: {0}")]
    IllegalParameter(String),

    #[error("invalid concept name for {row}: {message}")]
    InvalidConceptName { row: Row, message: String },

    #[error("invalid content item for {row}: {message}")]
    InvalidContentItem { row: Row, message: String },

    #[error("invalid template structure: {0}")]
    InvalidTemplateStructure(String),

    #[error("cannot add content item for {row}: {source}")]
    CannotAddContentItem {
        row: Row,
        #[source]
        source: ContentError,
    },

    #[error("no measurement group")]
    NoMeasurementGroup,

    #[error("memory exhausted")]
    MemoryExhausted,

    #[error("invalid segmentation object: {0}")]
    InvalidSegmentationObject(String),

    #[error("invalid real world value mapping object: {0}")]
    InvalidRealWorldValueMappingObject(String),

    #[error("{0}")]
    Content(#[from] ContentError),

    #[error("config error: {message}")]
    Config { message: String },
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
