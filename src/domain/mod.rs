//! Domain layer: content tree and value objects
//!
//! This layer knows nothing about templates or rows.

pub mod arena;
pub mod codes;
pub mod error;
pub mod render;
pub mod value_set;
pub mod values;

pub use arena::{AddMode, ContentNode, ContentTree, ContentValue, NodeId, Relationship, ValueKind};
pub use codes::{BasicCode, CodedEntry};
pub use error::{ContentError, ContentResult};
pub use render::ToTermTree;
pub use value_set::{
    CodeSelection, GenericIntensityAndSizeMeasurements, ModelComponentUnits, ResponseCriteria,
    RoiMeasurementModifiers, ValueSet,
};
pub use values::{sop_class, CompositeReference, ImageReference, MeasurementValue};
