//! Template layer: rows, slot bookkeeping and the TID 1411 builder
//!
//! Builds on the domain layer's content tree; adds no I/O.

pub mod builder;
pub mod error;
pub mod slots;

pub use builder::VolumetricRoiMeasurements;
pub use error::{TemplateError, TemplateResult};
pub use slots::{Row, RowSpec, SlotTable};
