//! Builder for the Volumetric ROI Measurements structured report template.
//!
//! The [`domain`] layer provides the content tree and its value objects, the
//! [`template`] layer fills that tree row by row according to the template.
//!
//! ```
//! use sr_template::domain::codes::{CUBIC_CENTIMETER, VOLUME};
//! use sr_template::domain::{sop_class, CodeSelection, ImageReference, MeasurementValue};
//! use sr_template::template::VolumetricRoiMeasurements;
//!
//! let mut report: VolumetricRoiMeasurements = VolumetricRoiMeasurements::new(false);
//! report.set_tracking_identifier("T1", true)?;
//! report.set_tracking_unique_identifier("1.2.3", true)?;
//! report.set_referenced_segment(
//!     &ImageReference::new(sop_class::SEGMENTATION_STORAGE, "1.2.3.5").with_segments([1]),
//!     true,
//! )?;
//! report.set_source_series_for_segmentation("1.2.3.4", true)?;
//! report.add_measurement(
//!     &VOLUME.into(),
//!     &MeasurementValue::new("120.5", CUBIC_CENTIMETER),
//!     &CodeSelection::new(),
//!     &CodeSelection::new(),
//!     true,
//! )?;
//! assert!(report.is_valid());
//! # Ok::<(), sr_template::template::TemplateError>(())
//! ```

pub mod config;
pub mod domain;
pub mod template;
pub mod util;
