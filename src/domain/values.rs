//! Value objects carried by content items.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::codes::CodedEntry;
use crate::domain::error::{ContentError, ContentResult};
use crate::util::uid::check_uid;

/// SOP class identities accepted by reference rows.
pub mod sop_class {
    pub const SEGMENTATION_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.66.4";
    pub const SURFACE_SEGMENTATION_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.66.5";
    pub const REAL_WORLD_VALUE_MAPPING_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.67";
    pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
}

/// Maximum length of a decimal string.
pub const MAX_DECIMAL_STRING: usize = 16;

fn decimal_regex() -> &'static Regex {
    static DS: OnceLock<Regex> = OnceLock::new();
    DS.get_or_init(|| {
        Regex::new(r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?$").unwrap()
    })
}

/// Numeric value with its measurement unit.
///
/// The numeric value is kept as a decimal string so that it is stored
/// exactly as given. An empty numeric value is allowed when a value
/// qualifier explains its absence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementValue {
    pub numeric_value: String,
    pub measurement_unit: CodedEntry,
    pub value_qualifier: Option<CodedEntry>,
}

impl MeasurementValue {
    pub fn new(numeric_value: impl Into<String>, measurement_unit: impl Into<CodedEntry>) -> Self {
        Self {
            numeric_value: numeric_value.into(),
            measurement_unit: measurement_unit.into(),
            value_qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<CodedEntry>) -> Self {
        self.value_qualifier = Some(qualifier.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        let has_number = !self.numeric_value.is_empty() && self.measurement_unit.is_complete();
        let has_qualifier = self
            .value_qualifier
            .as_ref()
            .is_some_and(CodedEntry::is_complete);
        has_number || has_qualifier
    }

    pub fn check(&self) -> ContentResult<()> {
        if !self.is_complete() {
            return Err(ContentError::IncompleteValue("measurement value"));
        }
        if !self.numeric_value.is_empty() {
            if self.numeric_value.len() > MAX_DECIMAL_STRING
                || !decimal_regex().is_match(&self.numeric_value)
            {
                return Err(ContentError::InvalidValue {
                    what: "numeric value",
                    reason: format!("'{}' is not a decimal string", self.numeric_value),
                });
            }
            self.measurement_unit.check()?;
        }
        if let Some(qualifier) = &self.value_qualifier {
            qualifier.check()?;
        }
        Ok(())
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value_qualifier {
            Some(q) if self.numeric_value.is_empty() => write!(f, "{}", q.code_meaning),
            _ => write!(
                f,
                "{} {}",
                self.numeric_value, self.measurement_unit.code_value
            ),
        }
    }
}

/// Reference to an image or segmentation instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReference {
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
    pub frames: Vec<u32>,
    pub segments: Vec<u16>,
}

impl ImageReference {
    pub fn new(sop_class_uid: impl Into<String>, sop_instance_uid: impl Into<String>) -> Self {
        Self {
            sop_class_uid: sop_class_uid.into(),
            sop_instance_uid: sop_instance_uid.into(),
            frames: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn with_segments(mut self, segments: impl IntoIterator<Item = u16>) -> Self {
        self.segments.extend(segments);
        self
    }

    pub fn with_frames(mut self, frames: impl IntoIterator<Item = u32>) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.sop_class_uid.is_empty() && !self.sop_instance_uid.is_empty()
    }

    pub fn check(&self) -> ContentResult<()> {
        if !self.is_complete() {
            return Err(ContentError::IncompleteValue("image reference"));
        }
        check_uid(&self.sop_class_uid)?;
        check_uid(&self.sop_instance_uid)?;
        if self.frames.contains(&0) || self.segments.contains(&0) {
            return Err(ContentError::InvalidValue {
                what: "image reference",
                reason: "frame and segment numbers start at 1".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.sop_instance_uid, self.sop_class_uid)?;
        if !self.frames.is_empty() {
            write!(f, " frames {:?}", self.frames)?;
        }
        if !self.segments.is_empty() {
            write!(f, " segments {:?}", self.segments)?;
        }
        Ok(())
    }
}

/// Reference to a composite (non-image) instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeReference {
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
}

impl CompositeReference {
    pub fn new(sop_class_uid: impl Into<String>, sop_instance_uid: impl Into<String>) -> Self {
        Self {
            sop_class_uid: sop_class_uid.into(),
            sop_instance_uid: sop_instance_uid.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.sop_class_uid.is_empty() && !self.sop_instance_uid.is_empty()
    }

    pub fn check(&self) -> ContentResult<()> {
        if !self.is_complete() {
            return Err(ContentError::IncompleteValue("composite reference"));
        }
        check_uid(&self.sop_class_uid)?;
        check_uid(&self.sop_instance_uid)
    }
}

impl fmt::Display for CompositeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.sop_instance_uid, self.sop_class_uid)
    }
}
