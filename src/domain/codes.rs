//! Coded entries and the fixed concept codes used by template rows.

use std::fmt;

use crate::domain::error::{ContentError, ContentResult};

/// Maximum length of a code value or coding scheme designator (short string).
pub const MAX_SHORT_STRING: usize = 16;
/// Maximum length of a code meaning (long string).
pub const MAX_LONG_STRING: usize = 64;

/// A coded concept: code value, coding scheme and human readable meaning.
///
/// Two entries are equal when code value, designator and version match;
/// the meaning is descriptive only.
#[derive(Debug, Clone, Default, Eq)]
pub struct CodedEntry {
    pub code_value: String,
    pub coding_scheme_designator: String,
    pub coding_scheme_version: Option<String>,
    pub code_meaning: String,
}

impl CodedEntry {
    pub fn new(
        code_value: impl Into<String>,
        coding_scheme_designator: impl Into<String>,
        code_meaning: impl Into<String>,
    ) -> Self {
        Self {
            code_value: code_value.into(),
            coding_scheme_designator: coding_scheme_designator.into(),
            coding_scheme_version: None,
            code_meaning: code_meaning.into(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.coding_scheme_version = Some(version.into());
        self
    }

    /// Value, designator and meaning are all present.
    pub fn is_complete(&self) -> bool {
        !self.code_value.is_empty()
            && !self.coding_scheme_designator.is_empty()
            && !self.code_meaning.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.code_value.is_empty()
            && self.coding_scheme_designator.is_empty()
            && self.code_meaning.is_empty()
    }

    /// Strict validation of the individual components.
    pub fn check(&self) -> ContentResult<()> {
        if !self.is_complete() {
            return Err(ContentError::IncompleteValue("coded entry"));
        }
        check_component("code value", &self.code_value, MAX_SHORT_STRING)?;
        check_component(
            "coding scheme designator",
            &self.coding_scheme_designator,
            MAX_SHORT_STRING,
        )?;
        if let Some(version) = &self.coding_scheme_version {
            check_component("coding scheme version", version, MAX_SHORT_STRING)?;
        }
        check_component("code meaning", &self.code_meaning, MAX_LONG_STRING)
    }
}

fn check_component(what: &'static str, value: &str, max_len: usize) -> ContentResult<()> {
    if value.chars().count() > max_len {
        return Err(ContentError::InvalidValue {
            what,
            reason: format!("'{}' exceeds {} characters", value, max_len),
        });
    }
    if value.chars().any(|c| c == '\\' || c.is_control()) {
        return Err(ContentError::InvalidValue {
            what,
            reason: format!("'{}' contains a backslash or control character", value),
        });
    }
    Ok(())
}

impl PartialEq for CodedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.code_value == other.code_value
            && self.coding_scheme_designator == other.coding_scheme_designator
            && self.coding_scheme_version == other.coding_scheme_version
    }
}

impl PartialEq<BasicCode> for CodedEntry {
    fn eq(&self, other: &BasicCode) -> bool {
        self.code_value == other.code_value
            && self.coding_scheme_designator == other.coding_scheme_designator
            && self.coding_scheme_version.is_none()
    }
}

impl fmt::Display for CodedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, \"{}\")",
            self.code_value, self.coding_scheme_designator, self.code_meaning
        )
    }
}

/// Compile-time coded concept without a scheme version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasicCode {
    pub code_value: &'static str,
    pub coding_scheme_designator: &'static str,
    pub code_meaning: &'static str,
}

impl BasicCode {
    pub const fn new(
        code_value: &'static str,
        coding_scheme_designator: &'static str,
        code_meaning: &'static str,
    ) -> Self {
        Self {
            code_value,
            coding_scheme_designator,
            code_meaning,
        }
    }

    pub fn to_entry(&self) -> CodedEntry {
        CodedEntry::new(
            self.code_value,
            self.coding_scheme_designator,
            self.code_meaning,
        )
    }
}

impl From<BasicCode> for CodedEntry {
    fn from(code: BasicCode) -> Self {
        code.to_entry()
    }
}

impl fmt::Display for BasicCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, \"{}\")",
            self.code_value, self.coding_scheme_designator, self.code_meaning
        )
    }
}

// Concept names of the template rows
pub const MEASUREMENT_GROUP: BasicCode = BasicCode::new("125007", "DCM", "Measurement Group");
pub const ACTIVITY_SESSION: BasicCode = BasicCode::new("C67447", "NCIt", "Activity Session");
pub const TRACKING_IDENTIFIER: BasicCode = BasicCode::new("112039", "DCM", "Tracking Identifier");
pub const TRACKING_UNIQUE_IDENTIFIER: BasicCode =
    BasicCode::new("112040", "DCM", "Tracking Unique Identifier");
pub const FINDING: BasicCode = BasicCode::new("121071", "DCM", "Finding");
pub const TIME_POINT: BasicCode = BasicCode::new("C2348792", "UMLS", "Time Point");
pub const REFERENCED_SEGMENT: BasicCode = BasicCode::new("121191", "DCM", "Referenced Segment");
pub const SOURCE_SERIES_FOR_SEGMENTATION: BasicCode =
    BasicCode::new("121232", "DCM", "Source series for segmentation");
pub const REAL_WORLD_VALUE_MAP_USED_FOR_MEASUREMENT: BasicCode =
    BasicCode::new("126100", "DCM", "Real World Value Map used for measurement");
pub const MEASUREMENT_METHOD: BasicCode = BasicCode::new("G-C036", "SRT", "Measurement Method");
pub const FINDING_SITE: BasicCode = BasicCode::new("G-C0E3", "SRT", "Finding Site");
pub const DERIVATION: BasicCode = BasicCode::new("121401", "DCM", "Derivation");

// Measurement concepts and modifiers
pub const AREA: BasicCode = BasicCode::new("G-A166", "SRT", "Area");
pub const VOLUME: BasicCode = BasicCode::new("G-D705", "SRT", "Volume");
pub const MEAN: BasicCode = BasicCode::new("R-00317", "SRT", "Mean");
pub const MEDIAN: BasicCode = BasicCode::new("R-00319", "SRT", "Median");
pub const MINIMUM: BasicCode = BasicCode::new("R-404FB", "SRT", "Minimum");
pub const MAXIMUM: BasicCode = BasicCode::new("G-A437", "SRT", "Maximum");
pub const STANDARD_DEVIATION: BasicCode = BasicCode::new("R-10047", "SRT", "Standard Deviation");

// Units
pub const CUBIC_CENTIMETER: BasicCode = BasicCode::new("cm3", "UCUM", "cubic centimeter");
pub const CUBIC_MILLIMETER: BasicCode = BasicCode::new("mm3", "UCUM", "cubic millimeter");
pub const MILLILITER: BasicCode = BasicCode::new("ml", "UCUM", "milliliter");
pub const SQUARE_MILLIMETER: BasicCode = BasicCode::new("mm2", "UCUM", "square millimeter");
pub const HOUNSFIELD_UNIT: BasicCode = BasicCode::new("[hnsf'U]", "UCUM", "Hounsfield unit");
pub const NO_UNITS: BasicCode = BasicCode::new("1", "UCUM", "no units");

// Response criteria
pub const RECIST_1_0: BasicCode = BasicCode::new("126080", "DCM", "RECIST 1.0");
pub const RECIST_1_1: BasicCode = BasicCode::new("126081", "DCM", "RECIST 1.1");
pub const WHO: BasicCode = BasicCode::new("126083", "DCM", "WHO");
