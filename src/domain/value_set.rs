//! Accepted value sets (context groups) and coded selections.
//!
//! A template row that takes a coded value from a context group is generic
//! over a [`ValueSet`] policy. The policy lists the codes of the group and
//! says whether codes outside of it are acceptable (extensible groups).

use std::fmt;
use std::marker::PhantomData;

use itertools::Itertools;
use tracing::debug;

use crate::domain::codes::{self, BasicCode, CodedEntry};
use crate::domain::error::{ContentError, ContentResult};

pub trait ValueSet {
    /// Context group identifier, e.g. `CID 7469`.
    const IDENTIFIER: &'static str;
    const NAME: &'static str;
    const EXTENSIBLE: bool = true;
    const CODES: &'static [BasicCode];

    fn contains(entry: &CodedEntry) -> bool {
        Self::CODES.iter().any(|code| entry == code)
    }

    /// Checks membership of `entry`.
    ///
    /// Codes outside an extensible group are accepted and only logged.
    fn check(entry: &CodedEntry) -> ContentResult<()> {
        if Self::contains(entry) {
            return Ok(());
        }
        if Self::EXTENSIBLE {
            debug!(
                "{} is not part of {} ({}), accepted as extension",
                entry,
                Self::IDENTIFIER,
                Self::NAME
            );
            Ok(())
        } else {
            Err(ContentError::InvalidValue {
                what: "coded entry",
                reason: format!(
                    "{} is not part of {} ({}), expected one of: {}",
                    entry,
                    Self::IDENTIFIER,
                    Self::NAME,
                    Self::CODES.iter().map(|c| c.code_meaning).join(", ")
                ),
            })
        }
    }
}

/// CID 7469: generic intensity and size measurements.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericIntensityAndSizeMeasurements;

impl ValueSet for GenericIntensityAndSizeMeasurements {
    const IDENTIFIER: &'static str = "CID 7469";
    const NAME: &'static str = "Generic Intensity and Size Measurements";
    const CODES: &'static [BasicCode] = &[
        codes::AREA,
        codes::VOLUME,
        codes::MEAN,
        codes::MEDIAN,
        codes::MINIMUM,
        codes::MAXIMUM,
        codes::STANDARD_DEVIATION,
    ];
}

/// CID 7181: abstract multi-dimensional image model component units.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelComponentUnits;

impl ValueSet for ModelComponentUnits {
    const IDENTIFIER: &'static str = "CID 7181";
    const NAME: &'static str = "Abstract Multi-dimensional Image Model Component Units";
    const CODES: &'static [BasicCode] = &[
        codes::CUBIC_CENTIMETER,
        codes::CUBIC_MILLIMETER,
        codes::MILLILITER,
        codes::SQUARE_MILLIMETER,
        codes::HOUNSFIELD_UNIT,
        codes::NO_UNITS,
    ];
}

/// CID 6147: response criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseCriteria;

impl ValueSet for ResponseCriteria {
    const IDENTIFIER: &'static str = "CID 6147";
    const NAME: &'static str = "Response Criteria";
    const CODES: &'static [BasicCode] = &[codes::RECIST_1_0, codes::RECIST_1_1, codes::WHO];
}

/// CID 7464: general region of interest measurement modifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoiMeasurementModifiers;

impl ValueSet for RoiMeasurementModifiers {
    const IDENTIFIER: &'static str = "CID 7464";
    const NAME: &'static str = "General Region of Interest Measurement Modifiers";
    const CODES: &'static [BasicCode] = &[
        codes::MEAN,
        codes::MEDIAN,
        codes::MINIMUM,
        codes::MAXIMUM,
        codes::STANDARD_DEVIATION,
    ];
}

/// A coded value drawn from the value set `V`, possibly not selected yet.
pub struct CodeSelection<V> {
    selected: Option<CodedEntry>,
    set: PhantomData<fn() -> V>,
}

impl<V: ValueSet> CodeSelection<V> {
    pub fn new() -> Self {
        Self {
            selected: None,
            set: PhantomData,
        }
    }

    /// Selection without membership check; completeness is still required
    /// for [`has_selected_value`](Self::has_selected_value).
    pub fn from_entry(entry: impl Into<CodedEntry>) -> Self {
        Self {
            selected: Some(entry.into()),
            set: PhantomData,
        }
    }

    /// Selects `entry`, checking it against `V` when `check` is set.
    pub fn select(&mut self, entry: impl Into<CodedEntry>, check: bool) -> ContentResult<()> {
        let entry = entry.into();
        if !entry.is_complete() {
            return Err(ContentError::IncompleteValue("coded entry"));
        }
        if check {
            V::check(&entry)?;
        }
        self.selected = Some(entry);
        Ok(())
    }

    pub fn has_selected_value(&self) -> bool {
        self.selected.as_ref().is_some_and(CodedEntry::is_complete)
    }

    pub fn selected(&self) -> Option<&CodedEntry> {
        self.selected.as_ref().filter(|e| e.is_complete())
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}

impl<V: ValueSet> Default for CodeSelection<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for CodeSelection<V> {
    fn clone(&self) -> Self {
        Self {
            selected: self.selected.clone(),
            set: PhantomData,
        }
    }
}

impl<V: ValueSet> fmt::Debug for CodeSelection<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeSelection")
            .field("value_set", &V::IDENTIFIER)
            .field("selected", &self.selected)
            .finish()
    }
}

impl<V: ValueSet> From<BasicCode> for CodeSelection<V> {
    fn from(code: BasicCode) -> Self {
        Self::from_entry(code)
    }
}

impl<V: ValueSet> From<CodedEntry> for CodeSelection<V> {
    fn from(entry: CodedEntry) -> Self {
        Self::from_entry(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Closed;

    impl ValueSet for Closed {
        const IDENTIFIER: &'static str = "CID 99999";
        const NAME: &'static str = "Closed Test Set";
        const EXTENSIBLE: bool = false;
        const CODES: &'static [BasicCode] = &[codes::VOLUME, codes::AREA];
    }

    #[test]
    fn given_extensible_set_when_selecting_foreign_code_then_accepted() {
        let mut selection = CodeSelection::<GenericIntensityAndSizeMeasurements>::new();
        selection
            .select(CodedEntry::new("99X1", "99LOCAL", "Local measure"), true)
            .unwrap();
        assert!(selection.has_selected_value());
    }

    #[test]
    fn given_closed_set_when_selecting_foreign_code_then_rejected() {
        let mut selection = CodeSelection::<Closed>::new();
        let err = selection.select(codes::MEAN, true).unwrap_err();
        assert!(err.to_string().contains("Volume, Area"), "{}", err);
        assert!(!selection.has_selected_value());
    }

    #[test]
    fn given_closed_set_when_selecting_without_check_then_accepted() {
        let mut selection = CodeSelection::<Closed>::new();
        selection.select(codes::MEAN, false).unwrap();
        assert_eq!(selection.selected(), Some(&codes::MEAN.to_entry()));
    }

    #[test]
    fn given_incomplete_entry_when_selecting_then_rejected() {
        let mut selection = CodeSelection::<Closed>::new();
        assert_eq!(
            selection.select(CodedEntry::new("1", "", "x"), false),
            Err(ContentError::IncompleteValue("coded entry"))
        );
    }

    #[test]
    fn given_unchecked_incomplete_entry_when_queried_then_not_selected() {
        let selection = CodeSelection::<Closed>::from_entry(CodedEntry::default());
        assert!(!selection.has_selected_value());
        assert!(selection.selected().is_none());
    }
}
