//! Template rows and the slot table mapping rows to content items.

use std::fmt;

use crate::domain::codes::{self, BasicCode};
use crate::domain::{NodeId, Relationship, ValueKind};

/// Rows of the Volumetric ROI Measurements template, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Row {
    MeasurementGroup,
    ActivitySession,
    TrackingIdentifier,
    TrackingUniqueIdentifier,
    Finding,
    TimePoint,
    ReferencedSegment,
    SourceSeriesForSegmentation,
    RealWorldValueMap,
    MeasurementMethod,
    FindingSite,
    /// Repeating row; the slot holds the most recently added measurement.
    LastMeasurement,
}

/// Static description of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpec {
    pub relationship: Relationship,
    pub value_kind: ValueKind,
    /// `None` for rows whose concept is chosen by the caller
    pub concept: Option<BasicCode>,
    pub annotation: &'static str,
}

impl Row {
    pub const COUNT: usize = 12;

    pub const ALL: [Row; Row::COUNT] = [
        Row::MeasurementGroup,
        Row::ActivitySession,
        Row::TrackingIdentifier,
        Row::TrackingUniqueIdentifier,
        Row::Finding,
        Row::TimePoint,
        Row::ReferencedSegment,
        Row::SourceSeriesForSegmentation,
        Row::RealWorldValueMap,
        Row::MeasurementMethod,
        Row::FindingSite,
        Row::LastMeasurement,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_repeating(self) -> bool {
        self == Row::LastMeasurement
    }

    pub fn spec(self) -> RowSpec {
        use Relationship::*;
        use ValueKind::*;
        let (relationship, value_kind, concept, annotation) = match self {
            Row::MeasurementGroup => (
                Unknown,
                Container,
                Some(codes::MEASUREMENT_GROUP),
                "TID 1411 - Row 1",
            ),
            Row::ActivitySession => (
                HasObsContext,
                Text,
                Some(codes::ACTIVITY_SESSION),
                "TID 1411 - Row 1b",
            ),
            Row::TrackingIdentifier => (
                HasObsContext,
                Text,
                Some(codes::TRACKING_IDENTIFIER),
                "TID 1411 - Row 2",
            ),
            Row::TrackingUniqueIdentifier => (
                HasObsContext,
                UidRef,
                Some(codes::TRACKING_UNIQUE_IDENTIFIER),
                "TID 1411 - Row 3",
            ),
            Row::Finding => (Contains, Code, Some(codes::FINDING), "TID 1411 - Row 3b"),
            Row::TimePoint => (
                HasObsContext,
                Text,
                Some(codes::TIME_POINT),
                "TID 1502 - Row 3",
            ),
            Row::ReferencedSegment => (
                Contains,
                Image,
                Some(codes::REFERENCED_SEGMENT),
                "TID 1411 - Row 7",
            ),
            Row::SourceSeriesForSegmentation => (
                Contains,
                UidRef,
                Some(codes::SOURCE_SERIES_FOR_SEGMENTATION),
                "TID 1411 - Row 12",
            ),
            Row::RealWorldValueMap => (
                Contains,
                Composite,
                Some(codes::REAL_WORLD_VALUE_MAP_USED_FOR_MEASUREMENT),
                "TID 1411 - Row 14",
            ),
            Row::MeasurementMethod => (
                HasConceptMod,
                Code,
                Some(codes::MEASUREMENT_METHOD),
                "TID 1419 - Row 1",
            ),
            Row::FindingSite => (
                HasConceptMod,
                Code,
                Some(codes::FINDING_SITE),
                "TID 1419 - Row 2",
            ),
            Row::LastMeasurement => (Contains, Num, None, "TID 1419 - Row 5"),
        };
        RowSpec {
            relationship,
            value_kind,
            concept,
            annotation,
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = self.spec();
        match spec.concept {
            Some(concept) => write!(f, "'{}' ({})", concept.code_meaning, spec.annotation),
            None => write!(f, "measurement ({})", spec.annotation),
        }
    }
}

/// Fixed-size table of the content items occupying each row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotTable {
    entries: [Option<NodeId>; Row::COUNT],
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: Row) -> Option<NodeId> {
        self.entries[row.index()]
    }

    pub fn is_occupied(&self, row: Row) -> bool {
        self.get(row).is_some()
    }

    pub fn store(&mut self, row: Row, id: NodeId) {
        self.entries[row.index()] = Some(id);
    }

    /// Occupant of the last occupied row at or before `row`.
    ///
    /// This is where a new item for `row` is anchored: inserting after it
    /// keeps the items in row order.
    pub fn last_occupied_up_to(&self, row: Row) -> Option<(Row, NodeId)> {
        Row::ALL[..=row.index()]
            .iter()
            .rev()
            .find_map(|&r| self.get(r).map(|id| (r, id)))
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Row, NodeId)> + '_ {
        Row::ALL
            .iter()
            .filter_map(move |&r| self.get(r).map(|id| (r, id)))
    }

    pub fn clear(&mut self) {
        self.entries = [None; Row::COUNT];
    }
}
