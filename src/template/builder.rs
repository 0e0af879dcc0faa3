//! Builder for the Volumetric ROI Measurements template (TID 1411).
//!
//! The builder owns a content tree and a [`SlotTable`] that remembers which
//! item occupies which template row. Setters can be called in any order and
//! repeatedly: an occupied row is reused and its value replaced, an
//! unoccupied row is inserted at the position that keeps the items in row
//! order below the measurement group.

use std::marker::PhantomData;

use tracing::{debug, instrument, trace, warn};

use crate::config::Settings;
use crate::domain::codes::{self, CodedEntry};
use crate::domain::values::sop_class;
use crate::domain::{
    AddMode, CodeSelection, CompositeReference, ContentError, ContentNode, ContentResult,
    ContentTree, GenericIntensityAndSizeMeasurements, ImageReference, MeasurementValue,
    ModelComponentUnits, NodeId, Relationship, ResponseCriteria, RoiMeasurementModifiers,
    ToTermTree, ValueKind, ValueSet,
};
use crate::template::error::{TemplateError, TemplateResult};
use crate::template::slots::{Row, SlotTable};
use crate::util::uid::{generate_uid, UUID_UID_ROOT};

const METHOD_ANNOTATION: &str = "TID 1419 - Row 7";
const DERIVATION_ANNOTATION: &str = "TID 1419 - Row 8";

/// Volumetric ROI measurements of one region.
///
/// The type parameters select the value sets accepted for the measurement
/// concept, its units, the measurement method and the derivation.
pub struct VolumetricRoiMeasurements<
    Concept = GenericIntensityAndSizeMeasurements,
    Unit = ModelComponentUnits,
    Method = ResponseCriteria,
    Derivation = RoiMeasurementModifiers,
> {
    tree: ContentTree,
    slots: SlotTable,
    uid_root: String,
    value_sets: PhantomData<fn() -> (Concept, Unit, Method, Derivation)>,
}

impl<C, U, M, D> Default for VolumetricRoiMeasurements<C, U, M, D>
where
    C: ValueSet,
    U: ValueSet,
    M: ValueSet,
    D: ValueSet,
{
    fn default() -> Self {
        Self::new(false)
    }
}

impl<C, U, M, D> VolumetricRoiMeasurements<C, U, M, D>
where
    C: ValueSet,
    U: ValueSet,
    M: ValueSet,
    D: ValueSet,
{
    /// Creates an empty builder, with the measurement group already in
    /// place if `create_group` is set.
    pub fn new(create_group: bool) -> Self {
        let mut builder = Self {
            tree: ContentTree::new(),
            slots: SlotTable::new(),
            uid_root: UUID_UID_ROOT.to_string(),
            value_sets: PhantomData,
        };
        if create_group {
            if let Err(e) = builder.ensure_group() {
                warn!("Cannot create measurement group: {}", e);
            }
        }
        builder
    }

    /// Creates a builder as configured by `settings`: eager group creation
    /// and the root of generated tracking unique identifiers.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut builder = Self::new(settings.create_group);
        builder.uid_root = settings.uid_root.clone();
        builder
    }

    /// The content tree built so far.
    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    /// Consumes the builder and hands over the content tree.
    pub fn into_tree(self) -> ContentTree {
        self.tree
    }

    /// Which item occupies which template row.
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Removes all content; tree and slot table are reset together.
    pub fn clear(&mut self) {
        self.tree.clear();
        self.slots.clear();
    }

    /// All required rows are present and the content tree is valid.
    pub fn is_valid(&self) -> bool {
        self.tree.is_valid()
            && self.has_measurement_group(false)
            && self.has_tracking_identifier()
            && self.has_tracking_unique_identifier()
            && self.has_referenced_segment()
            && self.has_source_series_for_segmentation()
            && self.has_roi_measurements()
    }

    /// With `check_children` the group must also have at least one child.
    pub fn has_measurement_group(&self, check_children: bool) -> bool {
        match self.slots.get(Row::MeasurementGroup) {
            Some(group) if check_children => !self.tree.children(group).is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    pub fn has_tracking_identifier(&self) -> bool {
        self.slots.is_occupied(Row::TrackingIdentifier)
    }

    pub fn has_tracking_unique_identifier(&self) -> bool {
        self.slots.is_occupied(Row::TrackingUniqueIdentifier)
    }

    pub fn has_referenced_segment(&self) -> bool {
        self.slots.is_occupied(Row::ReferencedSegment)
    }

    pub fn has_source_series_for_segmentation(&self) -> bool {
        self.slots.is_occupied(Row::SourceSeriesForSegmentation)
    }

    pub fn has_roi_measurements(&self) -> bool {
        self.slots.is_occupied(Row::LastMeasurement)
    }

    /// Measurement items in document order.
    pub fn measurements(&self) -> Vec<NodeId> {
        let Some(group) = self.slots.get(Row::MeasurementGroup) else {
            return Vec::new();
        };
        self.tree
            .children(group)
            .iter()
            .copied()
            .filter(|&id| {
                self.tree.get(id).is_some_and(|n| {
                    n.relationship() == Relationship::Contains && n.value_kind() == ValueKind::Num
                })
            })
            .collect()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_activity_session(&mut self, session: &str, check: bool) -> TemplateResult<()> {
        require_text(session, "activity session")?;
        self.set_row_value(Row::ActivitySession, check, |item| {
            item.set_string_value(session, check)
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_tracking_identifier(&mut self, tracking_id: &str, check: bool) -> TemplateResult<()> {
        require_text(tracking_id, "tracking identifier")?;
        self.set_row_value(Row::TrackingIdentifier, check, |item| {
            item.set_string_value(tracking_id, check)
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_tracking_unique_identifier(
        &mut self,
        tracking_uid: &str,
        check: bool,
    ) -> TemplateResult<()> {
        require_text(tracking_uid, "tracking unique identifier")?;
        self.set_row_value(Row::TrackingUniqueIdentifier, check, |item| {
            item.set_string_value(tracking_uid, check)
        })
    }

    /// Generates a tracking unique identifier below the configured UID root,
    /// sets it and returns it.
    pub fn set_generated_tracking_unique_identifier(&mut self, check: bool) -> TemplateResult<String> {
        let uid =
            generate_uid(&self.uid_root).map_err(|e| TemplateError::IllegalParameter(e.to_string()))?;
        self.set_tracking_unique_identifier(&uid, check)?;
        Ok(uid)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_finding(&mut self, finding: &CodedEntry, check: bool) -> TemplateResult<()> {
        require_code(finding, "finding")?;
        self.set_row_value(Row::Finding, check, |item| {
            item.set_code_value(finding, check)
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_time_point(&mut self, time_point: &str, check: bool) -> TemplateResult<()> {
        require_text(time_point, "time point")?;
        self.set_row_value(Row::TimePoint, check, |item| {
            item.set_string_value(time_point, check)
        })
    }

    /// Sets the segment the measurements were made on.
    ///
    /// The reference must point to a (surface) segmentation instance and
    /// name exactly one segment.
    #[instrument(level = "debug", skip(self))]
    pub fn set_referenced_segment(
        &mut self,
        segment: &ImageReference,
        check: bool,
    ) -> TemplateResult<()> {
        if !segment.is_complete() {
            return Err(TemplateError::IllegalParameter(
                "incomplete referenced segment".to_string(),
            ));
        }
        let row = Row::ReferencedSegment;
        if segment.sop_class_uid != sop_class::SEGMENTATION_STORAGE
            && segment.sop_class_uid != sop_class::SURFACE_SEGMENTATION_STORAGE
        {
            warn!("Cannot set value of {} content item ... wrong SOP class", row);
            debug!(
                "SOP class UID \"{}\" does not match one of the known segmentation objects",
                segment.sop_class_uid
            );
            return Err(TemplateError::InvalidSegmentationObject(format!(
                "SOP class {} is not a segmentation",
                segment.sop_class_uid
            )));
        }
        if segment.segment_count() != 1 {
            warn!("Cannot set value of {} content item ... wrong number of segments", row);
            return Err(TemplateError::InvalidSegmentationObject(format!(
                "{} segments referenced, expected 1",
                segment.segment_count()
            )));
        }
        self.set_row_value(row, check, |item| {
            item.set_image_reference(segment, check)
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_source_series_for_segmentation(
        &mut self,
        series_uid: &str,
        check: bool,
    ) -> TemplateResult<()> {
        require_text(series_uid, "source series")?;
        self.set_row_value(Row::SourceSeriesForSegmentation, check, |item| {
            item.set_string_value(series_uid, check)
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_real_world_value_map(
        &mut self,
        value_map: &CompositeReference,
        check: bool,
    ) -> TemplateResult<()> {
        if !value_map.is_complete() {
            return Err(TemplateError::IllegalParameter(
                "incomplete real world value map".to_string(),
            ));
        }
        let row = Row::RealWorldValueMap;
        if value_map.sop_class_uid != sop_class::REAL_WORLD_VALUE_MAPPING_STORAGE {
            warn!("Cannot set value of {} content item ... wrong SOP class", row);
            debug!(
                "SOP class UID \"{}\" does not match the one of the real world value mapping object",
                value_map.sop_class_uid
            );
            return Err(TemplateError::InvalidRealWorldValueMappingObject(format!(
                "SOP class {} is not a real world value mapping",
                value_map.sop_class_uid
            )));
        }
        self.set_row_value(row, check, |item| {
            item.set_composite_reference(value_map, check)
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_measurement_method(
        &mut self,
        method: &CodeSelection<M>,
        check: bool,
    ) -> TemplateResult<()> {
        let method = method.selected().ok_or_else(|| {
            TemplateError::IllegalParameter("no measurement method selected".to_string())
        })?;
        if check {
            M::check(method).map_err(illegal_parameter)?;
        }
        self.set_row_value(Row::MeasurementMethod, check, |item| {
            item.set_code_value(method, check)
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn set_finding_site(&mut self, site: &CodedEntry, check: bool) -> TemplateResult<()> {
        require_code(site, "finding site")?;
        self.set_row_value(Row::FindingSite, check, |item| {
            item.set_code_value(site, check)
        })
    }

    /// Adds a measurement with optional method and derivation modifiers.
    ///
    /// The measurement is built in a detached tree first and only moved into
    /// the document when all of its items were created, so a failure leaves
    /// the document as it was (apart from a measurement group created on
    /// the way). Returns the id of the new measurement item.
    #[instrument(level = "debug", skip(self))]
    pub fn add_measurement(
        &mut self,
        concept: &CodeSelection<C>,
        value: &MeasurementValue,
        method: &CodeSelection<M>,
        derivation: &CodeSelection<D>,
        check: bool,
    ) -> TemplateResult<NodeId> {
        let concept = match concept.selected() {
            Some(concept) if value.is_complete() => concept,
            _ => {
                return Err(TemplateError::IllegalParameter(
                    "measurement needs a selected concept and a complete value".to_string(),
                ))
            }
        };
        if check {
            C::check(concept).map_err(illegal_parameter)?;
            if !value.numeric_value.is_empty() {
                U::check(&value.measurement_unit).map_err(illegal_parameter)?;
            }
            if let Some(method) = method.selected() {
                M::check(method).map_err(illegal_parameter)?;
            }
            if let Some(derivation) = derivation.selected() {
                D::check(derivation).map_err(illegal_parameter)?;
            }
        }
        self.ensure_group()?;

        // dropped on every return below that does not move it into the tree
        let mut candidate =
            ContentTree::try_detached(3).map_err(|_| TemplateError::MemoryExhausted)?;
        build_measurement(
            &mut candidate,
            concept,
            value,
            method.selected(),
            derivation.selected(),
            check,
        )?;
        let row = Row::LastMeasurement;
        if candidate.is_empty() {
            return Err(TemplateError::CannotAddContentItem {
                row,
                source: ContentError::IncompleteValue("measurement"),
            });
        }

        let (anchor_row, anchor) = self
            .slots
            .last_occupied_up_to(row)
            .ok_or(TemplateError::NoMeasurementGroup)?;
        self.tree
            .goto(anchor)
            .map_err(|_| TemplateError::NoMeasurementGroup)?;
        let mode = if anchor_row == Row::MeasurementGroup {
            AddMode::BelowCurrentBeforeFirstChild
        } else {
            AddMode::AfterCurrent
        };
        let id = self
            .tree
            .insert_subtree(candidate, mode)
            .map_err(|source| TemplateError::CannotAddContentItem { row, source })?;
        self.slots.store(row, id);
        debug!("Added measurement {} at {}", concept, id);
        trace!("content tree:\n{}", self.tree.to_term_tree());
        Ok(id)
    }

    /// Creates the measurement group unless it exists already.
    ///
    /// The group must be the first and only top-level item, so a non-empty
    /// tree without a recorded group is an error.
    fn ensure_group(&mut self) -> TemplateResult<NodeId> {
        match self.slots.get(Row::MeasurementGroup) {
            Some(group) if self.tree.contains(group) => return Ok(group),
            Some(group) => {
                return Err(TemplateError::InvalidTemplateStructure(format!(
                    "measurement group {} no longer exists",
                    group
                )))
            }
            None if !self.tree.is_empty() => {
                return Err(TemplateError::InvalidTemplateStructure(
                    "content tree is not empty but has no measurement group".to_string(),
                ))
            }
            None => {}
        }
        let row = Row::MeasurementGroup;
        let spec = row.spec();
        let id = self
            .tree
            .add_named_item(
                spec.relationship,
                spec.value_kind,
                &codes::MEASUREMENT_GROUP.to_entry(),
                AddMode::BelowCurrent,
                false,
            )
            .map_err(|source| TemplateError::CannotAddContentItem { row, source })?;
        self.tree.current_item_mut()?.set_annotation(spec.annotation);
        self.slots.store(row, id);
        debug!("Created measurement group at {}", id);
        Ok(id)
    }

    fn set_row_value<F>(&mut self, row: Row, check: bool, assign: F) -> TemplateResult<()>
    where
        F: FnOnce(&mut ContentNode) -> ContentResult<()>,
    {
        self.ensure_group()?;
        self.upsert_row(row, check)?;
        assign(self.tree.current_item_mut()?)?;
        Ok(())
    }

    /// Adds the item of `row` or, if the row is occupied, makes sure the
    /// existing item can take a new value. The cursor is left on the item.
    fn upsert_row(&mut self, row: Row, check: bool) -> TemplateResult<NodeId> {
        let spec = row.spec();
        let concept = spec
            .concept
            .map(|c| c.to_entry())
            .filter(CodedEntry::is_complete)
            .ok_or_else(|| TemplateError::InvalidConceptName {
                row,
                message: "row has no complete concept name".to_string(),
            })?;

        let id = match self.slots.get(row) {
            None => self.add_row_item(row, &concept, check)?,
            Some(id) => self.reuse_row_item(row, id, &concept)?,
        };
        self.tree.current_item_mut()?.set_annotation(spec.annotation);
        Ok(id)
    }

    fn add_row_item(&mut self, row: Row, concept: &CodedEntry, check: bool) -> TemplateResult<NodeId> {
        let spec = row.spec();
        let (anchor_row, anchor) = self.slots.last_occupied_up_to(row).ok_or_else(|| {
            TemplateError::InvalidTemplateStructure(format!("no position for {}", row))
        })?;
        self.tree.goto(anchor).map_err(|_| {
            TemplateError::InvalidTemplateStructure(format!(
                "{} refers to missing item {}",
                anchor_row, anchor
            ))
        })?;
        let mode = if anchor_row == Row::MeasurementGroup {
            AddMode::BelowCurrentBeforeFirstChild
        } else {
            AddMode::AfterCurrent
        };
        let id = self
            .tree
            .add_named_item(spec.relationship, spec.value_kind, concept, mode, check)
            .map_err(|source| match source {
                ContentError::IncompleteValue(_) | ContentError::InvalidValue { .. } => {
                    TemplateError::InvalidConceptName {
                        row,
                        message: source.to_string(),
                    }
                }
                _ => TemplateError::CannotAddContentItem { row, source },
            })?;
        self.slots.store(row, id);
        debug!("Added {} content item at {}", row, id);
        Ok(id)
    }

    fn reuse_row_item(&mut self, row: Row, id: NodeId, concept: &CodedEntry) -> TemplateResult<NodeId> {
        let spec = row.spec();
        self.tree.goto(id).map_err(|_| {
            TemplateError::InvalidTemplateStructure(format!("{} refers to missing item {}", row, id))
        })?;
        let item = self.tree.current_item()?;
        if item.value_kind() != spec.value_kind {
            warn!("Cannot replace value of {} content item ... wrong value type", row);
            return Err(TemplateError::InvalidContentItem {
                row,
                message: format!(
                    "expected {}, found {}",
                    spec.value_kind,
                    item.value_kind()
                ),
            });
        }
        if item.concept_name() != concept {
            warn!("Cannot replace value of {} content item ... wrong concept name", row);
            return Err(TemplateError::InvalidConceptName {
                row,
                message: format!("expected {}, found {}", concept, item.concept_name()),
            });
        }
        debug!("Replacing value of {} content item", row);
        Ok(id)
    }
}

/// Builds measurement, method and derivation items into `candidate`.
fn build_measurement(
    candidate: &mut ContentTree,
    concept: &CodedEntry,
    value: &MeasurementValue,
    method: Option<&CodedEntry>,
    derivation: Option<&CodedEntry>,
    check: bool,
) -> ContentResult<NodeId> {
    let spec = Row::LastMeasurement.spec();
    let root = candidate.add_named_item(
        spec.relationship,
        spec.value_kind,
        concept,
        AddMode::AfterCurrent,
        check,
    )?;
    let item = candidate.current_item_mut()?;
    item.set_numeric_value(value, check)?;
    item.set_annotation(spec.annotation);

    let modifiers = [
        (method, codes::MEASUREMENT_METHOD, METHOD_ANNOTATION),
        (derivation, codes::DERIVATION, DERIVATION_ANNOTATION),
    ];
    for (code, modifier, annotation) in modifiers {
        let Some(code) = code else { continue };
        candidate.add_named_item(
            Relationship::HasConceptMod,
            ValueKind::Code,
            &modifier.to_entry(),
            AddMode::BelowCurrent,
            check,
        )?;
        let item = candidate.current_item_mut()?;
        item.set_code_value(code, check)?;
        item.set_annotation(annotation);
        candidate.goto_parent();
    }
    Ok(root)
}

fn require_text(value: &str, what: &str) -> TemplateResult<()> {
    if value.is_empty() {
        Err(TemplateError::IllegalParameter(format!("empty {}", what)))
    } else {
        Ok(())
    }
}

fn require_code(value: &CodedEntry, what: &str) -> TemplateResult<()> {
    if value.is_complete() {
        Ok(())
    } else {
        Err(TemplateError::IllegalParameter(format!("incomplete {}", what)))
    }
}

fn illegal_parameter(e: ContentError) -> TemplateError {
    TemplateError::IllegalParameter(e.to_string())
}
