//! Tests for the row setters, group lifecycle and validity of the
//! Volumetric ROI Measurements builder.

use rstest::{fixture, rstest};

use sr_template::domain::codes::{self, CodedEntry, CUBIC_CENTIMETER, VOLUME};
use sr_template::domain::{
    sop_class, CodeSelection, CompositeReference, ContentValue, ImageReference, MeasurementValue,
    ValueKind,
};
use sr_template::template::{Row, TemplateError, VolumetricRoiMeasurements};
use sr_template::util::testing::init_test_setup;

type Builder = VolumetricRoiMeasurements;

#[fixture]
fn builder() -> Builder {
    init_test_setup();
    Builder::new(false)
}

fn segment() -> ImageReference {
    ImageReference::new(sop_class::SEGMENTATION_STORAGE, "1.2.3.5").with_segments([1])
}

fn string_value(builder: &Builder, row: Row) -> Option<String> {
    let id = builder.slots().get(row)?;
    builder
        .tree()
        .get(id)?
        .string_value()
        .map(str::to_string)
}

// ============================================================
// Empty builder and group lifecycle
// ============================================================

#[rstest]
fn given_empty_builder_when_validating_then_invalid(builder: Builder) {
    assert!(!builder.is_valid());
    assert!(!builder.has_measurement_group(false));
    assert!(!builder.has_tracking_identifier());
    assert!(!builder.has_roi_measurements());
    assert!(builder.tree().is_empty());
}

#[rstest]
fn given_eager_group_when_constructed_then_group_is_only_root() {
    init_test_setup();
    let builder = Builder::new(true);

    assert!(builder.has_measurement_group(false));
    assert!(!builder.has_measurement_group(true), "group has no children yet");
    let group = builder.slots().get(Row::MeasurementGroup).unwrap();
    assert_eq!(builder.tree().roots(), &[group]);
    let node = builder.tree().get(group).unwrap();
    assert_eq!(node.value_kind(), ValueKind::Container);
    assert_eq!(node.concept_name(), &codes::MEASUREMENT_GROUP.to_entry());
    assert_eq!(node.annotation(), Some("TID 1411 - Row 1"));
}

#[rstest]
fn given_empty_builder_when_setting_first_row_then_group_created_lazily(mut builder: Builder) {
    builder.set_tracking_identifier("T1", true).unwrap();

    assert!(builder.has_measurement_group(true));
    let group = builder.slots().get(Row::MeasurementGroup).unwrap();
    let tracking = builder.slots().get(Row::TrackingIdentifier).unwrap();
    assert_eq!(builder.tree().roots(), &[group]);
    assert_eq!(builder.tree().children(group), &[tracking]);
    assert_eq!(builder.tree().len(), 2);
}

// ============================================================
// Idempotent replace
// ============================================================

#[rstest]
fn given_tracking_identifier_when_set_twice_then_replaced_in_place(mut builder: Builder) {
    builder.set_tracking_identifier("first", true).unwrap();
    let id = builder.slots().get(Row::TrackingIdentifier).unwrap();
    let count = builder.tree().len();

    builder.set_tracking_identifier("second", true).unwrap();

    assert_eq!(builder.slots().get(Row::TrackingIdentifier), Some(id));
    assert_eq!(builder.tree().len(), count);
    assert_eq!(
        string_value(&builder, Row::TrackingIdentifier).as_deref(),
        Some("second")
    );
}

#[rstest]
fn given_finding_when_set_twice_then_single_item_with_latest_code(mut builder: Builder) {
    let first = CodedEntry::new("T-D4100", "SRT", "Liver");
    let second = CodedEntry::new("T-28000", "SRT", "Lung");
    builder.set_finding(&first, true).unwrap();
    builder.set_finding(&second, true).unwrap();

    let id = builder.slots().get(Row::Finding).unwrap();
    assert_eq!(builder.tree().len(), 2);
    assert_eq!(builder.tree().get(id).unwrap().code_value(), Some(&second));
}

#[rstest]
fn given_referenced_segment_when_replaced_then_same_item_holds_new_reference(mut builder: Builder) {
    builder.set_referenced_segment(&segment(), true).unwrap();
    let id = builder.slots().get(Row::ReferencedSegment).unwrap();
    let surface = ImageReference::new(sop_class::SURFACE_SEGMENTATION_STORAGE, "1.2.3.6")
        .with_segments([2]);

    builder.set_referenced_segment(&surface, true).unwrap();

    assert_eq!(builder.slots().get(Row::ReferencedSegment), Some(id));
    assert_eq!(
        builder.tree().get(id).unwrap().image_reference(),
        Some(&surface)
    );
}

// ============================================================
// Row placement
// ============================================================

#[rstest]
#[case::schema_order(&[Row::TrackingIdentifier, Row::TrackingUniqueIdentifier, Row::Finding, Row::SourceSeriesForSegmentation])]
#[case::reversed(&[Row::FindingSite, Row::MeasurementMethod, Row::RealWorldValueMap, Row::TimePoint, Row::ActivitySession])]
#[case::mixed(&[Row::TimePoint, Row::TrackingIdentifier, Row::FindingSite, Row::ActivitySession, Row::ReferencedSegment, Row::Finding])]
#[case::measurement_first(&[Row::LastMeasurement, Row::FindingSite, Row::TrackingIdentifier, Row::LastMeasurement, Row::TimePoint])]
fn given_any_setter_order_when_building_then_single_root_and_rows_in_schema_order(
    mut builder: Builder,
    #[case] rows: &[Row],
) {
    for &row in rows {
        set_row(&mut builder, row);
    }

    let group = builder.slots().get(Row::MeasurementGroup).unwrap();
    assert_eq!(builder.tree().roots(), &[group]);

    // map children back to their rows; measurements count as the repeating row
    let measurements = builder.measurements();
    let child_rows: Vec<Row> = builder
        .tree()
        .children(group)
        .iter()
        .map(|id| {
            if measurements.contains(id) {
                Row::LastMeasurement
            } else {
                builder
                    .slots()
                    .occupied()
                    .find(|(_, occupant)| occupant == id)
                    .map(|(row, _)| row)
                    .unwrap()
            }
        })
        .collect();
    let mut sorted = child_rows.clone();
    sorted.sort();
    assert_eq!(child_rows, sorted);
    assert_eq!(child_rows.len(), rows.len());
}

fn set_row(builder: &mut Builder, row: Row) {
    let result = match row {
        Row::ActivitySession => builder.set_activity_session("baseline session", true),
        Row::TrackingIdentifier => builder.set_tracking_identifier("T1", true),
        Row::TrackingUniqueIdentifier => builder.set_tracking_unique_identifier("1.2.3", true),
        Row::Finding => builder.set_finding(&CodedEntry::new("T-D4100", "SRT", "Liver"), true),
        Row::TimePoint => builder.set_time_point("baseline", true),
        Row::ReferencedSegment => builder.set_referenced_segment(&segment(), true),
        Row::SourceSeriesForSegmentation => {
            builder.set_source_series_for_segmentation("1.2.3.4", true)
        }
        Row::RealWorldValueMap => builder.set_real_world_value_map(
            &CompositeReference::new(sop_class::REAL_WORLD_VALUE_MAPPING_STORAGE, "1.2.3.7"),
            true,
        ),
        Row::MeasurementMethod => {
            builder.set_measurement_method(&CodeSelection::from_entry(codes::RECIST_1_1), true)
        }
        Row::FindingSite => {
            builder.set_finding_site(&CodedEntry::new("T-62000", "SRT", "Liver"), true)
        }
        Row::LastMeasurement => builder
            .add_measurement(
                &VOLUME.into(),
                &MeasurementValue::new("10", CUBIC_CENTIMETER),
                &CodeSelection::new(),
                &CodeSelection::new(),
                true,
            )
            .map(|_| ()),
        Row::MeasurementGroup => Ok(()),
    };
    result.unwrap();
}

#[rstest]
fn given_each_row_when_set_then_item_matches_row_description(mut builder: Builder) {
    for row in Row::ALL.into_iter().filter(|r| *r != Row::MeasurementGroup) {
        set_row(&mut builder, row);
    }

    for (row, id) in builder.slots().occupied() {
        let spec = row.spec();
        let node = builder.tree().get(id).unwrap();
        assert_eq!(node.relationship(), spec.relationship, "{}", row);
        assert_eq!(node.value_kind(), spec.value_kind, "{}", row);
        assert_eq!(node.annotation(), Some(spec.annotation), "{}", row);
        if let Some(concept) = spec.concept {
            assert_eq!(node.concept_name(), &concept.to_entry(), "{}", row);
        }
        assert!(node.is_valid(), "{}", row);
    }
}

// ============================================================
// Parameter validation
// ============================================================

#[rstest]
#[case::activity_session(Row::ActivitySession)]
#[case::tracking_identifier(Row::TrackingIdentifier)]
#[case::tracking_uid(Row::TrackingUniqueIdentifier)]
#[case::time_point(Row::TimePoint)]
#[case::source_series(Row::SourceSeriesForSegmentation)]
fn given_empty_string_when_setting_row_then_illegal_parameter_and_tree_untouched(
    mut builder: Builder,
    #[case] row: Row,
) {
    let result = match row {
        Row::ActivitySession => builder.set_activity_session("", true),
        Row::TrackingIdentifier => builder.set_tracking_identifier("", true),
        Row::TrackingUniqueIdentifier => builder.set_tracking_unique_identifier("", true),
        Row::TimePoint => builder.set_time_point("", true),
        Row::SourceSeriesForSegmentation => builder.set_source_series_for_segmentation("", false),
        _ => unreachable!(),
    };

    assert!(matches!(result, Err(TemplateError::IllegalParameter(_))));
    assert!(builder.tree().is_empty());
    assert!(!builder.slots().is_occupied(row));
}

#[rstest]
fn given_incomplete_codes_when_setting_coded_rows_then_illegal_parameter(mut builder: Builder) {
    let incomplete = CodedEntry::new("T-D4100", "SRT", "");

    assert!(matches!(
        builder.set_finding(&incomplete, true),
        Err(TemplateError::IllegalParameter(_))
    ));
    assert!(matches!(
        builder.set_finding_site(&incomplete, true),
        Err(TemplateError::IllegalParameter(_))
    ));
    assert!(matches!(
        builder.set_measurement_method(&CodeSelection::new(), true),
        Err(TemplateError::IllegalParameter(_))
    ));
    assert!(matches!(
        builder.set_referenced_segment(&ImageReference::default(), true),
        Err(TemplateError::IllegalParameter(_))
    ));
    assert!(matches!(
        builder.set_real_world_value_map(&CompositeReference::default(), true),
        Err(TemplateError::IllegalParameter(_))
    ));
    assert!(builder.tree().is_empty());
}

#[rstest]
#[case::ct_image(ImageReference::new(sop_class::CT_IMAGE_STORAGE, "1.2.3.5").with_segments([1]))]
#[case::no_segment(ImageReference::new(sop_class::SEGMENTATION_STORAGE, "1.2.3.5"))]
#[case::two_segments(ImageReference::new(sop_class::SEGMENTATION_STORAGE, "1.2.3.5").with_segments([1, 2]))]
fn given_unusable_segmentation_when_setting_referenced_segment_then_rejected_before_mutation(
    mut builder: Builder,
    #[case] reference: ImageReference,
) {
    let result = builder.set_referenced_segment(&reference, true);

    assert!(matches!(
        result,
        Err(TemplateError::InvalidSegmentationObject(_))
    ));
    assert!(builder.tree().is_empty());
    assert!(!builder.has_measurement_group(false));
    assert!(!builder.is_valid());
}

#[rstest]
fn given_wrong_class_when_setting_value_map_then_rejected_before_mutation(mut builder: Builder) {
    builder.set_tracking_identifier("T1", true).unwrap();
    let count = builder.tree().len();
    let reference = CompositeReference::new(sop_class::SEGMENTATION_STORAGE, "1.2.3.7");

    let result = builder.set_real_world_value_map(&reference, true);

    assert!(matches!(
        result,
        Err(TemplateError::InvalidRealWorldValueMappingObject(_))
    ));
    assert_eq!(builder.tree().len(), count);
    assert!(!builder.slots().is_occupied(Row::RealWorldValueMap));
}

#[rstest]
fn given_invalid_uid_with_check_when_setting_then_item_left_without_value(mut builder: Builder) {
    // value assignment is the last step; the item placed before it stays
    let result = builder.set_tracking_unique_identifier("not-a-uid", true);

    assert!(matches!(result, Err(TemplateError::Content(_))));
    assert!(builder.has_tracking_unique_identifier());
    assert!(!builder.tree().is_valid());

    builder.set_tracking_unique_identifier("1.2.3", true).unwrap();
    assert!(builder.tree().is_valid());
    assert_eq!(
        string_value(&builder, Row::TrackingUniqueIdentifier).as_deref(),
        Some("1.2.3")
    );
}

#[rstest]
fn given_invalid_uid_without_check_when_setting_then_accepted(mut builder: Builder) {
    builder
        .set_source_series_for_segmentation("series-1", false)
        .unwrap();
    assert_eq!(
        string_value(&builder, Row::SourceSeriesForSegmentation).as_deref(),
        Some("series-1")
    );
}

#[rstest]
fn given_generated_uid_when_set_then_stored_under_default_root(mut builder: Builder) {
    let uid = builder.set_generated_tracking_unique_identifier(true).unwrap();

    assert!(uid.starts_with("2.25."));
    assert_eq!(
        string_value(&builder, Row::TrackingUniqueIdentifier),
        Some(uid)
    );
}

// ============================================================
// Validity
// ============================================================

#[rstest]
fn given_all_required_rows_when_validating_then_valid(mut builder: Builder) {
    // Arrange
    builder.set_tracking_identifier("T1", true).unwrap();
    builder.set_tracking_unique_identifier("1.2.3", true).unwrap();
    builder.set_referenced_segment(&segment(), true).unwrap();
    builder
        .set_source_series_for_segmentation("1.2.3.4", true)
        .unwrap();
    assert!(!builder.is_valid(), "no measurement yet");

    // Act
    let measurement = builder
        .add_measurement(
            &VOLUME.into(),
            &MeasurementValue::new("120.5", CUBIC_CENTIMETER),
            &CodeSelection::new(),
            &CodeSelection::new(),
            true,
        )
        .unwrap();

    // Assert
    assert!(builder.is_valid());
    let group = builder.slots().get(Row::MeasurementGroup).unwrap();
    let children = builder.tree().children(group);
    assert_eq!(
        children.first().copied(),
        builder.slots().get(Row::TrackingIdentifier)
    );
    assert_eq!(children.last().copied(), Some(measurement));
    assert_eq!(builder.measurements(), vec![measurement]);
    let node = builder.tree().get(measurement).unwrap();
    assert_eq!(node.concept_name(), &VOLUME.to_entry());
    assert_eq!(
        node.value(),
        &ContentValue::Numeric(MeasurementValue::new("120.5", CUBIC_CENTIMETER))
    );
}

#[rstest]
#[case::no_tracking_identifier(Row::TrackingIdentifier)]
#[case::no_tracking_uid(Row::TrackingUniqueIdentifier)]
#[case::no_segment(Row::ReferencedSegment)]
#[case::no_source_series(Row::SourceSeriesForSegmentation)]
#[case::no_measurement(Row::LastMeasurement)]
fn given_one_required_row_missing_when_validating_then_invalid(
    mut builder: Builder,
    #[case] missing: Row,
) {
    let required = [
        Row::TrackingIdentifier,
        Row::TrackingUniqueIdentifier,
        Row::ReferencedSegment,
        Row::SourceSeriesForSegmentation,
        Row::LastMeasurement,
    ];
    for row in required.into_iter().filter(|r| *r != missing) {
        set_row(&mut builder, row);
    }
    // optional rows do not make up for a missing one
    set_row(&mut builder, Row::Finding);
    set_row(&mut builder, Row::TimePoint);

    assert!(!builder.is_valid());
}

#[rstest]
fn given_valid_builder_when_taking_tree_then_document_kept_intact(mut builder: Builder) {
    for row in [
        Row::TrackingIdentifier,
        Row::TrackingUniqueIdentifier,
        Row::ReferencedSegment,
        Row::SourceSeriesForSegmentation,
        Row::LastMeasurement,
    ] {
        set_row(&mut builder, row);
    }
    let group = builder.slots().get(Row::MeasurementGroup).unwrap();
    let count = builder.tree().len();

    let tree = builder.into_tree();

    assert!(!tree.is_detached());
    assert!(tree.is_valid());
    assert_eq!(tree.len(), count);
    assert_eq!(tree.roots(), &[group]);
    assert_eq!(tree.children(group).len(), 5);
}

#[rstest]
fn given_valid_builder_when_cleared_then_empty_and_invalid(mut builder: Builder) {
    for row in [
        Row::TrackingIdentifier,
        Row::TrackingUniqueIdentifier,
        Row::ReferencedSegment,
        Row::SourceSeriesForSegmentation,
        Row::LastMeasurement,
    ] {
        set_row(&mut builder, row);
    }
    assert!(builder.is_valid());

    builder.clear();

    assert!(!builder.is_valid());
    assert!(builder.tree().is_empty());
    assert_eq!(builder.slots().occupied().count(), 0);

    // usable again after clearing
    builder.set_tracking_identifier("T2", true).unwrap();
    assert_eq!(builder.tree().len(), 2);
}
