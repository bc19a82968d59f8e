//! Building models from Arrow batches

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use phoenix_engine::domain::model_schema::{
    DatasetRole, DimensionDataType, DimensionRole, EmbeddingColumnNames, ModelError,
    ModelOptions, ModelRegistry, Schema,
};

fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    RecordBatch::try_new(
        Arc::new(ArrowSchema::new(fields)),
        columns.into_iter().map(|(_, array)| array).collect(),
    )
    .unwrap()
}

fn inferences(ages: Vec<i64>, predicted: Vec<&str>) -> RecordBatch {
    let rows = ages.len();
    let timestamps: Vec<f64> = (0..rows).map(|i| 1_700_000_000.0 + i as f64).collect();
    batch(vec![
        ("ts", Arc::new(Float64Array::from(timestamps)) as ArrayRef),
        ("age", Arc::new(Int64Array::from(ages)) as ArrayRef),
        ("predicted", Arc::new(StringArray::from(predicted)) as ArrayRef),
        ("vector", Arc::new(Float64Array::from(vec![0.5; rows])) as ArrayRef),
    ])
}

fn schema() -> Schema {
    Schema {
        timestamp_column_name: Some("ts".into()),
        prediction_label_column_name: Some("predicted".into()),
        embedding_feature_column_names: vec![(
            "embedding".into(),
            EmbeddingColumnNames::new("vector"),
        )],
        ..Default::default()
    }
}

#[test]
fn test_primary_and_reference_share_dimensions() {
    let registry = ModelRegistry::new();
    let model = schema()
        .build_model(
            &registry,
            [
                (DatasetRole::Primary, inferences(vec![30, 40], vec!["fraud", "ok"])),
                (DatasetRole::Reference, inferences(vec![20, 60], vec!["ok", "ok"])),
            ],
            &ModelOptions::default(),
        )
        .unwrap();

    let age = model.dimension("age").unwrap();
    assert_eq!(age.role(), DimensionRole::Feature);
    assert_eq!(age.data_type(&registry), Some(DimensionDataType::Continuous));
    assert_eq!(age.min_max(&registry), Some((20.0, 60.0)));

    let predicted = model.dimension("predicted").unwrap();
    assert_eq!(predicted.data_type(&registry), Some(DimensionDataType::Discrete));
    assert_eq!(predicted.categories(&registry), vec!["fraud", "ok"]);

    let embedding = model.dimension("embedding").unwrap();
    assert!(embedding.is_embedding());
    assert_eq!(embedding.data_type(&registry), None);
    assert!(model.dimension("vector").is_none());

    let reference = age.values(&registry, DatasetRole::Reference).unwrap();
    assert_eq!(reference.len(), 2);
    assert!(age.values(&registry, DatasetRole::Corpus).is_none());
}

#[test]
fn test_dimensions_outlive_their_model_safely() {
    let registry = ModelRegistry::new();
    let model = schema()
        .build_model(
            &registry,
            [(DatasetRole::Primary, inferences(vec![1, 2], vec!["a", "b"]))],
            &ModelOptions::default(),
        )
        .unwrap();
    let age = model.dimension("age").unwrap().clone();
    let id = model.id();
    drop(model);

    assert!(age.min_max(&registry).is_some());
    registry.remove(id);
    assert!(age.min_max(&registry).is_none());
    assert!(age.values(&registry, DatasetRole::Primary).is_none());
}

#[test]
fn test_conflicting_schema_is_rejected_before_reading_data() {
    let schema = Schema {
        tag_column_names: vec!["predicted".into()],
        ..schema()
    };
    let err = schema
        .build_model(
            &ModelRegistry::new(),
            [(DatasetRole::Primary, inferences(vec![1, 2], vec!["a", "b"]))],
            &ModelOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::Schema(_)));
    assert_eq!(
        err.to_string(),
        "column predicted is assigned to both tag and prediction_label"
    );
}
