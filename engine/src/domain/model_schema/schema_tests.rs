use super::*;
use crate::domain::model_schema::DimensionDataType;
use arrow::array::{Int64Array, TimestampSecondArray};
use serde_json::json;

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

fn micros(batch: &RecordBatch, column: &str) -> Vec<i64> {
    batch
        .column_by_name(column)
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .unwrap()
        .values()
        .iter()
        .copied()
        .collect()
}

fn strings(batch: &RecordBatch, column: &str) -> Vec<String> {
    batch
        .column_by_name(column)
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect()
}

fn roles(model: &Model) -> Vec<(String, DimensionRole)> {
    model
        .dimensions()
        .iter()
        .map(|d| (d.name().to_string(), d.role()))
        .collect()
}

#[test]
fn test_same_column_same_role_is_deduplicated() {
    let schema = Schema {
        feature_column_names: vec!["age".into(), "age".into()],
        ..Default::default()
    };
    let dimensions = schema.dimensions().unwrap();
    assert_eq!(dimensions.len(), 1);
    assert_eq!(dimensions[0].role(), DimensionRole::Feature);
}

#[test]
fn test_column_in_two_roles_is_rejected() {
    let schema = Schema {
        feature_column_names: vec!["age".into()],
        tag_column_names: vec!["age".into()],
        ..Default::default()
    };
    assert_eq!(
        schema.dimensions().unwrap_err(),
        SchemaError::DuplicateColumn {
            column: "age".into(),
            first: DimensionRole::Feature,
            second: DimensionRole::Tag,
        }
    );
}

#[test]
fn test_embedding_auxiliary_columns_are_claimed() {
    let schema = Schema {
        tag_column_names: vec!["text".into()],
        prompt_column_names: Some(EmbeddingColumnNames::new("vector").with_raw_data("text")),
        ..Default::default()
    };
    assert!(matches!(
        schema.dimensions(),
        Err(SchemaError::DuplicateColumn {
            first: DimensionRole::Tag,
            second: DimensionRole::Prompt,
            ..
        })
    ));
}

#[test]
fn test_empty_column_name_is_rejected() {
    let schema = Schema {
        actual_label_column_name: Some(String::new()),
        ..Default::default()
    };
    assert_eq!(
        schema.dimensions().unwrap_err(),
        SchemaError::EmptyColumnName(DimensionRole::ActualLabel)
    );
}

#[test]
fn test_schema_deserializes_with_defaults() {
    let schema: Schema = serde_json::from_value(json!({
        "feature_column_names": ["a"],
        "embedding_feature_column_names": [["image", {"vector_column_name": "image_vector"}]]
    }))
    .unwrap();
    assert!(schema.discover_features);
    assert_eq!(schema.timestamp_column_name, None);
    let dimensions = schema.dimensions().unwrap();
    assert_eq!(dimensions[1].name(), "image");
    assert!(dimensions[1].is_embedding());
}

#[test]
fn test_build_model_normalizes_and_sorts() {
    let registry = ModelRegistry::new();
    let schema = Schema {
        timestamp_column_name: Some("ts".into()),
        prediction_label_column_name: Some("label".into()),
        ..Default::default()
    };
    let data = batch(vec![
        ("x", Arc::new(Int64Array::from(vec![30, 10, 20])) as ArrayRef),
        ("ts", Arc::new(Float64Array::from(vec![3.0, 1.0, 2.0])) as ArrayRef),
        ("label", Arc::new(StringArray::from(vec!["c", "a", "b"])) as ArrayRef),
    ]);
    let model = schema
        .build_model(&registry, [(DatasetRole::Primary, data)], &ModelOptions::default())
        .unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(
        roles(&model),
        vec![
            ("prediction_id".to_string(), DimensionRole::PredictionId),
            ("ts".to_string(), DimensionRole::Timestamp),
            ("label".to_string(), DimensionRole::PredictionLabel),
            ("x".to_string(), DimensionRole::Feature),
        ]
    );

    let primary = model.dataset(DatasetRole::Primary).unwrap().batch();
    assert_eq!(micros(primary, "ts"), vec![1_000_000, 2_000_000, 3_000_000]);
    assert_eq!(primary.column_by_name("ts").unwrap().data_type(), &utc_micros());
    assert_eq!(strings(primary, "label"), vec!["a", "b", "c"]);

    let ids = strings(primary, "prediction_id");
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| Uuid::parse_str(id).is_ok()));
    assert_ne!(ids[0], ids[1]);

    let x = model.dimension("x").unwrap();
    assert_eq!(x.model_id(), Some(model.id()));
    assert_eq!(x.data_type(&registry), Some(DimensionDataType::Continuous));
    assert_eq!(x.min_max(&registry), Some((10.0, 30.0)));
    assert!(model.timestamp_dimension().is_some());
    assert!(model.prediction_id_dimension().is_some());
}

#[test]
fn test_build_model_synthesizes_timestamp_and_casts_ids() {
    let registry = ModelRegistry::new();
    let data = batch(vec![
        ("prediction_id", Arc::new(Int64Array::from(vec![7, 8])) as ArrayRef),
        ("city", Arc::new(StringArray::from(vec!["b", "a"])) as ArrayRef),
    ]);
    let before = chrono::Utc::now().timestamp_micros();
    let model = Schema::default()
        .build_model(
            &registry,
            [(DatasetRole::Primary, data)],
            &ModelOptions { sort_by_time: false },
        )
        .unwrap();
    let primary = model.dataset(DatasetRole::Primary).unwrap().batch();

    assert_eq!(strings(primary, "prediction_id"), vec!["7", "8"]);
    assert!(micros(primary, "timestamp").iter().all(|t| *t >= before));
    assert_eq!(
        model.dimension("city").unwrap().categories(&registry),
        vec!["a", "b"]
    );
}

#[test]
fn test_string_and_naive_timestamps() {
    let registry = ModelRegistry::new();
    let primary = batch(vec![(
        "timestamp",
        Arc::new(StringArray::from(vec![
            "2024-01-01T00:00:01Z",
            "2024-01-01 00:00:00",
        ])) as ArrayRef,
    )]);
    let reference = batch(vec![(
        "timestamp",
        Arc::new(TimestampSecondArray::from(vec![10])) as ArrayRef,
    )]);
    let model = Schema::default()
        .build_model(
            &registry,
            [
                (DatasetRole::Primary, primary),
                (DatasetRole::Reference, reference),
            ],
            &ModelOptions::default(),
        )
        .unwrap();

    let primary = model.dataset(DatasetRole::Primary).unwrap().batch();
    assert_eq!(
        micros(primary, "timestamp"),
        vec![1_704_067_200_000_000, 1_704_067_201_000_000]
    );
    let reference = model.dataset(DatasetRole::Reference).unwrap().batch();
    assert_eq!(micros(reference, "timestamp"), vec![10_000_000]);
}

#[test]
fn test_invalid_timestamp_is_reported() {
    let data = batch(vec![(
        "timestamp",
        Arc::new(StringArray::from(vec!["yesterday"])) as ArrayRef,
    )]);
    let err = Schema::default()
        .build_model(
            &ModelRegistry::new(),
            [(DatasetRole::Primary, data)],
            &ModelOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ModelError::InvalidTimestamp { value, .. } if value == "yesterday"));
}

#[test]
fn test_discovery_respects_exclusions() {
    let registry = ModelRegistry::new();
    let columns = || {
        batch(vec![
            ("a", Arc::new(Int64Array::from(vec![1])) as ArrayRef),
            ("b", Arc::new(Int64Array::from(vec![2])) as ArrayRef),
        ])
    };

    let schema = Schema {
        excluded_column_names: vec!["b".into()],
        ..Default::default()
    };
    let model = schema
        .build_model(&registry, [(DatasetRole::Primary, columns())], &ModelOptions::default())
        .unwrap();
    assert!(model.dimension("a").is_some());
    assert!(model.dimension("b").is_none());

    let schema = Schema {
        discover_features: false,
        ..Default::default()
    };
    let model = schema
        .build_model(&registry, [(DatasetRole::Primary, columns())], &ModelOptions::default())
        .unwrap();
    assert!(model.dimensions_with_role(DimensionRole::Feature).next().is_none());
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_build_model_errors() {
    let registry = ModelRegistry::new();
    let data = || batch(vec![("a", Arc::new(Int64Array::from(vec![1])) as ArrayRef)]);
    let options = ModelOptions::default();

    assert!(matches!(
        Schema::default().build_model(&registry, Vec::<(DatasetRole, RecordBatch)>::new(), &options),
        Err(ModelError::NoDatasets)
    ));
    assert!(matches!(
        Schema::default().build_model(
            &registry,
            [(DatasetRole::Primary, data()), (DatasetRole::Primary, data())],
            &options
        ),
        Err(ModelError::DuplicateDataset(DatasetRole::Primary))
    ));

    let schema = Schema {
        tag_column_names: vec!["region".into()],
        ..Default::default()
    };
    assert!(matches!(
        schema.build_model(&registry, [(DatasetRole::Reference, data())], &options),
        Err(ModelError::MissingColumn { column, dataset: DatasetRole::Reference }) if column == "region"
    ));
    assert!(registry.is_empty());
}
