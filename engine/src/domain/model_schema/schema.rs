//! Schema declaration and model construction

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::{cast, sort_to_indices, take};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dataset::{Dataset, DatasetRole};
use super::dimension::{Dimension, DimensionRole};
use super::error::{ModelError, SchemaError};
use super::model::{Model, ModelOptions};
use super::registry::{ModelId, ModelRegistry};
use crate::utils::time::parse_timestamp;

const DEFAULT_PREDICTION_ID_COLUMN: &str = "prediction_id";
const DEFAULT_TIMESTAMP_COLUMN: &str = "timestamp";
const UTC: &str = "UTC";

/// Columns backing one embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingColumnNames {
    pub vector_column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data_column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_to_data_column_name: Option<String>,
}

impl EmbeddingColumnNames {
    pub fn new(vector_column_name: impl Into<String>) -> Self {
        Self {
            vector_column_name: vector_column_name.into(),
            raw_data_column_name: None,
            link_to_data_column_name: None,
        }
    }

    pub fn with_raw_data(mut self, column: impl Into<String>) -> Self {
        self.raw_data_column_name = Some(column.into());
        self
    }

    pub fn with_link_to_data(mut self, column: impl Into<String>) -> Self {
        self.link_to_data_column_name = Some(column.into());
        self
    }

    /// Vector column first, then raw data and link columns when set.
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once(self.vector_column_name.as_str())
            .chain(self.raw_data_column_name.as_deref())
            .chain(self.link_to_data_column_name.as_deref())
            .collect()
    }
}

/// Which columns play which role.
///
/// Unset prediction id and timestamp columns fall back to `prediction_id`
/// and `timestamp`; either is synthesized when the data lacks it. With
/// `discover_features` set, every column no role claims becomes a feature
/// unless it is listed in `excluded_column_names`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub prediction_id_column_name: Option<String>,
    pub timestamp_column_name: Option<String>,
    pub feature_column_names: Vec<String>,
    pub tag_column_names: Vec<String>,
    pub prediction_label_column_name: Option<String>,
    pub prediction_score_column_name: Option<String>,
    pub actual_label_column_name: Option<String>,
    pub actual_score_column_name: Option<String>,
    pub prompt_column_names: Option<EmbeddingColumnNames>,
    pub response_column_names: Option<EmbeddingColumnNames>,
    pub embedding_feature_column_names: Vec<(String, EmbeddingColumnNames)>,
    pub excluded_column_names: Vec<String>,
    pub discover_features: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            prediction_id_column_name: None,
            timestamp_column_name: None,
            feature_column_names: Vec::new(),
            tag_column_names: Vec::new(),
            prediction_label_column_name: None,
            prediction_score_column_name: None,
            actual_label_column_name: None,
            actual_score_column_name: None,
            prompt_column_names: None,
            response_column_names: None,
            embedding_feature_column_names: Vec::new(),
            excluded_column_names: Vec::new(),
            discover_features: true,
        }
    }
}

/// Column ownership while compiling dimensions.
#[derive(Default)]
struct Assignments {
    owners: FxHashMap<String, DimensionRole>,
    dimensions: Vec<Dimension>,
}

impl Assignments {
    fn claim(&mut self, column: &str, role: DimensionRole) -> Result<bool, SchemaError> {
        if column.is_empty() {
            return Err(SchemaError::EmptyColumnName(role));
        }
        match self.owners.get(column) {
            Some(owner) if *owner == role => Ok(false),
            Some(owner) => Err(SchemaError::DuplicateColumn {
                column: column.to_string(),
                first: *owner,
                second: role,
            }),
            None => {
                self.owners.insert(column.to_string(), role);
                Ok(true)
            }
        }
    }

    fn scalar(&mut self, role: DimensionRole, column: Option<&str>) -> Result<(), SchemaError> {
        if let Some(column) = column
            && self.claim(column, role)?
        {
            self.dimensions.push(Dimension::new(role, column));
        }
        Ok(())
    }

    fn embedding(
        &mut self,
        role: DimensionRole,
        name: &str,
        columns: &EmbeddingColumnNames,
    ) -> Result<(), SchemaError> {
        let mut fresh = false;
        for column in columns.column_names() {
            fresh |= self.claim(column, role)?;
        }
        if fresh {
            self.dimensions
                .push(Dimension::embedding(role, name, columns.clone()));
        }
        Ok(())
    }
}

impl Schema {
    /// Compile the declared columns into dimensions.
    ///
    /// A column listed twice under the same role yields one dimension; a
    /// column claimed by two roles is an error.
    pub fn dimensions(&self) -> Result<Vec<Dimension>, SchemaError> {
        let mut assigned = Assignments::default();
        assigned.scalar(
            DimensionRole::PredictionId,
            self.prediction_id_column_name.as_deref(),
        )?;
        assigned.scalar(DimensionRole::Timestamp, self.timestamp_column_name.as_deref())?;
        for column in &self.feature_column_names {
            assigned.scalar(DimensionRole::Feature, Some(column.as_str()))?;
        }
        for column in &self.tag_column_names {
            assigned.scalar(DimensionRole::Tag, Some(column.as_str()))?;
        }
        assigned.scalar(
            DimensionRole::PredictionLabel,
            self.prediction_label_column_name.as_deref(),
        )?;
        assigned.scalar(
            DimensionRole::PredictionScore,
            self.prediction_score_column_name.as_deref(),
        )?;
        assigned.scalar(
            DimensionRole::ActualLabel,
            self.actual_label_column_name.as_deref(),
        )?;
        assigned.scalar(
            DimensionRole::ActualScore,
            self.actual_score_column_name.as_deref(),
        )?;
        if let Some(columns) = &self.prompt_column_names {
            assigned.embedding(DimensionRole::Prompt, "prompt", columns)?;
        }
        if let Some(columns) = &self.response_column_names {
            assigned.embedding(DimensionRole::Response, "response", columns)?;
        }
        for (name, columns) in &self.embedding_feature_column_names {
            assigned.embedding(DimensionRole::Feature, name, columns)?;
        }
        Ok(assigned.dimensions)
    }

    fn prediction_id_column(&self) -> &str {
        self.prediction_id_column_name
            .as_deref()
            .unwrap_or(DEFAULT_PREDICTION_ID_COLUMN)
    }

    fn timestamp_column(&self) -> &str {
        self.timestamp_column_name
            .as_deref()
            .unwrap_or(DEFAULT_TIMESTAMP_COLUMN)
    }

    /// Build a model from one batch per dataset role and register it.
    pub fn build_model<I>(
        &self,
        registry: &ModelRegistry,
        datasets: I,
        options: &ModelOptions,
    ) -> Result<Arc<Model>, ModelError>
    where
        I: IntoIterator<Item = (DatasetRole, RecordBatch)>,
    {
        let mut batches: Vec<(DatasetRole, RecordBatch)> = Vec::new();
        for (role, batch) in datasets {
            if batches.iter().any(|(existing, _)| *existing == role) {
                return Err(ModelError::DuplicateDataset(role));
            }
            batches.push((role, batch));
        }
        if batches.is_empty() {
            return Err(ModelError::NoDatasets);
        }

        let prediction_id = self.prediction_id_column().to_string();
        let timestamp = self.timestamp_column().to_string();
        let resolved = Schema {
            prediction_id_column_name: Some(prediction_id.clone()),
            timestamp_column_name: Some(timestamp.clone()),
            ..self.clone()
        };
        let mut dimensions = resolved.dimensions()?;

        let mut normalized = Vec::with_capacity(batches.len());
        for (role, batch) in batches {
            for dimension in &dimensions {
                for column in dimension.column_names() {
                    if column != prediction_id
                        && column != timestamp
                        && batch.column_by_name(column).is_none()
                    {
                        return Err(ModelError::MissingColumn {
                            column: column.to_string(),
                            dataset: role,
                        });
                    }
                }
            }
            let batch = normalize_prediction_id(&batch, &prediction_id)?;
            let batch = normalize_timestamp(&batch, &timestamp)?;
            let batch = if options.sort_by_time {
                sort_by_column(&batch, &timestamp)?
            } else {
                batch
            };
            normalized.push((role, batch));
        }

        if self.discover_features {
            let mut claimed: Vec<String> = dimensions
                .iter()
                .flat_map(|d| d.column_names().into_iter().map(str::to_string))
                .collect();
            claimed.extend(self.excluded_column_names.iter().cloned());
            for (_, batch) in &normalized {
                for field in batch.schema().fields() {
                    if !claimed.iter().any(|c| c == field.name()) {
                        claimed.push(field.name().clone());
                        dimensions.push(Dimension::new(DimensionRole::Feature, field.name()));
                    }
                }
            }
        }

        let id = ModelId::new();
        let dimensions = dimensions.iter().map(|d| d.with_model(id)).collect();
        let datasets = normalized
            .into_iter()
            .map(|(role, batch)| Dataset::new(role, batch, id))
            .collect();
        Ok(registry.insert(Model::new(id, dimensions, datasets)))
    }
}

/// Replace `name` in `batch`, or append it when absent.
fn with_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch, ArrowError> {
    let mut fields: Vec<Field> = Vec::with_capacity(batch.num_columns() + 1);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns() + 1);
    let mut replaced = false;
    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        if field.name() == name {
            fields.push(Field::new(name, array.data_type().clone(), true));
            columns.push(Arc::clone(&array));
            replaced = true;
        } else {
            fields.push(Field::clone(field));
            columns.push(Arc::clone(column));
        }
    }
    if !replaced {
        fields.push(Field::new(name, array.data_type().clone(), true));
        columns.push(array);
    }
    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns)
}

/// Prediction ids become strings; missing ones are random UUIDs.
fn normalize_prediction_id(batch: &RecordBatch, column: &str) -> Result<RecordBatch, ModelError> {
    let ids: ArrayRef = match batch.column_by_name(column) {
        Some(array) if array.data_type() == &DataType::Utf8 => return Ok(batch.clone()),
        Some(array) => cast(array.as_ref(), &DataType::Utf8)?,
        None => Arc::new(StringArray::from(
            (0..batch.num_rows())
                .map(|_| Uuid::new_v4().to_string())
                .collect::<Vec<_>>(),
        )),
    };
    Ok(with_column(batch, column, ids)?)
}

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into()))
}

/// Timestamps become UTC microseconds.
///
/// Numbers are epoch seconds, strings are parsed, naive timestamps are read
/// as UTC. A missing column is filled with the current time.
fn normalize_timestamp(batch: &RecordBatch, column: &str) -> Result<RecordBatch, ModelError> {
    let Some(array) = batch.column_by_name(column) else {
        let now = chrono::Utc::now().timestamp_micros();
        tracing::debug!(column, "Synthesizing timestamp column");
        let filled = TimestampMicrosecondArray::from(vec![now; batch.num_rows()]).with_timezone(UTC);
        return Ok(with_column(batch, column, Arc::new(filled))?);
    };

    let unsupported = || ModelError::UnsupportedType {
        column: column.to_string(),
        data_type: array.data_type().to_string(),
    };
    let micros: ArrayRef = match array.data_type() {
        data_type if *data_type == utc_micros() => return Ok(batch.clone()),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            cast(array.as_ref(), &utc_micros())?
        }
        data_type if data_type.is_numeric() => {
            let seconds = cast(array.as_ref(), &DataType::Float64)?;
            let seconds = seconds
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(unsupported)?;
            let micros: TimestampMicrosecondArray = seconds
                .iter()
                .map(|s| s.map(|s| (s * 1e6).round() as i64))
                .collect();
            Arc::new(micros.with_timezone(UTC))
        }
        DataType::Utf8 | DataType::LargeUtf8 => {
            let text = cast(array.as_ref(), &DataType::Utf8)?;
            let text = text
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(unsupported)?;
            let values = text
                .iter()
                .map(|value| match value {
                    None => Ok(None),
                    Some(value) => parse_timestamp(value)
                        .map(|dt| Some(dt.timestamp_micros()))
                        .ok_or_else(|| ModelError::InvalidTimestamp {
                            column: column.to_string(),
                            value: value.to_string(),
                        }),
                })
                .collect::<Result<Vec<Option<i64>>, ModelError>>()?;
            Arc::new(TimestampMicrosecondArray::from(values).with_timezone(UTC))
        }
        _ => return Err(unsupported()),
    };
    Ok(with_column(batch, column, micros)?)
}

fn sort_by_column(batch: &RecordBatch, column: &str) -> Result<RecordBatch, ArrowError> {
    let Some(keys) = batch.column_by_name(column) else {
        return Ok(batch.clone());
    };
    let indices = sort_to_indices(keys.as_ref(), None, None)?;
    let columns = batch
        .columns()
        .iter()
        .map(|column| take(column.as_ref(), &indices, None))
        .collect::<Result<Vec<_>, _>>()?;
    RecordBatch::try_new(batch.schema(), columns)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
