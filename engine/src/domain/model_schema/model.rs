//! Model: dimensions plus the datasets they read

use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::dataset::{Dataset, DatasetRole};
use super::dimension::{Dimension, DimensionRole};
use super::registry::ModelId;

#[derive(Debug, Clone, Copy)]
pub struct ModelOptions {
    /// Sort every dataset by its timestamp column.
    pub sort_by_time: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self { sort_by_time: true }
    }
}

/// Aggregates of one column over every dataset of a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSummary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub categories: Vec<String>,
}

impl ColumnSummary {
    fn compute(arrays: &[&ArrayRef]) -> Result<Self, ArrowError> {
        let mut summary = ColumnSummary::default();
        let numeric = arrays
            .iter()
            .all(|a| a.data_type().is_numeric() || a.data_type().is_temporal());

        if numeric {
            for array in arrays {
                let array = if array.data_type().is_temporal() {
                    cast(array.as_ref(), &DataType::Int64)?
                } else {
                    Arc::clone(array)
                };
                let values = cast(array.as_ref(), &DataType::Float64)?;
                let Some(values) = values.as_any().downcast_ref::<Float64Array>() else {
                    continue;
                };
                for value in values.iter().flatten().filter(|v| !v.is_nan()) {
                    summary.min = Some(summary.min.map_or(value, |m| m.min(value)));
                    summary.max = Some(summary.max.map_or(value, |m| m.max(value)));
                }
            }
        } else {
            let mut categories = BTreeSet::new();
            for array in arrays {
                let values = cast(array.as_ref(), &DataType::Utf8)?;
                let Some(values) = values.as_any().downcast_ref::<StringArray>() else {
                    continue;
                };
                categories.extend(values.iter().flatten().map(str::to_string));
            }
            summary.categories = categories.into_iter().collect();
        }
        Ok(summary)
    }
}

/// A built model. Immutable apart from its summary cache.
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    dimensions: Vec<Dimension>,
    datasets: Vec<Dataset>,
    summaries: RwLock<FxHashMap<String, Arc<ColumnSummary>>>,
}

impl Model {
    pub(crate) fn new(id: ModelId, dimensions: Vec<Dimension>, datasets: Vec<Dataset>) -> Self {
        Self {
            id,
            dimensions,
            datasets,
            summaries: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name() == name)
    }

    pub fn dimensions_with_role(&self, role: DimensionRole) -> impl Iterator<Item = &Dimension> {
        self.dimensions.iter().filter(move |d| d.role() == role)
    }

    pub fn prediction_id_dimension(&self) -> Option<&Dimension> {
        self.dimensions_with_role(DimensionRole::PredictionId).next()
    }

    pub fn timestamp_dimension(&self) -> Option<&Dimension> {
        self.dimensions_with_role(DimensionRole::Timestamp).next()
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self, role: DatasetRole) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.role() == role)
    }

    /// Summary of `column`, computed on first request and cached.
    pub fn summary(&self, column: &str) -> Option<Arc<ColumnSummary>> {
        if let Some(summary) = self.summaries.read().get(column) {
            return Some(Arc::clone(summary));
        }

        let arrays: Vec<&ArrayRef> = self
            .datasets
            .iter()
            .filter_map(|dataset| dataset.column(column))
            .collect();
        if arrays.is_empty() {
            return None;
        }
        let summary = ColumnSummary::compute(&arrays).unwrap_or_else(|e| {
            tracing::warn!(model = %self.id, column, error = %e, "Column cannot be summarized");
            ColumnSummary::default()
        });

        let mut summaries = self.summaries.write();
        let summary = summaries
            .entry(column.to_string())
            .or_insert_with(|| Arc::new(summary));
        Some(Arc::clone(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model_schema::ModelRegistry;
    use arrow::array::Int64Array;
    use arrow::datatypes::{Field, Schema as ArrowSchema};
    use arrow::record_batch::RecordBatch;

    fn model(batches: Vec<(DatasetRole, RecordBatch)>) -> Model {
        let id = ModelId::new();
        let datasets = batches
            .into_iter()
            .map(|(role, batch)| Dataset::new(role, batch, id))
            .collect();
        Model::new(
            id,
            vec![Dimension::new(DimensionRole::Feature, "x").with_model(id)],
            datasets,
        )
    }

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

    #[test]
    fn test_numeric_summary_spans_datasets() {
        let model = model(vec![
            (
                DatasetRole::Primary,
                batch(vec![("x", Arc::new(Int64Array::from(vec![Some(3), None, Some(7)])) as ArrayRef)]),
            ),
            (
                DatasetRole::Reference,
                batch(vec![("x", Arc::new(Float64Array::from(vec![-1.5, f64::NAN])) as ArrayRef)]),
            ),
        ]);
        let summary = model.summary("x").unwrap();
        assert_eq!(summary.min, Some(-1.5));
        assert_eq!(summary.max, Some(7.0));
        assert!(summary.categories.is_empty());
        assert!(Arc::ptr_eq(&summary, &model.summary("x").unwrap()));
        assert!(model.summary("y").is_none());
    }

    #[test]
    fn test_categories_sorted_distinct() {
        let model = model(vec![(
            DatasetRole::Primary,
            batch(vec![(
                "x",
                Arc::new(StringArray::from(vec![Some("b"), Some("a"), None, Some("b")])) as ArrayRef,
            )]),
        )]);
        let summary = model.summary("x").unwrap();
        assert_eq!(summary.categories, vec!["a", "b"]);
        assert_eq!(summary.min, None);
    }

    #[test]
    fn test_dimension_reads_through_registry() {
        let registry = ModelRegistry::new();
        let model = registry.insert(model(vec![(
            DatasetRole::Primary,
            batch(vec![("x", Arc::new(Int64Array::from(vec![2, 9])) as ArrayRef)]),
        )]));
        let dimension = model.dimension("x").unwrap().clone();

        assert_eq!(dimension.min_max(&registry), Some((2.0, 9.0)));
        assert_eq!(
            dimension.data_type(&registry),
            Some(crate::domain::model_schema::DimensionDataType::Continuous)
        );
        assert_eq!(
            dimension
                .values(&registry, DatasetRole::Primary)
                .unwrap()
                .len(),
            2
        );
        assert!(dimension.values(&registry, DatasetRole::Reference).is_none());

        registry.remove(model.id());
        drop(model);
        assert!(registry.is_empty());
        assert!(dimension.values(&registry, DatasetRole::Primary).is_none());
        assert!(dimension.categories(&registry).is_empty());
    }
}
