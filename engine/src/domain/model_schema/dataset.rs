//! Datasets owned by a model

use std::fmt;

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use super::registry::ModelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetRole {
    Primary,
    Reference,
    Corpus,
}

impl DatasetRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DatasetRole::Primary => "primary",
            DatasetRole::Reference => "reference",
            DatasetRole::Corpus => "corpus",
        }
    }
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized record batch with its role in the owning model.
#[derive(Debug, Clone)]
pub struct Dataset {
    role: DatasetRole,
    batch: RecordBatch,
    model: ModelId,
}

impl Dataset {
    pub(crate) fn new(role: DatasetRole, batch: RecordBatch, model: ModelId) -> Self {
        Self { role, batch, model }
    }

    pub fn role(&self) -> DatasetRole {
        self.role
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn model_id(&self) -> ModelId {
        self.model
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
    use std::sync::Arc;

    #[test]
    fn test_dataset_accessors() {
        let schema = Arc::new(ArrowSchema::new(vec![Field::new("x", DataType::Int64, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
        let id = ModelId::new();
        let dataset = Dataset::new(DatasetRole::Reference, batch, id);

        assert_eq!(dataset.role(), DatasetRole::Reference);
        assert_eq!(dataset.model_id(), id);
        assert_eq!(dataset.num_rows(), 2);
        assert!(dataset.column("x").is_some());
        assert!(dataset.column("y").is_none());
        assert_eq!(DatasetRole::Corpus.to_string(), "corpus");
    }
}
