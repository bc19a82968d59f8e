//! Model schema error types

use thiserror::Error;

use super::dataset::DatasetRole;
use super::dimension::DimensionRole;

/// Invalid schema declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("column {column} is assigned to both {first} and {second}")]
    DuplicateColumn {
        column: String,
        first: DimensionRole,
        second: DimensionRole,
    },

    #[error("empty column name for {0}")]
    EmptyColumnName(DimensionRole),
}

/// Failure to build a model from data.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("at least one dataset is required")]
    NoDatasets,

    #[error("more than one {0} dataset")]
    DuplicateDataset(DatasetRole),

    #[error("column {column} not found in {dataset} dataset")]
    MissingColumn { column: String, dataset: DatasetRole },

    #[error("column {column} has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: String },

    #[error("invalid timestamp {value:?} in column {column}")]
    InvalidTimestamp { column: String, value: String },
}
