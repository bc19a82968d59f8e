//! Declarative model schemas over tabular data
//!
//! A [`Schema`] names the columns that play each role (prediction id,
//! timestamp, features, tags, predictions, actuals, embeddings). Building a
//! model from one or more Arrow record batches normalizes the prediction id
//! and timestamp columns, discovers features, and registers the resulting
//! [`Model`] in a [`ModelRegistry`].
//!
//! Dimensions refer to their model by [`ModelId`] and resolve it through the
//! registry, so a dimension never keeps its model alive.

pub mod dataset;
pub mod dimension;
pub mod error;
pub mod model;
pub mod registry;
pub mod schema;

pub use dataset::{Dataset, DatasetRole};
pub use dimension::{Dimension, DimensionDataType, DimensionRole};
pub use error::{ModelError, SchemaError};
pub use model::{ColumnSummary, Model, ModelOptions};
pub use registry::{ModelId, ModelRegistry};
pub use schema::{EmbeddingColumnNames, Schema};
