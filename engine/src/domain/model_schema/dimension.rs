//! Role-tagged accessors over model columns

use std::fmt;
use std::sync::OnceLock;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

use super::dataset::DatasetRole;
use super::registry::{ModelId, ModelRegistry};
use super::schema::EmbeddingColumnNames;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionRole {
    PredictionId,
    Timestamp,
    Feature,
    Tag,
    PredictionLabel,
    PredictionScore,
    ActualLabel,
    ActualScore,
    Prompt,
    Response,
}

impl DimensionRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DimensionRole::PredictionId => "prediction_id",
            DimensionRole::Timestamp => "timestamp",
            DimensionRole::Feature => "feature",
            DimensionRole::Tag => "tag",
            DimensionRole::PredictionLabel => "prediction_label",
            DimensionRole::PredictionScore => "prediction_score",
            DimensionRole::ActualLabel => "actual_label",
            DimensionRole::ActualScore => "actual_score",
            DimensionRole::Prompt => "prompt",
            DimensionRole::Response => "response",
        }
    }

    /// Data type implied by the role alone.
    fn fixed_data_type(self) -> Option<DimensionDataType> {
        match self {
            DimensionRole::PredictionId
            | DimensionRole::PredictionLabel
            | DimensionRole::ActualLabel => Some(DimensionDataType::Discrete),
            DimensionRole::Timestamp
            | DimensionRole::PredictionScore
            | DimensionRole::ActualScore => Some(DimensionDataType::Continuous),
            DimensionRole::Feature
            | DimensionRole::Tag
            | DimensionRole::Prompt
            | DimensionRole::Response => None,
        }
    }
}

impl fmt::Display for DimensionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionDataType {
    Discrete,
    Continuous,
}

impl DimensionDataType {
    /// Numeric columns are continuous; everything else is discrete.
    pub fn guess(data_type: &DataType) -> Self {
        if data_type.is_numeric() {
            DimensionDataType::Continuous
        } else {
            DimensionDataType::Discrete
        }
    }
}

/// A named column (or group of columns, for embeddings) playing one role.
///
/// Scalar dimensions guess their data type from the column the first time
/// it is asked for and keep the answer. Field changes go through the
/// `with_*` methods, which return a modified copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    name: String,
    role: DimensionRole,
    column_name: String,
    embedding: Option<EmbeddingColumnNames>,
    data_type: OnceLock<DimensionDataType>,
    model: Option<ModelId>,
}

impl Dimension {
    pub fn new(role: DimensionRole, column_name: impl Into<String>) -> Self {
        let column_name = column_name.into();
        let data_type = OnceLock::new();
        if let Some(fixed) = role.fixed_data_type() {
            let _ = data_type.set(fixed);
        }
        Self {
            name: column_name.clone(),
            role,
            column_name,
            embedding: None,
            data_type,
            model: None,
        }
    }

    /// Embedding dimension named `name`; its primary column is the vector column.
    pub fn embedding(role: DimensionRole, name: impl Into<String>, columns: EmbeddingColumnNames) -> Self {
        Self {
            name: name.into(),
            role,
            column_name: columns.vector_column_name.clone(),
            embedding: Some(columns),
            data_type: OnceLock::new(),
            model: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> DimensionRole {
        self.role
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn embedding_columns(&self) -> Option<&EmbeddingColumnNames> {
        self.embedding.as_ref()
    }

    pub fn is_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn model_id(&self) -> Option<ModelId> {
        self.model
    }

    /// Every physical column this dimension reads.
    pub fn column_names(&self) -> Vec<&str> {
        match &self.embedding {
            Some(columns) => columns.column_names(),
            None => vec![self.column_name.as_str()],
        }
    }

    pub fn with_model(&self, model: ModelId) -> Self {
        Self {
            model: Some(model),
            ..self.clone()
        }
    }

    pub fn with_data_type(&self, data_type: DimensionDataType) -> Self {
        Self {
            data_type: OnceLock::from(data_type),
            ..self.clone()
        }
    }

    /// Discrete or continuous; `None` for embeddings or a detached dimension.
    pub fn data_type(&self, registry: &ModelRegistry) -> Option<DimensionDataType> {
        if let Some(data_type) = self.data_type.get() {
            return Some(*data_type);
        }
        if self.is_embedding() {
            return None;
        }
        let model = registry.get(self.model?)?;
        let guessed = model
            .datasets()
            .iter()
            .find_map(|dataset| dataset.column(&self.column_name))
            .map(|array| DimensionDataType::guess(array.data_type()))?;
        Some(*self.data_type.get_or_init(|| guessed))
    }

    /// The column in the model's dataset of `role`.
    pub fn values(&self, registry: &ModelRegistry, role: DatasetRole) -> Option<ArrayRef> {
        let model = registry.get(self.model?)?;
        model.dataset(role)?.column(&self.column_name).cloned()
    }

    /// Smallest and largest value over all datasets of the model.
    pub fn min_max(&self, registry: &ModelRegistry) -> Option<(f64, f64)> {
        let model = registry.get(self.model?)?;
        let summary = model.summary(&self.column_name)?;
        Some((summary.min?, summary.max?))
    }

    /// Distinct values over all datasets of the model, sorted.
    pub fn categories(&self, registry: &ModelRegistry) -> Vec<String> {
        self.model
            .and_then(|id| registry.get(id))
            .and_then(|model| model.summary(&self.column_name))
            .map(|summary| summary.categories.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_fixes_data_type() {
        let registry = ModelRegistry::new();
        let score = Dimension::new(DimensionRole::PredictionScore, "score");
        assert_eq!(score.data_type(&registry), Some(DimensionDataType::Continuous));
        let label = Dimension::new(DimensionRole::ActualLabel, "label");
        assert_eq!(label.data_type(&registry), Some(DimensionDataType::Discrete));
    }

    #[test]
    fn test_detached_dimension_has_no_data() {
        let registry = ModelRegistry::new();
        let feature = Dimension::new(DimensionRole::Feature, "age");
        assert_eq!(feature.data_type(&registry), None);
        assert_eq!(feature.min_max(&registry), None);
        assert!(feature.categories(&registry).is_empty());

        let dangling = feature.with_model(ModelId::new());
        assert!(dangling.values(&registry, DatasetRole::Primary).is_none());
    }

    #[test]
    fn test_with_methods_copy() {
        let feature = Dimension::new(DimensionRole::Feature, "age");
        let id = ModelId::new();
        let attached = feature.with_model(id);
        assert_eq!(feature.model_id(), None);
        assert_eq!(attached.model_id(), Some(id));

        let forced = feature.with_data_type(DimensionDataType::Discrete);
        assert_eq!(
            forced.data_type(&ModelRegistry::new()),
            Some(DimensionDataType::Discrete)
        );
    }

    #[test]
    fn test_embedding_columns() {
        let prompt = Dimension::embedding(
            DimensionRole::Prompt,
            "prompt",
            EmbeddingColumnNames {
                vector_column_name: "prompt_vector".into(),
                raw_data_column_name: Some("prompt_text".into()),
                link_to_data_column_name: None,
            },
        );
        assert_eq!(prompt.name(), "prompt");
        assert_eq!(prompt.column_name(), "prompt_vector");
        assert_eq!(prompt.column_names(), vec!["prompt_vector", "prompt_text"]);
        assert_eq!(prompt.data_type(&ModelRegistry::new()), None);
    }

    #[test]
    fn test_guess_data_type() {
        assert_eq!(
            DimensionDataType::guess(&DataType::Float32),
            DimensionDataType::Continuous
        );
        assert_eq!(
            DimensionDataType::guess(&DataType::Utf8),
            DimensionDataType::Discrete
        );
    }
}
