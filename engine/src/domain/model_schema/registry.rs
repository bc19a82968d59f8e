//! Arena of live models
//!
//! Dimensions and datasets hold a [`ModelId`] rather than a reference, and
//! resolve it here. Removing a model from the registry releases it even if
//! dimensions cloned out of it are still around.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use super::model::Model;

/// Non-owning handle to a registered [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(Uuid);

impl ModelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<FxHashMap<ModelId, Arc<Model>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, model: Model) -> Arc<Model> {
        let model = Arc::new(model);
        self.models.write().insert(model.id(), Arc::clone(&model));
        tracing::debug!(model = %model.id(), dimensions = model.dimensions().len(), "Registered model");
        model
    }

    pub fn get(&self, id: ModelId) -> Option<Arc<Model>> {
        self.models.read().get(&id).cloned()
    }

    pub fn remove(&self, id: ModelId) -> Option<Arc<Model>> {
        self.models.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}
