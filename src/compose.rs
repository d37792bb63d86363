//! Multi-file composition: models keyed by the path they were parsed from.

use crate::api;
use crate::error::SyslError;
use crate::model::Model;
use indexmap::IndexMap;
use std::path::Path;

/// A caller-owned set of parsed files. Nothing here is shared between
/// compositions, so independent compositions can be built in parallel.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    models: IndexMap<String, Model>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `model` under `path`, returning the model it replaces.
    pub fn insert(&mut self, path: impl Into<String>, model: Model) -> Option<Model> {
        let path = path.into();
        log::debug!("composing `{path}`");
        self.models.insert(path, model)
    }

    /// Parses the file at `path` and stores the result under that path.
    ///
    /// # Errors
    /// Returns a `SyslError` if the file cannot be read or parsed.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), SyslError> {
        let path = path.as_ref();
        let model = api::parse_file(path)?;
        self.insert(path.to_string_lossy(), model);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Model> {
        self.models.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Model> {
        self.models.shift_remove(path)
    }

    /// Paths and their models, in insertion order.
    pub fn models(&self) -> impl Iterator<Item = (&str, &Model)> {
        self.models.iter().map(|(path, model)| (path.as_str(), model))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All files folded into one model, earlier files winning on conflicts.
    #[must_use]
    pub fn merged(&self) -> Model {
        let mut merged = Model::new();
        for model in self.models.values() {
            merged.merge(model.clone());
        }
        merged
    }

    /// The merged model restricted to what `path` declared.
    #[must_use]
    pub fn filter_by_file(&self, path: &str) -> Model {
        self.merged().filter_by_file(path)
    }
}
