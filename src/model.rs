//! The top-level model: applications keyed by their escaped name.

use crate::api;
use crate::attribute::Attributes;
use crate::endpoint::Endpoint;
use crate::error::SyslError;
use crate::name::AppName;
use crate::types::Type;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// A named container of endpoints and type declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub name: AppName,
    pub attrs: Attributes,
    pub endpoints: IndexMap<String, Endpoint>,
    pub types: IndexMap<String, Type>,
    /// File the application header was read from.
    pub source: Option<String>,
}

impl Application {
    pub fn new(name: AppName) -> Self {
        Self {
            name,
            attrs: Attributes::new(),
            endpoints: IndexMap::new(),
            types: IndexMap::new(),
            source: None,
        }
    }

    /// Adds an endpoint under its name, handing it back if the name is taken.
    ///
    /// # Errors
    /// Returns the rejected endpoint when the key already exists.
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<(), Endpoint> {
        if self.endpoints.contains_key(&endpoint.name) {
            return Err(endpoint);
        }
        self.endpoints.insert(endpoint.name.clone(), endpoint);
        Ok(())
    }

    /// Adds a type under its name, handing it back if the name is taken.
    ///
    /// # Errors
    /// Returns the rejected type when the name already exists.
    pub fn add_type(&mut self, ty: Type) -> Result<(), Type> {
        if self.types.contains_key(&ty.name) {
            return Err(ty);
        }
        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty() && self.types.is_empty()
    }

    /// Folds `other` into this application. Existing endpoints, types,
    /// tags and annotations win over those in `other`.
    pub fn merge(&mut self, other: Application) {
        if self.source.is_none() {
            self.source = other.source;
        }
        self.attrs.merge(other.attrs);
        for (_, endpoint) in other.endpoints {
            if let Err(rejected) = self.add_endpoint(endpoint) {
                log::warn!(
                    "endpoint `{}` already declared in `{}`, keeping the first",
                    rejected.name,
                    self.name
                );
            }
        }
        for (_, ty) in other.types {
            if let Err(rejected) = self.add_type(ty) {
                log::warn!(
                    "type `{}` already declared in `{}`, keeping the first",
                    rejected.name,
                    self.name
                );
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Model {
    pub apps: IndexMap<String, Application>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses source text that did not come from a file.
    ///
    /// # Errors
    /// Returns a `SyslError` if the text is not well-formed.
    pub fn from_text(source: &str) -> Result<Model, SyslError> {
        api::parse_text(source)
    }

    /// Reads and parses a file, recording its path as provenance.
    ///
    /// # Errors
    /// Returns `SyslError::Io` if the file cannot be read, or a parse error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Model, SyslError> {
        api::parse_file(path)
    }

    /// Inserts an application, merging it into an existing one of the same name.
    pub fn insert(&mut self, app: Application) {
        let key = app.name.to_sysl();
        match self.apps.get_mut(&key) {
            Some(existing) => existing.merge(app),
            None => {
                self.apps.insert(key, app);
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &AppName) -> Option<&Application> {
        self.apps.get(&name.to_sysl())
    }

    /// Looks an application up by its `A :: B` text.
    #[must_use]
    pub fn app(&self, name: &str) -> Option<&Application> {
        let name: AppName = name.parse().ok()?;
        self.get(&name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Folds all applications of `other` into this model.
    pub fn merge(&mut self, other: Model) {
        for (_, app) in other.apps {
            self.insert(app);
        }
    }

    /// The part of the model declared in `path`.
    ///
    /// Endpoints and types are kept when they came from `path`; an
    /// application is kept when it was declared there or still holds
    /// entities from it. Application attributes travel with the application.
    #[must_use]
    pub fn filter_by_file(&self, path: &str) -> Model {
        let from_path = |source: &Option<String>| source.as_deref() == Some(path);
        let mut filtered = Model::new();
        for (key, app) in &self.apps {
            let endpoints: IndexMap<String, Endpoint> = app
                .endpoints
                .iter()
                .filter(|(_, e)| from_path(&e.source))
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect();
            let types: IndexMap<String, Type> = app
                .types
                .iter()
                .filter(|(_, t)| from_path(&t.source))
                .map(|(k, t)| (k.clone(), t.clone()))
                .collect();
            if from_path(&app.source) || !endpoints.is_empty() || !types.is_empty() {
                filtered.apps.insert(
                    key.clone(),
                    Application {
                        name: app.name.clone(),
                        attrs: app.attrs.clone(),
                        endpoints,
                        types,
                        source: app.source.clone(),
                    },
                );
            }
        }
        filtered
    }

    /// Serializes the structured model into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serializes the structured model into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Annotation, Tag};

    fn app(name: &str, source: &str) -> Application {
        let mut app = Application::new(name.parse().unwrap());
        app.source = Some(source.to_string());
        app
    }

    fn endpoint(name: &str, source: &str) -> Endpoint {
        let mut endpoint = Endpoint::new(name);
        endpoint.source = Some(source.to_string());
        endpoint
    }

    #[test]
    fn test_insert_merges_same_name() {
        let mut model = Model::new();
        let mut first = app("A :: B", "a.sysl");
        first.add_endpoint(endpoint("One", "a.sysl")).unwrap();
        let mut second = app("A::B", "b.sysl");
        second.add_endpoint(endpoint("Two", "b.sysl")).unwrap();
        second.add_endpoint(endpoint("One", "b.sysl")).unwrap();
        second.attrs.add_tag(Tag::new("abstract"));

        model.insert(first);
        model.insert(second);

        assert_eq!(model.len(), 1);
        let merged = model.app("A :: B").unwrap();
        assert_eq!(merged.endpoints.len(), 2);
        assert_eq!(merged.endpoints["One"].source.as_deref(), Some("a.sysl"));
        assert!(merged.attrs.has_tag("abstract"));
        assert_eq!(merged.source.as_deref(), Some("a.sysl"));
    }

    #[test]
    fn test_filter_by_file() {
        let mut model = Model::new();
        let mut shared = app("Shared", "a.sysl");
        shared.add_endpoint(endpoint("FromA", "a.sysl")).unwrap();
        shared.add_endpoint(endpoint("FromB", "b.sysl")).unwrap();
        model.insert(shared);
        model.insert(app("OnlyB", "b.sysl"));
        let mut only_a = app("OnlyA", "a.sysl");
        only_a
            .attrs
            .add_annotation(Annotation::string("owner", "team"))
            .unwrap();
        model.insert(only_a);

        let filtered = model.filter_by_file("b.sysl");
        let names: Vec<_> = filtered.apps.keys().cloned().collect();
        assert_eq!(names, ["Shared", "OnlyB"]);
        let shared = filtered.app("Shared").unwrap();
        assert_eq!(shared.endpoints.keys().collect::<Vec<_>>(), ["FromB"]);

        let filtered = model.filter_by_file("a.sysl");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.app("OnlyA").unwrap().attrs.annotation("owner").is_some());
        assert!(model.filter_by_file("c.sysl").is_empty());
    }

    #[test]
    fn test_add_type_rejects_duplicate() {
        let mut app = Application::new("App".parse().unwrap());
        app.add_type(Type::new_type("T", vec![])).unwrap();
        assert!(app.add_type(Type::new_table("T", vec![])).is_err());
        assert!(!app.is_empty());
    }

    #[test]
    fn test_to_json_uses_escaped_names() {
        let mut model = Model::new();
        model.insert(Application::new("Namespace :: App".parse().unwrap()));
        let json: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(json["apps"]["Namespace :: App"]["name"], "Namespace :: App");
        assert!(model.to_yaml().unwrap().contains("Namespace :: App"));
    }
}
