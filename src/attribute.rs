//! Annotations (`@name = value`) and tags (`~name`).

use serde::Serialize;

/// A short inline marker such as `~abstract` or `~pk`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    String(String),
    /// One entry per `|` line. Leading spaces inside a line are kept.
    MultiLine(Vec<String>),
    Array(Vec<String>),
    NestedArray(Vec<Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub value: AnnotationValue,
}

impl Annotation {
    pub fn new(name: impl Into<String>, value: AnnotationValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Shorthand for a scalar string annotation.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, AnnotationValue::String(value.into()))
    }
}

/// Tags and annotations attached to one entity, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub tags: Vec<Tag>,
    pub annotations: Vec<Annotation>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.annotations.is_empty()
    }

    /// Adds a tag. Tags have set semantics, so a repeated tag is ignored.
    pub fn add_tag(&mut self, tag: Tag) {
        if !self.has_tag(&tag.name) {
            self.tags.push(tag);
        }
    }

    /// Adds an annotation, handing it back if the name is already taken.
    ///
    /// # Errors
    /// Returns the rejected annotation when one with the same name exists.
    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<(), Annotation> {
        if self.annotation(&annotation.name).is_some() {
            return Err(annotation);
        }
        self.annotations.push(annotation);
        Ok(())
    }

    #[must_use]
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    #[must_use]
    pub fn annotation(&self, name: &str) -> Option<&AnnotationValue> {
        self.annotations
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// Folds `other` in; existing tags and annotation names win.
    pub fn merge(&mut self, other: Attributes) {
        for tag in other.tags {
            self.add_tag(tag);
        }
        for annotation in other.annotations {
            if let Err(rejected) = self.add_annotation(annotation) {
                log::warn!("annotation `@{}` already set, keeping the first", rejected.name);
            }
        }
    }
}
