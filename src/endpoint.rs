//! Endpoints, their parameters and statements, and the REST specialization.

use crate::attribute::Attributes;
use crate::name::AppName;
use crate::types::TypeRef;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "HEAD")]
    Head,
    #[serde(rename = "OPTIONS")]
    Options,
}

impl Method {
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "PATCH" => Some(Method::Patch),
            "DELETE" => Some(Method::Delete),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    Literal(String),
    /// `{name <: type}`
    Variable { name: String, type_ref: TypeRef },
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Literal(text) => f.write_str(text),
            PathSegment::Variable { name, type_ref } => write!(f, "{{{name} <: {type_ref}}}"),
        }
    }
}

/// A URL path. The root path `/` has no segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RestPath(pub Vec<PathSegment>);

impl RestPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// `self` followed by `suffix`, as when a sub-path block nests in a path block.
    #[must_use]
    pub fn join(&self, suffix: &RestPath) -> RestPath {
        let mut segments = self.0.clone();
        segments.extend(suffix.0.iter().cloned());
        RestPath(segments)
    }
}

impl fmt::Display for RestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// `name=type` after the method; `type_ref.optional` marks an optional parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryParam {
    pub name: String,
    pub type_ref: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestInfo {
    pub method: Method,
    pub path: RestPath,
    pub query: Vec<QueryParam>,
}

impl RestInfo {
    /// The endpoint key: method and full path, e.g. `GET /users/{id <: int}`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// An endpoint parameter. At least one of `name` and `type_ref` is set:
/// `(foo)` has only a name, `(Types.T)` only a type, `(p <: int)` both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: Option<String>,
    pub type_ref: Option<TypeRef>,
    pub attrs: Attributes,
}

impl Param {
    pub fn named(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: Some(name.into()),
            type_ref: Some(type_ref),
            attrs: Attributes::new(),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            type_ref: None,
            attrs: Attributes::new(),
        }
    }

    pub fn unnamed(type_ref: TypeRef) -> Self {
        Self {
            name: None,
            type_ref: Some(type_ref),
            attrs: Attributes::new(),
        }
    }

    /// Marked `[~body]`.
    #[must_use]
    pub fn is_body(&self) -> bool {
        self.attrs.has_tag("body")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub text: String,
}

/// `App <- Endpoint`. A `None` target is the enclosing application (`.`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    pub target: Option<AppName>,
    pub endpoint: String,
}

/// `return payload <: type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Return {
    pub payload: String,
    pub type_ref: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    Action(Action),
    Call(Call),
    Return(Return),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub attrs: Attributes,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            attrs: Attributes::new(),
        }
    }

    /// A free-text step.
    ///
    /// The text is written out verbatim, so it must not contain `<-` or start
    /// with the word `return`: such a line reads back as a call or a return.
    pub fn action(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Action(Action { text: text.into() }))
    }

    pub fn call(target: Option<AppName>, endpoint: impl Into<String>) -> Self {
        Self::new(StatementKind::Call(Call {
            target,
            endpoint: endpoint.into(),
        }))
    }

    pub fn ret(payload: impl Into<String>, type_ref: Option<TypeRef>) -> Self {
        Self::new(StatementKind::Return(Return {
            payload: payload.into(),
            type_ref,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// The plain name, or the REST key (`GET /path`).
    pub name: String,
    pub params: Vec<Param>,
    pub statements: Vec<Statement>,
    pub attrs: Attributes,
    pub rest: Option<RestInfo>,
    /// File the declaration was read from.
    pub source: Option<String>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            statements: Vec::new(),
            attrs: Attributes::new(),
            rest: None,
            source: None,
        }
    }

    pub fn rest(method: Method, path: RestPath) -> Self {
        let rest = RestInfo {
            method,
            path,
            query: Vec::new(),
        };
        let mut endpoint = Self::new(rest.key());
        endpoint.rest = Some(rest);
        endpoint
    }

    #[must_use]
    pub fn is_rest(&self) -> bool {
        self.rest.is_some()
    }

    /// The type of the first `return` statement that declares one.
    #[must_use]
    pub fn return_type(&self) -> Option<&TypeRef> {
        self.statements.iter().find_map(|s| match &s.kind {
            StatementKind::Return(r) => r.type_ref.as_ref(),
            StatementKind::Action(_) | StatementKind::Call(_) => None,
        })
    }
}
