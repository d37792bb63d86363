//! Primitive types, constraints, type references and user type declarations.

use crate::attribute::Attributes;
use crate::error::{ConstraintError, Located};
use crate::name::AppName;
use serde::Serialize;
use std::fmt;

const CONSTRAINT_SOURCE: &str = "<constraint>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Any,
    Bool,
    Int,
    Int32,
    Int64,
    Float,
    Float32,
    Float64,
    Decimal,
    String,
    String8,
    Date,
    DateTime,
    Bytes,
    Uuid,
    Xml,
}

impl Primitive {
    pub const ALL: [Primitive; 16] = [
        Primitive::Any,
        Primitive::Bool,
        Primitive::Int,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::Float,
        Primitive::Float32,
        Primitive::Float64,
        Primitive::Decimal,
        Primitive::String,
        Primitive::String8,
        Primitive::Date,
        Primitive::DateTime,
        Primitive::Bytes,
        Primitive::Uuid,
        Primitive::Xml,
    ];

    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == word)
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Any => "any",
            Primitive::Bool => "bool",
            Primitive::Int => "int",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Float => "float",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::Decimal => "decimal",
            Primitive::String => "string",
            Primitive::String8 => "string8",
            Primitive::Date => "date",
            Primitive::DateTime => "datetime",
            Primitive::Bytes => "bytes",
            Primitive::Uuid => "uuid",
            Primitive::Xml => "xml",
        }
    }

    /// Whether `constraint` is meaningful for this primitive.
    #[must_use]
    pub fn accepts(self, constraint: &Constraint) -> bool {
        match self {
            Primitive::String | Primitive::String8 | Primitive::Bytes => match constraint {
                Constraint::Bound(n) => *n >= 0,
                Constraint::Range { min, .. } => *min >= 0,
                Constraint::Decimal { .. } => false,
            },
            Primitive::Int
            | Primitive::Int32
            | Primitive::Int64
            | Primitive::Float
            | Primitive::Float32
            | Primitive::Float64 => !matches!(constraint, Constraint::Decimal { .. }),
            Primitive::Decimal => match constraint {
                Constraint::Bound(n) => *n > 0,
                Constraint::Decimal { .. } => true,
                Constraint::Range { .. } => false,
            },
            Primitive::Any
            | Primitive::Bool
            | Primitive::Date
            | Primitive::DateTime
            | Primitive::Uuid
            | Primitive::Xml => false,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A numeric constraint written in parentheses after a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// `(n)`
    Bound(i64),
    /// `(min..)` when `max` is `None`, otherwise `(min..max)`.
    Range { min: i64, max: Option<i64> },
    /// `(precision.scale)`
    Decimal { precision: u32, scale: u32 },
}

impl Constraint {
    pub fn bound(n: i64) -> Self {
        Constraint::Bound(n)
    }

    pub fn open(min: i64) -> Self {
        Constraint::Range { min, max: None }
    }

    /// A closed range.
    ///
    /// # Errors
    /// Returns `ConstraintError::Inverted` when `max < min`.
    pub fn range(min: i64, max: i64) -> Result<Self, ConstraintError> {
        if max < min {
            let text = format!("{min}..{max}");
            let located = Located::new(CONSTRAINT_SOURCE, &text, 0, text.len());
            return Err(ConstraintError::Inverted {
                src: located.src,
                span: located.span,
                min,
                max,
                position: located.position,
            });
        }
        Ok(Constraint::Range {
            min,
            max: Some(max),
        })
    }

    pub fn decimal(precision: u32, scale: u32) -> Self {
        Constraint::Decimal { precision, scale }
    }

    #[must_use]
    pub fn min(&self) -> Option<i64> {
        match self {
            Constraint::Range { min, .. } => Some(*min),
            Constraint::Bound(_) | Constraint::Decimal { .. } => None,
        }
    }

    #[must_use]
    pub fn max(&self) -> Option<i64> {
        match self {
            Constraint::Bound(n) => Some(*n),
            Constraint::Range { max, .. } => *max,
            Constraint::Decimal { .. } => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Bound(n) => write!(f, "({n})"),
            Constraint::Range { min, max: None } => write!(f, "({min}..)"),
            Constraint::Range {
                min,
                max: Some(max),
            } => write!(f, "({min}..{max})"),
            Constraint::Decimal { precision, scale } => write!(f, "({precision}.{scale})"),
        }
    }
}

/// A lexical pointer to a user type. `app` is `None` for a short reference,
/// which is relative to the enclosing application and never resolved here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    pub app: Option<AppName>,
    pub name: String,
}

impl Reference {
    pub fn short(name: impl Into<String>) -> Self {
        Self {
            app: None,
            name: name.into(),
        }
    }

    pub fn qualified(app: AppName, name: impl Into<String>) -> Self {
        Self {
            app: Some(app),
            name: name.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.app {
            Some(app) => write!(f, "{app}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeBase {
    Primitive(Primitive),
    Reference(Reference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Set,
    Sequence,
}

impl Collection {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Collection::Set => "set",
            Collection::Sequence => "sequence",
        }
    }
}

/// A use of a type: base, constraint and the orthogonal modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRef {
    pub base: TypeBase,
    pub constraint: Option<Constraint>,
    pub optional: bool,
    pub collection: Option<Collection>,
}

impl TypeRef {
    pub fn primitive(primitive: Primitive) -> Self {
        Self::from_base(TypeBase::Primitive(primitive))
    }

    pub fn reference(reference: Reference) -> Self {
        Self::from_base(TypeBase::Reference(reference))
    }

    fn from_base(base: TypeBase) -> Self {
        Self {
            base,
            constraint: None,
            optional: false,
            collection: None,
        }
    }

    /// Attaches a constraint.
    ///
    /// # Errors
    /// Returns `ConstraintError::Malformed` when the base is a reference or a
    /// primitive that does not take this kind of constraint.
    pub fn try_with_constraint(mut self, constraint: Constraint) -> Result<Self, ConstraintError> {
        let rejected = match &self.base {
            TypeBase::Primitive(p) if p.accepts(&constraint) => None,
            TypeBase::Primitive(p) => Some((
                p.to_string(),
                format!("{constraint} is not a valid constraint for {p}"),
            )),
            TypeBase::Reference(r) => Some((
                r.to_string(),
                format!("reference {r} cannot carry a constraint"),
            )),
        };
        if let Some((base, message)) = rejected {
            let text = format!("{base}{constraint}");
            let located = Located::new(CONSTRAINT_SOURCE, &text, 0, text.len());
            return Err(ConstraintError::Malformed {
                src: located.src,
                span: located.span,
                message,
                position: located.position,
            });
        }
        self.constraint = Some(constraint);
        Ok(self)
    }

    /// Attaches a constraint. Panics if the base cannot carry it, since a
    /// model holding such a pair cannot be serialized back faithfully.
    #[must_use]
    pub fn with_constraint(self, constraint: Constraint) -> Self {
        match self.try_with_constraint(constraint) {
            Ok(type_ref) => type_ref,
            Err(err) => panic!("{err}"),
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn set_of(mut self) -> Self {
        self.collection = Some(Collection::Set);
        self
    }

    #[must_use]
    pub fn sequence_of(mut self) -> Self {
        self.collection = Some(Collection::Sequence);
        self
    }

    #[must_use]
    pub fn as_primitive(&self) -> Option<Primitive> {
        match &self.base {
            TypeBase::Primitive(p) => Some(*p),
            TypeBase::Reference(_) => None,
        }
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<&Reference> {
        match &self.base {
            TypeBase::Reference(r) => Some(r),
            TypeBase::Primitive(_) => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(collection) = self.collection {
            write!(f, "{} of ", collection.keyword())?;
        }
        match &self.base {
            TypeBase::Primitive(p) => write!(f, "{p}")?,
            TypeBase::Reference(r) => write!(f, "{r}")?,
        }
        if let Some(constraint) = &self.constraint {
            write!(f, "{constraint}")?;
        }
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub type_ref: TypeRef,
    pub attrs: Attributes,
}

impl Field {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            attrs: Attributes::new(),
        }
    }

    /// Table columns marked `[~pk]`.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.attrs.has_tag("pk")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub label: String,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discriminator {
    Type,
    Table,
    Enum,
}

impl Discriminator {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Discriminator::Type => "!type",
            Discriminator::Table => "!table",
            Discriminator::Enum => "!enum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "members", rename_all = "snake_case")]
pub enum TypeBody {
    Type(Vec<Field>),
    Table(Vec<Field>),
    Enum(Vec<EnumValue>),
}

/// A user type declaration: `!type`, `!table` or `!enum`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Type {
    pub name: String,
    pub attrs: Attributes,
    pub body: TypeBody,
    /// File the declaration was read from.
    pub source: Option<String>,
}

impl Type {
    pub fn new_type(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::with_body(name, TypeBody::Type(fields))
    }

    pub fn new_table(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::with_body(name, TypeBody::Table(fields))
    }

    pub fn new_enum(name: impl Into<String>, values: Vec<EnumValue>) -> Self {
        Self::with_body(name, TypeBody::Enum(values))
    }

    fn with_body(name: impl Into<String>, body: TypeBody) -> Self {
        Self {
            name: name.into(),
            attrs: Attributes::new(),
            body,
            source: None,
        }
    }

    #[must_use]
    pub fn discriminator(&self) -> Discriminator {
        match self.body {
            TypeBody::Type(_) => Discriminator::Type,
            TypeBody::Table(_) => Discriminator::Table,
            TypeBody::Enum(_) => Discriminator::Enum,
        }
    }

    /// Fields of a `!type` or `!table`; empty for enums.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        match &self.body {
            TypeBody::Type(fields) | TypeBody::Table(fields) => fields,
            TypeBody::Enum(_) => &[],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.body {
            TypeBody::Type(fields) | TypeBody::Table(fields) => fields.is_empty(),
            TypeBody::Enum(values) => values.is_empty(),
        }
    }
}
