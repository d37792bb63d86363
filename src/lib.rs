pub mod api;
pub mod attribute;
pub mod compose;
pub mod endpoint;
pub mod error;
pub mod lexer;
pub mod model;
pub mod name;
pub mod parser;
pub mod serializer;
pub mod types;
pub mod utils;

pub use api::{parse, parse_file, parse_text};
pub use attribute::{Annotation, AnnotationValue, Attributes, Tag};
pub use compose::Composition;
pub use endpoint::{Endpoint, Method, Param, RestPath, Statement, StatementKind};
pub use error::{Position, SyslError};
pub use model::{Application, Model};
pub use name::AppName;
pub use serializer::ToSysl;
pub use types::{Constraint, Field, Primitive, Type, TypeRef};
