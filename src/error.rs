use crate::utils::get_line_and_column;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fmt;
use thiserror::Error;

/// A 1-based line and column in a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The source text an error points into, along with its name for reporting.
#[derive(Debug, Clone)]
pub(crate) struct Located {
    pub src: NamedSource<String>,
    pub span: SourceSpan,
    pub position: Position,
}

impl Located {
    pub(crate) fn new(name: &str, text: &str, start: usize, len: usize) -> Self {
        let start = start.min(text.len());
        let len = len.min(text.len() - start);
        let (line, column) = get_line_and_column(text, start);
        Self {
            src: NamedSource::new(name, text.to_string()),
            span: (start, len).into(),
            position: Position { line, column },
        }
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum SyslError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidName(#[from] InvalidNameError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    DuplicateAnnotation(#[from] DuplicateAnnotationError),

    #[error("failed to read `{path}`")]
    #[diagnostic(code(sysl::io), help("Check that the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SyslError {
    /// The position the error points at, if it came from source text.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self {
            SyslError::Syntax(e) => Some(e.position()),
            SyslError::InvalidName(e) => Some(e.position()),
            SyslError::Constraint(e) => Some(e.position()),
            SyslError::DuplicateAnnotation(e) => Some(e.position),
            SyslError::Io { .. } => None,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SyntaxError {
    #[error("unexpected token at {position}: expected {expected}")]
    #[diagnostic(
        code(sysl::syntax::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
        position: Position,
    },

    #[error("unexpected end of input at {position}")]
    #[diagnostic(
        code(sysl::syntax::unexpected_eof),
        help("The input ended while a construct was still open.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("Input ended here")]
        span: SourceSpan,
        position: Position,
    },

    #[error("malformed indentation at {position}")]
    #[diagnostic(
        code(sysl::syntax::indentation),
        help("Indent with spaces, and dedent back to a column used by an enclosing block.")
    )]
    MalformedIndentation {
        #[source_code]
        src: NamedSource<String>,
        #[label("This line is not aligned with any open block")]
        span: SourceSpan,
        position: Position,
    },

    #[error("unterminated {what} at {position}")]
    #[diagnostic(code(sysl::syntax::unterminated))]
    UnterminatedText {
        #[source_code]
        src: NamedSource<String>,
        #[label("This {what} is never closed")]
        span: SourceSpan,
        what: String,
        position: Position,
    },

    #[error("unknown primitive type `{keyword}` at {position}")]
    #[diagnostic(
        code(sysl::syntax::unknown_primitive),
        help("Only primitive types such as string, int and decimal accept a constraint.")
    )]
    UnknownPrimitive {
        #[source_code]
        src: NamedSource<String>,
        #[label("Not a primitive type")]
        span: SourceSpan,
        keyword: String,
        position: Position,
    },

    #[error("{what} `{name}` declared twice at {position}")]
    #[diagnostic(
        code(sysl::syntax::duplicate_declaration),
        help("Each endpoint, method and path pair, or type may be declared once per application.")
    )]
    DuplicateDeclaration {
        #[source_code]
        src: NamedSource<String>,
        #[label("Second declaration")]
        span: SourceSpan,
        what: String,
        name: String,
        position: Position,
    },
}

impl SyntaxError {
    #[must_use]
    pub fn position(&self) -> Position {
        match self {
            SyntaxError::UnexpectedToken { position, .. }
            | SyntaxError::UnexpectedEof { position, .. }
            | SyntaxError::MalformedIndentation { position, .. }
            | SyntaxError::UnterminatedText { position, .. }
            | SyntaxError::UnknownPrimitive { position, .. }
            | SyntaxError::DuplicateDeclaration { position, .. } => *position,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum InvalidNameError {
    #[error("empty segment in name `{name}` at {position}")]
    #[diagnostic(code(sysl::name::empty_segment))]
    EmptySegment {
        #[source_code]
        src: NamedSource<String>,
        #[label("Segment is empty")]
        span: SourceSpan,
        name: String,
        position: Position,
    },

    #[error("illegal escape in name `{name}` at {position}")]
    #[diagnostic(
        code(sysl::name::illegal_escape),
        help("Escapes are written as `%` followed by two hexadecimal digits, e.g. `%28`.")
    )]
    IllegalEscape {
        #[source_code]
        src: NamedSource<String>,
        #[label("Bad escape")]
        span: SourceSpan,
        name: String,
        position: Position,
    },
}

impl InvalidNameError {
    #[must_use]
    pub fn position(&self) -> Position {
        match self {
            InvalidNameError::EmptySegment { position, .. }
            | InvalidNameError::IllegalEscape { position, .. } => *position,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ConstraintError {
    #[error("malformed constraint at {position}: {message}")]
    #[diagnostic(
        code(sysl::constraint::malformed),
        help("Use `(n)`, `(n..)` or `(n..m)`; decimals take `(precision.scale)`.")
    )]
    Malformed {
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
        position: Position,
    },

    #[error("constraint upper bound {max} is below lower bound {min}")]
    #[diagnostic(code(sysl::constraint::inverted))]
    Inverted {
        #[source_code]
        src: NamedSource<String>,
        #[label("max < min")]
        span: SourceSpan,
        min: i64,
        max: i64,
        position: Position,
    },
}

impl ConstraintError {
    #[must_use]
    pub fn position(&self) -> Position {
        match self {
            ConstraintError::Malformed { position, .. }
            | ConstraintError::Inverted { position, .. } => *position,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
#[error("annotation `@{name}` declared twice at {position}")]
#[diagnostic(
    code(sysl::annotation::duplicate),
    help("An annotation name may appear once per entity, whether written inline or as a block.")
)]
pub struct DuplicateAnnotationError {
    #[source_code]
    pub src: NamedSource<String>,
    #[label("Duplicate annotation")]
    pub span: SourceSpan,
    pub name: String,
    pub position: Position,
}
