use crate::error::SyslError;
use crate::model::Model;
use crate::parser::Parser;
use std::path::Path;

/// Parses a Sysl source string into a `Model`.
///
/// This is the primary entry point for reading Sysl. Every application,
/// endpoint and type in the result records `file_name` as its source, which
/// is what `Model::filter_by_file` matches against.
///
/// # Arguments
///
/// * `source` - The Sysl source code as a string.
/// * `file_name` - The name of the file being parsed (used for provenance and error reporting).
///
/// # Errors
///
/// Returns a `SyslError` if the source is not well-formed Sysl.
pub fn parse(source: &str, file_name: &str) -> Result<Model, SyslError> {
    log::debug!("parsing `{file_name}` ({} bytes)", source.len());
    let mut parser = Parser::new_with_name(source, file_name.to_string());
    parser.parse_model()
}

/// Parses source text that has no file behind it. The resulting entities carry no provenance.
///
/// # Errors
///
/// Returns a `SyslError` if the source is not well-formed Sysl.
pub fn parse_text(source: &str) -> Result<Model, SyslError> {
    Parser::new(source).parse_model()
}

/// Reads and parses a file. The path, as given, becomes the provenance of its entities.
///
/// # Errors
///
/// Returns `SyslError::Io` if the file cannot be read, or a parse error.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Model, SyslError> {
    let path = path.as_ref();
    let name = path.to_string_lossy().into_owned();
    let source = std::fs::read_to_string(path).map_err(|source| SyslError::Io {
        path: name.clone(),
        source,
    })?;
    parse(&source, &name)
}
