//! Hierarchical application names and identifier escaping.
//!
//! Names are kept in their escaped surface form throughout the model, so an
//! identifier like `%28App%29` is emitted exactly as it was read. Decoding to
//! the raw characters only happens on request, for display outside the model.

use crate::error::{InvalidNameError, Located};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between the segments of an application name.
pub const SEGMENT_SEPARATOR: &str = "::";

const NAME_SOURCE: &str = "<name>";

/// Characters allowed verbatim in an identifier.
pub fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Returns true when `name` is already a valid escaped identifier.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && find_bad_escape(name).is_none()
}

/// Percent-escapes every character outside the safe identifier set.
pub fn escape_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut buf = [0u8; 4];
    for c in raw.chars() {
        if is_safe_char(c) {
            out.push(c);
        } else {
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

/// Decodes an escaped identifier back to its raw characters.
///
/// # Errors
/// Returns `InvalidNameError::IllegalEscape` if a `%` is not followed by two
/// hex digits, a character outside the safe set appears unescaped, or the
/// decoded bytes are not UTF-8.
pub fn unescape_name(escaped: &str) -> Result<String, InvalidNameError> {
    if let Some(at) = find_bad_escape(escaped) {
        return Err(illegal_escape(escaped, at));
    }
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            // Validated above: two hex digits follow.
            let hex = &escaped[i + 1..i + 3];
            let byte = u8::from_str_radix(hex, 16).map_err(|_| illegal_escape(escaped, i))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| illegal_escape(escaped, 0))
}

/// Byte offset of the first character that makes `name` an invalid escaped identifier.
fn find_bad_escape(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let valid = bytes.len() >= i + 3
                    && bytes[i + 1].is_ascii_hexdigit()
                    && bytes[i + 2].is_ascii_hexdigit();
                if !valid {
                    return Some(i);
                }
                i += 3;
            }
            b if is_safe_char(b as char) => i += 1,
            _ => return Some(i),
        }
    }
    None
}

fn illegal_escape(name: &str, at: usize) -> InvalidNameError {
    let located = Located::new(NAME_SOURCE, name, at, 1);
    InvalidNameError::IllegalEscape {
        src: located.src,
        span: located.span,
        name: name.to_string(),
        position: located.position,
    }
}

/// A hierarchical application name such as `Namespace :: App`.
///
/// Segments are stored escaped. Two names are equal iff their escaped
/// segment sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppName {
    segments: Vec<String>,
}

impl AppName {
    /// Builds a name from already-escaped segments.
    ///
    /// # Errors
    /// Fails on an empty list, an empty segment, or a segment that is not a
    /// valid escaped identifier.
    pub fn new<I, S>(segments: I) -> Result<Self, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let text = segments.join(" :: ");
        if segments.is_empty() {
            return Err(empty_segment(&text, 0));
        }
        let mut offset = 0;
        for segment in &segments {
            if segment.is_empty() {
                return Err(empty_segment(&text, offset));
            }
            if let Some(at) = find_bad_escape(segment) {
                let located = Located::new(NAME_SOURCE, &text, offset + at, 1);
                return Err(InvalidNameError::IllegalEscape {
                    src: located.src,
                    span: located.span,
                    name: text.clone(),
                    position: located.position,
                });
            }
            offset += segment.len() + 4;
        }
        Ok(Self { segments })
    }

    /// Builds a name from raw segments, escaping each one.
    ///
    /// # Errors
    /// Fails if any segment is empty.
    pub fn from_raw<I, S>(segments: I) -> Result<Self, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(segments.into_iter().map(|s| escape_name(s.as_ref())))
    }

    /// Internal constructor for segments the lexer already validated.
    pub(crate) fn from_validated(segments: Vec<String>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last segment, i.e. the application's own name without its namespace.
    #[must_use]
    pub fn last(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Segments decoded to their raw characters, for display outside the model.
    ///
    /// # Errors
    /// Only fails if a segment was built with an invalid escape, which the
    /// constructors rule out.
    pub fn unescaped_segments(&self) -> Result<Vec<String>, InvalidNameError> {
        self.segments.iter().map(|s| unescape_name(s)).collect()
    }

    /// The canonical `A :: B` text of this name.
    #[must_use]
    pub fn to_sysl(&self) -> String {
        self.segments.join(&format!(" {SEGMENT_SEPARATOR} "))
    }
}

fn empty_segment(text: &str, at: usize) -> InvalidNameError {
    let located = Located::new(NAME_SOURCE, text, at, 0);
    InvalidNameError::EmptySegment {
        src: located.src,
        span: located.span,
        name: text.to_string(),
        position: located.position,
    }
}

impl FromStr for AppName {
    type Err = InvalidNameError;

    /// Splits on `::`, trimming the whitespace around each segment.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut offset = 0;
        for piece in text.split(SEGMENT_SEPARATOR) {
            let segment = piece.trim();
            let lead = piece.len() - piece.trim_start().len();
            if segment.is_empty() {
                return Err(empty_segment(text, offset + lead));
            }
            if let Some(at) = find_bad_escape(segment) {
                let located = Located::new(NAME_SOURCE, text, offset + lead + at, 1);
                return Err(InvalidNameError::IllegalEscape {
                    src: located.src,
                    span: located.span,
                    name: text.to_string(),
                    position: located.position,
                });
            }
            segments.push(segment.to_string());
            offset += piece.len() + SEGMENT_SEPARATOR.len();
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sysl())
    }
}

impl Serialize for AppName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_sysl())
    }
}
