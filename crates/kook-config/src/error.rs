//! Error types for loading and saving configurations.

use kook_yaml_tree::{LineIndex, ParseError, Span};
use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Errors raised by configuration loading, saving and resource extraction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The text is not a valid configuration document.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Reading or writing the backing file or stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialized object could not be reconstructed.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    /// A resource was requested that is not bundled with the plugin.
    #[error("resource '{0}' is not bundled")]
    MissingResource(String),
}

/// Malformed configuration text.
///
/// Wraps the parser's diagnostic when there is one, so callers can render it
/// with [`ParseError::render`].
#[derive(Debug, Error)]
#[error("{message}{}", location(.line, .column))]
pub struct FormatError {
    pub message: String,
    /// 1-based line, when the position is known.
    pub line: Option<usize>,
    /// 1-based column, when the position is known.
    pub column: Option<usize>,
    #[source]
    pub source: Option<ParseError>,
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" (line {}, column {})", line, column),
        (Some(line), None) => format!(" (line {})", line),
        _ => String::new(),
    }
}

impl FormatError {
    /// An error without position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            source: None,
        }
    }

    /// An error pointing at `span` in the text indexed by `lines`.
    pub fn at(message: impl Into<String>, span: Option<Span>, lines: Option<&LineIndex>) -> Self {
        let mut error = Self::new(message);
        if let (Some(span), Some(lines)) = (span, lines) {
            let (line, column) = lines.line_col(span.start);
            error.line = Some(line);
            error.column = Some(column);
        }
        error
    }

    /// Wrap a parser error, keeping it as the source.
    pub fn from_parse(error: ParseError, source: &str) -> Self {
        let (line, column) = error.line_col(source);
        Self {
            message: error.to_string(),
            line: Some(line),
            column: Some(column),
            source: Some(error),
        }
    }
}

/// A serialized object whose type could not be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeserializationError {
    /// The mapping has no `==` entry naming its type.
    #[error("serialized object has no type key")]
    MissingTypeKey,

    /// No reconstructor is registered for the type.
    #[error("unknown serialized type '{0}'")]
    UnknownType(String),

    /// The reconstructor rejected the fields.
    #[error("cannot deserialize '{type_tag}': {message}")]
    Invalid { type_tag: String, message: String },
}

impl DeserializationError {
    /// Convenience constructor for reconstructors rejecting their input.
    pub fn invalid(type_tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            type_tag: type_tag.into(),
            message: message.into(),
        }
    }
}
