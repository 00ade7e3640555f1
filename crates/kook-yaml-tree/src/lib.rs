//! Document tree for kook configuration YAML.
//!
//! This crate composes the tokens of [`kook_yaml_tokenizer`] into a tree of
//! [`Node`]s that keeps every comment and blank line, so a document can be
//! edited and written back without losing its annotations.
//!
//! The accepted language is the single-document YAML used by configuration
//! files: block and flow collections, explicit `?` keys in block mappings,
//! plain scalars continued on deeper-indented lines, quoted and block
//! scalars (with chomping and indentation indicators), anchors, aliases,
//! merge keys and tags. Directives, multiple documents and `?` keys inside
//! flow collections are rejected with a [`ParseError`].

mod diagnostic;
mod node;
mod parser;
mod scalar;

pub use diagnostic::{LineIndex, ParseError, ParseErrorKind};
pub use kook_yaml_tokenizer::Span;
pub use node::{
    AliasNode, CommentKind, CommentLine, MappingNode, Node, NodeKind, NodeTuple, ScalarNode,
    ScalarStyle, ScalarTag, SequenceNode,
};
pub use scalar::{
    decode_block, decode_double, decode_single, parse_bool, parse_float, parse_int,
    resolve_scalar,
};

/// Options for [`parse_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Record comments and blank lines. When off they are skipped.
    pub process_comments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            process_comments: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_comments(mut self, process_comments: bool) -> Self {
        self.process_comments = process_comments;
        self
    }
}

/// A parsed YAML document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// The root node, absent for empty documents.
    pub root: Option<Node>,
    /// Comments and blank lines after the root node.
    pub end_comments: Vec<CommentLine>,
}

/// Parse a YAML document, keeping comments.
pub fn parse(source: &str) -> Result<Document, ParseError> {
    parse_with(source, ParseOptions::default())
}

/// Parse a YAML document.
///
/// Input made only of whitespace and control characters (a file padded with
/// NUL bytes, for instance) is an empty document rather than an error.
pub fn parse_with(source: &str, options: ParseOptions) -> Result<Document, ParseError> {
    if source.chars().all(|c| c <= ' ') {
        return Ok(Document::default());
    }
    parser::Parser::new(source, options).parse_document()
}
