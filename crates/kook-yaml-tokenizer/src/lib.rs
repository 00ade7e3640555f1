//! A tokenizer for kook configuration YAML.
//!
//! Unlike most YAML scanners this one keeps comments and line breaks as
//! tokens, so the layer above can attach them to document nodes.

mod span;
pub use span::Span;

mod token;
pub use token::{Token, TokenKind};

mod tokenizer;
pub use tokenizer::Tokenizer;
