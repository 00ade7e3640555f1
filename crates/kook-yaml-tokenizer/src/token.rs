//! Token types produced by the [`Tokenizer`](crate::Tokenizer).

use crate::Span;

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Layout
    /// Spaces and tabs.
    Whitespace,
    /// `\n` or `\r\n`.
    Newline,
    /// `# ...` up to (not including) the line break.
    Comment,

    // Document markers
    /// `---` at column 0.
    DocumentStart,
    /// `...` at column 0.
    DocumentEnd,

    // Block indicators
    /// `?` followed by whitespace or a line break, outside flow collections.
    ExplicitKey,
    /// `-` followed by whitespace or a line break.
    SequenceEntry,
    /// `:` followed by whitespace or a line break (or a flow terminator inside flow).
    MappingValue,

    // Flow indicators
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,` inside a flow collection.
    Comma,

    // Node properties
    /// `&name`
    Anchor,
    /// `*name`
    Alias,
    /// `!tag`, `!!tag` or `!`
    Tag,

    // Scalars
    /// Unquoted scalar, trailing whitespace excluded.
    PlainScalar,
    /// `'...'`, may span lines.
    SingleQuotedScalar,
    /// `"..."`, may span lines.
    DoubleQuotedScalar,
    /// `|` or `>` with optional chomping/indentation indicators.
    BlockScalarHeader,
    /// The indented lines that follow a block scalar header.
    BlockScalarContent,

    // Special
    Eof,
    /// Unrecognized or unterminated input.
    Error,
}

impl TokenKind {
    /// Whitespace, line breaks and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment
        )
    }

    /// Tokens that can stand as a mapping key.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TokenKind::PlainScalar | TokenKind::SingleQuotedScalar | TokenKind::DoubleQuotedScalar
        )
    }

    /// Tokens after which nothing else may follow on the same line.
    pub fn ends_line(&self) -> bool {
        matches!(
            self,
            TokenKind::Newline | TokenKind::Comment | TokenKind::Eof
        )
    }
}

/// A token with its kind, span, and source text slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub span: Span,
    pub text: &'src str,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, span: Span, text: &'src str) -> Self {
        Self { kind, span, text }
    }
}
