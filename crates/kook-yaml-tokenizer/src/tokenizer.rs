//! Tokenizer for kook configuration YAML.

use crate::{Span, Token, TokenKind};
use tracing::trace;

/// A tokenizer that produces tokens from YAML source text.
///
/// The tokenizer is context sensitive in two ways: it tracks flow nesting
/// (`[`/`{`), which changes how plain scalars end, and it remembers a pending
/// block scalar so the indented lines after `|` or `>` come out as a single
/// [`TokenKind::BlockScalarContent`] token.
#[derive(Clone)]
pub struct Tokenizer<'src> {
    /// The source text being tokenized.
    source: &'src str,
    /// The remaining source text (suffix of `source`).
    remaining: &'src str,
    /// Current byte position in `source`.
    pos: u32,
    /// Nesting depth of flow collections.
    flow_depth: u32,
    /// Indentation of the current line, valid once its leading whitespace is consumed.
    line_indent: u32,
    /// Nothing but whitespace has been seen on the current line.
    at_line_start: bool,
    /// Set after a block scalar header, consumed at the start of the next line.
    block_scalar: Option<BlockScalarState>,
}

#[derive(Debug, Clone, Copy)]
struct BlockScalarState {
    /// Indentation of the line holding the header; content must be deeper.
    parent_indent: u32,
    /// `+` chomping: trailing blank lines belong to the scalar.
    keep_trailing: bool,
    /// Explicit indentation indicator, relative to `parent_indent`.
    indent_indicator: Option<u32>,
}

impl<'src> Tokenizer<'src> {
    /// Create a new tokenizer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            remaining: source,
            pos: 0,
            flow_depth: 0,
            line_indent: 0,
            at_line_start: true,
            block_scalar: None,
        }
    }

    /// Get the current byte position.
    #[inline]
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Check if we're at the end of input.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Current flow nesting depth.
    #[inline]
    pub fn flow_depth(&self) -> u32 {
        self.flow_depth
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.remaining.chars().next()
    }

    #[inline]
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.remaining.chars().nth(n)
    }

    #[inline]
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8() as u32;
        self.remaining = &self.remaining[c.len_utf8()..];
        Some(c)
    }

    #[inline]
    fn advance_by(&mut self, n: usize) {
        self.pos += n as u32;
        self.remaining = &self.remaining[n..];
    }

    #[inline]
    fn starts_with(&self, prefix: &str) -> bool {
        self.remaining.starts_with(prefix)
    }

    /// Whether the nth character is whitespace, a line break, or end of input.
    fn is_blank_at(&self, n: usize) -> bool {
        matches!(self.peek_nth(n), None | Some(' ' | '\t' | '\n' | '\r'))
    }

    /// Whether the nth character ends a plain scalar inside a flow collection.
    fn is_flow_indicator_at(&self, n: usize) -> bool {
        self.flow_depth > 0 && matches!(self.peek_nth(n), Some(',' | '[' | ']' | '{' | '}'))
    }

    /// Create a token from the given start position to current position.
    fn token(&self, kind: TokenKind, start: u32) -> Token<'src> {
        let span = Span::new(start, self.pos);
        let text = span.slice(self.source);
        trace!("Token {:?} at {:?}: {:?}", kind, span, text);
        Token::new(kind, span, text)
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token<'src> {
        if let Some(state) = self.block_scalar
            && (self.at_line_start || self.is_eof())
        {
            self.block_scalar = None;
            return self.tokenize_block_scalar_content(state);
        }

        let Some(c) = self.peek() else {
            return self.token(TokenKind::Eof, self.pos);
        };
        let start = self.pos;
        let at_column_zero = self.at_line_start && self.line_indent == 0;

        let token = match c {
            '\n' => {
                self.advance();
                self.token(TokenKind::Newline, start)
            }
            '\r' => {
                self.advance();
                if self.peek() == Some('\n') {
                    self.advance();
                }
                self.token(TokenKind::Newline, start)
            }

            // Leading whitespace keeps us at the start of the line.
            ' ' | '\t' => return self.tokenize_whitespace(),

            '#' => self.tokenize_comment(),

            '-' if at_column_zero && self.starts_with("---") && self.is_blank_at(3) => {
                self.advance_by(3);
                self.token(TokenKind::DocumentStart, start)
            }
            '.' if at_column_zero && self.starts_with("...") && self.is_blank_at(3) => {
                self.advance_by(3);
                self.token(TokenKind::DocumentEnd, start)
            }
            '-' if self.is_blank_at(1) => {
                self.advance();
                self.token(TokenKind::SequenceEntry, start)
            }
            ':' if self.is_blank_at(1) || self.is_flow_indicator_at(1) => {
                self.advance();
                self.token(TokenKind::MappingValue, start)
            }

            '[' => {
                self.advance();
                self.flow_depth += 1;
                self.token(TokenKind::LBracket, start)
            }
            '{' => {
                self.advance();
                self.flow_depth += 1;
                self.token(TokenKind::LBrace, start)
            }
            ']' => {
                self.advance();
                self.flow_depth = self.flow_depth.saturating_sub(1);
                self.token(TokenKind::RBracket, start)
            }
            '}' => {
                self.advance();
                self.flow_depth = self.flow_depth.saturating_sub(1);
                self.token(TokenKind::RBrace, start)
            }
            ',' if self.flow_depth > 0 => {
                self.advance();
                self.token(TokenKind::Comma, start)
            }

            '&' => self.tokenize_property(TokenKind::Anchor),
            '*' => self.tokenize_property(TokenKind::Alias),
            '!' => self.tokenize_property(TokenKind::Tag),

            '\'' => self.tokenize_single_quoted(),
            '"' => self.tokenize_double_quoted(),

            '|' | '>' if self.flow_depth == 0 => self.tokenize_block_scalar_header(),

            '?' if self.is_blank_at(1) && self.flow_depth == 0 => {
                self.advance();
                self.token(TokenKind::ExplicitKey, start)
            }

            // Flow explicit keys, directives and reserved indicators are not
            // supported.
            '?' if self.is_blank_at(1) => {
                self.advance();
                self.token(TokenKind::Error, start)
            }
            '%' | '@' | '`' | ',' | '|' | '>' => {
                self.advance();
                self.token(TokenKind::Error, start)
            }

            _ => self.tokenize_plain_scalar(),
        };

        self.at_line_start = token.kind == TokenKind::Newline;
        if self.at_line_start {
            self.line_indent = 0;
        }
        token
    }

    /// Tokenize horizontal whitespace (spaces and tabs).
    fn tokenize_whitespace(&mut self) -> Token<'src> {
        let start = self.pos;
        while let Some(' ' | '\t') = self.peek() {
            self.advance();
        }
        if self.at_line_start {
            self.line_indent = self.pos - start;
        }
        self.token(TokenKind::Whitespace, start)
    }

    /// Tokenize a comment: `# ...` up to the line break.
    fn tokenize_comment(&mut self) -> Token<'src> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            self.advance();
        }
        self.token(TokenKind::Comment, start)
    }

    /// Tokenize `&anchor`, `*alias` or `!tag`.
    fn tokenize_property(&mut self, kind: TokenKind) -> Token<'src> {
        let start = self.pos;
        self.advance();
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\n' | '\r') || self.is_flow_indicator_at(0) {
                break;
            }
            self.advance();
        }
        // Anchors and aliases need a name; a lone `!` is the non-specific tag.
        if kind != TokenKind::Tag && self.pos - start == 1 {
            return self.token(TokenKind::Error, start);
        }
        self.token(kind, start)
    }

    /// Tokenize a single-quoted scalar. `''` is an escaped quote.
    fn tokenize_single_quoted(&mut self) -> Token<'src> {
        let start = self.pos;
        self.advance();
        loop {
            match self.peek() {
                None => return self.token(TokenKind::Error, start),
                Some('\'') if self.peek_nth(1) == Some('\'') => {
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        self.token(TokenKind::SingleQuotedScalar, start)
    }

    /// Tokenize a double-quoted scalar; escapes are decoded later.
    fn tokenize_double_quoted(&mut self) -> Token<'src> {
        let start = self.pos;
        self.advance();
        loop {
            match self.peek() {
                None => return self.token(TokenKind::Error, start),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if self.peek().is_some() {
                        self.advance();
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        self.token(TokenKind::DoubleQuotedScalar, start)
    }

    /// Tokenize a plain scalar.
    ///
    /// Interior whitespace is part of the scalar, trailing whitespace is not.
    /// The scalar ends at `: `, ` #`, a line break, or a flow indicator when
    /// inside a flow collection.
    fn tokenize_plain_scalar(&mut self) -> Token<'src> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            match c {
                '\n' | '\r' => break,
                ':' if self.is_blank_at(1) || self.is_flow_indicator_at(1) => break,
                ',' | '[' | ']' | '{' | '}' if self.flow_depth > 0 => break,
                ' ' | '\t' => {
                    let ws = self
                        .remaining
                        .bytes()
                        .take_while(|b| *b == b' ' || *b == b'\t')
                        .count();
                    if !self.scalar_continues_after(ws) {
                        break;
                    }
                    self.advance_by(ws);
                }
                _ => {
                    self.advance();
                }
            }
        }

        if self.pos == start {
            self.advance();
            return self.token(TokenKind::Error, start);
        }
        self.token(TokenKind::PlainScalar, start)
    }

    /// Whether plain scalar text resumes after `ws` bytes of whitespace.
    fn scalar_continues_after(&self, ws: usize) -> bool {
        let mut after = self.remaining[ws..].chars();
        match after.next() {
            None | Some('\n' | '\r' | '#') => false,
            Some(':') => {
                let next = after.next();
                let blank = matches!(next, None | Some(' ' | '\t' | '\n' | '\r'));
                let flow_end =
                    self.flow_depth > 0 && matches!(next, Some(',' | '[' | ']' | '{' | '}'));
                !(blank || flow_end)
            }
            Some(',' | '[' | ']' | '{' | '}') => self.flow_depth == 0,
            Some(_) => true,
        }
    }

    /// Tokenize `|` / `>` plus chomping and indentation indicators.
    fn tokenize_block_scalar_header(&mut self) -> Token<'src> {
        let start = self.pos;
        self.advance();

        let mut keep_trailing = false;
        let mut indent_indicator = None;
        for _ in 0..2 {
            match self.peek() {
                Some('+') => {
                    keep_trailing = true;
                    self.advance();
                }
                Some('-') => {
                    self.advance();
                }
                Some(c @ '1'..='9') => {
                    indent_indicator = c.to_digit(10);
                    self.advance();
                }
                _ => break,
            }
        }

        self.block_scalar = Some(BlockScalarState {
            parent_indent: self.line_indent,
            keep_trailing,
            indent_indicator,
        });
        self.token(TokenKind::BlockScalarHeader, start)
    }

    /// Tokenize the lines of a block scalar.
    ///
    /// Content indentation comes from the indentation indicator when there is
    /// one, otherwise from the first non-blank line, and must exceed the
    /// header line's indentation. Trailing blank lines are only consumed
    /// with `+` chomping; otherwise they are left to become blank-line trivia.
    fn tokenize_block_scalar_content(&mut self, state: BlockScalarState) -> Token<'src> {
        let start = self.pos;
        let mut content_indent = state
            .indent_indicator
            .map(|indicator| (state.parent_indent + indicator) as usize);
        let mut cursor = start as usize;
        let mut end = cursor;

        while cursor < self.source.len() {
            let line_end = self.source[cursor..]
                .find('\n')
                .map(|i| cursor + i + 1)
                .unwrap_or(self.source.len());
            let body = self.source[cursor..line_end].trim_end_matches(['\n', '\r']);
            let indent = body.len() - body.trim_start_matches(' ').len();

            if body.trim_start_matches([' ', '\t']).is_empty() {
                cursor = line_end;
                if state.keep_trailing {
                    end = cursor;
                }
                continue;
            }

            match content_indent {
                None if indent as u32 > state.parent_indent => content_indent = Some(indent),
                None => break,
                Some(required) if indent < required => break,
                Some(_) => {}
            }
            cursor = line_end;
            end = cursor;
        }

        self.advance_by(end - start as usize);
        self.at_line_start = true;
        self.line_indent = 0;
        self.token(TokenKind::BlockScalarContent, start)
    }
}

impl<'src> Iterator for Tokenizer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}
