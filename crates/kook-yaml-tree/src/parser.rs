//! Composer: builds a [`Document`] from the token stream.
//!
//! Block structure is decided by token columns. Comments and blank lines are
//! collected into a pending list as they are skipped and handed to the next
//! key, sequence item or standalone node that starts. Whatever is still
//! pending after the root node becomes the document's end comments.

use std::collections::HashMap;
use std::rc::Rc;

use kook_yaml_tokenizer::{Span, Token, TokenKind, Tokenizer};
use tracing::debug;

use crate::diagnostic::{LineIndex, ParseError, ParseErrorKind};
use crate::node::{
    CommentKind, CommentLine, MappingNode, Node, NodeKind, NodeTuple, ScalarNode, ScalarStyle,
    ScalarTag, SequenceNode,
};
use crate::scalar::{decode_block, decode_double, decode_single, resolve_scalar};
use crate::{Document, ParseOptions};

type Result<T> = std::result::Result<T, ParseError>;

/// Anchor and tag written in front of a node.
#[derive(Debug, Default)]
struct Properties {
    anchor: Option<String>,
    tag: Option<String>,
}

impl Properties {
    fn is_empty(&self) -> bool {
        self.anchor.is_none() && self.tag.is_none()
    }
}

pub(crate) struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
    lines: LineIndex,
    eof: Span,
    process_comments: bool,
    /// Comments and blank lines waiting for the next node.
    pending: Vec<CommentLine>,
    /// Something other than whitespace was consumed on the current line.
    line_has_content: bool,
    anchors: HashMap<String, Rc<Node>>,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str, options: ParseOptions) -> Self {
        let end = source.len() as u32;
        Parser {
            tokens: Tokenizer::new(source).collect(),
            pos: 0,
            lines: LineIndex::new(source),
            eof: Span::empty(end),
            process_comments: options.process_comments,
            pending: Vec::new(),
            line_has_content: false,
            anchors: HashMap::new(),
        }
    }

    pub(crate) fn parse_document(mut self) -> Result<Document> {
        self.skip_trivia();
        if self.peek_kind() == TokenKind::DocumentStart {
            self.bump();
            self.skip_trivia();
        }

        let root = match self.peek_kind() {
            TokenKind::Eof | TokenKind::DocumentStart | TokenKind::DocumentEnd => None,
            _ => Some(self.parse_block_node(-1, true)?),
        };

        self.skip_trivia();
        let mut ended = false;
        if self.peek_kind() == TokenKind::DocumentEnd {
            self.bump();
            self.skip_trivia();
            ended = true;
        }
        match self.peek_kind() {
            TokenKind::Eof => {}
            TokenKind::DocumentStart => return Err(self.error(ParseErrorKind::MultipleDocuments)),
            _ if ended => return Err(self.error(ParseErrorKind::MultipleDocuments)),
            _ => return Err(self.unexpected()),
        }

        debug!(
            has_root = root.is_some(),
            anchors = self.anchors.len(),
            "composed document"
        );
        Ok(Document {
            root,
            end_comments: std::mem::take(&mut self.pending),
        })
    }

    // Token access

    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().map_or(TokenKind::Eof, |t| t.kind)
    }

    fn current_span(&self) -> Span {
        self.peek().map_or(self.eof, |t| t.span)
    }

    /// Column of the current token.
    fn column(&self) -> i64 {
        self.lines.column(self.current_span().start) as i64
    }

    fn bump(&mut self) -> Token<'src> {
        match self.tokens.get(self.pos).cloned() {
            Some(token) => {
                self.pos += 1;
                self.line_has_content = true;
                token
            }
            None => Token::new(TokenKind::Eof, self.eof, ""),
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.current_span())
    }

    /// Error for the current token, distinguishing tokenizer errors.
    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Error && t.text.starts_with(['"', '\'']) => {
                ParseError::new(ParseErrorKind::UnterminatedScalar, t.span)
            }
            Some(t) if t.kind == TokenKind::Error => {
                ParseError::new(ParseErrorKind::InvalidToken, t.span)
            }
            _ => self.error(ParseErrorKind::UnexpectedToken),
        }
    }

    // Trivia and comments

    fn skip_whitespace(&mut self) {
        while self.peek_kind() == TokenKind::Whitespace {
            self.pos += 1;
        }
    }

    /// Skip whitespace, line breaks and comments, collecting comments and
    /// blank lines into `pending`.
    fn skip_trivia(&mut self) {
        while let Some(token) = self.tokens.get(self.pos) {
            match token.kind {
                TokenKind::Whitespace => {}
                TokenKind::Newline => {
                    if !self.line_has_content && self.process_comments {
                        self.pending.push(CommentLine {
                            kind: CommentKind::BlankLine,
                            value: String::new(),
                            span: Some(token.span),
                        });
                    }
                    self.line_has_content = false;
                }
                TokenKind::Comment => {
                    if self.process_comments {
                        self.pending.push(CommentLine {
                            kind: CommentKind::Block,
                            value: token.text[1..].to_string(),
                            span: Some(token.span),
                        });
                    }
                    self.line_has_content = true;
                }
                _ => break,
            }
            self.pos += 1;
        }
    }

    /// Skip trivia inside a flow collection. Comments there are dropped.
    fn skip_flow_trivia(&mut self) {
        while self.peek_kind().is_trivia() {
            self.pos += 1;
        }
    }

    /// Take a comment trailing content on the current line.
    fn take_inline(&mut self) -> Vec<CommentLine> {
        self.skip_whitespace();
        match self.peek().cloned() {
            Some(token) if token.kind == TokenKind::Comment => {
                self.pos += 1;
                self.line_has_content = true;
                if !self.process_comments {
                    return Vec::new();
                }
                vec![CommentLine {
                    kind: CommentKind::InLine,
                    value: token.text[1..].to_string(),
                    span: Some(token.span),
                }]
            }
            _ => Vec::new(),
        }
    }

    fn take_pending(&mut self) -> Vec<CommentLine> {
        std::mem::take(&mut self.pending)
    }

    /// Nothing but a comment may follow on this line.
    fn expect_line_end(&mut self) -> Result<()> {
        self.skip_whitespace();
        match self.peek_kind() {
            TokenKind::Newline | TokenKind::Comment | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn at_document_boundary(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Eof | TokenKind::DocumentStart | TokenKind::DocumentEnd
        )
    }

    fn null_node(&self) -> Node {
        let mut node = Node::null();
        node.span = Some(Span::empty(self.current_span().start));
        node
    }

    // Block context

    /// Parse a node in block context.
    ///
    /// `parent_col` is the column of the enclosing key or sequence entry
    /// (-1 for the root). Block mappings and sequences may only start here
    /// when `block_ok` is set, which excludes values written on the same line
    /// as their key.
    fn parse_block_node(&mut self, parent_col: i64, block_ok: bool) -> Result<Node> {
        let props = self.parse_properties()?;

        let node = if !props.is_empty()
            && matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Comment)
        {
            // `key: &anchor` with the node itself on the following lines.
            let inline = self.take_inline();
            self.skip_trivia();
            let col = self.column();
            let indentless = self.peek_kind() == TokenKind::SequenceEntry && col == parent_col;
            let mut node = if !self.at_document_boundary() && (col > parent_col || indentless) {
                self.parse_node_body(parent_col, true)?
            } else {
                self.null_node()
            };
            node.inline_comments.splice(0..0, inline);
            node
        } else if !props.is_empty() && self.at_document_boundary() {
            self.null_node()
        } else {
            self.parse_node_body(parent_col, block_ok)?
        };

        Ok(self.apply_properties(node, props))
    }

    fn parse_node_body(&mut self, parent_col: i64, block_ok: bool) -> Result<Node> {
        let col = self.column() as u32;
        match self.peek_kind() {
            TokenKind::SequenceEntry if block_ok => self.parse_block_sequence(col),
            TokenKind::ExplicitKey if block_ok => self.parse_block_mapping(col),
            kind if kind.is_scalar()
                && block_ok
                && self.is_mapping_key_ahead() =>
            {
                self.parse_block_mapping(col)
            }
            _ => {
                let block_comments = self.take_pending();
                let mut node = match self.peek_kind() {
                    TokenKind::BlockScalarHeader => self.parse_block_scalar()?,
                    TokenKind::PlainScalar => self.parse_plain_scalar(parent_col)?,
                    _ => self.parse_flow_node_body()?,
                };
                node.block_comments = block_comments;
                Ok(node)
            }
        }
    }

    /// A scalar at the current position followed by `:` starts a mapping.
    fn is_mapping_key_ahead(&self) -> bool {
        self.tokens[self.pos + 1..]
            .iter()
            .find(|t| t.kind != TokenKind::Whitespace)
            .is_some_and(|t| t.kind == TokenKind::MappingValue)
    }

    fn parse_block_mapping(&mut self, col: u32) -> Result<Node> {
        let start = self.current_span();
        let col = col as i64;
        let mut entries = Vec::new();

        loop {
            let key_comments = self.take_pending();
            let explicit = self.peek_kind() == TokenKind::ExplicitKey;
            let mut key = match self.peek_kind() {
                TokenKind::ExplicitKey => self.parse_explicit_key(col)?,
                kind if kind.is_scalar() => {
                    let key_token = self.bump();
                    let key = self.scalar_from_token(&key_token)?;
                    self.skip_whitespace();
                    key
                }
                TokenKind::Error => return Err(self.unexpected()),
                _ => return Err(self.error(ParseErrorKind::ExpectedKey)),
            };
            key.block_comments.splice(0..0, key_comments);

            let (mut value, inline) = match self.peek_kind() {
                TokenKind::MappingValue if !explicit || self.column() == col => {
                    self.bump();
                    self.skip_whitespace();
                    self.parse_mapping_value(col)?
                }
                // `? key` without a `: value` line.
                _ if explicit => (self.null_node(), Vec::new()),
                _ => return Err(self.error(ParseErrorKind::ExpectedMappingValue)),
            };

            // Trailing comments of container values sit on the key line.
            if value.is_collection() {
                key.inline_comments.extend(inline);
            } else {
                value.inline_comments.extend(inline);
            }
            entries.push(NodeTuple::new(key, value));

            self.skip_trivia();
            if self.at_document_boundary() {
                break;
            }
            let next_col = self.column();
            if next_col < col {
                break;
            }
            if next_col > col {
                return Err(self.error(ParseErrorKind::BadIndentation));
            }
        }

        let mut node = Node::new(NodeKind::Mapping(MappingNode::new(entries)));
        node.span = Some(start.extend(self.previous_span()));
        Ok(node)
    }

    /// The value after `key:` up to the end of its last line, with the
    /// comments trailing it.
    fn parse_mapping_value(&mut self, col: i64) -> Result<(Node, Vec<CommentLine>)> {
        let mut inline = self.take_inline();
        let value = if !inline.is_empty()
            || matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof)
        {
            self.skip_trivia();
            let next_col = self.column();
            let indentless = self.peek_kind() == TokenKind::SequenceEntry && next_col == col;
            if !self.at_document_boundary() && (next_col > col || indentless) {
                self.parse_block_node(col, true)?
            } else {
                self.null_node()
            }
        } else {
            self.parse_block_node(col, false)?
        };

        if self.line_has_content {
            inline.extend(self.take_inline());
            self.expect_line_end()?;
        }
        Ok((value, inline))
    }

    /// `? key`, leaving the parser at the line that may hold `: value`.
    fn parse_explicit_key(&mut self, col: i64) -> Result<Node> {
        self.bump();
        self.skip_whitespace();

        let mut inline = self.take_inline();
        let mut key = if !inline.is_empty()
            || matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof)
        {
            self.skip_trivia();
            if !self.at_document_boundary() && self.column() > col {
                self.parse_block_node(col, true)?
            } else {
                self.null_node()
            }
        } else {
            self.parse_block_node(col, true)?
        };

        if self.line_has_content {
            inline.extend(self.take_inline());
            self.expect_line_end()?;
        }
        key.inline_comments.extend(inline);
        self.skip_trivia();
        Ok(key)
    }

    fn parse_block_sequence(&mut self, col: u32) -> Result<Node> {
        let start = self.current_span();
        let col = col as i64;
        let mut items = Vec::new();

        loop {
            let item_comments = self.take_pending();
            self.bump();
            self.skip_whitespace();

            let mut inline = self.take_inline();
            let mut item = if !inline.is_empty()
                || matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof)
            {
                self.skip_trivia();
                if !self.at_document_boundary() && self.column() > col {
                    self.parse_block_node(col, true)?
                } else {
                    self.null_node()
                }
            } else {
                // Compact forms: `- key: value` and `- - nested`.
                self.parse_block_node(col, true)?
            };

            if self.line_has_content {
                inline.extend(self.take_inline());
                self.expect_line_end()?;
            }
            item.inline_comments.extend(inline);
            item.block_comments.splice(0..0, item_comments);
            items.push(item);

            self.skip_trivia();
            if self.at_document_boundary() {
                break;
            }
            let next_col = self.column();
            if next_col > col {
                return Err(self.error(ParseErrorKind::BadIndentation));
            }
            if next_col < col || self.peek_kind() != TokenKind::SequenceEntry {
                break;
            }
        }

        let mut node = Node::new(NodeKind::Sequence(SequenceNode::new(items)));
        node.span = Some(start.extend(self.previous_span()));
        Ok(node)
    }

    fn parse_block_scalar(&mut self) -> Result<Node> {
        let parent_indent = self.line_indent(self.pos);
        let header = self.bump();
        let inline = self.take_inline();
        match self.peek_kind() {
            TokenKind::Newline => self.pos += 1,
            TokenKind::BlockScalarContent => {}
            _ => return Err(self.unexpected()),
        }

        let (content, end) = if self.peek_kind() == TokenKind::BlockScalarContent {
            let token = self.bump();
            (token.text, token.span)
        } else {
            ("", header.span)
        };
        self.line_has_content = false;

        let style = if header.text.starts_with('>') {
            ScalarStyle::Folded
        } else {
            ScalarStyle::Literal
        };
        let mut node = Node::new(NodeKind::Scalar(ScalarNode {
            value: decode_block(header.text, content, parent_indent),
            tag: ScalarTag::Str,
            style,
        }));
        node.inline_comments = inline;
        node.span = Some(header.span.extend(end));
        Ok(node)
    }

    /// Indentation of the line holding the token at `index`.
    fn line_indent(&self, index: usize) -> usize {
        let line_start = self.tokens[..index]
            .iter()
            .rposition(|t| matches!(t.kind, TokenKind::Newline | TokenKind::BlockScalarContent))
            .map_or(0, |i| i + 1);
        match self.tokens.get(line_start) {
            Some(t) if t.kind == TokenKind::Whitespace => t.text.len(),
            _ => 0,
        }
    }

    /// A plain scalar in block context, with its continuation lines.
    ///
    /// Lines indented deeper than `parent_col` that hold nothing but plain
    /// text continue the scalar. A single line break folds to a space, and
    /// each blank line in between becomes a line feed.
    fn parse_plain_scalar(&mut self, parent_col: i64) -> Result<Node> {
        let first = self.bump();
        let mut node = self.scalar_from_token(&first)?;

        let mut text = first.text.to_string();
        let mut end = first.span;
        while let Some((index, blank_lines)) = self.plain_continuation(parent_col) {
            if blank_lines == 0 {
                text.push(' ');
            } else {
                text.extend(std::iter::repeat_n('\n', blank_lines));
            }
            let token = &self.tokens[index];
            text.push_str(token.text);
            end = token.span;
            self.pos = index + 1;
            self.line_has_content = true;
        }

        if end != first.span {
            debug!(lines = text.lines().count(), "folded multi-line plain scalar");
            node = Node::new(NodeKind::Scalar(ScalarNode {
                tag: resolve_scalar(&text),
                value: text,
                style: ScalarStyle::Plain,
            }));
            node.span = Some(first.span.extend(end));
        }
        Ok(node)
    }

    /// The plain scalar token continuing the current one on a later line, and
    /// the number of blank lines before it.
    fn plain_continuation(&self, parent_col: i64) -> Option<(usize, usize)> {
        let mut index = self.pos;
        let mut line_breaks = 0;
        loop {
            let token = self.tokens.get(index)?;
            match token.kind {
                TokenKind::Whitespace => {}
                TokenKind::Newline => line_breaks += 1,
                TokenKind::PlainScalar if line_breaks > 0 => break,
                _ => return None,
            }
            index += 1;
        }

        let token = &self.tokens[index];
        if (self.lines.column(token.span.start) as i64) <= parent_col {
            return None;
        }
        // `key: value` on the next line is a sibling or an error, not text.
        let key_ahead = self.tokens[index + 1..]
            .iter()
            .find(|t| t.kind != TokenKind::Whitespace)
            .is_some_and(|t| t.kind == TokenKind::MappingValue);
        (!key_ahead).then_some((index, line_breaks - 1))
    }

    fn previous_span(&self) -> Span {
        self.tokens[..self.pos]
            .iter()
            .rev()
            .find(|t| !t.kind.is_trivia())
            .map_or(self.eof, |t| t.span)
    }

    // Properties

    fn parse_properties(&mut self) -> Result<Properties> {
        let mut props = Properties::default();
        loop {
            match self.peek_kind() {
                TokenKind::Anchor if props.anchor.is_none() => {
                    let token = self.bump();
                    props.anchor = Some(token.text[1..].to_string());
                }
                TokenKind::Tag if props.tag.is_none() => {
                    let token = self.bump();
                    props.tag = Some(token.text.to_string());
                }
                TokenKind::Anchor | TokenKind::Tag => return Err(self.unexpected()),
                _ => break,
            }
            self.skip_whitespace();
        }
        Ok(props)
    }

    fn apply_properties(&mut self, mut node: Node, props: Properties) -> Node {
        if let Some(tag) = props.tag
            && let NodeKind::Scalar(scalar) = &mut node.kind
        {
            scalar.tag = ScalarTag::from_tag_str(&tag);
        }
        if let Some(anchor) = props.anchor {
            debug!(anchor = %anchor, "registered anchor");
            node.anchor = Some(anchor.clone());
            self.anchors.insert(anchor, Rc::new(node.clone()));
        }
        node
    }

    // Flow context

    /// Parse a node that may appear inside a flow collection.
    fn parse_flow_node(&mut self) -> Result<Node> {
        let props = self.parse_properties()?;
        self.skip_flow_trivia();
        let node = match self.peek_kind() {
            TokenKind::Comma | TokenKind::RBracket | TokenKind::RBrace if !props.is_empty() => {
                self.null_node()
            }
            _ => self.parse_flow_node_body()?,
        };
        Ok(self.apply_properties(node, props))
    }

    /// Alias, flow collection or scalar at the current token.
    fn parse_flow_node_body(&mut self) -> Result<Node> {
        match self.peek_kind() {
            TokenKind::Alias => {
                let token = self.bump();
                let name = &token.text[1..];
                let Some(target) = self.anchors.get(name) else {
                    return Err(ParseError::new(
                        ParseErrorKind::UnknownAnchor(name.to_string()),
                        token.span,
                    ));
                };
                let mut node = Node::alias(name, Rc::clone(target));
                node.span = Some(token.span);
                Ok(node)
            }
            TokenKind::LBracket => self.parse_flow_sequence(),
            TokenKind::LBrace => self.parse_flow_mapping(),
            kind if kind.is_scalar() => {
                let token = self.bump();
                self.scalar_from_token(&token)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_flow_sequence(&mut self) -> Result<Node> {
        let open = self.bump();
        let mut items = Vec::new();

        let close = loop {
            self.skip_flow_trivia();
            match self.peek_kind() {
                TokenKind::RBracket => break self.bump(),
                TokenKind::Eof => {
                    return Err(ParseError::new(ParseErrorKind::UnclosedFlowSequence, open.span));
                }
                _ => {}
            }

            let mut item = self.parse_flow_node()?;
            self.skip_flow_trivia();
            if self.peek_kind() == TokenKind::MappingValue {
                // `[key: value]` is a single-pair mapping.
                self.bump();
                self.skip_flow_trivia();
                let value = match self.peek_kind() {
                    TokenKind::Comma | TokenKind::RBracket => self.null_node(),
                    _ => self.parse_flow_node()?,
                };
                item = Node::new(NodeKind::Mapping(MappingNode {
                    entries: vec![NodeTuple::new(item, value)],
                    flow: true,
                }));
                self.skip_flow_trivia();
            }
            items.push(item);

            match self.peek_kind() {
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::RBracket => {}
                TokenKind::Eof => {
                    return Err(ParseError::new(ParseErrorKind::UnclosedFlowSequence, open.span));
                }
                _ => return Err(self.unexpected()),
            }
        };

        let mut node = Node::new(NodeKind::Sequence(SequenceNode { items, flow: true }));
        node.span = Some(open.span.extend(close.span));
        Ok(node)
    }

    fn parse_flow_mapping(&mut self) -> Result<Node> {
        let open = self.bump();
        let mut entries = Vec::new();

        let close = loop {
            self.skip_flow_trivia();
            match self.peek_kind() {
                TokenKind::RBrace => break self.bump(),
                TokenKind::Eof => {
                    return Err(ParseError::new(ParseErrorKind::UnclosedFlowMapping, open.span));
                }
                _ => {}
            }

            let key = self.parse_flow_node()?;
            self.skip_flow_trivia();
            let value = if self.peek_kind() == TokenKind::MappingValue {
                self.bump();
                self.skip_flow_trivia();
                match self.peek_kind() {
                    TokenKind::Comma | TokenKind::RBrace => self.null_node(),
                    _ => self.parse_flow_node()?,
                }
            } else {
                self.null_node()
            };
            entries.push(NodeTuple::new(key, value));

            self.skip_flow_trivia();
            match self.peek_kind() {
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::RBrace => {}
                TokenKind::Eof => {
                    return Err(ParseError::new(ParseErrorKind::UnclosedFlowMapping, open.span));
                }
                _ => return Err(self.unexpected()),
            }
        };

        let mut node = Node::new(NodeKind::Mapping(MappingNode {
            entries,
            flow: true,
        }));
        node.span = Some(open.span.extend(close.span));
        Ok(node)
    }

    // Scalars

    fn scalar_from_token(&self, token: &Token<'src>) -> Result<Node> {
        let (value, tag, style) = match token.kind {
            TokenKind::PlainScalar => (
                token.text.to_string(),
                resolve_scalar(token.text),
                ScalarStyle::Plain,
            ),
            TokenKind::SingleQuotedScalar => (
                decode_single(&token.text[1..token.text.len() - 1]),
                ScalarTag::Str,
                ScalarStyle::SingleQuoted,
            ),
            TokenKind::DoubleQuotedScalar => {
                let value = decode_double(&token.text[1..token.text.len() - 1])
                    .map_err(|seq| ParseError::new(ParseErrorKind::InvalidEscape(seq), token.span))?;
                (value, ScalarTag::Str, ScalarStyle::DoubleQuoted)
            }
            _ => return Err(ParseError::new(ParseErrorKind::UnexpectedToken, token.span)),
        };
        let mut node = Node::new(NodeKind::Scalar(ScalarNode { value, tag, style }));
        node.span = Some(token.span);
        Ok(node)
    }
}
