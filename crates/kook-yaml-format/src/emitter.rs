//! Emitter: writes a node tree as block-style YAML.
//!
//! Layout rules:
//! - mappings and sequences are written in block style unless they are empty
//!   or marked as flow, in which case they are written as `{...}` / `[...]`
//! - a sequence under a mapping key is not indented (`key:\n- a`)
//! - a mapping or sequence inside a sequence item starts on the dash line
//!   (`- key: value`)
//! - blank-line comments become empty lines, other comments keep their text
//!   after the `#` unchanged

use kook_yaml_tree::{CommentLine, Document, MappingNode, Node, NodeKind, ScalarNode, ScalarStyle, ScalarTag, SequenceNode, resolve_scalar};
use tracing::trace;

use crate::options::EmitOptions;
use crate::scalar::{escape_double, fold_double, is_foldable, needs_double_quotes, needs_quotes, quote_single};

/// Where a scalar is written; decides quoting and folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Value of a block mapping or block sequence item.
    Block,
    /// Key of a block mapping.
    Key,
    /// Anywhere inside a flow collection.
    Flow,
}

/// Writes [`Node`] trees as YAML text.
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    options: EmitOptions,
}

impl Emitter {
    /// Create an emitter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an emitter with the given options.
    pub fn with_options(options: EmitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Emit a root node, including its block and end comments.
    pub fn emit(&self, node: &Node) -> String {
        let mut writer = Writer::new(&self.options);
        writer.root(node);
        trace!(bytes = writer.out.len(), "emitted node tree");
        writer.out
    }

    /// Emit a whole document: the root (if any) followed by the document's
    /// end comments.
    pub fn emit_document(&self, document: &Document) -> String {
        let mut writer = Writer::new(&self.options);
        if let Some(root) = &document.root {
            writer.root(root);
        }
        writer.block_comments(&document.end_comments, 0);
        writer.out
    }
}

struct Writer<'a> {
    out: String,
    options: &'a EmitOptions,
}

fn is_block_mapping(m: &MappingNode) -> bool {
    !m.flow && !m.entries.is_empty()
}

fn is_block_sequence(s: &SequenceNode) -> bool {
    !s.flow && !s.items.is_empty()
}

fn is_empty_null(node: &Node) -> bool {
    node.anchor.is_none()
        && matches!(
            &node.kind,
            NodeKind::Scalar(ScalarNode { value, tag: ScalarTag::Null, .. }) if value.is_empty()
        )
}

impl<'a> Writer<'a> {
    fn new(options: &'a EmitOptions) -> Self {
        Writer {
            out: String::new(),
            options,
        }
    }

    fn indent_width(&self) -> usize {
        self.options.indent_width()
    }

    /// Current column (in characters) on the line being written.
    fn column(&self) -> usize {
        let start = self.out.rfind('\n').map_or(0, |i| i + 1);
        self.out[start..].chars().count()
    }

    fn spaces(&mut self, n: usize) {
        self.out.extend(std::iter::repeat_n(' ', n));
    }

    // Comments

    fn block_comments(&mut self, comments: &[CommentLine], indent: usize) {
        if !self.options.process_comments {
            return;
        }
        for comment in comments {
            if comment.is_blank() {
                self.out.push('\n');
                continue;
            }
            for line in comment.value.split('\n') {
                self.spaces(indent);
                self.out.push('#');
                self.out.push_str(line);
                self.out.push('\n');
            }
        }
    }

    fn inline_comments(&mut self, comments: &[CommentLine]) {
        if !self.options.process_comments {
            return;
        }
        for comment in comments.iter().filter(|c| !c.is_blank()) {
            self.out.push_str(" #");
            self.out.push_str(&comment.value.replace('\n', " "));
        }
    }

    // Block structure

    fn root(&mut self, node: &Node) {
        self.block_comments(&node.block_comments, 0);
        match &node.kind {
            NodeKind::Mapping(m) if is_block_mapping(m) => {
                if let Some(anchor) = &node.anchor {
                    self.out.push('&');
                    self.out.push_str(anchor);
                    self.inline_comments(&node.inline_comments);
                    self.out.push('\n');
                }
                self.block_mapping(m, 0, false);
            }
            NodeKind::Sequence(s) if is_block_sequence(s) => {
                if let Some(anchor) = &node.anchor {
                    self.out.push('&');
                    self.out.push_str(anchor);
                    self.inline_comments(&node.inline_comments);
                    self.out.push('\n');
                }
                self.block_sequence(s, 0, false);
            }
            _ => {
                self.anchor_prefix(node);
                let col = self.column();
                let text = self.inline_node(node, Position::Block, col, self.indent_width());
                self.out.push_str(&text);
                self.inline_comments(&node.inline_comments);
                self.out.push('\n');
            }
        }
        self.block_comments(&node.end_comments, 0);
    }

    /// Write mapping entries at `indent`. With `continued`, the first key
    /// goes right where the cursor is (after a sequence dash).
    fn block_mapping(&mut self, m: &MappingNode, indent: usize, continued: bool) {
        for (i, entry) in m.entries.iter().enumerate() {
            if i > 0 || !continued {
                self.block_comments(&entry.key.block_comments, indent);
                self.spaces(indent);
            }
            self.key(&entry.key);
            self.out.push(':');
            self.mapping_value(&entry.key, &entry.value, indent);
        }
    }

    fn key(&mut self, key: &Node) {
        self.anchor_prefix(key);
        let col = self.column();
        let text = self.inline_node(key, Position::Key, col, 0);
        self.out.push_str(&text);
    }

    fn mapping_value(&mut self, key: &Node, value: &Node, indent: usize) {
        let child_indent = indent + self.indent_width();
        match &value.kind {
            NodeKind::Mapping(m) if is_block_mapping(m) => {
                self.anchor_suffix(value);
                self.inline_comments(&key.inline_comments);
                self.inline_comments(&value.inline_comments);
                self.out.push('\n');
                self.block_comments(&value.block_comments, child_indent);
                self.block_mapping(m, child_indent, false);
                self.block_comments(&value.end_comments, child_indent);
            }
            NodeKind::Sequence(s) if is_block_sequence(s) => {
                self.anchor_suffix(value);
                self.inline_comments(&key.inline_comments);
                self.inline_comments(&value.inline_comments);
                self.out.push('\n');
                self.block_comments(&value.block_comments, indent);
                self.block_sequence(s, indent, false);
                self.block_comments(&value.end_comments, indent);
            }
            _ if is_empty_null(value) => {
                self.inline_comments(&key.inline_comments);
                self.inline_comments(&value.inline_comments);
                self.out.push('\n');
            }
            _ => {
                self.out.push(' ');
                self.anchor_prefix(value);
                let col = self.column();
                let text = self.inline_node(value, Position::Block, col, child_indent);
                self.out.push_str(&text);
                self.inline_comments(&key.inline_comments);
                self.inline_comments(&value.inline_comments);
                self.out.push('\n');
            }
        }
    }

    /// Write sequence items at `indent`. With `continued`, the first dash
    /// goes right where the cursor is.
    fn block_sequence(&mut self, s: &SequenceNode, indent: usize, continued: bool) {
        for (i, item) in s.items.iter().enumerate() {
            if i > 0 || !continued {
                self.block_comments(&item.block_comments, indent);
                self.block_comments(compact_leading_comments(item), indent);
                self.spaces(indent);
            }
            self.out.push('-');
            self.sequence_item(item, indent);
        }
    }

    fn sequence_item(&mut self, item: &Node, indent: usize) {
        let child_indent = indent + self.indent_width();
        let compact = item.anchor.is_none() && item.inline_comments.is_empty();
        match &item.kind {
            NodeKind::Mapping(m) if is_block_mapping(m) => {
                if compact {
                    self.spaces(self.indent_width() - 1);
                    self.block_mapping(m, child_indent, true);
                } else {
                    self.anchor_suffix(item);
                    self.inline_comments(&item.inline_comments);
                    self.out.push('\n');
                    self.block_mapping(m, child_indent, false);
                }
                self.block_comments(&item.end_comments, child_indent);
            }
            NodeKind::Sequence(s) if is_block_sequence(s) => {
                if compact {
                    self.spaces(self.indent_width() - 1);
                    self.block_sequence(s, child_indent, true);
                } else {
                    self.anchor_suffix(item);
                    self.inline_comments(&item.inline_comments);
                    self.out.push('\n');
                    self.block_sequence(s, child_indent, false);
                }
                self.block_comments(&item.end_comments, child_indent);
            }
            _ if is_empty_null(item) => {
                self.inline_comments(&item.inline_comments);
                self.out.push('\n');
            }
            _ => {
                self.out.push(' ');
                self.anchor_prefix(item);
                let col = self.column();
                let text = self.inline_node(item, Position::Block, col, child_indent);
                self.out.push_str(&text);
                self.inline_comments(&item.inline_comments);
                self.out.push('\n');
            }
        }
    }

    /// `&name ` before an inline node.
    fn anchor_prefix(&mut self, node: &Node) {
        if let Some(anchor) = &node.anchor {
            self.out.push('&');
            self.out.push_str(anchor);
            self.out.push(' ');
        }
    }

    /// ` &name` after a key whose value is a block collection.
    fn anchor_suffix(&mut self, node: &Node) {
        if let Some(anchor) = &node.anchor {
            self.out.push_str(" &");
            self.out.push_str(anchor);
        }
    }

    // Inline forms

    /// Render a node on the current line: a scalar, an alias or a flow
    /// collection. `col` is where the text starts, `indent` where folded
    /// continuation lines start.
    fn inline_node(&self, node: &Node, position: Position, col: usize, indent: usize) -> String {
        match &node.kind {
            NodeKind::Alias(alias) => format!("*{}", alias.name),
            NodeKind::Scalar(scalar) => self.scalar(scalar, position, col, indent),
            NodeKind::Sequence(s) => {
                let items: Vec<String> = s
                    .items
                    .iter()
                    .map(|item| self.flow_item(item))
                    .collect();
                format!("[{}]", items.join(", "))
            }
            NodeKind::Mapping(m) => {
                let entries: Vec<String> = m
                    .entries
                    .iter()
                    .map(|e| format!("{}: {}", self.flow_item(&e.key), self.flow_item(&e.value)))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }

    fn flow_item(&self, node: &Node) -> String {
        let text = self.inline_node(node, Position::Flow, 0, 0);
        match &node.anchor {
            Some(anchor) => format!("&{} {}", anchor, text),
            None => text,
        }
    }

    fn scalar(&self, scalar: &ScalarNode, position: Position, col: usize, indent: usize) -> String {
        let value = scalar.value.as_str();
        match &scalar.tag {
            ScalarTag::Null if !value.is_empty() && resolve_scalar(value) == ScalarTag::Null => {
                value.to_string()
            }
            ScalarTag::Null => "null".to_string(),
            ScalarTag::Str => self.string(value, scalar.style, position, col, indent),
            tag if resolve_scalar(value) == *tag => value.to_string(),
            // Explicit tag: custom tags, or core-tagged text that would not
            // resolve to that type on its own.
            tag => {
                let tag = tag.as_tag_str();
                let text = self.string(value, scalar.style, position, col + tag.len() + 1, indent);
                format!("{} {}", tag, text)
            }
        }
    }

    fn string(&self, value: &str, style: ScalarStyle, position: Position, col: usize, indent: usize) -> String {
        let rendered = if needs_double_quotes(value) || style == ScalarStyle::DoubleQuoted {
            format!("\"{}\"", escape_double(value))
        } else if needs_quotes(value, position == Position::Flow) || style == ScalarStyle::SingleQuoted {
            quote_single(value)
        } else {
            value.to_string()
        };

        let too_long = col + rendered.chars().count() > self.options.width;
        if position == Position::Block && too_long && is_foldable(value) {
            return fold_double(&escape_double(value), col, indent, self.options.width);
        }
        rendered
    }
}

/// Comments of the first entry of a sequence item written in compact form;
/// they have to go above the dash.
fn compact_leading_comments(item: &Node) -> &[CommentLine] {
    if item.anchor.is_some() || !item.inline_comments.is_empty() {
        return &[];
    }
    match &item.kind {
        NodeKind::Mapping(m) if is_block_mapping(m) => &m.entries[0].key.block_comments,
        NodeKind::Sequence(s) if is_block_sequence(s) => &s.items[0].block_comments,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kook_yaml_tree::{CommentLine, NodeTuple, parse};
    use proptest::prelude::*;

    fn emit(node: &Node) -> String {
        Emitter::new().emit(node)
    }

    fn reemit(source: &str) -> String {
        let doc = parse(source).unwrap_or_else(|e| panic!("{}", e.render("test.yml", source)));
        Emitter::new().emit_document(&doc)
    }

    fn entry(key: &str, value: Node) -> NodeTuple {
        NodeTuple::new(Node::string(key), value)
    }

    #[test]
    fn test_emit_simple_mapping() {
        let node = Node::mapping(vec![
            entry("name", Node::string("Alice")),
            entry("age", Node::scalar("30", ScalarTag::Int)),
            entry("enabled", Node::scalar("true", ScalarTag::Bool)),
        ]);
        insta::assert_snapshot!(emit(&node), @r"
        name: Alice
        age: 30
        enabled: true
        ");
    }

    #[test]
    fn test_emit_nested_and_sequences() {
        let node = Node::mapping(vec![
            entry(
                "server",
                Node::mapping(vec![
                    entry("host", Node::string("localhost")),
                    entry("ports", Node::sequence(vec![
                        Node::scalar("80", ScalarTag::Int),
                        Node::scalar("443", ScalarTag::Int),
                    ])),
                ]),
            ),
            entry(
                "users",
                Node::sequence(vec![
                    Node::mapping(vec![
                        entry("name", Node::string("a")),
                        entry("admin", Node::scalar("false", ScalarTag::Bool)),
                    ]),
                    Node::sequence(vec![Node::string("x"), Node::string("y")]),
                ]),
            ),
            entry("empty_map", Node::mapping(vec![])),
            entry("empty_list", Node::sequence(vec![])),
        ]);
        insta::assert_snapshot!(emit(&node), @r"
        server:
          host: localhost
          ports:
          - 80
          - 443
        users:
        - name: a
          admin: false
        - - x
          - y
        empty_map: {}
        empty_list: []
        ");
    }

    #[test]
    fn test_emit_with_indent_four() {
        let node = Node::mapping(vec![entry(
            "a",
            Node::mapping(vec![entry(
                "b",
                Node::sequence(vec![Node::mapping(vec![
                    entry("c", Node::string("d")),
                    entry("e", Node::string("f")),
                ])]),
            )]),
        )]);
        let output = Emitter::with_options(EmitOptions::new().indent(4)).emit(&node);
        assert_eq!(output, "a:\n    b:\n    -   c: d\n        e: f\n");
        assert_eq!(reemit(&output), output);
    }

    #[test]
    fn test_emit_comments() {
        let mut root = Node::mapping(vec![
            NodeTuple::new(
                Node::string("a").with_block_comments(vec![CommentLine::block(" first")]),
                Node::scalar("1", ScalarTag::Int).with_inline_comments(vec![CommentLine::inline(" one")]),
            ),
            NodeTuple::new(
                Node::string("b")
                    .with_block_comments(vec![CommentLine::blank(), CommentLine::block(" second")])
                    .with_inline_comments(vec![CommentLine::inline(" container")]),
                Node::mapping(vec![entry("c", Node::string("x"))]),
            ),
        ]);
        root.block_comments = vec![CommentLine::block(" header"), CommentLine::blank()];
        root.end_comments = vec![CommentLine::block(" footer")];

        insta::assert_snapshot!(emit(&root), @r"
        # header

        # first
        a: 1 # one

        # second
        b: # container
          c: x
        # footer
        ");
    }

    #[test]
    fn test_emit_without_comments() {
        let mut root = Node::mapping(vec![NodeTuple::new(
            Node::string("a").with_block_comments(vec![CommentLine::block(" c")]),
            Node::string("b").with_inline_comments(vec![CommentLine::inline(" d")]),
        )]);
        root.end_comments = vec![CommentLine::blank()];
        let output = Emitter::with_options(EmitOptions::new().process_comments(false)).emit(&root);
        assert_eq!(output, "a: b\n");
    }

    #[test]
    fn test_emit_empty_flow_root_with_comments() {
        let mut root = Node::mapping(vec![]);
        root.block_comments = vec![CommentLine::block(" header"), CommentLine::blank()];
        root.end_comments = vec![CommentLine::block(" footer")];
        assert_eq!(emit(&root), "# header\n\n{}\n# footer\n");
    }

    #[test]
    fn test_emit_quoting() {
        let node = Node::mapping(vec![
            entry("number_string", Node::string("123")),
            entry("bool_string", Node::string("yes")),
            entry("empty", Node::string("")),
            entry("colon", Node::string("a: b")),
            entry("quote", Node::string("it's")),
            entry("newline", Node::string("a\nb")),
            entry("indicator", Node::string("*star")),
            entry("1", Node::string("int key")),
            entry("null", Node::null()),
        ]);
        insta::assert_snapshot!(emit(&node), @r#"
        number_string: '123'
        bool_string: 'yes'
        empty: ''
        colon: 'a: b'
        quote: it's
        newline: "a\nb"
        indicator: '*star'
        '1': int key
        'null':
        "#);
    }

    #[test]
    fn test_emit_floats_and_tags() {
        let node = Node::mapping(vec![
            entry("ratio", Node::scalar(crate::format_float(1.0), ScalarTag::Float)),
            entry("inf", Node::scalar(crate::format_float(f64::NEG_INFINITY), ScalarTag::Float)),
            entry("color", Node::scalar("red", ScalarTag::Custom("!color".to_string()))),
            entry("forced", Node::scalar("abc", ScalarTag::Int)),
        ]);
        assert_eq!(
            emit(&node),
            "ratio: 1.0\ninf: -.inf\ncolor: !color red\nforced: !!int abc\n"
        );
    }

    #[test]
    fn test_emit_anchor_and_alias() {
        let base = Node::mapping(vec![entry("host", Node::string("localhost"))]).with_anchor("base");
        let target = std::rc::Rc::new(base.clone());
        let node = Node::mapping(vec![
            entry("base", base),
            entry("copy", Node::alias("base", target)),
        ]);
        let output = emit(&node);
        assert_eq!(output, "base: &base\n  host: localhost\ncopy: *base\n");
        assert_eq!(reemit(&output), output);
    }

    #[test]
    fn test_emit_folds_long_strings() {
        let long = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor";
        let node = Node::mapping(vec![entry("text", Node::string(long))]);
        let output = Emitter::with_options(EmitOptions::new().width(40)).emit(&node);
        insta::assert_snapshot!(output, @r#"
        text: "lorem ipsum dolor sit amet
          consectetur adipiscing elit sed do
          eiusmod tempor"
        "#);

        let doc = parse(&output).unwrap();
        let root = doc.root.unwrap();
        let value = root.as_mapping().and_then(|m| m.get("text")).and_then(Node::as_str);
        assert_eq!(value, Some(long));
    }

    #[test]
    fn test_reemit_is_stable() {
        let source = "\
# header

# about a
a: 1 # one
list:
- x
- y: 2
  z: 3
nested: # note
  deep:
    flag: true
flow: [1, 2]
empty: {}
# footer
";
        assert_eq!(reemit(source), source);
    }

    proptest! {
        #[test]
        fn strings_read_back_unchanged(text in "\\PC{0,40}|[ a-z:#'\"-]{0,20}") {
            let node = Node::mapping(vec![entry("k", Node::string(text.clone()))]);
            let output = Emitter::with_options(EmitOptions::new().width(20)).emit(&node);
            let doc = parse(&output).unwrap();
            let root = doc.root.unwrap();
            let value = root.as_mapping().and_then(|m| m.get("k")).and_then(Node::as_str);
            prop_assert_eq!(value, Some(text.as_str()));
        }
    }
}
