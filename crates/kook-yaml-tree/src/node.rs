//! Node types for YAML documents.
//!
//! A document is a tree of [`Node`]s. Every node, whatever its kind, can
//! carry three comment lists:
//! - `block_comments`: full-line comments and blank lines directly above it
//! - `inline_comments`: a trailing `# ...` on the line where it ends
//! - `end_comments`: comments after the last child of a collection
//!
//! Anchored nodes are shared: every alias of an anchor points at the same
//! [`Rc`], so consumers can see that two places refer to one node.

use std::collections::HashSet;
use std::rc::Rc;

use kook_yaml_tokenizer::Span;

/// How a comment line appeared in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentKind {
    /// A comment on a line of its own.
    Block,
    /// A comment trailing other content on the same line.
    InLine,
    /// An empty line. Its `value` is always empty.
    BlankLine,
}

/// One comment line, or a blank-line marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    pub kind: CommentKind,
    /// Text after the `#`, leading whitespace included.
    pub value: String,
    /// Source span (None if programmatically constructed).
    pub span: Option<Span>,
}

impl CommentLine {
    /// A full-line comment.
    pub fn block(value: impl Into<String>) -> Self {
        CommentLine {
            kind: CommentKind::Block,
            value: value.into(),
            span: None,
        }
    }

    /// A trailing comment.
    pub fn inline(value: impl Into<String>) -> Self {
        CommentLine {
            kind: CommentKind::InLine,
            value: value.into(),
            span: None,
        }
    }

    /// A blank line.
    pub fn blank() -> Self {
        CommentLine {
            kind: CommentKind::BlankLine,
            value: String::new(),
            span: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.kind == CommentKind::BlankLine
    }
}

/// The implicit or explicit type of a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarTag {
    Null,
    Bool,
    Int,
    Float,
    Timestamp,
    Str,
    /// A local or unrecognized tag, kept verbatim (e.g. `!color`).
    Custom(String),
}

impl ScalarTag {
    /// The `!!` shorthand for core tags, or the custom tag text.
    pub fn as_tag_str(&self) -> &str {
        match self {
            ScalarTag::Null => "!!null",
            ScalarTag::Bool => "!!bool",
            ScalarTag::Int => "!!int",
            ScalarTag::Float => "!!float",
            ScalarTag::Timestamp => "!!timestamp",
            ScalarTag::Str => "!!str",
            ScalarTag::Custom(tag) => tag,
        }
    }

    /// Map explicit tag text (as written after a node) to a tag.
    pub fn from_tag_str(tag: &str) -> Self {
        match tag {
            "!" | "!!str" => ScalarTag::Str,
            "!!null" => ScalarTag::Null,
            "!!bool" => ScalarTag::Bool,
            "!!int" => ScalarTag::Int,
            "!!float" => ScalarTag::Float,
            "!!timestamp" => ScalarTag::Timestamp,
            other => ScalarTag::Custom(other.to_string()),
        }
    }
}

/// How a scalar was (or should be) written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

/// A scalar: decoded text plus its type.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarNode {
    /// The decoded text content.
    pub value: String,
    pub tag: ScalarTag,
    pub style: ScalarStyle,
}

/// A sequence of nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceNode {
    pub items: Vec<Node>,
    /// Written as `[a, b]` instead of `- a`.
    pub flow: bool,
}

/// A key/value pair in a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTuple {
    pub key: Node,
    pub value: Node,
}

impl NodeTuple {
    pub fn new(key: Node, value: Node) -> Self {
        NodeTuple { key, value }
    }
}

/// An ordered mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingNode {
    pub entries: Vec<NodeTuple>,
    /// Written as `{k: v}` instead of `k: v`.
    pub flow: bool,
}

/// A reference to an anchored node.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasNode {
    /// Anchor name (without `*`).
    pub name: String,
    /// The anchored node. All aliases of one anchor share this.
    pub target: Rc<Node>,
}

/// The four node variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(ScalarNode),
    Sequence(SequenceNode),
    Mapping(MappingNode),
    Alias(AliasNode),
}

/// A document node with its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Anchor name (without `&`) declared on this node.
    pub anchor: Option<String>,
    pub block_comments: Vec<CommentLine>,
    pub inline_comments: Vec<CommentLine>,
    pub end_comments: Vec<CommentLine>,
    /// Source span (None if programmatically constructed).
    pub span: Option<Span>,
}

impl Node {
    /// Wrap a node kind with no comments.
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            anchor: None,
            block_comments: Vec::new(),
            inline_comments: Vec::new(),
            end_comments: Vec::new(),
            span: None,
        }
    }

    /// A plain scalar with an explicit tag.
    pub fn scalar(value: impl Into<String>, tag: ScalarTag) -> Self {
        Node::new(NodeKind::Scalar(ScalarNode {
            value: value.into(),
            tag,
            style: ScalarStyle::Plain,
        }))
    }

    /// A string scalar.
    pub fn string(value: impl Into<String>) -> Self {
        Node::scalar(value, ScalarTag::Str)
    }

    /// The empty null scalar (what `key:` with no value parses to).
    pub fn null() -> Self {
        Node::scalar("", ScalarTag::Null)
    }

    /// A block sequence.
    pub fn sequence(items: Vec<Node>) -> Self {
        Node::new(NodeKind::Sequence(SequenceNode { items, flow: false }))
    }

    /// A block mapping.
    pub fn mapping(entries: Vec<NodeTuple>) -> Self {
        Node::new(NodeKind::Mapping(MappingNode {
            entries,
            flow: false,
        }))
    }

    /// An alias to an anchored node.
    pub fn alias(name: impl Into<String>, target: Rc<Node>) -> Self {
        Node::new(NodeKind::Alias(AliasNode {
            name: name.into(),
            target,
        }))
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn with_block_comments(mut self, comments: Vec<CommentLine>) -> Self {
        self.block_comments = comments;
        self
    }

    pub fn with_inline_comments(mut self, comments: Vec<CommentLine>) -> Self {
        self.inline_comments = comments;
        self
    }

    /// Follow alias chains to the node they ultimately refer to.
    pub fn resolve(&self) -> &Node {
        let mut node = self;
        while let NodeKind::Alias(alias) = &node.kind {
            node = &alias.target;
        }
        node
    }

    pub fn as_scalar(&self) -> Option<&ScalarNode> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceNode> {
        match &self.kind {
            NodeKind::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&MappingNode> {
        match &self.kind {
            NodeKind::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut MappingNode> {
        match &mut self.kind {
            NodeKind::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Text of a scalar node (after alias resolution).
    pub fn as_str(&self) -> Option<&str> {
        self.resolve().as_scalar().map(|s| s.value.as_str())
    }

    /// Whether this is a mapping or sequence once aliases are resolved.
    pub fn is_collection(&self) -> bool {
        matches!(
            self.resolve().kind,
            NodeKind::Mapping(_) | NodeKind::Sequence(_)
        )
    }

    /// Whether this is the `<<` merge key.
    pub fn is_merge_key(&self) -> bool {
        matches!(
            &self.kind,
            NodeKind::Scalar(ScalarNode { value, style: ScalarStyle::Plain, .. }) if value == "<<"
        )
    }
}

impl MappingNode {
    pub fn new(entries: Vec<NodeTuple>) -> Self {
        MappingNode {
            entries,
            flow: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Find the value for a scalar key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|e| e.key.as_str() == Some(key))
            .map(|e| &e.value)
    }

    /// Whether any immediate key is a scalar equal to `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace `<<` entries with the entries they merge in.
    ///
    /// A merge value may be a mapping, an alias to one, or a sequence of
    /// those. Keys written explicitly in this mapping win over merged keys,
    /// and earlier merge sources win over later ones. Merged entries are
    /// inserted where the `<<` entry was. Merge values that are not
    /// mappings are left as ordinary entries.
    pub fn flatten_merge_keys(&mut self) {
        if !self.entries.iter().any(|e| e.key.is_merge_key()) {
            return;
        }

        let explicit: HashSet<String> = self
            .entries
            .iter()
            .filter(|e| !e.key.is_merge_key())
            .filter_map(|e| e.key.as_str().map(str::to_string))
            .collect();
        let mut merged: HashSet<String> = HashSet::new();

        let entries = std::mem::take(&mut self.entries);
        for tuple in entries {
            if !tuple.key.is_merge_key() {
                self.entries.push(tuple);
                continue;
            }

            let Some(sources) = merge_sources(&tuple.value) else {
                self.entries.push(tuple);
                continue;
            };

            for source in sources {
                let mut source = source.clone();
                source.flatten_merge_keys();
                for entry in source.entries {
                    if let Some(key) = entry.key.as_str() {
                        if explicit.contains(key) || !merged.insert(key.to_string()) {
                            continue;
                        }
                    }
                    self.entries.push(entry);
                }
            }
        }
    }
}

/// The mappings a `<<` value refers to, in priority order.
fn merge_sources(value: &Node) -> Option<Vec<&MappingNode>> {
    match &value.resolve().kind {
        NodeKind::Mapping(m) => Some(vec![m]),
        NodeKind::Sequence(seq) => Some(
            seq.items
                .iter()
                .filter_map(|item| item.resolve().as_mapping())
                .collect(),
        ),
        _ => None,
    }
}

impl SequenceNode {
    pub fn new(items: Vec<Node>) -> Self {
        SequenceNode { items, flow: false }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
