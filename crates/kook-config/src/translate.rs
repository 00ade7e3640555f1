//! Conversion between YAML node trees and configuration sections.
//!
//! Loading walks a mapping node and fills a section: nested mappings become
//! nested sections, unless they carry the `==` type key, in which case they
//! are typed objects. Saving builds the node tree back.
//!
//! Comment placement follows one convention in both directions: block
//! comments sit on the key node, and an inline comment sits on the key node
//! when the value is a mapping or sequence, otherwise on the value node.

use indexmap::IndexMap;
use kook_yaml_format::format_float;
use kook_yaml_tree::{
    CommentLine, LineIndex, MappingNode, Node, NodeKind, NodeTuple, ScalarTag, parse_bool, parse_float, parse_int,
};
use tracing::{debug, warn};

use crate::error::FormatError;
use crate::options::ConfigurationOptions;
use crate::section::ConfigurationSection;
use crate::serialization::{SERIALIZED_TYPE_KEY, SerializationRegistry, TypedObject};
use crate::value::Value;

/// Converts node trees to sections and back.
pub(crate) struct Translator<'a> {
    registry: &'a SerializationRegistry,
    options: ConfigurationOptions,
    lines: Option<LineIndex>,
}

impl<'a> Translator<'a> {
    pub(crate) fn new(registry: &'a SerializationRegistry, options: ConfigurationOptions) -> Self {
        Self {
            registry,
            options,
            lines: None,
        }
    }

    /// Resolve node spans against `source` in error messages.
    pub(crate) fn with_source(mut self, source: &str) -> Self {
        self.lines = Some(LineIndex::new(source));
        self
    }

    fn error(&self, message: impl Into<String>, node: &Node) -> FormatError {
        FormatError::at(message, node.span, self.lines.as_ref())
    }

    // Load direction

    /// Fill `section` from the entries of `mapping`.
    pub(crate) fn from_node_tree(&self, mapping: &MappingNode, section: &mut ConfigurationSection) -> Result<(), FormatError> {
        let mut mapping = mapping.clone();
        mapping.flatten_merge_keys();

        for NodeTuple { key, value } in &mapping.entries {
            let name = self.key_string(key)?;
            let target = value.resolve();

            match &target.kind {
                NodeKind::Mapping(nested) if !nested.contains_key(SERIALIZED_TYPE_KEY) => {
                    let child = section.create_section(&name);
                    self.from_node_tree(nested, child)?;
                }
                _ => {
                    let constructed = self.construct(target)?;
                    if constructed.is_null() {
                        debug!(key = %name, "skipping key without a value");
                    }
                    section.set(&name, constructed);
                }
            }

            section.set_comments(&name, comments_from_nodes(&key.block_comments));
            let inline = if target.is_collection() {
                &key.inline_comments
            } else {
                &value.inline_comments
            };
            section.set_inline_comments(&name, comments_from_nodes(inline));
        }
        Ok(())
    }

    /// The text of a key node. Keys are scalars; typed scalars are written
    /// the way their values would be.
    fn key_string(&self, key: &Node) -> Result<String, FormatError> {
        let text = match self.construct(key.resolve())? {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => format_float(n),
            Value::String(s) => s,
            Value::Sequence(_) | Value::Section(_) | Value::Object(_) => {
                return Err(self.error("mapping keys must be scalars", key));
            }
        };
        Ok(text)
    }

    /// Build a value from a node that is not a nested section.
    fn construct(&self, node: &Node) -> Result<Value, FormatError> {
        match &node.kind {
            NodeKind::Alias(alias) => self.construct(&alias.target),
            NodeKind::Scalar(scalar) => Ok(construct_scalar(&scalar.value, &scalar.tag)),
            NodeKind::Sequence(sequence) => sequence
                .items
                .iter()
                .map(|item| self.construct(item.resolve()))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            NodeKind::Mapping(mapping) if mapping.contains_key(SERIALIZED_TYPE_KEY) => {
                self.construct_object(mapping).map(Value::Object)
            }
            // Mappings outside of a section (in sequences or object fields)
            // are detached sections.
            NodeKind::Mapping(mapping) => {
                let mut section = ConfigurationSection::with_options(self.options);
                self.from_node_tree(mapping, &mut section)?;
                Ok(Value::Section(section))
            }
        }
    }

    fn construct_object(&self, mapping: &MappingNode) -> Result<TypedObject, FormatError> {
        let mut mapping = mapping.clone();
        mapping.flatten_merge_keys();

        let mut fields = IndexMap::new();
        for NodeTuple { key, value } in &mapping.entries {
            fields.insert(self.key_string(key)?, self.construct(value.resolve())?);
        }

        Ok(self.registry.deserialize(&fields).unwrap_or_else(|error| {
            let type_tag = match fields.shift_remove(SERIALIZED_TYPE_KEY) {
                Some(Value::String(tag)) => tag,
                Some(other) => other.to_scalar_string().unwrap_or_default(),
                None => String::new(),
            };
            warn!(%type_tag, %error, "keeping serialized object unresolved");
            TypedObject::Unresolved { type_tag, fields, error }
        }))
    }

    // Save direction

    /// Build a block mapping node from `section`.
    pub(crate) fn to_node_tree(&self, section: &ConfigurationSection) -> Node {
        let section = section.effective();
        let entries = section
            .entries()
            .map(|(name, entry)| {
                let mut key = Node::string(name.as_str()).with_block_comments(comments_to_nodes(&entry.comments, false));
                let mut value = self.represent(&entry.value);
                let inline = comments_to_nodes(&entry.inline_comments, true);
                if value.is_collection() {
                    key.inline_comments = inline;
                } else {
                    value.inline_comments = inline;
                }
                NodeTuple::new(key, value)
            })
            .collect();
        Node::mapping(entries)
    }

    fn represent(&self, value: &Value) -> Node {
        match value {
            Value::Null => Node::scalar("null", ScalarTag::Null),
            Value::Bool(b) => Node::scalar(b.to_string(), ScalarTag::Bool),
            Value::Int(n) => Node::scalar(n.to_string(), ScalarTag::Int),
            Value::Float(n) => Node::scalar(format_float(*n), ScalarTag::Float),
            Value::String(s) => Node::string(s.as_str()),
            Value::Sequence(items) => Node::sequence(items.iter().map(|item| self.represent(item)).collect()),
            Value::Section(section) => self.to_node_tree(section),
            Value::Object(object) => {
                let mut entries = vec![NodeTuple::new(
                    Node::string(SERIALIZED_TYPE_KEY),
                    Node::string(object.type_tag()),
                )];
                entries.extend(
                    object
                        .fields()
                        .iter()
                        .filter(|(name, _)| name.as_str() != SERIALIZED_TYPE_KEY)
                        .map(|(name, field)| NodeTuple::new(Node::string(name.as_str()), self.represent(field))),
                );
                Node::mapping(entries)
            }
        }
    }
}

fn construct_scalar(text: &str, tag: &ScalarTag) -> Value {
    match tag {
        ScalarTag::Null => Value::Null,
        ScalarTag::Bool => parse_bool(text).map_or_else(|| Value::String(text.to_string()), Value::Bool),
        // Integers too large for i64 are kept as floats.
        ScalarTag::Int => match parse_int(text) {
            Some(n) => Value::Int(n),
            None => parse_float(text).map_or_else(|| Value::String(text.to_string()), Value::Float),
        },
        ScalarTag::Float => parse_float(text).map_or_else(|| Value::String(text.to_string()), Value::Float),
        ScalarTag::Timestamp | ScalarTag::Str | ScalarTag::Custom(_) => Value::String(text.to_string()),
    }
}

/// Comment lines as stored in sections: one leading space stripped, blank
/// lines as `None`.
pub(crate) fn comments_from_nodes(lines: &[CommentLine]) -> Vec<Option<String>> {
    lines
        .iter()
        .map(|line| {
            if line.is_blank() {
                None
            } else {
                let text = line.value.strip_prefix(' ').unwrap_or(&line.value);
                Some(text.to_string())
            }
        })
        .collect()
}

/// Comment lines for the emitter: a space put back in front of the text.
pub(crate) fn comments_to_nodes(comments: &[Option<String>], inline: bool) -> Vec<CommentLine> {
    comments
        .iter()
        .map(|comment| match comment {
            None => CommentLine::blank(),
            Some(text) => {
                let value = if text.is_empty() { String::new() } else { format!(" {}", text) };
                if inline { CommentLine::inline(value) } else { CommentLine::block(value) }
            }
        })
        .collect()
}

/// Split the comments above the first key at the last blank line: the part
/// up to and including that line is the document header.
pub(crate) fn split_header(mut comments: Vec<CommentLine>) -> (Vec<CommentLine>, Vec<CommentLine>) {
    match comments.iter().rposition(CommentLine::is_blank) {
        Some(last_blank) => {
            let rest = comments.split_off(last_blank + 1);
            (comments, rest)
        }
        None => (Vec::new(), comments),
    }
}

/// The header as stored in options: without the separating blank line and
/// without leading blank lines.
pub(crate) fn load_header(mut header: Vec<Option<String>>) -> Vec<Option<String>> {
    header.pop();
    let first_text = header.iter().position(Option::is_some).unwrap_or(header.len());
    header.split_off(first_text)
}

/// The header as written: followed by a blank line so that reading it back
/// splits at the same place.
pub(crate) fn save_header(header: &[Option<String>]) -> Vec<Option<String>> {
    let mut lines = header.to_vec();
    if !lines.is_empty() {
        lines.push(None);
    }
    lines
}
