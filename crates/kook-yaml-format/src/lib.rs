//! Comment-preserving YAML output for kook configuration files.
//!
//! This crate turns a [`kook_yaml_tree::Node`] tree back into block-style
//! YAML text, keeping the comments the parser attached to each node.

mod emitter;
mod options;
mod scalar;

pub use emitter::Emitter;
pub use options::EmitOptions;
pub use scalar::{
    escape_double, fold_double, format_float, is_foldable, needs_double_quotes, needs_quotes,
    quote_single,
};
