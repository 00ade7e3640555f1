//! Hierarchical, comment-preserving configuration for kook bots.
//!
//! The configuration tree is a [`ConfigurationSection`]: ordered keys,
//! nested sections addressed by dotted paths, per-key comments and an
//! optional defaults section consulted on lookup misses.
//! [`YamlConfiguration`] loads that tree from YAML and writes it back with
//! the comments, the blank lines and the document header and footer intact.
//!
//! Mappings carrying a `==` key are typed objects rather than sections;
//! their types are registered in a [`SerializationRegistry`].
//!
//! Nothing here is synchronized. Callers sharing a configuration between
//! threads wrap it in a lock of their own.

mod error;
mod options;
mod plugin;
mod section;
mod serialization;
mod translate;
mod value;
mod yaml;

pub use error::{ConfigError, DeserializationError, FormatError, Result};
pub use options::{ConfigurationOptions, YamlConfigurationOptions};
pub use plugin::{CONFIG_FILE_NAME, EmbeddedResources, PluginConfigStore, ResourceSource};
pub use section::ConfigurationSection;
pub use serialization::{
    ConfigurationSerializable, Reconstruct, SERIALIZED_TYPE_KEY, SerializationRegistry, TypedObject,
};
pub use value::Value;
pub use yaml::{OptionsMut, YamlConfiguration};
