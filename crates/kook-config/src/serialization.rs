//! Custom types stored in configurations.
//!
//! A mapping with a `==` entry is not a section: it is an object of the
//! type named by that entry. Types are registered with a
//! [`SerializationRegistry`] under their tag; the other entries of the
//! mapping are handed to the registered reconstructor.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::DeserializationError;
use crate::value::Value;

/// Key holding the type tag of a serialized object.
pub const SERIALIZED_TYPE_KEY: &str = "==";

/// A type that can be written into a configuration as a tagged mapping.
pub trait ConfigurationSerializable: fmt::Debug + Send + Sync + Any {
    /// The fields to write, without the type key.
    fn serialize(&self) -> IndexMap<String, Value>;
}

/// Builds an object back from its fields.
pub type Reconstruct = dyn Fn(&IndexMap<String, Value>) -> Result<Arc<dyn ConfigurationSerializable>, DeserializationError>
    + Send
    + Sync;

/// Maps type tags to reconstructors.
#[derive(Default, Clone)]
pub struct SerializationRegistry {
    constructors: HashMap<String, Arc<Reconstruct>>,
}

impl fmt::Debug for SerializationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("SerializationRegistry").field("tags", &tags).finish()
    }
}

impl SerializationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reconstructor for `tag`, replacing any previous one.
    pub fn register<F>(&mut self, tag: impl Into<String>, reconstruct: F)
    where
        F: Fn(&IndexMap<String, Value>) -> Result<Arc<dyn ConfigurationSerializable>, DeserializationError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(tag.into(), Arc::new(reconstruct));
    }

    /// Forget `tag`. Returns whether it was registered.
    pub fn unregister(&mut self, tag: &str) -> bool {
        self.constructors.remove(tag).is_some()
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// The reconstruction function registered for `tag`.
    pub fn lookup(&self, tag: &str) -> Option<&Reconstruct> {
        self.constructors.get(tag).map(|f| &**f)
    }

    /// Reconstruct an object from a mapping's entries, `==` included.
    pub fn deserialize(&self, fields: &IndexMap<String, Value>) -> Result<TypedObject, DeserializationError> {
        let type_tag = match fields.get(SERIALIZED_TYPE_KEY) {
            Some(Value::String(tag)) => tag.as_str(),
            _ => return Err(DeserializationError::MissingTypeKey),
        };
        let reconstruct = self
            .lookup(type_tag)
            .ok_or_else(|| DeserializationError::UnknownType(type_tag.to_string()))?;

        let mut fields = fields.clone();
        fields.shift_remove(SERIALIZED_TYPE_KEY);
        let object = reconstruct(&fields)?;
        Ok(TypedObject::Resolved {
            type_tag: type_tag.to_string(),
            object,
        })
    }
}

/// A value stored as a tagged mapping.
#[derive(Debug, Clone)]
pub enum TypedObject {
    /// Reconstructed through the registry.
    Resolved {
        type_tag: String,
        object: Arc<dyn ConfigurationSerializable>,
    },
    /// The tag is unknown or the reconstructor failed. The raw fields are
    /// kept so that saving writes them back unchanged.
    Unresolved {
        type_tag: String,
        fields: IndexMap<String, Value>,
        error: DeserializationError,
    },
}

impl TypedObject {
    pub fn new(type_tag: impl Into<String>, object: impl ConfigurationSerializable) -> Self {
        TypedObject::Resolved {
            type_tag: type_tag.into(),
            object: Arc::new(object),
        }
    }

    /// The value of the `==` key.
    pub fn type_tag(&self) -> &str {
        match self {
            TypedObject::Resolved { type_tag, .. } | TypedObject::Unresolved { type_tag, .. } => type_tag,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TypedObject::Resolved { .. })
    }

    /// The fields written on save, without the type key.
    pub fn fields(&self) -> IndexMap<String, Value> {
        match self {
            TypedObject::Resolved { object, .. } => object.serialize(),
            TypedObject::Unresolved { fields, .. } => fields.clone(),
        }
    }

    /// Why an unresolved object could not be reconstructed.
    pub fn error(&self) -> Option<&DeserializationError> {
        match self {
            TypedObject::Unresolved { error, .. } => Some(error),
            TypedObject::Resolved { .. } => None,
        }
    }

    /// Borrow the reconstructed object as a concrete type.
    pub fn downcast_ref<T: ConfigurationSerializable>(&self) -> Option<&T> {
        match self {
            TypedObject::Resolved { object, .. } => {
                let any: &dyn Any = &**object;
                any.downcast_ref::<T>()
            }
            TypedObject::Unresolved { .. } => None,
        }
    }
}

impl PartialEq for TypedObject {
    fn eq(&self, other: &Self) -> bool {
        self.type_tag() == other.type_tag() && self.fields() == other.fields()
    }
}
