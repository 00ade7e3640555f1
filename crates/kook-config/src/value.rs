//! Values stored in configuration sections.

use crate::section::ConfigurationSection;
use crate::serialization::TypedObject;

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value. Setting a key to `Null` removes it.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    /// A nested section.
    Section(ConfigurationSection),
    /// An object written as a mapping with a `==` type key.
    Object(TypedObject),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Floats, and integers converted to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_section(&self) -> Option<&ConfigurationSection> {
        match self {
            Value::Section(section) => Some(section),
            _ => None,
        }
    }

    pub fn as_section_mut(&mut self) -> Option<&mut ConfigurationSection> {
        match self {
            Value::Section(section) => Some(section),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&TypedObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Text form of a scalar, as used for string lists.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<ConfigurationSection> for Value {
    fn from(section: ConfigurationSection) -> Self {
        Value::Section(section)
    }
}

impl From<TypedObject> for Value {
    fn from(object: TypedObject) -> Self {
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(5u8), Value::Int(5));
        assert_eq!(Value::from(-3i32), Value::Int(-3));
        assert_eq!(Value::from(0.5f32), Value::Float(0.5));
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::Sequence(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Float(2.5).as_i64(), None);
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("s").as_str(), Some("s"));
        assert_eq!(Value::from(vec![1, 2]).as_sequence().map(<[Value]>::len), Some(2));
        assert!(Value::Null.is_null());
        assert!(Value::from(ConfigurationSection::new()).as_section().is_some());
        assert_eq!(Value::Float(1.5).to_scalar_string().as_deref(), Some("1.5"));
        assert_eq!(Value::Null.to_scalar_string(), None);
    }
}
