//! Conversion engine: typed values to and from their ini text form.
//!
//! Each [`ValueType`] kind resolves to a [`ValueConverter`] through the
//! [`ConverterRegistry`]. A property may carry its own converter, which wins
//! over the registry. Built-ins cover scalars, choices, lists, sets and maps;
//! collection converters convert their elements through the registry again.

mod collection;
mod scalar;

pub use collection::{ListConverter, MapConverter};
pub use scalar::ScalarConverter;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::descriptor::PropertyDescriptor;
use crate::value::{Value, ValueType};
use crate::{Error, Result};

/// Failure reported by a converter, without property context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ConvertError(pub String);

impl ConvertError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Bidirectional conversion between a [`Value`] and its text form.
pub trait ValueConverter: Send + Sync {
    /// Name used in logs and debug output.
    fn name(&self) -> &str;

    /// Render `value` (already of shape `value_type`) as text.
    fn to_text(
        &self,
        value: &Value,
        value_type: &ValueType,
        registry: &ConverterRegistry,
    ) -> std::result::Result<String, ConvertError>;

    /// Parse `text` into a value of shape `value_type`.
    fn from_text(
        &self,
        text: &str,
        value_type: &ValueType,
        registry: &ConverterRegistry,
    ) -> std::result::Result<Value, ConvertError>;
}

/// Converter lookup by value type kind.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<&'static str, Arc<dyn ValueConverter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&&str> = self.converters.keys().collect();
        kinds.sort();
        f.debug_struct("ConverterRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl ConverterRegistry {
    /// Registry with the built-in converters.
    pub fn new() -> Self {
        let scalar: Arc<dyn ValueConverter> = Arc::new(ScalarConverter);
        let list: Arc<dyn ValueConverter> = Arc::new(ListConverter);
        let mut converters = HashMap::new();
        for kind in ["bool", "integer", "unsigned", "float", "text", "choice"] {
            converters.insert(kind, Arc::clone(&scalar));
        }
        converters.insert("list", Arc::clone(&list));
        converters.insert("set", list);
        converters.insert("map", Arc::new(MapConverter) as Arc<dyn ValueConverter>);
        Self { converters }
    }

    /// Replace the converter used for one value type kind.
    pub fn register(&mut self, kind: &'static str, converter: Arc<dyn ValueConverter>) {
        self.converters.insert(kind, converter);
    }

    /// Converter for a value type.
    pub fn resolve(&self, value_type: &ValueType) -> Arc<dyn ValueConverter> {
        match self.converters.get(value_type.kind()) {
            Some(converter) => Arc::clone(converter),
            None => Arc::new(ScalarConverter),
        }
    }

    fn converter_for(&self, property: &PropertyDescriptor) -> Arc<dyn ValueConverter> {
        match property.converter() {
            Some(converter) => Arc::clone(converter),
            None => self.resolve(property.value_type()),
        }
    }

    /// Render an element of a collection.
    pub fn element_to_text(
        &self,
        value: &Value,
        value_type: &ValueType,
    ) -> std::result::Result<String, ConvertError> {
        self.resolve(value_type).to_text(value, value_type, self)
    }

    /// Parse an element of a collection.
    pub fn element_from_text(
        &self,
        text: &str,
        value_type: &ValueType,
    ) -> std::result::Result<Value, ConvertError> {
        self.resolve(value_type).from_text(text, value_type, self)
    }

    /// Text form of a property value. Null renders as an empty string.
    pub fn to_text(&self, property: &PropertyDescriptor, value: &Value) -> Result<String> {
        if value.is_null() {
            return Ok(String::new());
        }
        self.converter_for(property)
            .to_text(value, property.value_type(), self)
            .map_err(|e| conversion_error(property, &value.to_string(), e))
    }

    /// Parse the text form of a property value.
    pub fn from_text(&self, property: &PropertyDescriptor, text: &str) -> Result<Value> {
        self.converter_for(property)
            .from_text(text, property.value_type(), self)
            .map_err(|e| conversion_error(property, text, e))
    }

    /// Bring an arbitrary value into the shape of the property's declared
    /// type. Text is parsed; numbers widen; lists and sets interchange.
    pub fn coerce(&self, property: &PropertyDescriptor, value: Value) -> Result<Value> {
        if let Value::Text(text) = &value {
            if !matches!(property.value_type(), ValueType::Text) || property.converter().is_some()
            {
                return self.from_text(property, text);
            }
        }
        self.coerce_to(property.value_type(), value)
            .map_err(|actual| Error::TypeMismatch {
                property: property.name().to_string(),
                expected: property.value_type().to_string(),
                actual,
            })
    }

    /// Structural coercion. On failure returns the kind of the offending
    /// value.
    fn coerce_to(&self, value_type: &ValueType, value: Value) -> std::result::Result<Value, String> {
        let kind = value.kind().to_string();
        match (value_type, value) {
            (_, Value::Null) => Ok(Value::Null),
            (ValueType::Bool, v @ Value::Bool(_)) => Ok(v),
            (ValueType::Integer, v @ Value::Integer(_)) => Ok(v),
            (ValueType::Integer, Value::Unsigned(u)) => {
                i64::try_from(u).map(Value::Integer).map_err(|_| kind)
            }
            (ValueType::Unsigned, v @ Value::Unsigned(_)) => Ok(v),
            (ValueType::Unsigned, Value::Integer(i)) => {
                u64::try_from(i).map(Value::Unsigned).map_err(|_| kind)
            }
            (ValueType::Float, v @ Value::Float(_)) => Ok(v),
            (ValueType::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
            (ValueType::Float, Value::Unsigned(u)) => Ok(Value::Float(u as f64)),
            (ValueType::Text, v @ Value::Text(_)) => Ok(v),
            (ValueType::Text, v @ (Value::Bool(_)
            | Value::Integer(_)
            | Value::Unsigned(_)
            | Value::Float(_))) => Ok(Value::Text(v.to_string())),
            (vt @ (ValueType::Choice(_) | ValueType::Bool | ValueType::Integer
            | ValueType::Unsigned | ValueType::Float), Value::Text(text)) => self
                .element_from_text(&text, vt)
                .map_err(|_| kind),
            (ValueType::List(element), Value::List(items) | Value::Set(items)) => items
                .into_iter()
                .map(|item| self.coerce_to(element, item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::List),
            (ValueType::Set(element), Value::List(items) | Value::Set(items)) => items
                .into_iter()
                .map(|item| self.coerce_to(element, item))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::set_from),
            (ValueType::Map(element), Value::Map(map)) => map
                .into_iter()
                .map(|(k, v)| self.coerce_to(element, v).map(|v| (k, v)))
                .collect::<std::result::Result<BTreeMap<_, _>, _>>()
                .map(Value::Map),
            (vt @ (ValueType::List(_) | ValueType::Set(_) | ValueType::Map(_)), Value::Text(text)) => {
                self.element_from_text(&text, vt).map_err(|_| kind)
            }
            _ => Err(kind),
        }
    }

    /// Default value of a property converted to its declared type.
    ///
    /// Without a declared default, collections get an empty instance and
    /// scalars their zero value; text and choices have none.
    pub fn default_value(&self, property: &PropertyDescriptor) -> Result<Option<Value>> {
        match property.raw_default() {
            Some(raw) => self.coerce(property, raw.clone()).map(Some),
            None => Ok(property.value_type().implicit_default()),
        }
    }

    /// Entries of a map-typed value rendered for a dedicated ini section.
    pub fn map_entries(
        &self,
        property: &PropertyDescriptor,
        value: &Value,
    ) -> Result<Vec<(String, String)>> {
        let element = property.value_type().element().cloned().unwrap_or(ValueType::Text);
        let Some(map) = value.as_map() else {
            return Ok(Vec::new());
        };
        map.iter()
            .map(|(k, v)| {
                self.element_to_text(v, &element)
                    .map(|text| (k.clone(), text))
                    .map_err(|e| conversion_error(property, &v.to_string(), e))
            })
            .collect()
    }

    /// Rebuild a map-typed value from the entries of a dedicated ini section.
    pub fn map_from_entries<'a>(
        &self,
        property: &PropertyDescriptor,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Value> {
        let element = property.value_type().element().cloned().unwrap_or(ValueType::Text);
        let mut map = BTreeMap::new();
        for (key, text) in entries {
            let value = self
                .element_from_text(text, &element)
                .map_err(|e| conversion_error(property, text, e))?;
            map.insert(key.to_string(), value);
        }
        Ok(Value::Map(map))
    }
}

fn conversion_error(property: &PropertyDescriptor, value: &str, error: ConvertError) -> Error {
    Error::Conversion {
        property: property.name().to_string(),
        value: value.to_string(),
        reason: error.0,
    }
}
