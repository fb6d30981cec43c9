//! Built-in converters for lists, sets and inline maps.
//!
//! Items are separated by commas; map entries are `key=value` pairs.
//! Surrounding whitespace of items is trimmed and empty items are skipped.

use std::collections::BTreeMap;

use super::{ConvertError, ConverterRegistry, ValueConverter};
use crate::value::{Value, ValueType};

const ITEM_SEPARATOR: char = ',';
const PAIR_SEPARATOR: char = '=';

/// Converter for [`ValueType::List`] and [`ValueType::Set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListConverter;

impl ValueConverter for ListConverter {
    fn name(&self) -> &str {
        "list"
    }

    fn to_text(
        &self,
        value: &Value,
        value_type: &ValueType,
        registry: &ConverterRegistry,
    ) -> Result<String, ConvertError> {
        let element = element_type(value_type)?;
        let items = value
            .as_items()
            .ok_or_else(|| ConvertError::new(format!("expected a list, got {}", value.kind())))?;
        let parts = items
            .iter()
            .map(|item| registry.element_to_text(item, element))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(&ITEM_SEPARATOR.to_string()))
    }

    fn from_text(
        &self,
        text: &str,
        value_type: &ValueType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConvertError> {
        let element = element_type(value_type)?;
        let items = split_items(text)
            .map(|item| registry.element_from_text(item, element))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match value_type {
            ValueType::Set(_) => Value::set_from(items),
            _ => Value::List(items),
        })
    }
}

/// Converter for [`ValueType::Map`] written inline as `k=v,k2=v2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapConverter;

impl ValueConverter for MapConverter {
    fn name(&self) -> &str {
        "map"
    }

    fn to_text(
        &self,
        value: &Value,
        value_type: &ValueType,
        registry: &ConverterRegistry,
    ) -> Result<String, ConvertError> {
        let element = element_type(value_type)?;
        let map = value
            .as_map()
            .ok_or_else(|| ConvertError::new(format!("expected a map, got {}", value.kind())))?;
        let parts = map
            .iter()
            .map(|(k, v)| {
                registry
                    .element_to_text(v, element)
                    .map(|text| format!("{}{}{}", k, PAIR_SEPARATOR, text))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(&ITEM_SEPARATOR.to_string()))
    }

    fn from_text(
        &self,
        text: &str,
        value_type: &ValueType,
        registry: &ConverterRegistry,
    ) -> Result<Value, ConvertError> {
        let element = element_type(value_type)?;
        let mut map = BTreeMap::new();
        for item in split_items(text) {
            let (key, raw) = item
                .split_once(PAIR_SEPARATOR)
                .ok_or_else(|| ConvertError::new(format!("'{}' is not a key=value pair", item)))?;
            let value = registry.element_from_text(raw.trim(), element)?;
            map.insert(key.trim().to_string(), value);
        }
        Ok(Value::Map(map))
    }
}

fn element_type(value_type: &ValueType) -> Result<&ValueType, ConvertError> {
    value_type
        .element()
        .ok_or_else(|| ConvertError::new(format!("{} is not a collection type", value_type)))
}

fn split_items(text: &str) -> impl Iterator<Item = &str> {
    text.split(ITEM_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}
