//! Built-in converter for booleans, numbers, text and choices.

use super::{ConvertError, ConverterRegistry, ValueConverter};
use crate::value::{Value, ValueType};

/// Converter for all scalar value types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarConverter;

impl ValueConverter for ScalarConverter {
    fn name(&self) -> &str {
        "scalar"
    }

    fn to_text(
        &self,
        value: &Value,
        value_type: &ValueType,
        _registry: &ConverterRegistry,
    ) -> Result<String, ConvertError> {
        match (value_type, value) {
            (_, Value::List(_) | Value::Set(_) | Value::Map(_)) => Err(ConvertError::new(format!(
                "{} value cannot be written as {}",
                value.kind(),
                value_type
            ))),
            (_, v) => Ok(v.to_string()),
        }
    }

    fn from_text(
        &self,
        text: &str,
        value_type: &ValueType,
        _registry: &ConverterRegistry,
    ) -> Result<Value, ConvertError> {
        let trimmed = text.trim();
        match value_type {
            ValueType::Bool => parse_bool(trimmed).map(Value::Bool),
            ValueType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| ConvertError::new(e.to_string())),
            ValueType::Unsigned => trimmed
                .parse::<u64>()
                .map(Value::Unsigned)
                .map_err(|e| ConvertError::new(e.to_string())),
            ValueType::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| ConvertError::new(e.to_string())),
            ValueType::Text => Ok(Value::Text(text.to_string())),
            ValueType::Choice(options) => options
                .iter()
                .find(|o| o.eq_ignore_ascii_case(trimmed))
                .map(|o| Value::Text(o.clone()))
                .ok_or_else(|| {
                    ConvertError::new(format!("expected one of {}", options.join(", ")))
                }),
            other => Err(ConvertError::new(format!(
                "{} is not a scalar type",
                other
            ))),
        }
    }
}

fn parse_bool(text: &str) -> Result<bool, ConvertError> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConvertError::new(format!("'{}' is not a boolean", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, value_type: ValueType) -> Result<Value, ConvertError> {
        ScalarConverter.from_text(text, &value_type, &ConverterRegistry::new())
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse("True", ValueType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(parse(" off ", ValueType::Bool).unwrap(), Value::Bool(false));
        assert!(parse("maybe", ValueType::Bool).is_err());
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse(" -42", ValueType::Integer).unwrap(), Value::Integer(-42));
        assert_eq!(parse("42", ValueType::Unsigned).unwrap(), Value::Unsigned(42));
        assert!(parse("-1", ValueType::Unsigned).is_err());
        assert_eq!(parse("1.5", ValueType::Float).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        assert_eq!(parse("  padded ", ValueType::Text).unwrap(), Value::from("  padded "));
    }

    #[test]
    fn test_choice_is_canonicalized() {
        let choice = ValueType::choice(["Json", "Human"]);
        assert_eq!(parse("human", choice.clone()).unwrap(), Value::from("Human"));
        assert!(parse("xml", choice).is_err());
    }

    #[test]
    fn test_collections_are_rejected() {
        let registry = ConverterRegistry::new();
        assert!(
            ScalarConverter
                .to_text(&Value::List(vec![]), &ValueType::Text, &registry)
                .is_err()
        );
    }
}
