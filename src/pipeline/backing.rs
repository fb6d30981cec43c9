//! Committed property storage.

use std::collections::HashMap;
use std::sync::Arc;

use super::{GetContext, Interceptor, SetContext, Stage};
use crate::Result;
use crate::convert::ConverterRegistry;
use crate::value::Value;

/// Name to value map holding committed values.
///
/// Reads of absent names fall back to the property's default.
pub struct BackingStore {
    values: HashMap<String, Value>,
    registry: Arc<ConverterRegistry>,
}

impl BackingStore {
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self {
            values: HashMap::new(),
            registry,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Interceptor for BackingStore {
    fn stage(&self) -> Stage {
        Stage::BackingStore
    }

    fn on_get(&mut self, ctx: &mut GetContext<'_>) -> Result<()> {
        match self.values.get(ctx.descriptor.name()) {
            Some(value) => {
                ctx.value = value.clone();
                ctx.has_value = true;
            }
            None => {
                ctx.value = self
                    .registry
                    .default_value(ctx.descriptor)
                    .ok()
                    .flatten()
                    .unwrap_or(Value::Null);
                ctx.has_value = false;
            }
        }
        Ok(())
    }

    fn on_set(&mut self, ctx: &mut SetContext<'_>) -> Result<()> {
        let previous = self
            .values
            .insert(ctx.descriptor.name().to_string(), ctx.new_value.clone());
        ctx.has_old_value = previous.is_some();
        ctx.old_value = previous.unwrap_or(Value::Null);
        Ok(())
    }
}
