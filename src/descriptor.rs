//! Static property metadata.
//!
//! A [`SectionDescriptor`] lists the properties of one configuration section.
//! Descriptors are built once through the builders below and shared read-only
//! by every instance of the section. [`DescriptorCache`] keeps one descriptor
//! per section type.

use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::convert::ValueConverter;
use crate::value::{Value, ValueType};

/// Metadata of a single property.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    value_type: ValueType,
    default: Option<Value>,
    description: Option<String>,
    category: Option<String>,
    ini_key: String,
    emit_default: bool,
    read_enabled: bool,
    write_enabled: bool,
    ignore_errors: bool,
    converter: Option<Arc<dyn ValueConverter>>,
    tags: BTreeMap<String, Option<String>>,
}

impl PropertyDescriptor {
    /// Start describing a property.
    pub fn builder(name: impl Into<String>, value_type: ValueType) -> PropertyBuilder {
        let name = name.into();
        PropertyBuilder {
            descriptor: PropertyDescriptor {
                ini_key: name.clone(),
                name,
                value_type,
                default: None,
                description: None,
                category: None,
                emit_default: false,
                read_enabled: true,
                write_enabled: true,
                ignore_errors: false,
                converter: None,
                tags: BTreeMap::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// The declared default, before conversion to the value type.
    pub fn raw_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Key used in the ini file.
    pub fn ini_key(&self) -> &str {
        &self.ini_key
    }

    /// Write the value even when it equals the default.
    pub fn emit_default(&self) -> bool {
        self.emit_default
    }

    /// Value is read from ini layers.
    pub fn read_enabled(&self) -> bool {
        self.read_enabled
    }

    /// Value is written to the ini file.
    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    /// Conversion errors are logged and swallowed instead of raised.
    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }

    pub fn converter(&self) -> Option<&Arc<dyn ValueConverter>> {
        self.converter.as_ref()
    }

    pub fn is_tagged_with(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// Value of a tag; `None` when the tag is absent or carries no value.
    pub fn tag_value(&self, tag: &str) -> Option<&str> {
        self.tags.get(tag).and_then(|v| v.as_deref())
    }

    pub fn tags(&self) -> &BTreeMap<String, Option<String>> {
        &self.tags
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("default", &self.default)
            .field("ini_key", &self.ini_key)
            .field("emit_default", &self.emit_default)
            .field("read_enabled", &self.read_enabled)
            .field("write_enabled", &self.write_enabled)
            .field("ignore_errors", &self.ignore_errors)
            .field("converter", &self.converter.as_ref().map(|c| c.name()))
            .field("tags", &self.tags)
            .finish()
    }
}

/// Builder for [`PropertyDescriptor`].
pub struct PropertyBuilder {
    descriptor: PropertyDescriptor,
}

impl PropertyBuilder {
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.descriptor.default = Some(value.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.descriptor.category = Some(category.into());
        self
    }

    pub fn ini_key(mut self, key: impl Into<String>) -> Self {
        self.descriptor.ini_key = key.into();
        self
    }

    pub fn emit_default(mut self, emit: bool) -> Self {
        self.descriptor.emit_default = emit;
        self
    }

    pub fn read_enabled(mut self, enabled: bool) -> Self {
        self.descriptor.read_enabled = enabled;
        self
    }

    pub fn write_enabled(mut self, enabled: bool) -> Self {
        self.descriptor.write_enabled = enabled;
        self
    }

    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.descriptor.ignore_errors = ignore;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.descriptor.converter = Some(converter);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>, value: Option<&str>) -> Self {
        self.descriptor
            .tags
            .insert(tag.into(), value.map(str::to_string));
        self
    }

    pub fn build(self) -> PropertyDescriptor {
        self.descriptor
    }
}

impl From<PropertyBuilder> for PropertyDescriptor {
    fn from(builder: PropertyBuilder) -> Self {
        builder.build()
    }
}

/// Metadata of a configuration section: its name and ordered properties.
#[derive(Debug, Clone)]
pub struct SectionDescriptor {
    name: String,
    description: Option<String>,
    properties: Vec<Arc<PropertyDescriptor>>,
    index: HashMap<String, usize>,
}

impl SectionDescriptor {
    pub fn builder(name: impl Into<String>) -> SectionBuilder {
        SectionBuilder {
            name: name.into(),
            description: None,
            properties: Vec::new(),
        }
    }

    /// Describe a section whose properties are all plain text.
    ///
    /// Used for sections found in ini files without a declared schema.
    pub fn untyped<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keys.into_iter()
            .fold(Self::builder(name), |builder, key| {
                builder.property(PropertyDescriptor::builder(key, ValueType::Text))
            })
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[Arc<PropertyDescriptor>] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.index.get(name).map(|&i| &self.properties[i])
    }

    /// Find a property by its ini key, case-insensitively.
    pub fn property_by_ini_key(&self, key: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.properties
            .iter()
            .find(|p| p.ini_key().eq_ignore_ascii_case(key))
    }
}

/// Builder for [`SectionDescriptor`].
pub struct SectionBuilder {
    name: String,
    description: Option<String>,
    properties: Vec<PropertyDescriptor>,
}

impl SectionBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a property. A later property with the same name replaces the
    /// earlier one in place.
    pub fn property(mut self, property: impl Into<PropertyDescriptor>) -> Self {
        let property = property.into();
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
        self
    }

    pub fn build(self) -> SectionDescriptor {
        let properties: Vec<Arc<PropertyDescriptor>> =
            self.properties.into_iter().map(Arc::new).collect();
        let index = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        SectionDescriptor {
            name: self.name,
            description: self.description,
            properties,
            index,
        }
    }
}

/// Descriptors built lazily, one per section type.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<TypeId, Arc<SectionDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached descriptor for `T`, building it on first use.
    pub fn get_or_build<T: 'static>(
        &self,
        build: impl FnOnce() -> SectionDescriptor,
    ) -> Arc<SectionDescriptor> {
        let key = TypeId::of::<T>();
        if let Some(found) = self.entries.read().get(&key) {
            return Arc::clone(found);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(build())))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SectionDescriptor {
        SectionDescriptor::builder("Core")
            .property(
                PropertyDescriptor::builder("Name", ValueType::Text)
                    .ini_key("name")
                    .default_value("x")
                    .tag("Expert", None)
                    .tag("Category", Some("ui")),
            )
            .property(PropertyDescriptor::builder("Age", ValueType::Integer))
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let desc = PropertyDescriptor::builder("Port", ValueType::Unsigned).build();
        assert_eq!(desc.ini_key(), "Port");
        assert!(desc.read_enabled());
        assert!(desc.write_enabled());
        assert!(!desc.emit_default());
        assert!(!desc.ignore_errors());
        assert!(desc.raw_default().is_none());
    }

    #[test]
    fn test_lookup_and_order() {
        let section = sample();
        let names: Vec<&str> = section.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Name", "Age"]);
        assert!(section.property("Age").is_some());
        assert!(section.property("age").is_none());
        assert_eq!(section.property_by_ini_key("NAME").unwrap().name(), "Name");
    }

    #[test]
    fn test_tags() {
        let section = sample();
        let name = section.property("Name").unwrap();
        assert!(name.is_tagged_with("Expert"));
        assert_eq!(name.tag_value("Expert"), None);
        assert_eq!(name.tag_value("Category"), Some("ui"));
        assert!(!name.is_tagged_with("Other"));
    }

    #[test]
    fn test_duplicate_property_replaces() {
        let section = SectionDescriptor::builder("S")
            .property(PropertyDescriptor::builder("A", ValueType::Text))
            .property(PropertyDescriptor::builder("A", ValueType::Integer))
            .build();
        assert_eq!(section.properties().len(), 1);
        assert_eq!(section.property("A").unwrap().value_type(), &ValueType::Integer);
    }

    #[test]
    fn test_cache_builds_once() {
        struct Marker;
        let cache = DescriptorCache::new();
        let first = cache.get_or_build::<Marker>(sample);
        let second = cache.get_or_build::<Marker>(|| panic!("built twice"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_untyped_section() {
        let section = SectionDescriptor::untyped("Misc", ["a", "b"]);
        assert_eq!(section.properties().len(), 2);
        assert_eq!(section.property("b").unwrap().value_type(), &ValueType::Text);
    }
}
