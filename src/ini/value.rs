//! Per-property ini view.

use serde::Serialize;
use std::sync::Arc;

use crate::Result;
use crate::descriptor::PropertyDescriptor;
use crate::instance::ConfigInstance;
use crate::value::Value;

/// A property of a live instance seen from the file's perspective.
#[derive(Debug, Clone)]
pub struct IniValue {
    instance: ConfigInstance,
    descriptor: Arc<PropertyDescriptor>,
}

/// Serializable snapshot of an [`IniValue`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IniValueInfo {
    pub section: String,
    pub property: String,
    pub ini_key: String,
    pub value_type: String,
    pub value: Value,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub write_protected: bool,
    pub write_needed: bool,
}

impl IniValue {
    pub fn new(instance: ConfigInstance, descriptor: Arc<PropertyDescriptor>) -> Self {
        Self {
            instance,
            descriptor,
        }
    }

    pub fn instance(&self) -> &ConfigInstance {
        &self.instance
    }

    pub fn descriptor(&self) -> &Arc<PropertyDescriptor> {
        &self.descriptor
    }

    pub fn section(&self) -> &str {
        self.instance.name()
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn ini_key(&self) -> &str {
        self.descriptor.ini_key()
    }

    pub fn description(&self) -> Option<&str> {
        self.descriptor.description()
    }

    pub fn value(&self) -> Result<Value> {
        self.instance.get(self.descriptor.name())
    }

    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.instance.set(self.descriptor.name(), value)
    }

    /// Current value in ini text form.
    pub fn text(&self) -> Result<String> {
        let value = self.value()?;
        self.instance.registry().to_text(&self.descriptor, &value)
    }

    pub fn set_text(&self, text: &str) -> Result<()> {
        self.instance.set_text(self.descriptor.name(), text)
    }

    pub fn default_value(&self) -> Result<Option<Value>> {
        self.instance.registry().default_value(&self.descriptor)
    }

    /// Whether saving should write this property.
    pub fn is_write_needed(&self) -> Result<bool> {
        if !self.descriptor.write_enabled() {
            return Ok(false);
        }
        if self.descriptor.emit_default() {
            return Ok(true);
        }
        let default = self.default_value()?.unwrap_or_default();
        Ok(self.value()? != default)
    }

    /// Restore the default through the full chain.
    pub fn reset(&self) -> Result<()> {
        self.instance.restore_to_default(self.descriptor.name())
    }

    pub fn info(&self) -> Result<IniValueInfo> {
        Ok(IniValueInfo {
            section: self.section().to_string(),
            property: self.name().to_string(),
            ini_key: self.ini_key().to_string(),
            value_type: self.descriptor.value_type().to_string(),
            value: self.value()?,
            text: self.text()?,
            default: self.default_value()?,
            description: self.description().map(str::to_string),
            write_protected: self.instance.is_write_protected(self.name())?,
            write_needed: self.is_write_needed()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::core_instance;
    use crate::value::Value;

    #[test]
    fn test_write_needed_only_when_changed() {
        let core = core_instance();
        let age = core.ini_value("Age").unwrap();
        assert!(!age.is_write_needed().unwrap());
        age.set_value(30).unwrap();
        assert!(age.is_write_needed().unwrap());
        age.reset().unwrap();
        assert_eq!(age.value().unwrap(), Value::Integer(21));
    }

    #[test]
    fn test_write_disabled_never_written() {
        let core = core_instance();
        let secret = core.ini_value("Secret").unwrap();
        secret.set_value("x").unwrap();
        assert!(!secret.is_write_needed().unwrap());
    }

    #[test]
    fn test_text_form() {
        let core = core_instance();
        core.set("Tags", vec!["a", "b"]).unwrap();
        let tags = core.ini_value("Tags").unwrap();
        assert_eq!(tags.text().unwrap(), "a,b");
        tags.set_text("c, d").unwrap();
        assert_eq!(tags.value().unwrap(), Value::from(vec!["c", "d"]));
    }

    #[test]
    fn test_info_snapshot() {
        let core = core_instance();
        let info = core.ini_value("Name").unwrap().info().unwrap();
        assert_eq!(info.section, "Core");
        assert_eq!(info.text, "Robin");
        assert_eq!(info.description.as_deref(), Some("Display name"));
        assert!(!info.write_needed);
    }
}
