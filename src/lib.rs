//! iniconf - live configuration objects backed by layered ini files.
//!
//! A section is a declared set of typed properties. Each registered section
//! becomes a [`ConfigInstance`] whose reads and writes run through an ordered
//! interceptor chain (write protection, transactions, backing store, change
//! tracking, change events). An [`IniContainer`] persists instances to one ini
//! file, merging a defaults file, the user file and a constants file.

pub mod cli;
pub mod command;
pub mod container;
pub mod convert;
pub mod descriptor;
pub mod ini;
pub mod instance;
pub mod pipeline;
pub mod value;

pub use container::{IniContainer, IniOptions};
pub use convert::{ConverterRegistry, ValueConverter};
pub use descriptor::{PropertyDescriptor, SectionDescriptor};
pub use ini::{IniDocument, IniValue, TextEncoding};
pub use instance::{ConfigInstance, Section};
pub use pipeline::{PropertyChange, SubscriptionId};
pub use value::{FromValue, Value, ValueType};

/// Test utilities for isolated test environments.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::container::{IniContainer, IniOptions};
    use crate::descriptor::{PropertyDescriptor, SectionDescriptor};
    use crate::instance::{ConfigInstance, Section};
    use crate::value::{Value, ValueType};

    /// Section used across unit tests.
    pub struct CoreSettings(ConfigInstance);

    impl Section for CoreSettings {
        fn describe() -> SectionDescriptor {
            SectionDescriptor::builder("Core")
                .description("Core settings")
                .property(
                    PropertyDescriptor::builder("Name", ValueType::Text)
                        .default_value("Robin")
                        .description("Display name"),
                )
                .property(PropertyDescriptor::builder("Age", ValueType::Integer).default_value(21))
                .property(
                    PropertyDescriptor::builder("Tags", ValueType::list(ValueType::Text))
                        .tag("Expert", None),
                )
                .property(PropertyDescriptor::builder(
                    "Counts",
                    ValueType::map(ValueType::Integer),
                ))
                .property(
                    PropertyDescriptor::builder("Secret", ValueType::Text)
                        .write_enabled(false)
                        .tag("Category", Some("hidden")),
                )
                .property(
                    PropertyDescriptor::builder("Ratio", ValueType::Float)
                        .default_value(0.5)
                        .ignore_errors(true),
                )
                .build()
        }

        fn bind(instance: ConfigInstance) -> Self {
            Self(instance)
        }

        fn instance(&self) -> &ConfigInstance {
            &self.0
        }
    }

    impl CoreSettings {
        pub fn name(&self) -> Option<String> {
            self.0.get_as("Name")
        }

        pub fn age(&self) -> i64 {
            self.0.get_as("Age").unwrap_or_default()
        }
    }

    /// A freshly constructed, unregistered instance of [`CoreSettings`].
    pub fn core_instance() -> ConfigInstance {
        ConfigInstance::new(Arc::new(CoreSettings::describe())).unwrap()
    }

    /// Text value helper.
    pub fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    /// Temporary directory holding ini files for one test.
    pub struct TestEnv {
        pub dir: TempDir,
    }

    impl TestEnv {
        pub fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        /// Options for a container named `app` without background tasks.
        pub fn options(&self) -> IniOptions {
            IniOptions::new("test", "app")
                .directory(self.path())
                .autosave_interval(None)
                .watch(false)
        }

        pub fn container(&self) -> IniContainer {
            IniContainer::new(self.options())
        }

        pub fn write(&self, file_name: &str, content: &str) {
            std::fs::write(self.path().join(file_name), content).unwrap();
        }

        pub fn read(&self, file_name: &str) -> String {
            std::fs::read_to_string(self.path().join(file_name)).unwrap_or_default()
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Library-level error type for iniconf operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "watch")]
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Property is write protected: {0}")]
    WriteProtected(String),

    #[error("No transaction is open")]
    NoTransaction,

    #[error("Cannot convert '{value}' for {property}: {reason}")]
    Conversion {
        property: String,
        value: String,
        reason: String,
    },

    #[error("Type mismatch for {property}: expected {expected}, got {actual}")]
    TypeMismatch {
        property: String,
        expected: String,
        actual: String,
    },

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for iniconf operations.
pub type Result<T> = std::result::Result<T, Error>;
