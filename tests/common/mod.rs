//! Common test utilities for iniconf integration tests.
//!
//! Provides `TestEnv` for isolated test environments that keep ini files
//! out of the user's configuration directory.

#![allow(dead_code)]

use assert_cmd::Command;
use iniconf::{
    ConfigInstance, IniContainer, IniOptions, PropertyDescriptor, Section, SectionDescriptor,
    ValueType,
};
pub use tempfile::TempDir;

/// Application name used by every test container.
pub const APP: &str = "demo";

/// Base name of the test ini files.
pub const NAME: &str = "settings";

/// A test environment with an isolated ini directory.
///
/// The `iniconf()` method returns a `Command` with `INICONF_DIR`,
/// `INICONF_NAME` and `INICONF_APP` set per invocation, so tests can run in
/// parallel.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Get a Command for the iniconf binary pointed at this environment.
    pub fn iniconf(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_iniconf"));
        cmd.env("INICONF_DIR", self.path());
        cmd.env("INICONF_NAME", NAME);
        cmd.env("INICONF_APP", APP);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Container options without background tasks.
    pub fn options(&self) -> IniOptions {
        IniOptions::new(APP, NAME)
            .directory(self.path())
            .autosave_interval(None)
            .watch(false)
    }

    pub fn container(&self) -> IniContainer {
        IniContainer::new(self.options())
    }

    /// Write `{NAME}{suffix}.ini`, e.g. `write("-defaults", ...)`.
    pub fn write(&self, suffix: &str, content: &str) {
        std::fs::write(self.file(suffix), content).unwrap();
    }

    pub fn read(&self, suffix: &str) -> String {
        std::fs::read_to_string(self.file(suffix)).unwrap_or_default()
    }

    pub fn file(&self, suffix: &str) -> std::path::PathBuf {
        self.path().join(format!("{}{}.ini", NAME, suffix))
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed section used by the library tests.
pub struct Profile(ConfigInstance);

impl Section for Profile {
    fn describe() -> SectionDescriptor {
        SectionDescriptor::builder("Profile")
            .description("User profile")
            .property(
                PropertyDescriptor::builder("Name", ValueType::Text)
                    .default_value("Robin")
                    .description("Display name"),
            )
            .property(PropertyDescriptor::builder("Age", ValueType::Integer).default_value(21))
            .property(PropertyDescriptor::builder(
                "Scores",
                ValueType::map(ValueType::Integer),
            ))
            .property(PropertyDescriptor::builder(
                "Colors",
                ValueType::set(ValueType::choice(["Red", "Green", "Blue"])),
            ))
            .property(
                PropertyDescriptor::builder("Bio", ValueType::Text).ini_key("Biography"),
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

impl Profile {
    pub fn name(&self) -> Option<String> {
        self.0.get_as("Name")
    }

    pub fn set_name(&self, name: &str) -> iniconf::Result<()> {
        self.0.set("Name", name)
    }

    pub fn age(&self) -> i64 {
        self.0.get_as("Age").unwrap_or_default()
    }

    pub fn set_age(&self, age: i64) -> iniconf::Result<()> {
        self.0.set("Age", age)
    }
}
