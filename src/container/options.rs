//! Container configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::Error;
use crate::descriptor::PropertyDescriptor;
use crate::ini::TextEncoding;
use crate::instance::ConfigInstance;

/// Default autosave check interval.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(1);

/// Default quiet period before reacting to file changes.
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// What to do with a conversion error while loading or saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Log and keep going; the property keeps its current value.
    Ignore,
    /// Report the error to the caller.
    Raise,
}

/// Decides how a per-property load or save error is handled.
pub type ErrorHandler =
    Arc<dyn Fn(&ConfigInstance, &PropertyDescriptor, &Error) -> ErrorDisposition + Send + Sync>;

/// Ignore errors on properties flagged `ignore_errors`, raise the rest.
pub fn default_error_handler(
    _: &ConfigInstance,
    property: &PropertyDescriptor,
    _: &Error,
) -> ErrorDisposition {
    if property.ignore_errors() {
        ErrorDisposition::Ignore
    } else {
        ErrorDisposition::Raise
    }
}

/// Settings for an [`IniContainer`](super::IniContainer).
#[derive(Clone)]
pub struct IniOptions {
    pub(crate) application: String,
    pub(crate) name: String,
    pub(crate) directory: Option<PathBuf>,
    pub(crate) encoding: TextEncoding,
    pub(crate) write_comments: bool,
    pub(crate) autosave_interval: Option<Duration>,
    pub(crate) watch: bool,
    pub(crate) watch_debounce: Duration,
    pub(crate) read_error_handler: ErrorHandler,
    pub(crate) write_error_handler: ErrorHandler,
}

impl fmt::Debug for IniOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IniOptions")
            .field("application", &self.application)
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("encoding", &self.encoding)
            .field("write_comments", &self.write_comments)
            .field("autosave_interval", &self.autosave_interval)
            .field("watch", &self.watch)
            .field("watch_debounce", &self.watch_debounce)
            .finish_non_exhaustive()
    }
}

impl IniOptions {
    /// Options for `{name}.ini` belonging to `application`.
    pub fn new(application: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            name: name.into(),
            directory: None,
            encoding: TextEncoding::default(),
            write_comments: true,
            autosave_interval: Some(DEFAULT_AUTOSAVE_INTERVAL),
            watch: true,
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
            read_error_handler: Arc::new(default_error_handler),
            write_error_handler: Arc::new(default_error_handler),
        }
    }

    /// Directory holding the ini files. Defaults to the platform config
    /// directory joined with the application name.
    pub fn directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.directory = Some(directory.as_ref().to_path_buf());
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Write descriptions as `;` comment lines.
    pub fn write_comments(mut self, write: bool) -> Self {
        self.write_comments = write;
        self
    }

    /// How often to check for unsaved changes. `None` disables autosave.
    pub fn autosave_interval(mut self, interval: Option<Duration>) -> Self {
        self.autosave_interval = interval;
        self
    }

    /// Reload when the files change on disk.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    pub fn read_error_handler(
        mut self,
        handler: impl Fn(&ConfigInstance, &PropertyDescriptor, &Error) -> ErrorDisposition
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.read_error_handler = Arc::new(handler);
        self
    }

    pub fn write_error_handler(
        mut self,
        handler: impl Fn(&ConfigInstance, &PropertyDescriptor, &Error) -> ErrorDisposition
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.write_error_handler = Arc::new(handler);
        self
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved directory: explicit, then `{config_dir}/{application}`,
    /// then the working directory.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join(&self.application))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }

    pub(crate) fn paths(&self) -> IniPaths {
        let dir = self.resolved_directory();
        IniPaths {
            file: dir.join(format!("{}.ini", self.name)),
            defaults: dir.join(format!("{}-defaults.ini", self.name)),
            constants: dir.join(format!("{}-constants.ini", self.name)),
            directory: dir,
        }
    }
}

/// Files making up one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniPaths {
    pub directory: PathBuf,
    pub file: PathBuf,
    pub defaults: PathBuf,
    pub constants: PathBuf,
}

// Watch events may report canonicalized directories, so files are matched
// by name.
impl IniPaths {
    pub fn contains(&self, path: &Path) -> bool {
        [&self.file, &self.defaults, &self.constants]
            .iter()
            .any(|p| same_file_name(p, path))
    }

    pub fn is_primary(&self, path: &Path) -> bool {
        same_file_name(&self.file, path)
    }
}

fn same_file_name(a: &Path, b: &Path) -> bool {
    a.file_name().is_some() && a.file_name() == b.file_name()
}
