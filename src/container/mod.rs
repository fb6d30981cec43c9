//! Layered persistence.
//!
//! An [`IniContainer`] owns the sections of one application file and fills
//! them from three layers: `{name}-defaults.ini`, `{name}.ini` and
//! `{name}-constants.ini`, in increasing precedence. Constants are applied
//! while write-protecting, so they cannot be overwritten at runtime. Saving
//! writes only the user file.
//!
//! Structural operations (load, save, reload, reset) are serialized by one
//! async gate per container. Autosave and file watching run as background
//! tasks started by the first load.

mod autosave;
mod options;
#[cfg(feature = "watch")]
mod watch;

pub use options::{
    DEFAULT_AUTOSAVE_INTERVAL, DEFAULT_WATCH_DEBOUNCE, ErrorDisposition, ErrorHandler, IniOptions,
    IniPaths, default_error_handler,
};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::convert::ConverterRegistry;
use crate::descriptor::{DescriptorCache, PropertyDescriptor, SectionDescriptor};
use crate::ini::{IniDocument, IniValue, map_section_name};
use crate::instance::{ConfigInstance, HookPoint, Section};
use crate::{Error, Result};

/// The three precedence layers, lowest first.
#[derive(Debug, Clone, Default)]
pub struct Layers {
    pub defaults: IniDocument,
    pub file: IniDocument,
    pub constants: IniDocument,
}

#[derive(Default)]
struct ContainerState {
    layers: Arc<Layers>,
    sections: BTreeMap<String, ConfigInstance>,
    loaded: bool,
}

pub(crate) struct ContainerInner {
    options: IniOptions,
    paths: IniPaths,
    registry: Arc<ConverterRegistry>,
    descriptors: DescriptorCache,
    gate: tokio::sync::Mutex<()>,
    /// Serializes filling sections from the layers, including the fill of
    /// a section registered outside the gate. Reentrant so load hooks may
    /// register further sections.
    fill_lock: ReentrantMutex<()>,
    state: RwLock<ContainerState>,
    /// Sections currently being filled; autosave waits while non-zero
    filling: AtomicUsize,
    watch_paused: AtomicBool,
    last_written: Mutex<Option<Vec<u8>>>,
    background_started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Sections persisted to one layered ini file.
#[derive(Clone)]
pub struct IniContainer {
    inner: Arc<ContainerInner>,
}

impl std::fmt::Debug for IniContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IniContainer")
            .field("file", &self.inner.paths.file)
            .field("sections", &self.section_names())
            .finish()
    }
}

struct FillGuard<'a>(&'a AtomicUsize);

impl<'a> FillGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for FillGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl IniContainer {
    pub fn new(options: IniOptions) -> Self {
        Self::with_registry(options, ConverterRegistry::new())
    }

    /// Create a container whose instances use `registry` for conversions.
    pub fn with_registry(options: IniOptions, registry: ConverterRegistry) -> Self {
        let paths = options.paths();
        Self {
            inner: Arc::new(ContainerInner {
                options,
                paths,
                registry: Arc::new(registry),
                descriptors: DescriptorCache::new(),
                gate: tokio::sync::Mutex::new(()),
                fill_lock: ReentrantMutex::new(()),
                state: RwLock::new(ContainerState::default()),
                filling: AtomicUsize::new(0),
                watch_paused: AtomicBool::new(false),
                last_written: Mutex::new(None),
                background_started: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    pub fn options(&self) -> &IniOptions {
        &self.inner.options
    }

    pub fn application(&self) -> &str {
        self.inner.options.application()
    }

    pub fn name(&self) -> &str {
        self.inner.options.name()
    }

    pub fn paths(&self) -> &IniPaths {
        &self.inner.paths
    }

    /// Snapshot of the layers as last read.
    pub fn layers(&self) -> Arc<Layers> {
        Arc::clone(&self.inner.state.read().layers)
    }

    // -- Sections --------------------------------------------------------------

    /// Register a section. Returns the existing instance when one with the
    /// same name is already registered. After a load the new instance is
    /// filled from the layers immediately.
    pub fn register(&self, descriptor: Arc<SectionDescriptor>) -> Result<ConfigInstance> {
        if let Some(existing) = self.try_get(descriptor.name()) {
            return Ok(existing);
        }
        // A fill running concurrently either sees this section in the map
        // or has finished before our layer snapshot is taken.
        let _fill = self.inner.fill_lock.lock();
        let instance = ConfigInstance::with_registry(descriptor, Arc::clone(&self.inner.registry))?;
        instance.track_changes();

        let (layers, loaded) = {
            let state = self.inner.state.read();
            (Arc::clone(&state.layers), state.loaded)
        };
        if loaded {
            self.fill_section(&instance, &layers)?;
        }

        let mut state = self.inner.state.write();
        if let Some(existing) = find_section(&state.sections, instance.name()) {
            return Ok(existing.clone());
        }
        state
            .sections
            .insert(instance.name().to_string(), instance.clone());
        tracing::debug!(section = instance.name(), "Registered section");
        Ok(instance)
    }

    /// Typed access to a section, registering it on first use.
    pub fn section<T: Section>(&self) -> Result<T> {
        let descriptor = self.inner.descriptors.get_or_build::<T>(T::describe);
        self.register(descriptor).map(T::bind)
    }

    /// Register a section described by the keys found in the layers.
    pub fn register_untyped(&self, name: &str) -> Result<ConfigInstance> {
        self.register_untyped_with_keys(name, &[])
    }

    /// Like [`register_untyped`](Self::register_untyped), adding `extra`
    /// keys. With extra keys the section need not exist in any layer.
    pub fn register_untyped_with_keys(&self, name: &str, extra: &[&str]) -> Result<ConfigInstance> {
        if let Some(existing) = self.try_get(name) {
            if extra.iter().all(|k| existing.descriptor().property_by_ini_key(k).is_some()) {
                return Ok(existing);
            }
            return Err(Error::UnknownProperty(format!("{}.{}", name, extra.join(","))));
        }
        let layers = self.layers();
        let mut found = !extra.is_empty();
        let mut keys: Vec<String> = extra.iter().map(|k| k.to_string()).collect();
        for doc in [&layers.defaults, &layers.file, &layers.constants] {
            let Some(section) = doc.section(name) else {
                continue;
            };
            found = true;
            for key in section.keys() {
                if !keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                    keys.push(key.to_string());
                }
            }
        }
        if !found {
            return Err(Error::UnknownSection(name.to_string()));
        }
        self.register(Arc::new(SectionDescriptor::untyped(name, keys)))
    }

    /// Register every section present in any layer that is not registered yet.
    pub fn register_all_untyped(&self) -> Result<Vec<ConfigInstance>> {
        let layers = self.layers();
        let mut names: Vec<String> = Vec::new();
        for doc in [&layers.defaults, &layers.file, &layers.constants] {
            for name in doc.section_names() {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    names.push(name.to_string());
                }
            }
        }
        names.iter().map(|n| self.register_untyped(n)).collect()
    }

    pub fn try_get(&self, name: &str) -> Option<ConfigInstance> {
        find_section(&self.inner.state.read().sections, name).cloned()
    }

    pub fn get(&self, name: &str) -> Result<ConfigInstance> {
        self.try_get(name)
            .ok_or_else(|| Error::UnknownSection(name.to_string()))
    }

    pub fn section_names(&self) -> Vec<String> {
        self.inner.state.read().sections.keys().cloned().collect()
    }

    /// Registered instances sorted by section name.
    pub fn sections(&self) -> Vec<ConfigInstance> {
        self.inner.state.read().sections.values().cloned().collect()
    }

    pub fn on_before_load<T: Section>(&self, hook: impl Fn(&T) + Send + Sync + 'static) -> Result<()> {
        self.add_hook::<T>(HookPoint::BeforeLoad, hook)
    }

    pub fn on_after_load<T: Section>(&self, hook: impl Fn(&T) + Send + Sync + 'static) -> Result<()> {
        self.add_hook::<T>(HookPoint::AfterLoad, hook)
    }

    pub fn on_before_save<T: Section>(&self, hook: impl Fn(&T) + Send + Sync + 'static) -> Result<()> {
        self.add_hook::<T>(HookPoint::BeforeSave, hook)
    }

    pub fn on_after_save<T: Section>(&self, hook: impl Fn(&T) + Send + Sync + 'static) -> Result<()> {
        self.add_hook::<T>(HookPoint::AfterSave, hook)
    }

    fn add_hook<T: Section>(
        &self,
        point: HookPoint,
        hook: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<()> {
        let section = self.section::<T>()?;
        section.instance().add_hook(
            point,
            Arc::new(move |instance: &ConfigInstance| hook(&T::bind(instance.clone()))),
        );
        Ok(())
    }

    // -- Load ------------------------------------------------------------------

    /// Read all layers and fill every registered section.
    pub async fn load(&self) -> Result<()> {
        self.load_with_cancel(&CancellationToken::new()).await
    }

    pub async fn load_with_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        let _gate = self.inner.gate.lock().await;
        let layers = self.read_layers(cancel).await?;
        let result = self.fill_all(&layers, cancel);
        self.start_background();
        result
    }

    /// Replace the file layer with ini text from `reader` and refill.
    pub async fn load_from_reader<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<()> {
        let _gate = self.inner.gate.lock().await;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let text = self.inner.options.encoding.decode(&bytes)?;
        let file = IniDocument::parse(&text)?;
        let layers = {
            let mut state = self.inner.state.write();
            Arc::make_mut(&mut state.layers).file = file;
            state.loaded = true;
            Arc::clone(&state.layers)
        };
        self.fill_all(&layers, &CancellationToken::new())
    }

    /// Re-read the layers and re-apply them. With `reset`, every section is
    /// first restored to its defaults so keys removed from the file revert.
    pub async fn reload(&self, reset: bool) -> Result<()> {
        let _gate = self.inner.gate.lock().await;
        let cancel = CancellationToken::new();
        if reset {
            self.reset_sections(&self.layers())?;
        }
        let layers = self.read_layers(&cancel).await?;
        tracing::info!(file = %self.inner.paths.file.display(), reset, "Reloaded ini layers");
        self.fill_all(&layers, &cancel)
    }

    /// Restore defaults, then re-apply the defaults and constants layers.
    pub async fn reset(&self) -> Result<()> {
        let _gate = self.inner.gate.lock().await;
        self.reset_sections(&self.layers())
    }

    async fn read_layers(&self, cancel: &CancellationToken) -> Result<Arc<Layers>> {
        let paths = &self.inner.paths;
        let constants = self.read_document(&paths.constants, cancel).await?;
        let defaults = self.read_document(&paths.defaults, cancel).await?;
        let file = self.read_document(&paths.file, cancel).await?;
        let layers = Arc::new(Layers {
            defaults,
            file,
            constants,
        });
        let mut state = self.inner.state.write();
        state.layers = Arc::clone(&layers);
        state.loaded = true;
        Ok(layers)
    }

    async fn read_document(&self, path: &Path, cancel: &CancellationToken) -> Result<IniDocument> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Ini file missing, using empty layer");
                return Ok(IniDocument::new());
            }
            Err(e) => return Err(e.into()),
        };
        let text = self.inner.options.encoding.decode(&bytes)?;
        let doc = IniDocument::parse_with_cancel(&text, cancel)?;
        tracing::info!(path = %path.display(), "Read ini file");
        Ok(doc)
    }

    fn fill_all(&self, layers: &Layers, cancel: &CancellationToken) -> Result<()> {
        let _fill = self.inner.fill_lock.lock();
        let mut first_error = None;
        for instance in self.sections() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Err(e) = self.fill_section(&instance, layers) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn fill_section(&self, instance: &ConfigInstance, layers: &Layers) -> Result<()> {
        let _filling = FillGuard::new(&self.inner.filling);
        instance.run_hooks(HookPoint::BeforeLoad);
        instance.remove_write_protection();

        let mut first_error = None;
        for layer in [&layers.defaults, &layers.file] {
            if let Err(e) = self.apply_layer(instance, layer) {
                first_error.get_or_insert(e);
            }
        }
        instance.start_write_protecting();
        if let Err(e) = self.apply_layer(instance, &layers.constants) {
            first_error.get_or_insert(e);
        }
        instance.stop_write_protecting();

        instance.run_hooks(HookPoint::AfterLoad);
        instance.reset_has_changes();
        tracing::debug!(section = instance.name(), "Filled section");
        first_error.map_or(Ok(()), Err)
    }

    /// Set every property found in `layer`. Errors go through the read
    /// handler; the first raised error is returned after the whole section.
    fn apply_layer(&self, instance: &ConfigInstance, layer: &IniDocument) -> Result<()> {
        let section = layer.section(instance.name());
        let mut first_error = None;
        for property in instance.descriptor().properties() {
            if !property.read_enabled() {
                continue;
            }
            let result = if property.value_type().is_map() {
                let dedicated = layer.section(&map_section_name(instance.name(), property.ini_key()));
                match (dedicated, section.and_then(|s| s.get(property.ini_key()))) {
                    (Some(entries), _) => self
                        .inner
                        .registry
                        .map_from_entries(property, entries.iter())
                        .and_then(|value| instance.set(property.name(), value)),
                    (None, Some(text)) => instance.set_text(property.name(), text),
                    (None, None) => continue,
                }
            } else {
                match section.and_then(|s| s.get(property.ini_key())) {
                    Some(text) => instance.set_text(property.name(), text),
                    None => continue,
                }
            };
            if let Err(e) = result {
                self.handle_error(&self.inner.options.read_error_handler, instance, property, e, &mut first_error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn handle_error(
        &self,
        handler: &ErrorHandler,
        instance: &ConfigInstance,
        property: &PropertyDescriptor,
        error: Error,
        first_error: &mut Option<Error>,
    ) {
        match handler(instance, property, &error) {
            ErrorDisposition::Ignore => tracing::warn!(
                section = instance.name(),
                property = property.name(),
                error = %error,
                "Ignoring property error"
            ),
            ErrorDisposition::Raise => {
                first_error.get_or_insert(error);
            }
        }
    }

    fn reset_sections(&self, layers: &Layers) -> Result<()> {
        let _fill = self.inner.fill_lock.lock();
        let mut first_error = None;
        for instance in self.sections() {
            let _filling = FillGuard::new(&self.inner.filling);
            instance.rollback_transaction();
            instance.remove_write_protection();
            for name in instance.property_names() {
                if let Err(e) = instance.restore_to_default(name) {
                    first_error.get_or_insert(e);
                }
            }
            if let Err(e) = self.apply_layer(&instance, &layers.defaults) {
                first_error.get_or_insert(e);
            }
            instance.start_write_protecting();
            if let Err(e) = self.apply_layer(&instance, &layers.constants) {
                first_error.get_or_insert(e);
            }
            instance.stop_write_protecting();
            instance.reset_has_changes();
        }
        first_error.map_or(Ok(()), Err)
    }

    // -- Save ------------------------------------------------------------------

    /// Write every section to the user file.
    pub async fn save(&self) -> Result<()> {
        self.save_with_cancel(&CancellationToken::new()).await
    }

    /// Save, checking `cancel` between sections. Sections rendered before
    /// cancellation are still written.
    pub async fn save_with_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        let _gate = self.inner.gate.lock().await;
        self.save_locked(cancel).await
    }

    async fn save_locked(&self, cancel: &CancellationToken) -> Result<()> {
        let (doc, staged) = self.stage();
        let (text, cancelled) = self.render(&doc, Some(cancel));
        self.write_file(&text).await?;
        if cancelled {
            return Err(Error::Cancelled);
        }
        staged
    }

    /// Write the merged user file as ini text to `writer`.
    pub async fn save_to_writer<W: AsyncWrite + Unpin>(&self, mut writer: W) -> Result<()> {
        let _gate = self.inner.gate.lock().await;
        let (doc, staged) = self.stage();
        let (text, _) = self.render(&doc, None);
        writer
            .write_all(&self.inner.options.encoding.encode(&text))
            .await?;
        writer.flush().await?;
        staged
    }

    /// Stage all sections into a copy of the file layer and store it back.
    /// Returns the document and the first raised staging error.
    fn stage(&self) -> (IniDocument, Result<()>) {
        let layers = self.layers();
        let mut doc = layers.file.clone();
        let mut first_error = None;
        for instance in self.sections() {
            instance.run_hooks(HookPoint::BeforeSave);
            let result = self.stage_section(&instance, &layers, &mut doc);
            instance.run_hooks(HookPoint::AfterSave);
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        doc.prune_empty();
        Arc::make_mut(&mut self.inner.state.write().layers).file = doc.clone();
        (doc, first_error.map_or(Ok(()), Err))
    }

    fn stage_section(&self, instance: &ConfigInstance, layers: &Layers, doc: &mut IniDocument) -> Result<()> {
        if self.inner.options.write_comments {
            if let Some(description) = instance.descriptor().description() {
                doc.section_mut(instance.name()).comment = Some(description.to_string());
            }
        }
        let mut first_error = None;
        for value in instance.ini_values() {
            if let Err(e) = self.stage_value(&value, layers, doc) {
                self.handle_error(
                    &self.inner.options.write_error_handler,
                    instance,
                    value.descriptor(),
                    e,
                    &mut first_error,
                );
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn stage_value(&self, value: &IniValue, layers: &Layers, doc: &mut IniDocument) -> Result<()> {
        let property = value.descriptor();
        let section = value.section();
        let key = property.ini_key();

        // Constants are never copied into the user file.
        let dedicated = map_section_name(section, key);
        let is_map = property.value_type().is_map();
        if layers.constants.get(section, key).is_some()
            || (is_map && layers.constants.section(&dedicated).is_some())
        {
            return Ok(());
        }

        if is_map {
            doc.remove(section, key);
            doc.remove_section(&dedicated);
            if !value.is_write_needed()? {
                return Ok(());
            }
            let entries = self.inner.registry.map_entries(property, &value.value()?)?;
            let target = doc.section_mut(&dedicated);
            for (k, text) in entries {
                target.set(k, text);
            }
            return Ok(());
        }

        let text = value.text()?;
        let from_defaults = layers.defaults.get(section, key) == Some(text.as_str());
        if !value.is_write_needed()? || from_defaults {
            doc.remove(section, key);
            return Ok(());
        }
        let target = doc.section_mut(section);
        target.set(key, text);
        if self.inner.options.write_comments {
            if let Some(description) = property.description() {
                target.set_comment(key, Some(description.to_string()));
            }
        }
        Ok(())
    }

    fn render(&self, doc: &IniDocument, cancel: Option<&CancellationToken>) -> (String, bool) {
        let mut out = String::new();
        for (i, (name, section)) in doc.sections().enumerate() {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                tracing::warn!(written = i, "Save cancelled, writing partial file");
                return (out, true);
            }
            if i > 0 {
                out.push('\n');
            }
            section.render(name, self.inner.options.write_comments, &mut out);
        }
        (out, cancel.is_some_and(|c| c.is_cancelled()))
    }

    async fn write_file(&self, text: &str) -> Result<()> {
        let paths = &self.inner.paths;
        let bytes = self.inner.options.encoding.encode(text);
        tokio::fs::create_dir_all(&paths.directory).await?;

        self.inner.watch_paused.store(true, Ordering::SeqCst);
        *self.inner.last_written.lock() = Some(digest(&bytes));
        let tmp = temp_path(&paths.file);
        let result = async {
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, &paths.file).await?;
            Ok::<(), Error>(())
        }
        .await;
        self.inner.watch_paused.store(false, Ordering::SeqCst);

        result?;
        tracing::info!(path = %paths.file.display(), bytes = bytes.len(), "Saved ini file");
        Ok(())
    }

    // -- Background tasks ------------------------------------------------------

    fn start_background(&self) {
        if self.inner.background_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut tasks = self.inner.tasks.lock();
        if let Some(interval) = self.inner.options.autosave_interval {
            tasks.push(autosave::spawn(
                Arc::downgrade(&self.inner),
                interval,
                self.inner.shutdown.clone(),
            ));
        }
        #[cfg(feature = "watch")]
        if self.inner.options.watch {
            match watch::spawn(
                Arc::downgrade(&self.inner),
                self.inner.paths.clone(),
                self.inner.options.watch_debounce,
                self.inner.shutdown.clone(),
            ) {
                Ok(handle) => tasks.push(handle),
                Err(e) => tracing::warn!(error = %e, "File watch unavailable"),
            }
        }
    }

    /// Save when any section has unsaved changes. Returns whether it saved.
    ///
    /// Change flags are taken before staging, so a write racing with the
    /// save stays flagged for the next round. A failed save restores them.
    pub(crate) async fn autosave(&self) -> Result<bool> {
        let _gate = self.inner.gate.lock().await;
        if self.inner.filling.load(Ordering::SeqCst) > 0 {
            return Ok(false);
        }
        let sections = self.sections();
        if !sections.iter().any(|s| s.has_changes()) {
            return Ok(false);
        }
        let taken: Vec<(ConfigInstance, Vec<String>)> = sections
            .into_iter()
            .map(|s| {
                let names = s.take_changes();
                (s, names)
            })
            .collect();
        if let Err(e) = self.save_locked(&CancellationToken::new()).await {
            for (section, names) in &taken {
                section.restore_changes(names);
            }
            return Err(e);
        }
        tracing::debug!("Autosaved ini file");
        Ok(true)
    }

    /// React to changes of the layer files on disk.
    pub(crate) async fn on_files_changed(&self, touched: &[PathBuf]) -> Result<()> {
        if self.inner.watch_paused.load(Ordering::SeqCst) {
            tracing::debug!("Ignoring file event during own write");
            return Ok(());
        }
        if touched.iter().all(|p| self.inner.paths.is_primary(p)) {
            let current = tokio::fs::read(&self.inner.paths.file)
                .await
                .ok()
                .map(|bytes| digest(&bytes));
            let last = self.inner.last_written.lock().clone();
            if current.is_some() && current == last {
                tracing::debug!("Ignoring file event for own write");
                return Ok(());
            }
        }
        tracing::info!(file = %self.inner.paths.file.display(), "Ini files changed on disk");
        self.reload(false).await
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Background task failed");
            }
        }
    }
}

fn find_section<'a>(
    sections: &'a BTreeMap<String, ConfigInstance>,
    name: &str,
) -> Option<&'a ConfigInstance> {
    sections.get(name).or_else(|| {
        sections
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, s)| s)
    })
}

fn digest(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
