//! Configuration instances.
//!
//! A [`ConfigInstance`] is the live object behind one section. It owns the
//! pipeline state for the section's properties and exposes the operations of
//! every behavior module. Handles are cheap to clone and share the same state.
//!
//! Typed access goes through hand-written structs implementing [`Section`],
//! whose accessors delegate to [`ConfigInstance::get_as`] and
//! [`ConfigInstance::set`].

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

use crate::convert::ConverterRegistry;
use crate::descriptor::{PropertyDescriptor, SectionDescriptor};
use crate::ini::IniValue;
use crate::pipeline::{
    ChangeListener, ListenerKind, Lookup, Pipeline, PropertyChange, SubscriptionId,
};
use crate::value::{FromValue, Value};
use crate::{Error, Result};

/// A typed view over a configuration instance.
pub trait Section: Sized + Send + Sync + 'static {
    /// Describe the section. Called once per container; the result is cached.
    fn describe() -> SectionDescriptor;

    /// Wrap a live instance.
    fn bind(instance: ConfigInstance) -> Self;

    /// The wrapped instance.
    fn instance(&self) -> &ConfigInstance;
}

/// Callback run around loading or saving a section.
pub type SectionHook = Arc<dyn Fn(&ConfigInstance) + Send + Sync>;

/// When a [`SectionHook`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    BeforeLoad,
    AfterLoad,
    BeforeSave,
    AfterSave,
}

#[derive(Default)]
struct SectionHooks {
    before_load: Vec<SectionHook>,
    after_load: Vec<SectionHook>,
    before_save: Vec<SectionHook>,
    after_save: Vec<SectionHook>,
}

impl SectionHooks {
    fn slot(&mut self, point: HookPoint) -> &mut Vec<SectionHook> {
        match point {
            HookPoint::BeforeLoad => &mut self.before_load,
            HookPoint::AfterLoad => &mut self.after_load,
            HookPoint::BeforeSave => &mut self.before_save,
            HookPoint::AfterSave => &mut self.after_save,
        }
    }
}

struct InstanceInner {
    descriptor: Arc<SectionDescriptor>,
    registry: Arc<ConverterRegistry>,
    pipeline: Mutex<Pipeline>,
    hooks: RwLock<SectionHooks>,
}

/// Live configuration object for one section.
#[derive(Clone)]
pub struct ConfigInstance {
    inner: Arc<InstanceInner>,
}

impl fmt::Debug for ConfigInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigInstance")
            .field("section", &self.name())
            .finish()
    }
}

impl ConfigInstance {
    /// Create an instance with the built-in converters.
    pub fn new(descriptor: Arc<SectionDescriptor>) -> Result<Self> {
        Self::with_registry(descriptor, Arc::new(ConverterRegistry::new()))
    }

    /// Create an instance and default every property in declaration order.
    pub fn with_registry(
        descriptor: Arc<SectionDescriptor>,
        registry: Arc<ConverterRegistry>,
    ) -> Result<Self> {
        let pipeline = Pipeline::new(descriptor.name(), Arc::clone(&registry));
        let instance = Self {
            inner: Arc::new(InstanceInner {
                descriptor,
                registry,
                pipeline: Mutex::new(pipeline),
                hooks: RwLock::new(SectionHooks::default()),
            }),
        };
        for property in instance.inner.descriptor.properties() {
            instance.restore_to_default(property.name())?;
        }
        Ok(instance)
    }

    /// Section name.
    pub fn name(&self) -> &str {
        self.inner.descriptor.name()
    }

    pub fn descriptor(&self) -> &Arc<SectionDescriptor> {
        &self.inner.descriptor
    }

    pub fn registry(&self) -> &Arc<ConverterRegistry> {
        &self.inner.registry
    }

    /// Both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &ConfigInstance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn property(&self, name: &str) -> Result<&Arc<PropertyDescriptor>> {
        self.inner
            .descriptor
            .property(name)
            .ok_or_else(|| Error::UnknownProperty(format!("{}.{}", self.name(), name)))
    }

    /// Property names in declaration order.
    pub fn property_names(&self) -> Vec<&str> {
        self.inner
            .descriptor
            .properties()
            .iter()
            .map(|p| p.name())
            .collect()
    }

    // -- Access ----------------------------------------------------------------

    /// Run the getter chain, reporting whether the value came from storage.
    pub fn lookup(&self, name: &str) -> Result<Lookup> {
        let property = self.property(name)?;
        self.inner.pipeline.lock().get(property)
    }

    /// Current value of a property.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.lookup(name).map(|l| l.value)
    }

    /// Current value converted to a Rust type; `None` when the property is
    /// unknown or the value does not fit `T`.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<T> {
        self.get(name).ok().and_then(|v| T::from_value(&v))
    }

    /// Set a property. The value is coerced to the declared type first.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let property = self.property(name)?;
        let value = self.inner.registry.coerce(property, value.into())?;
        self.set_coerced(property, value)
    }

    /// Set a property from its ini text form.
    pub fn set_text(&self, name: &str, text: &str) -> Result<()> {
        let property = self.property(name)?;
        let value = self.inner.registry.from_text(property, text)?;
        self.set_coerced(property, value)
    }

    fn set_coerced(&self, property: &Arc<PropertyDescriptor>, value: Value) -> Result<()> {
        tracing::debug!(section = self.name(), property = property.name(), "set");
        let changing = self.inner.pipeline.lock().announce(property, &value)?;
        dispatch(changing);
        let pending = {
            let mut pipeline = self.inner.pipeline.lock();
            pipeline.set(property, value)?;
            pipeline.events.take_pending()
        };
        dispatch(pending);
        Ok(())
    }

    // -- Defaults --------------------------------------------------------------

    /// Default of a property converted to its declared type.
    pub fn default_value_for(&self, name: &str) -> Result<Option<Value>> {
        let property = self.property(name)?;
        self.inner.registry.default_value(property)
    }

    /// Write the default through the full chain. Properties without any
    /// default lose their stored value.
    pub fn restore_to_default(&self, name: &str) -> Result<()> {
        let property = self.property(name)?;
        match self.inner.registry.default_value(property)? {
            Some(value) => self.set_coerced(property, value),
            None => self.inner.pipeline.lock().remove(property),
        }
    }

    pub fn description_for(&self, name: &str) -> Result<Option<&str>> {
        self.property(name).map(|p| p.description())
    }

    pub fn category_for(&self, name: &str) -> Result<Option<&str>> {
        self.property(name).map(|p| p.category())
    }

    pub fn is_tagged_with(&self, name: &str, tag: &str) -> Result<bool> {
        self.property(name).map(|p| p.is_tagged_with(tag))
    }

    pub fn tag_value(&self, name: &str, tag: &str) -> Result<Option<&str>> {
        self.property(name).map(|p| p.tag_value(tag))
    }

    // -- Transactions ----------------------------------------------------------

    /// Open a transaction. Calling it again keeps the current overlay.
    pub fn start_transaction(&self) {
        self.inner.pipeline.lock().transaction.start();
    }

    /// Apply the overlay through the full chain. Without an open transaction
    /// this does nothing.
    /// All values are replayed even when some fail; the first failure is
    /// returned.
    pub fn commit_transaction(&self) -> Result<()> {
        let entries = {
            let mut pipeline = self.inner.pipeline.lock();
            if !pipeline.transaction.is_active() {
                return Ok(());
            }
            pipeline.transaction.finish()
        };
        let mut first_error = None;
        for (property, value) in entries {
            if let Err(e) = self.set_coerced(&property, value) {
                tracing::warn!(property = property.name(), "commit failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Like [`commit_transaction`](Self::commit_transaction) but fails when
    /// no transaction is open.
    pub fn try_commit_transaction(&self) -> Result<()> {
        if !self.is_in_transaction() {
            return Err(Error::NoTransaction);
        }
        self.commit_transaction()
    }

    /// Discard the overlay. Without an open transaction this does nothing.
    pub fn rollback_transaction(&self) {
        self.inner.pipeline.lock().transaction.rollback();
    }

    /// Like [`rollback_transaction`](Self::rollback_transaction) but fails
    /// when no transaction is open.
    pub fn try_rollback_transaction(&self) -> Result<()> {
        let mut pipeline = self.inner.pipeline.lock();
        if !pipeline.transaction.is_active() {
            return Err(Error::NoTransaction);
        }
        pipeline.transaction.rollback();
        Ok(())
    }

    pub fn is_in_transaction(&self) -> bool {
        self.inner.pipeline.lock().transaction.is_active()
    }

    pub fn is_transaction_dirty(&self) -> bool {
        self.inner.pipeline.lock().transaction.is_dirty()
    }

    // -- Write protection ------------------------------------------------------

    pub fn start_write_protecting(&self) {
        self.inner.pipeline.lock().protection.start_protecting();
    }

    pub fn stop_write_protecting(&self) {
        self.inner.pipeline.lock().protection.stop_protecting();
    }

    pub fn write_protect(&self, name: &str) -> Result<()> {
        let property = self.property(name)?;
        self.inner.pipeline.lock().protection.protect(property.name());
        Ok(())
    }

    pub fn disable_write_protect(&self, name: &str) -> Result<()> {
        let property = self.property(name)?;
        self.inner.pipeline.lock().protection.unprotect(property.name());
        Ok(())
    }

    pub fn is_write_protected(&self, name: &str) -> Result<bool> {
        let property = self.property(name)?;
        Ok(self.inner.pipeline.lock().protection.is_protected(property.name()))
    }

    /// Stop protecting and release every protected property.
    pub fn remove_write_protection(&self) {
        self.inner.pipeline.lock().protection.clear();
    }

    // -- Change tracking -------------------------------------------------------

    pub fn track_changes(&self) {
        self.inner.pipeline.lock().tracker.enable();
    }

    pub fn do_not_track_changes(&self) {
        self.inner.pipeline.lock().tracker.disable();
    }

    pub fn has_changes(&self) -> bool {
        self.inner.pipeline.lock().tracker.has_changes()
    }

    /// Sorted names of changed properties.
    pub fn changes(&self) -> Vec<String> {
        self.inner.pipeline.lock().tracker.changes()
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.inner.pipeline.lock().tracker.is_changed(name)
    }

    pub fn reset_has_changes(&self) {
        self.inner.pipeline.lock().tracker.reset();
    }

    /// Clear the changed names and return them in one step, so a write
    /// landing afterwards is tracked again.
    pub fn take_changes(&self) -> Vec<String> {
        self.inner.pipeline.lock().tracker.take()
    }

    /// Mark `names` as changed again, e.g. after a failed save.
    pub(crate) fn restore_changes(&self, names: &[String]) {
        let mut pipeline = self.inner.pipeline.lock();
        for name in names {
            pipeline.tracker.mark(name);
        }
    }

    // -- Change notification ---------------------------------------------------

    /// Notify `listener` of a value change before it is stored.
    pub fn subscribe_changing(
        &self,
        listener: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribe(ListenerKind::Changing, Arc::new(listener))
    }

    /// Notify `listener` of value changes.
    pub fn subscribe_changed(
        &self,
        listener: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribe(ListenerKind::Changed, Arc::new(listener))
    }

    fn subscribe(&self, kind: ListenerKind, listener: ChangeListener) -> SubscriptionId {
        self.inner.pipeline.lock().events.subscribe(kind, listener)
    }

    /// Remove a listener. Returns whether it was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.pipeline.lock().events.unsubscribe(id)
    }

    // -- Ini views and hooks ---------------------------------------------------

    pub fn ini_value(&self, name: &str) -> Result<IniValue> {
        let property = self.property(name)?;
        Ok(IniValue::new(self.clone(), Arc::clone(property)))
    }

    /// Views of every property in declaration order.
    pub fn ini_values(&self) -> Vec<IniValue> {
        self.inner
            .descriptor
            .properties()
            .iter()
            .map(|p| IniValue::new(self.clone(), Arc::clone(p)))
            .collect()
    }

    pub fn add_hook(&self, point: HookPoint, hook: SectionHook) {
        self.inner.hooks.write().slot(point).push(hook);
    }

    pub(crate) fn run_hooks(&self, point: HookPoint) {
        let hooks: Vec<SectionHook> = self.inner.hooks.write().slot(point).clone();
        for hook in hooks {
            hook(self);
        }
    }
}

fn dispatch(pending: Vec<(ChangeListener, PropertyChange)>) {
    for (listener, change) in pending {
        listener(&change);
    }
}
