//! Interceptor pipeline for property access.
//!
//! A get or set on a configuration instance runs an ordered chain of
//! interceptors. Each interceptor sees a mutable context and may supply a
//! value, stop the chain by clearing `can_continue`, or abort the whole call
//! with an error.
//!
//! ## Order
//!
//! | Stage | Priority | Role |
//! |---|---|---|
//! | [`Stage::WriteProtection`] | 0 | reject writes to protected names |
//! | [`Stage::Transaction`] | 100 | redirect reads and writes to the overlay |
//! | [`Stage::BackingStore`] | 1000 | committed storage and default fallback |
//! | [`Stage::ChangeTracking`] | 2000 | record changed names |
//! | [`Stage::ChangeEvents`] | 3000 | queue change notifications |
//!
//! Write protection runs first so a rejected write leaves no trace. The
//! transaction stage stops the chain while a transaction is open, so overlay
//! writes never reach storage, tracking or events.

mod backing;
mod events;
mod protection;
mod tracking;
mod transaction;

pub use backing::BackingStore;
pub use events::{ChangeEvents, ChangeListener, ListenerKind, PropertyChange, SubscriptionId};
pub use protection::WriteProtection;
pub use tracking::ChangeTracker;
pub use transaction::TransactionOverlay;

use std::sync::Arc;

use crate::Result;
use crate::convert::ConverterRegistry;
use crate::descriptor::PropertyDescriptor;
use crate::value::Value;

/// Position of an interceptor in the chain. Lower runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    WriteProtection = 0,
    Transaction = 100,
    BackingStore = 1000,
    ChangeTracking = 2000,
    ChangeEvents = 3000,
}

impl Stage {
    pub fn priority(self) -> u16 {
        self as u16
    }
}

/// State passed along the getter chain.
#[derive(Debug)]
pub struct GetContext<'a> {
    pub descriptor: &'a Arc<PropertyDescriptor>,
    pub value: Value,
    /// The value came from storage rather than a default
    pub has_value: bool,
    pub can_continue: bool,
}

/// State passed along the setter chain.
#[derive(Debug)]
pub struct SetContext<'a> {
    pub descriptor: &'a Arc<PropertyDescriptor>,
    pub new_value: Value,
    pub old_value: Value,
    pub has_old_value: bool,
    pub can_continue: bool,
}

impl SetContext<'_> {
    /// The write actually changes the stored value.
    pub fn is_change(&self) -> bool {
        !self.has_old_value || self.new_value != self.old_value
    }
}

/// One stage of the property access chain.
pub trait Interceptor: Send {
    fn stage(&self) -> Stage;

    fn on_get(&mut self, _ctx: &mut GetContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_set(&mut self, _ctx: &mut SetContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Outcome of a lookup: the value and whether it came from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub value: Value,
    pub found: bool,
}

/// All behavior modules of one configuration instance.
pub struct Pipeline {
    pub protection: WriteProtection,
    pub transaction: TransactionOverlay,
    pub store: BackingStore,
    pub tracker: ChangeTracker,
    pub events: ChangeEvents,
}

impl Pipeline {
    pub fn new(section: impl Into<String>, registry: Arc<ConverterRegistry>) -> Self {
        Self {
            protection: WriteProtection::default(),
            transaction: TransactionOverlay::default(),
            store: BackingStore::new(registry),
            tracker: ChangeTracker::default(),
            events: ChangeEvents::new(section),
        }
    }

    fn chain(&mut self) -> [&mut dyn Interceptor; 5] {
        let mut chain: [&mut dyn Interceptor; 5] = [
            &mut self.protection,
            &mut self.transaction,
            &mut self.store,
            &mut self.tracker,
            &mut self.events,
        ];
        chain.sort_by_key(|interceptor| interceptor.stage());
        chain
    }

    /// Run the getter chain.
    pub fn get(&mut self, descriptor: &Arc<PropertyDescriptor>) -> Result<Lookup> {
        let mut ctx = GetContext {
            descriptor,
            value: Value::Null,
            has_value: false,
            can_continue: true,
        };
        for interceptor in self.chain() {
            interceptor.on_get(&mut ctx)?;
            if !ctx.can_continue {
                break;
            }
        }
        Ok(Lookup {
            value: ctx.value,
            found: ctx.has_value,
        })
    }

    /// Run the setter chain with an already coerced value.
    pub fn set(&mut self, descriptor: &Arc<PropertyDescriptor>, value: Value) -> Result<()> {
        let mut ctx = SetContext {
            descriptor,
            new_value: value,
            old_value: Value::Null,
            has_old_value: false,
            can_continue: true,
        };
        for interceptor in self.chain() {
            interceptor.on_set(&mut ctx)?;
            if !ctx.can_continue {
                break;
            }
        }
        Ok(())
    }

    /// Changing notifications for a write of `value`, computed before the
    /// write runs. Empty when the write would stay in a transaction overlay
    /// or would not change the stored value. Protected names are rejected.
    pub fn announce(
        &self,
        descriptor: &Arc<PropertyDescriptor>,
        value: &Value,
    ) -> Result<Vec<(ChangeListener, PropertyChange)>> {
        self.protection.check(descriptor.name())?;
        if self.transaction.is_active() {
            return Ok(Vec::new());
        }
        let old_value = self.store.get(descriptor.name()).cloned();
        if old_value.as_ref() == Some(value) {
            return Ok(Vec::new());
        }
        Ok(self.events.changing(descriptor.name(), old_value, value))
    }

    /// Drop a stored value entirely. Protected names are rejected.
    pub fn remove(&mut self, descriptor: &Arc<PropertyDescriptor>) -> Result<()> {
        self.protection.check(descriptor.name())?;
        if self.store.remove(descriptor.name()).is_some() {
            self.tracker.mark(descriptor.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::value::ValueType;

    fn prop(name: &str) -> Arc<PropertyDescriptor> {
        Arc::new(
            PropertyDescriptor::builder(name, ValueType::Integer)
                .default_value(7)
                .build(),
        )
    }

    fn pipeline() -> Pipeline {
        Pipeline::new("Test", Arc::new(ConverterRegistry::new()))
    }

    #[test]
    fn test_chain_is_sorted_by_priority() {
        let mut p = pipeline();
        let stages: Vec<u16> = p.chain().iter().map(|i| i.stage().priority()).collect();
        assert_eq!(stages, vec![0, 100, 1000, 2000, 3000]);
    }

    #[test]
    fn test_missing_value_falls_back_to_default() {
        let mut p = pipeline();
        let lookup = p.get(&prop("A")).unwrap();
        assert_eq!(lookup.value, Value::Integer(7));
        assert!(!lookup.found);
    }

    #[test]
    fn test_set_then_get() {
        let mut p = pipeline();
        let a = prop("A");
        p.set(&a, Value::Integer(3)).unwrap();
        let lookup = p.get(&a).unwrap();
        assert_eq!(lookup.value, Value::Integer(3));
        assert!(lookup.found);
    }

    #[test]
    fn test_rejected_write_leaves_no_trace() {
        let mut p = pipeline();
        let a = prop("A");
        p.tracker.enable();
        p.protection.protect("A");
        let err = p.set(&a, Value::Integer(3)).unwrap_err();
        assert!(matches!(err, Error::WriteProtected(_)));
        assert!(!p.tracker.has_changes());
        assert!(!p.get(&a).unwrap().found);
    }

    #[test]
    fn test_transaction_writes_bypass_store() {
        let mut p = pipeline();
        let a = prop("A");
        p.set(&a, Value::Integer(1)).unwrap();
        p.tracker.enable();
        p.transaction.start();
        p.set(&a, Value::Integer(2)).unwrap();
        assert_eq!(p.store.get("A"), Some(&Value::Integer(1)));
        assert_eq!(p.get(&a).unwrap().value, Value::Integer(2));
        assert!(!p.tracker.has_changes());

        for (descriptor, value) in p.transaction.finish() {
            p.set(&descriptor, value).unwrap();
        }
        assert_eq!(p.store.get("A"), Some(&Value::Integer(2)));
        assert!(p.tracker.is_changed("A"));
        assert!(!p.transaction.is_active());
    }

    #[test]
    fn test_announce_sees_value_before_write() {
        let mut p = pipeline();
        let a = prop("A");
        p.set(&a, Value::Integer(1)).unwrap();
        p.events
            .subscribe(ListenerKind::Changing, Arc::new(|_: &PropertyChange| {}));

        let pending = p.announce(&a, &Value::Integer(2)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1.old_value, Some(Value::Integer(1)));
        assert_eq!(p.store.get("A"), Some(&Value::Integer(1)));

        assert!(p.announce(&a, &Value::Integer(1)).unwrap().is_empty());
        p.transaction.start();
        assert!(p.announce(&a, &Value::Integer(3)).unwrap().is_empty());
        p.protection.protect("A");
        assert!(p.announce(&a, &Value::Integer(3)).is_err());
    }

    #[test]
    fn test_remove_drops_value() {
        let mut p = pipeline();
        let a = prop("A");
        p.set(&a, Value::Integer(1)).unwrap();
        p.remove(&a).unwrap();
        assert!(p.store.get("A").is_none());
    }
}
