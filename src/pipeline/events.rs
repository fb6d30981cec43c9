//! Change notification.
//!
//! Listeners subscribe to "changing" or "changed" notifications. Changing
//! notifications are announced before the write reaches the store, so a
//! listener still reads the old value. The stage queues changed
//! notifications for every accepted write that changes a value; the owning
//! instance delivers both after its lock is released.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Interceptor, SetContext, Stage};
use crate::Result;
use crate::value::Value;

/// A property value change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChange {
    pub section: String,
    pub property: String,
    /// `None` when the property had no stored value
    pub old_value: Option<Value>,
    pub new_value: Value,
    pub changed_at: DateTime<Utc>,
}

/// Callback receiving change notifications.
pub type ChangeListener = Arc<dyn Fn(&PropertyChange) + Send + Sync>;

/// Which notification a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Changing,
    Changed,
}

/// Opaque subscription handle used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }
}

pub struct ChangeEvents {
    section: String,
    listeners: Vec<(SubscriptionId, ListenerKind, ChangeListener)>,
    pending: Vec<(ChangeListener, PropertyChange)>,
}

impl ChangeEvents {
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            listeners: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, kind: ListenerKind, listener: ChangeListener) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.listeners.push((id, kind, listener));
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Hand out queued notifications in delivery order.
    pub fn take_pending(&mut self) -> Vec<(ChangeListener, PropertyChange)> {
        std::mem::take(&mut self.pending)
    }

    /// Notifications for changing listeners of a write about to happen.
    pub fn changing(
        &self,
        property: &str,
        old_value: Option<Value>,
        new_value: &Value,
    ) -> Vec<(ChangeListener, PropertyChange)> {
        self.notifications(ListenerKind::Changing, property, old_value, new_value)
    }

    fn notifications(
        &self,
        wanted: ListenerKind,
        property: &str,
        old_value: Option<Value>,
        new_value: &Value,
    ) -> Vec<(ChangeListener, PropertyChange)> {
        let mut listeners = self
            .listeners
            .iter()
            .filter(|(_, kind, _)| *kind == wanted)
            .peekable();
        if listeners.peek().is_none() {
            return Vec::new();
        }
        let change = PropertyChange {
            section: self.section.clone(),
            property: property.to_string(),
            old_value,
            new_value: new_value.clone(),
            changed_at: Utc::now(),
        };
        listeners
            .map(|(_, _, listener)| (Arc::clone(listener), change.clone()))
            .collect()
    }
}

impl Interceptor for ChangeEvents {
    fn stage(&self) -> Stage {
        Stage::ChangeEvents
    }

    fn on_set(&mut self, ctx: &mut SetContext<'_>) -> Result<()> {
        if self.listeners.is_empty() || !ctx.is_change() {
            return Ok(());
        }
        let old_value = ctx.has_old_value.then(|| ctx.old_value.clone());
        let queued = self.notifications(
            ListenerKind::Changed,
            ctx.descriptor.name(),
            old_value,
            &ctx.new_value,
        );
        self.pending.extend(queued);
        Ok(())
    }
}
