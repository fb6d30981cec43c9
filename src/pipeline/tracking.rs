//! Change tracking, used to decide whether an autosave is due.

use std::collections::BTreeSet;

use super::{Interceptor, SetContext, Stage};
use crate::Result;

/// Records names whose value changed while tracking is enabled.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    enabled: bool,
    changed: BTreeSet<String>,
}

impl ChangeTracker {
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Sorted snapshot of the changed names.
    pub fn changes(&self) -> Vec<String> {
        self.changed.iter().cloned().collect()
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    pub fn reset(&mut self) {
        self.changed.clear();
    }

    /// Clear the changed set, handing out the names it held.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changed).into_iter().collect()
    }

    /// Record a change outside the setter chain (removals).
    pub(crate) fn mark(&mut self, name: &str) {
        if self.enabled {
            self.changed.insert(name.to_string());
        }
    }
}

impl Interceptor for ChangeTracker {
    fn stage(&self) -> Stage {
        Stage::ChangeTracking
    }

    fn on_set(&mut self, ctx: &mut SetContext<'_>) -> Result<()> {
        if self.enabled && ctx.is_change() {
            self.changed.insert(ctx.descriptor.name().to_string());
        }
        Ok(())
    }
}
