//! Transaction overlay.
//!
//! While a transaction is open, writes land in an overlay and reads prefer
//! it. The committed store is untouched until the owning instance commits,
//! replaying the overlay through the full chain.

use std::sync::Arc;

use super::{GetContext, Interceptor, SetContext, Stage};
use crate::Result;
use crate::descriptor::PropertyDescriptor;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct TransactionOverlay {
    active: bool,
    /// Overlaid values in first-write order
    overlay: Vec<(Arc<PropertyDescriptor>, Value)>,
}

impl TransactionOverlay {
    /// Open a transaction. An existing overlay is kept.
    pub fn start(&mut self) {
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Open and holding uncommitted values.
    pub fn is_dirty(&self) -> bool {
        self.active && !self.overlay.is_empty()
    }

    /// Close the transaction and discard the overlay.
    pub fn rollback(&mut self) {
        self.active = false;
        self.overlay.clear();
    }

    /// Close the transaction and hand out the overlay for replay.
    pub(crate) fn finish(&mut self) -> Vec<(Arc<PropertyDescriptor>, Value)> {
        self.active = false;
        std::mem::take(&mut self.overlay)
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.overlay.iter().position(|(d, _)| d.name() == name)
    }
}

impl Interceptor for TransactionOverlay {
    fn stage(&self) -> Stage {
        Stage::Transaction
    }

    fn on_get(&mut self, ctx: &mut GetContext<'_>) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        if let Some(i) = self.find(ctx.descriptor.name()) {
            ctx.value = self.overlay[i].1.clone();
            ctx.has_value = true;
            ctx.can_continue = false;
        }
        Ok(())
    }

    fn on_set(&mut self, ctx: &mut SetContext<'_>) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let value = ctx.new_value.clone();
        match self.find(ctx.descriptor.name()) {
            Some(i) => {
                ctx.old_value = std::mem::replace(&mut self.overlay[i].1, value);
                ctx.has_old_value = true;
            }
            None => {
                self.overlay.push((Arc::clone(ctx.descriptor), value));
                ctx.has_old_value = false;
            }
        }
        ctx.can_continue = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    #[test]
    fn test_dirty_only_when_active_with_values() {
        let mut tx = TransactionOverlay::default();
        assert!(!tx.is_dirty());
        tx.start();
        assert!(!tx.is_dirty());

        let desc = Arc::new(PropertyDescriptor::builder("A", ValueType::Text).build());
        let mut ctx = SetContext {
            descriptor: &desc,
            new_value: Value::from("x"),
            old_value: Value::Null,
            has_old_value: false,
            can_continue: true,
        };
        tx.on_set(&mut ctx).unwrap();
        assert!(!ctx.can_continue);
        assert!(tx.is_dirty());

        tx.rollback();
        assert!(!tx.is_active());
        assert!(!tx.is_dirty());
    }

    #[test]
    fn test_nested_start_keeps_overlay() {
        let mut tx = TransactionOverlay::default();
        tx.start();
        let desc = Arc::new(PropertyDescriptor::builder("A", ValueType::Text).build());
        let mut ctx = SetContext {
            descriptor: &desc,
            new_value: Value::from("x"),
            old_value: Value::Null,
            has_old_value: false,
            can_continue: true,
        };
        tx.on_set(&mut ctx).unwrap();
        tx.start();
        assert!(tx.is_dirty());
        assert_eq!(tx.finish().len(), 1);
    }
}
