//! Write protection.
//!
//! Names in the protected set reject every write. While "protecting" is on,
//! each accepted write adds its name to the set, so values written during
//! that window (constants, for instance) stay protected until released.

use std::collections::BTreeSet;

use super::{Interceptor, SetContext, Stage};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct WriteProtection {
    protected: BTreeSet<String>,
    protecting: bool,
}

impl WriteProtection {
    /// Protect every name written from now on.
    pub fn start_protecting(&mut self) {
        self.protecting = true;
    }

    /// Stop protecting new writes. Existing protections stay.
    pub fn stop_protecting(&mut self) {
        self.protecting = false;
    }

    pub fn is_protecting(&self) -> bool {
        self.protecting
    }

    pub fn protect(&mut self, name: &str) {
        self.protected.insert(name.to_string());
    }

    pub fn unprotect(&mut self, name: &str) {
        self.protected.remove(name);
    }

    /// Clear the protecting flag and every protection.
    pub fn clear(&mut self) {
        self.protecting = false;
        self.protected.clear();
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }

    pub fn protected_names(&self) -> Vec<String> {
        self.protected.iter().cloned().collect()
    }

    /// Fail when `name` is protected.
    pub fn check(&self, name: &str) -> Result<()> {
        if self.is_protected(name) {
            return Err(Error::WriteProtected(name.to_string()));
        }
        Ok(())
    }
}

impl Interceptor for WriteProtection {
    fn stage(&self) -> Stage {
        Stage::WriteProtection
    }

    fn on_set(&mut self, ctx: &mut SetContext<'_>) -> Result<()> {
        let name = ctx.descriptor.name();
        if let Err(e) = self.check(name) {
            ctx.can_continue = false;
            tracing::debug!(property = name, "write rejected");
            return Err(e);
        }
        if self.protecting {
            self.protect(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protecting_window_protects_writes() {
        let mut wp = WriteProtection::default();
        wp.start_protecting();
        assert!(wp.is_protecting());
        wp.protect("A");
        wp.stop_protecting();
        assert!(wp.is_protected("A"));
        assert!(wp.check("A").is_err());
        assert!(wp.check("B").is_ok());
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut wp = WriteProtection::default();
        wp.protect("A");
        wp.start_protecting();
        wp.clear();
        assert!(!wp.is_protecting());
        assert!(wp.protected_names().is_empty());
    }

    #[test]
    fn test_unprotect_single_name() {
        let mut wp = WriteProtection::default();
        wp.protect("A");
        wp.protect("B");
        wp.unprotect("A");
        assert_eq!(wp.protected_names(), vec!["B".to_string()]);
    }
}
