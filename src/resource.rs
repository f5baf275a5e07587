//! Shared Manager Resource
//!
//! The rule manager lives behind a mutex shared by the worker and the host.
//! Readers take the committed snapshot and query it without the lock.

use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::rule::{RuleManager, Snapshot};

/// Wrapper for RuleManager that can be shared across threads
pub struct ManagerResource {
    pub inner: Mutex<RuleManager>,
}

impl ManagerResource {
    pub fn new(config: Config) -> Self {
        ManagerResource {
            inner: Mutex::new(RuleManager::new(config)),
        }
    }

    pub fn from_manager(manager: RuleManager) -> Self {
        ManagerResource {
            inner: Mutex::new(manager),
        }
    }

    /// Run `f` with exclusive access to the manager
    ///
    /// # Errors
    ///
    /// Returns [`Error::Poisoned`] if a previous holder panicked.
    pub fn with_manager<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut RuleManager) -> R,
    {
        let mut guard = self.inner.lock().map_err(|_| Error::Poisoned)?;
        Ok(f(&mut guard))
    }

    /// Committed snapshot, when the manager is ready
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.with_manager(|manager| {
            if manager.is_ready() {
                manager.snapshot()
            } else {
                None
            }
        })
        .ok()
        .flatten()
    }
}

impl Default for ManagerResource {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Handle shared by the worker and the host
pub type ManagerRef = Arc<ManagerResource>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::{page, rules};
    use crate::ChangeSeq;

    #[test]
    fn test_snapshot_only_when_ready() {
        let resource = ManagerResource::default();
        assert!(resource.snapshot().is_none());

        resource
            .with_manager(|manager| {
                manager.load("user", None, &rules(r#"[{"name": "x", "type": "marker", "criteria": [{"text": "hi"}]}]"#));
                manager.update(page("<control><text>hi</text></control>"), &ChangeSeq::new(), None)
            })
            .unwrap()
            .unwrap();
        let snapshot = resource.snapshot().unwrap();
        assert_eq!(snapshot.results().len(), 1);
    }

    #[test]
    fn test_poisoned_lock() {
        let resource = Arc::new(ManagerResource::default());
        let clone = Arc::clone(&resource);
        let _ = std::thread::spawn(move || {
            clone
                .with_manager(|_| panic!("boom"))
                .ok();
        })
        .join();
        assert!(matches!(resource.with_manager(|_| ()), Err(Error::Poisoned)));
        assert!(resource.snapshot().is_none());
    }
}
