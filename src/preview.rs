// Local preview references for staged media.
//
// A handle is released when it is dropped, so every owner releases it at most once.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    live: Arc<Mutex<HashSet<Uuid>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, file_name: &str) -> PreviewHandle {
        let id = Uuid::new_v4();
        match self.live.lock() {
            Ok(mut live) => {
                live.insert(id);
            }
            Err(e) => log::warn!("Failed to acquire preview lock (non-critical): {}", e),
        }
        log::debug!("Allocated preview {} for {}", id, file_name);

        PreviewHandle {
            id,
            live: Arc::clone(&self.live),
        }
    }

    /// Number of handles that have not been released yet.
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_live(&self, handle_url: &str) -> bool {
        let Some(id) = handle_url
            .strip_prefix("preview://")
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            return false;
        };
        self.live
            .lock()
            .map(|live| live.contains(&id))
            .unwrap_or(false)
    }
}

pub struct PreviewHandle {
    id: Uuid,
    live: Arc<Mutex<HashSet<Uuid>>>,
}

impl PreviewHandle {
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url()).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        match self.live.lock() {
            Ok(mut live) => {
                live.remove(&self.id);
                log::debug!("Released preview {}", self.id);
            }
            Err(e) => log::warn!("Failed to release preview {} (non-critical): {}", self.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_release_on_drop() {
        let store = PreviewStore::new();
        let first = store.allocate("a.png");
        let second = store.allocate("b.png");
        assert_eq!(store.live_count(), 2);
        assert!(store.is_live(&first.url()));

        let url = first.url();
        drop(first);
        assert_eq!(store.live_count(), 1);
        assert!(!store.is_live(&url));

        drop(second);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_is_live_ignores_foreign_urls() {
        let store = PreviewStore::new();
        let _handle = store.allocate("a.png");
        assert!(!store.is_live("blob:http://localhost/123"));
        assert!(!store.is_live("preview://not-a-uuid"));
    }
}
