use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per resume reference.
///
/// Serializes count-then-purge for a single artifact without making
/// operations on unrelated references wait on each other.
#[derive(Default)]
pub struct ReferenceLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ReferenceLocks {
    pub async fn lock(&self, reference: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries only the map itself still points at are idle
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(reference.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }
}
