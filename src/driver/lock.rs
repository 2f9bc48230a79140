//! Named mutual exclusion.
//!
//! A lock client hands out locks keyed by string; two locks for the same
//! key are mutually exclusive. The trait pair exists so deployments can
//! plug in a distributed backend; the process-local client below is the
//! default.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use super::error::{DriverError, DriverResult};

/// Hands out [`KeyLock`]s for string keys.
///
/// `lock_key` is idempotent and safe under concurrent use: two calls with
/// the same key return locks that exclude each other.
pub trait LockClient: Send + Sync {
    /// Lock handle for `key`, creating the key lazily.
    fn lock_key(&self, key: &str) -> DriverResult<Box<dyn KeyLock>>;
}

/// One named lock.
///
/// `lock` must be followed by exactly one `unlock` by the same logical
/// request before `destroy` is called. `destroy` is best-effort garbage
/// collection of the key.
#[async_trait]
pub trait KeyLock: Send + Sync {
    /// Acquire the lock, waiting until it is available.
    async fn lock(&self) -> DriverResult<()>;
    /// Release the lock.
    async fn unlock(&self) -> DriverResult<()>;
    /// Drop the key from the owning client.
    async fn destroy(&self) -> DriverResult<()>;
}

type KeyMap = Arc<parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Process-local lock client backed by a lazily-populated key → mutex map.
#[derive(Default)]
pub struct LocalLockClient {
    keys: KeyMap,
}

impl LocalLockClient {
    /// Empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, for tests and diagnostics.
    pub fn key_count(&self) -> usize {
        self.keys.lock().len()
    }
}

impl LockClient for LocalLockClient {
    fn lock_key(&self, key: &str) -> DriverResult<Box<dyn KeyLock>> {
        let mutex = self
            .keys
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        Ok(Box::new(LocalLock {
            key: key.to_string(),
            keys: self.keys.clone(),
            mutex,
            held: parking_lot::Mutex::new(None),
        }))
    }
}

/// Lock handle produced by [`LocalLockClient`].
pub struct LocalLock {
    key: String,
    keys: KeyMap,
    mutex: Arc<tokio::sync::Mutex<()>>,
    held: parking_lot::Mutex<Option<OwnedMutexGuard<()>>>,
}

#[async_trait]
impl KeyLock for LocalLock {
    async fn lock(&self) -> DriverResult<()> {
        let guard = self.mutex.clone().lock_owned().await;
        *self.held.lock() = Some(guard);
        Ok(())
    }

    async fn unlock(&self) -> DriverResult<()> {
        match self.held.lock().take() {
            Some(guard) => {
                drop(guard);
                Ok(())
            }
            None => Err(DriverError::lock(format!(
                "key {} is not locked by this handle",
                self.key
            ))),
        }
    }

    async fn destroy(&self) -> DriverResult<()> {
        self.keys.lock().remove(&self.key);
        Ok(())
    }
}
