//! Single-flight memoization store with per-key locking and optional TTL.
//!
//! Reads probe the entry map without taking the key lock. On a miss the
//! caller takes the per-key lock, probes again, and only then runs the
//! factory. Callers racing on one key therefore observe a single factory
//! run when it succeeds.
//!
//! A failed factory stores nothing. Callers queued on the same lock wake up,
//! find the key still absent, and run their own factory. Failures are not
//! shared between callers.
//!
//! Per-key locks live in a [`LockTable`] and are removed once no caller
//! holds or awaits them, so the table never outgrows the set of keys that
//! are in use.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex as KeyMutex, OwnedMutexGuard};
use tokio::time::Instant;

/// A stored value and its absolute expiry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

// ============================================================================
// Lock table
// ============================================================================

/// Registry of per-key async locks with reference-counted eviction.
#[derive(Debug)]
pub struct LockTable<K> {
    locks: Mutex<HashMap<K, Arc<KeyMutex<()>>>>,
}

impl<K> Default for LockTable<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<K, Arc<KeyMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, key: &K) -> Arc<KeyMutex<()>> {
        Arc::clone(
            self.registry()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(KeyMutex::new(()))),
        )
    }

    /// Wait for exclusive ownership of `key`.
    ///
    /// Dropping the returned future while it waits gives up this caller's
    /// claim on the table entry.
    pub async fn lock(&self, key: &K) -> KeyGuard<'_, K> {
        let claim = Claim::new(self, key);
        let guard = Arc::clone(&claim.handle).lock_owned().await;
        KeyGuard { guard, claim }
    }

    /// Block the current thread until `key` is owned.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context. Use
    /// [`LockTable::lock`] there instead.
    pub fn lock_blocking(&self, key: &K) -> KeyGuard<'_, K> {
        let claim = Claim::new(self, key);
        let guard = Arc::clone(&claim.handle).blocking_lock_owned();
        KeyGuard { guard, claim }
    }

    /// Number of keys with a live lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }
}

/// One caller's reference to a table entry, from the moment it starts
/// waiting until it releases the lock.
struct Claim<'a, K: Eq + Hash + Clone> {
    table: &'a LockTable<K>,
    key: K,
    handle: Arc<KeyMutex<()>>,
}

impl<'a, K: Eq + Hash + Clone> Claim<'a, K> {
    fn new(table: &'a LockTable<K>, key: &K) -> Self {
        Self {
            table,
            key: key.clone(),
            handle: table.handle(key),
        }
    }
}

impl<K: Eq + Hash + Clone> Drop for Claim<'_, K> {
    fn drop(&mut self) {
        let mut locks = self.table.registry();
        // One reference in the table plus ours: nobody else holds or waits.
        if Arc::strong_count(&self.handle) == 2 {
            let ours = locks
                .get(&self.key)
                .is_some_and(|existing| Arc::ptr_eq(existing, &self.handle));
            if ours {
                locks.remove(&self.key);
            }
        }
    }
}

/// Exclusive ownership of one key. Releases the lock on drop and evicts it
/// from the table when nobody else holds or awaits it.
pub struct KeyGuard<'a, K: Eq + Hash + Clone> {
    // Field order matters: the lock is released before the claim is dropped.
    guard: OwnedMutexGuard<()>,
    claim: Claim<'a, K>,
}

// ============================================================================
// Store
// ============================================================================

/// Memoized key→value store.
///
/// `default_ttl` applies to writes that carry no TTL of their own. `None`
/// keeps such entries until they are deleted.
#[derive(Debug)]
pub struct SingleFlightStore<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    locks: LockTable<K>,
    default_ttl: Option<Duration>,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for SingleFlightStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SingleFlightStore<K, V> {
    /// Store whose entries never expire unless written with a TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_ttl(None)
    }

    #[must_use]
    pub fn with_default_ttl(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: LockTable::new(),
            default_ttl,
        }
    }

    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Live value for `key`, without taking the key lock.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Return the live value for `key`, or run `factory` once under the key
    /// lock and store its result with `ttl` (or the default retention).
    pub async fn get_or_create<F, Fut, E>(
        &self,
        key: K,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_create_with(key, || async move { factory().await.map(|v| (v, ttl)) })
            .await
    }

    /// Like [`get_or_create`](Self::get_or_create), for factories that learn
    /// the TTL only once the value is known (e.g. a token's `expires_in`).
    pub async fn get_or_create_with<F, Fut, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Option<Duration>), E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let _guard = self.locks.lock(&key).await;
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        tracing::trace!(target: "idp.cache", "Running factory for absent key");
        let (value, ttl) = factory().await?;
        self.write(key, value.clone(), ttl);
        Ok(value)
    }

    /// Synchronous [`get_or_create`](Self::get_or_create).
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn get_or_create_blocking<F, E>(
        &self,
        key: K,
        ttl: Option<Duration>,
        factory: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_create_with_blocking(key, || factory().map(|v| (v, ttl)))
    }

    /// Synchronous [`get_or_create_with`](Self::get_or_create_with).
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn get_or_create_with_blocking<F, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<(V, Option<Duration>), E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let _guard = self.locks.lock_blocking(&key);
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        tracing::trace!(target: "idp.cache", "Running factory for absent key");
        let (value, ttl) = factory()?;
        self.write(key, value.clone(), ttl);
        Ok(value)
    }

    /// Store `value` under the key lock, replacing any existing entry.
    pub async fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let _guard = self.locks.lock(&key).await;
        self.write(key, value, ttl);
    }

    /// Synchronous [`insert`](Self::insert).
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn insert_blocking(&self, key: K, value: V, ttl: Option<Duration>) {
        let _guard = self.locks.lock_blocking(&key);
        self.write(key, value, ttl);
    }

    /// Remove `key` under its lock. Succeeds for absent keys.
    pub async fn delete(&self, key: &K) -> bool {
        let _guard = self.locks.lock(key).await;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        true
    }

    /// Remove `key` under its lock only when its current value matches
    /// `predicate`. Returns whether an entry was removed.
    ///
    /// Lets a caller discard a value it knows to be stale without clobbering
    /// a replacement another caller stored in the meantime.
    pub async fn remove_if<P>(&self, key: &K, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let _guard = self.locks.lock(key).await;
        self.remove_matching(key, predicate)
    }

    /// Synchronous [`remove_if`](Self::remove_if).
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn remove_if_blocking<P>(&self, key: &K, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let _guard = self.locks.lock_blocking(key);
        self.remove_matching(key, predicate)
    }

    fn remove_matching<P>(&self, key: &K, predicate: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|entry| predicate(&entry.value)) {
            entries.remove(key);
            true
        } else {
            false
        }
    }

    /// Remove every expired entry, each under its own key lock.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            let _guard = self.locks.lock(&key).await;
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            // Re-check: the key may have been rewritten while we waited.
            if entries
                .get(&key)
                .is_some_and(|entry| !entry.is_live(Instant::now()))
            {
                entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of per-key locks currently held or awaited.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    fn write(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl
            .or(self.default_ttl)
            .and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, CacheEntry { value, expires_at });
    }
}
