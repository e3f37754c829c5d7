//! Session cache keyed by the session's live key.
//!
//! Each entry maps [`SubId`]s to the bindings registered while a response was
//! being built. Entries are append-only; the only ways one disappears are a
//! rename (it moves, whole) and a reaper pass (it is dropped, whole).
//!
//! Locking is two-level. The outer map is behind a read-write lock that is
//! held exclusively only to create an entry, move one during a rename, or
//! drop a batch of expired ones. Reads and inserts into an existing session
//! share the outer lock and take that session's own mutex, so traffic on
//! different sessions does not serialize.

use crate::error::CacheError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rootcause::Report;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;
use switchboard_core::{SessionKey, SubId};
use tracing::{debug, warn};

/// Maximum expired entries removed per exclusive lock acquisition.
const REAP_BATCH: usize = 64;

/// What a [`SessionCache::rename_key`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The entry moved to the new key.
    Renamed,
    /// Nothing was stored under the old key; the cache is unchanged.
    SourceMissing,
    /// The entry moved and displaced a different session already stored
    /// under the new key.
    ReplacedExisting,
}

struct SessionEntry<B> {
    created_at: DateTime<Utc>,
    bindings: Mutex<HashMap<SubId, Arc<B>>>,
}

impl<B> SessionEntry<B> {
    fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    fn insert(
        &self,
        key: &SessionKey,
        sub_id: SubId,
        binding: Arc<B>,
    ) -> Result<(), Report<CacheError>> {
        match self.bindings.lock().entry(sub_id) {
            Entry::Occupied(_) => Err(CacheError::DuplicateBinding {
                key: key.clone(),
                sub_id,
            }
            .into()),
            Entry::Vacant(slot) => {
                slot.insert(binding);
                Ok(())
            }
        }
    }
}

/// Concurrent store of per-session bindings.
pub struct SessionCache<B> {
    sessions: RwLock<HashMap<SessionKey, SessionEntry<B>>>,
}

impl<B> SessionCache<B> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Stores `binding` under `(key, sub_id)`, creating the session entry
    /// with the current time on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DuplicateBinding`] if `sub_id` is already bound
    /// within this session. The existing binding is left in place.
    pub fn put(
        &self,
        key: &SessionKey,
        sub_id: SubId,
        binding: B,
    ) -> Result<(), Report<CacheError>> {
        self.put_arc(key, sub_id, Arc::new(binding))
    }

    /// Like [`put`](Self::put) for a binding that is already shared.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DuplicateBinding`] if `sub_id` is already bound.
    pub fn put_arc(
        &self,
        key: &SessionKey,
        sub_id: SubId,
        binding: Arc<B>,
    ) -> Result<(), Report<CacheError>> {
        {
            let sessions = self.sessions.read();
            if let Some(entry) = sessions.get(key) {
                return entry.insert(key, sub_id, binding);
            }
        }

        // Re-check under the write lock: another put may have created it.
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(key.clone()).or_insert_with(|| {
            debug!(session = %key, "session cache entry created");
            SessionEntry::new(Utc::now())
        });
        entry.insert(key, sub_id, binding)
    }

    /// Looks up the binding for `(key, sub_id)`.
    ///
    /// An unknown session and an unknown sub ID within a live session are
    /// both reported as `None`.
    #[must_use]
    pub fn get(&self, key: &SessionKey, sub_id: SubId) -> Option<Arc<B>> {
        let sessions = self.sessions.read();
        let entry = sessions.get(key)?;
        let bindings = entry.bindings.lock();
        bindings.get(&sub_id).cloned()
    }

    /// Moves the session stored under `old` to `new` in one step.
    ///
    /// Missing `old` is a no-op, so retrying a rename is harmless. If `new`
    /// already holds a different session, the moved entry replaces it and a
    /// warning is logged.
    pub fn rename_key(&self, old: &SessionKey, new: &SessionKey) -> RenameOutcome {
        if old == new {
            return if self.contains(old) {
                RenameOutcome::Renamed
            } else {
                RenameOutcome::SourceMissing
            };
        }

        let mut sessions = self.sessions.write();
        let Some(entry) = sessions.remove(old) else {
            debug!(from = %old, to = %new, "rename skipped, source session absent");
            return RenameOutcome::SourceMissing;
        };

        match sessions.insert(new.clone(), entry) {
            Some(displaced) => {
                warn!(
                    from = %old,
                    to = %new,
                    displaced_created_at = %displaced.created_at,
                    "session key collision on rename, replacing existing entry"
                );
                RenameOutcome::ReplacedExisting
            }
            None => {
                debug!(from = %old, to = %new, "session key renamed");
                RenameOutcome::Renamed
            }
        }
    }

    /// Drops every session created before `now - max_age` and returns how
    /// many were removed.
    ///
    /// Expired keys are found under the shared lock and then removed in
    /// small batches, re-checking each timestamp, so request traffic is never
    /// stalled for a whole scan.
    pub fn remove_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return 0;
        };

        let expired: Vec<SessionKey> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter(|(_, entry)| entry.created_at < cutoff)
                .map(|(key, _)| key.clone())
                .collect()
        };

        let mut removed = 0;
        for batch in expired.chunks(REAP_BATCH) {
            let mut sessions = self.sessions.write();
            for key in batch {
                // The key may have been renamed away since the scan; the
                // moved entry is picked up on the next pass.
                let still_expired = sessions
                    .get(key)
                    .is_some_and(|entry| entry.created_at < cutoff);
                if still_expired {
                    sessions.remove(key);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Whether a session is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.read().contains_key(key)
    }

    /// Number of bindings in the session under `key`, if any.
    #[must_use]
    pub fn binding_count(&self, key: &SessionKey) -> Option<usize> {
        let sessions = self.sessions.read();
        sessions.get(key).map(|entry| entry.bindings.lock().len())
    }

    /// When the session under `key` was created.
    #[must_use]
    pub fn created_at(&self, key: &SessionKey) -> Option<DateTime<Utc>> {
        self.sessions.read().get(key).map(|entry| entry.created_at)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the cache holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl<B> Default for SessionCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for SessionCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use switchboard_core::{CallId, SessionId};

    fn session_key() -> SessionKey {
        SessionId::new().into()
    }

    #[test]
    fn get_returns_stored_binding() {
        let cache = SessionCache::new();
        let key = session_key();
        cache.put(&key, SubId::new(0), "weather").unwrap();

        assert_eq!(cache.get(&key, SubId::new(0)).as_deref(), Some(&"weather"));
    }

    #[test]
    fn misses_are_reported_as_absent() {
        let cache = SessionCache::new();
        let key = session_key();
        cache.put(&key, SubId::new(0), 1u32).unwrap();

        assert!(cache.get(&key, SubId::new(1)).is_none());
        assert!(cache.get(&session_key(), SubId::new(0)).is_none());
    }

    #[test]
    fn duplicate_sub_id_is_rejected_and_original_kept() {
        let cache = SessionCache::new();
        let key = session_key();
        cache.put(&key, SubId::new(0), "first").unwrap();

        let err = cache.put(&key, SubId::new(0), "second").unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(cache.get(&key, SubId::new(0)).as_deref(), Some(&"first"));
    }

    #[test]
    fn concurrent_puts_lose_no_bindings() {
        let cache = Arc::new(SessionCache::new());
        let keys: Vec<SessionKey> = (0..4).map(|_| session_key()).collect();

        let handles: Vec<_> = (0..8u32)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                let keys = keys.clone();
                thread::spawn(move || {
                    for n in 0..200u32 {
                        let key = &keys[(n as usize) % keys.len()];
                        let sub_id = SubId::new(worker * 1000 + n);
                        cache.put(key, sub_id, (worker, n)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for worker in 0..8u32 {
            for n in 0..200u32 {
                let key = &keys[(n as usize) % keys.len()];
                let found = cache.get(key, SubId::new(worker * 1000 + n));
                assert_eq!(found.as_deref(), Some(&(worker, n)));
            }
        }
        let total: usize = keys.iter().filter_map(|k| cache.binding_count(k)).sum();
        assert_eq!(total, 1600);
    }

    #[test]
    fn rename_moves_every_binding() {
        let cache = SessionCache::new();
        let old = session_key();
        let new: SessionKey = CallId::new("call-1").into();
        for n in 0..5 {
            cache.put(&old, SubId::new(n), n).unwrap();
        }

        assert_eq!(cache.rename_key(&old, &new), RenameOutcome::Renamed);
        assert!(!cache.contains(&old));
        for n in 0..5 {
            assert!(cache.get(&old, SubId::new(n)).is_none());
            assert_eq!(cache.get(&new, SubId::new(n)).as_deref(), Some(&n));
        }
    }

    #[test]
    fn rename_keeps_creation_time() {
        let cache = SessionCache::new();
        let old = session_key();
        let new: SessionKey = CallId::new("call-t").into();
        cache.put(&old, SubId::new(0), ()).unwrap();
        let created = cache.created_at(&old).unwrap();

        cache.rename_key(&old, &new);
        assert_eq!(cache.created_at(&new), Some(created));
    }

    #[test]
    fn rename_twice_is_idempotent() {
        let cache = SessionCache::new();
        let old = session_key();
        let new: SessionKey = CallId::new("call-2").into();
        cache.put(&old, SubId::new(0), "tool").unwrap();

        assert_eq!(cache.rename_key(&old, &new), RenameOutcome::Renamed);
        assert_eq!(cache.rename_key(&old, &new), RenameOutcome::SourceMissing);
        assert_eq!(cache.get(&new, SubId::new(0)).as_deref(), Some(&"tool"));
        assert_eq!(cache.binding_count(&new), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rename_onto_occupied_key_replaces_it() {
        let cache = SessionCache::new();
        let old = session_key();
        let new: SessionKey = CallId::new("call-3").into();
        cache.put(&new, SubId::new(0), "stale").unwrap();
        cache.put(&old, SubId::new(0), "fresh").unwrap();

        assert_eq!(cache.rename_key(&old, &new), RenameOutcome::ReplacedExisting);
        assert_eq!(cache.get(&new, SubId::new(0)).as_deref(), Some(&"fresh"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rename_to_same_key_changes_nothing() {
        let cache = SessionCache::new();
        let key = session_key();
        cache.put(&key, SubId::new(0), 9).unwrap();

        assert_eq!(cache.rename_key(&key, &key), RenameOutcome::Renamed);
        assert_eq!(cache.get(&key, SubId::new(0)).as_deref(), Some(&9));
    }

    #[test]
    fn readers_never_see_both_or_neither_key() {
        let cache = Arc::new(SessionCache::new());
        let old = session_key();
        let new: SessionKey = CallId::new("call-race").into();
        cache.put(&old, SubId::new(0), 42).unwrap();

        let reader = {
            let cache = Arc::clone(&cache);
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                for _ in 0..10_000 {
                    assert_eq!(cache.len(), 1);
                    let seen_old = cache.get(&old, SubId::new(0)).is_some();
                    let seen_new = cache.get(&new, SubId::new(0)).is_some();
                    // Once the old key is gone the new one must already answer.
                    if !seen_old {
                        assert!(seen_new);
                    }
                }
            })
        };

        cache.rename_key(&old, &new);
        reader.join().unwrap();
        assert!(cache.get(&old, SubId::new(0)).is_none());
        assert_eq!(cache.get(&new, SubId::new(0)).as_deref(), Some(&42));
    }

    #[test]
    fn reap_removes_only_expired_sessions() {
        let cache = SessionCache::new();
        let old_keys: Vec<SessionKey> = (0..10).map(|_| session_key()).collect();
        for key in &old_keys {
            cache.put(key, SubId::new(0), ()).unwrap();
        }

        thread::sleep(std::time::Duration::from_millis(5));
        let boundary = Utc::now();
        thread::sleep(std::time::Duration::from_millis(5));

        let fresh = session_key();
        cache.put(&fresh, SubId::new(0), ()).unwrap();

        let max_age = Duration::minutes(10);
        let removed = cache.remove_older_than(max_age, boundary + max_age);
        assert_eq!(removed, 10);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&fresh));
    }

    #[test]
    fn reap_past_max_age_empties_cache() {
        let cache = SessionCache::new();
        for _ in 0..200 {
            cache.put(&session_key(), SubId::new(0), ()).unwrap();
        }

        let max_age = Duration::seconds(30);
        let later = Utc::now() + max_age + Duration::seconds(1);
        assert_eq!(cache.remove_older_than(max_age, later), 200);
        assert!(cache.is_empty());
    }

    #[test]
    fn reap_with_unrepresentable_cutoff_removes_nothing() {
        let cache = SessionCache::new();
        cache.put(&session_key(), SubId::new(0), ()).unwrap();

        assert_eq!(cache.remove_older_than(Duration::MAX, Utc::now()), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tool_call_resolves_after_platform_assigns_call_id() {
        let cache = SessionCache::new();
        let s1: SessionKey = SessionId::new().into();
        cache.put(&s1, SubId::new(0), "T1").unwrap();

        let c1: SessionKey = CallId::new("C1").into();
        cache.rename_key(&s1, &c1);

        assert_eq!(cache.get(&c1, SubId::new(0)).as_deref(), Some(&"T1"));
    }
}
