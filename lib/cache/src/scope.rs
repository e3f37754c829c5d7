//! Per-response registration scope.
//!
//! While one response is being built, every tool or assistant instance it
//! creates registers through the same [`SessionScope`], which hands out the
//! sub IDs and files the bindings under the session's live key.

use crate::cache::SessionCache;
use crate::error::CacheError;
use std::fmt;
use std::sync::Arc;
use switchboard_core::{Result, SessionKey, SubId, SubIdGenerator};

/// Binds a cache, a session key and that session's sub-ID counter.
pub struct SessionScope<B> {
    cache: Arc<SessionCache<B>>,
    key: SessionKey,
    sub_ids: SubIdGenerator,
}

impl<B> SessionScope<B> {
    /// Opens a scope for `key`. Nothing is written until the first
    /// registration.
    #[must_use]
    pub fn new(cache: Arc<SessionCache<B>>, key: impl Into<SessionKey>) -> Self {
        Self {
            cache,
            key: key.into(),
            sub_ids: SubIdGenerator::new(),
        }
    }

    /// The key bindings from this scope are filed under.
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Number of bindings registered so far.
    #[must_use]
    pub fn registered(&self) -> u32 {
        self.sub_ids.issued()
    }

    /// Issues the next sub ID and stores `binding` under it.
    ///
    /// # Errors
    ///
    /// Fails only if the cache already holds that sub ID for this key, which
    /// means two scopes were opened for the same session.
    pub fn register(&self, binding: B) -> Result<SubId, CacheError> {
        let sub_id = self.sub_ids.next_id();
        self.cache.put(&self.key, sub_id, binding)?;
        Ok(sub_id)
    }
}

impl<B> fmt::Debug for SessionScope<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionScope")
            .field("key", &self.key)
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use switchboard_core::{CallId, SessionId};

    #[test]
    fn register_issues_sequential_sub_ids() {
        let cache = Arc::new(SessionCache::new());
        let scope = SessionScope::new(Arc::clone(&cache), SessionId::new());

        let first = scope.register("lookup").unwrap();
        let second = scope.register("transfer").unwrap();

        assert_eq!(first, SubId::new(0));
        assert_eq!(second, SubId::new(1));
        assert_eq!(cache.get(scope.key(), second).as_deref(), Some(&"transfer"));
        assert_eq!(scope.registered(), 2);
    }

    #[test]
    fn squad_members_share_one_session() {
        let cache = Arc::new(SessionCache::new());
        let scope = Arc::new(SessionScope::new(Arc::clone(&cache), CallId::new("squad-call")));

        let handles: Vec<_> = (0..3)
            .map(|member| {
                let scope = Arc::clone(&scope);
                thread::spawn(move || {
                    (0..5)
                        .map(|tool| scope.register(format!("member{member}-tool{tool}")).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<SubId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 15);
        assert_eq!(cache.binding_count(scope.key()), Some(15));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn empty_scope_writes_nothing() {
        let cache: Arc<SessionCache<()>> = Arc::new(SessionCache::new());
        let scope = SessionScope::new(Arc::clone(&cache), SessionId::new());
        assert_eq!(scope.registered(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn second_scope_for_same_key_collides() {
        let cache = Arc::new(SessionCache::new());
        let key = SessionKey::from(SessionId::new());
        let a = SessionScope::new(Arc::clone(&cache), key.clone());
        let b = SessionScope::new(Arc::clone(&cache), key);

        a.register(1).unwrap();
        let report: Result<SubId, CacheError> = b.register(2);
        let message = report.unwrap_err().to_string();
        assert!(message.contains("binding 0 already registered"));
        assert_eq!(cache.get(a.key(), SubId::new(0)).as_deref(), Some(&1));
    }
}
