//! Existence resolver - asks the store whether a resource is already there

use crate::context::ResourceStore;
use crate::error::Result;
use crate::resource::ResourceId;
use crate::retry::{LogCallback, RetryCallback, with_retry};
use crate::types::RetryConfig;

/// Queries a [`ResourceStore`] for resource existence.
///
/// Transient lookup failures are retried with bounded exponential backoff;
/// authorization failures are returned on the first attempt. A negative
/// answer may be stale: another run can create the resource between the
/// check and a subsequent create.
pub struct ExistenceResolver<'a> {
    store: &'a dyn ResourceStore,
    retry: RetryConfig,
    callback: Option<&'a dyn RetryCallback>,
}

impl<'a> ExistenceResolver<'a> {
    /// Create a resolver that logs retries.
    pub fn new(store: &'a dyn ResourceStore, retry: RetryConfig) -> Self {
        Self {
            store,
            retry,
            callback: Some(&LogCallback),
        }
    }

    /// Replace the retry callback
    pub fn with_callback(mut self, callback: Option<&'a dyn RetryCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn exists(&self, id: &ResourceId) -> Result<bool> {
        let found = with_retry(&self.retry, self.callback, || self.store.exists(id))?;
        log::debug!("{id}: {}", if found { "exists" } else { "absent" });
        Ok(found)
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::resource::Params;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_exists_reflects_store() {
        let store = MemoryStore::new();
        let id = ResourceId::new("vault", "kv");
        let resolver = ExistenceResolver::new(&store, fast_retry(1));

        assert!(!resolver.exists(&id).unwrap());
        store.insert(id.clone(), Params::new());
        assert!(resolver.exists(&id).unwrap());
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let store = MemoryStore::new();
        store.fail_lookups(2);
        let resolver = ExistenceResolver::new(&store, fast_retry(3)).with_callback(None);

        assert!(!resolver.exists(&ResourceId::new("vault", "kv")).unwrap());
        assert_eq!(store.lookup_count(), 3);
    }

    #[test]
    fn test_transient_failures_exhaust_attempts() {
        let store = MemoryStore::new();
        store.fail_lookups(10);
        let resolver = ExistenceResolver::new(&store, fast_retry(3)).with_callback(None);

        let err = resolver.exists(&ResourceId::new("vault", "kv")).unwrap_err();
        assert!(matches!(err, Error::Lookup { .. }));
        assert_eq!(store.lookup_count(), 3);
    }

    #[test]
    fn test_not_authorized_is_fatal() {
        let store = MemoryStore::new();
        let id = ResourceId::new("vault", "kv");
        store.deny(id.clone());
        let resolver = ExistenceResolver::new(&store, fast_retry(5));

        let err = resolver.exists(&id).unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
        assert_eq!(store.lookup_count(), 1);
    }
}
