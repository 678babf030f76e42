//! In-memory resource store
//!
//! Keeps records in a map and can inject the failures a real control plane
//! produces: transient lookup errors, authorization failures, and stale
//! existence answers. Every call is recorded so callers can assert on what
//! reached the store.

use crate::context::ResourceStore;
use crate::error::{Error, Result};
use crate::resource::{Params, ResourceId};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A call received by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Exists(ResourceId),
    Create(ResourceId, Params),
    Update(ResourceId, Params),
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<ResourceId, Params>,
    failing_lookups: u32,
    denied: HashSet<ResourceId>,
    hidden: HashSet<ResourceId>,
    calls: Vec<StoreCall>,
}

/// Thread-safe in-memory [`ResourceStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a record without recording a call
    pub fn insert(&self, id: ResourceId, params: Params) {
        self.lock().records.insert(id, params);
    }

    pub fn get(&self, id: &ResourceId) -> Option<Params> {
        self.lock().records.get(id).cloned()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.lock().records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Make the next `n` existence checks fail with a transient error
    pub fn fail_lookups(&self, n: u32) {
        self.lock().failing_lookups = n;
    }

    /// Refuse every operation on `id`
    pub fn deny(&self, id: ResourceId) {
        self.lock().denied.insert(id);
    }

    /// Report `id` as absent even when present, simulating a stale read
    pub fn hide(&self, id: ResourceId) {
        self.lock().hidden.insert(id);
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::Exists(_)))
            .count()
    }

    /// Number of create and update calls, successful or not
    pub fn mutation_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| !matches!(c, StoreCall::Exists(_)))
            .count()
    }
}

fn not_authorized(id: &ResourceId) -> Error {
    Error::NotAuthorized {
        id: id.to_string(),
        message: "access denied by store policy".to_string(),
    }
}

impl ResourceStore for MemoryStore {
    fn exists(&self, id: &ResourceId) -> Result<bool> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Exists(id.clone()));

        if inner.denied.contains(id) {
            return Err(not_authorized(id));
        }
        if inner.failing_lookups > 0 {
            inner.failing_lookups -= 1;
            return Err(Error::Lookup {
                id: id.to_string(),
                message: "store unavailable".to_string(),
            });
        }

        Ok(inner.records.contains_key(id) && !inner.hidden.contains(id))
    }

    fn create(&self, id: &ResourceId, params: &Params) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Create(id.clone(), params.clone()));

        if inner.denied.contains(id) {
            return Err(not_authorized(id));
        }
        if inner.records.contains_key(id) {
            return Err(Error::AlreadyExists { id: id.to_string() });
        }

        inner.records.insert(id.clone(), params.clone());
        Ok(())
    }

    fn update(&self, id: &ResourceId, params: &Params) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Update(id.clone(), params.clone()));

        if inner.denied.contains(id) {
            return Err(not_authorized(id));
        }
        match inner.records.get_mut(id) {
            Some(existing) => {
                *existing = params.clone();
                Ok(())
            }
            None => Err(Error::Store {
                id: id.to_string(),
                message: "cannot update a resource that does not exist".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WriteOutcome;
    use crate::resource::ParamValue;

    #[test]
    fn test_create_twice_reports_already_exists() {
        let store = MemoryStore::new();
        let id = ResourceId::new("vault", "kv");

        store.create(&id, &Params::new()).unwrap();
        let err = store.create(&id, &Params::new()).unwrap_err();
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_create_or_update() {
        let store = MemoryStore::new();
        let id = ResourceId::new("vault", "kv");
        let mut params = Params::new();
        params.insert("sku".into(), ParamValue::Text("standard".into()));

        assert_eq!(
            store.create_or_update(&id, &params).unwrap(),
            WriteOutcome::Created
        );

        params.insert("sku".into(), ParamValue::Text("premium".into()));
        assert_eq!(
            store.create_or_update(&id, &params).unwrap(),
            WriteOutcome::Updated
        );
        assert_eq!(
            store.get(&id).unwrap()["sku"],
            ParamValue::Text("premium".into())
        );
    }

    #[test]
    fn test_hidden_record_reads_absent() {
        let store = MemoryStore::new();
        let id = ResourceId::new("secret", "s");
        store.insert(id.clone(), Params::new());
        store.hide(id.clone());

        assert!(!store.exists(&id).unwrap());
        assert!(store.contains(&id));
    }
}
