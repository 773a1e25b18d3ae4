use super::{Backend, BackendError, Collection, Filter, Identity, Query, Record, SqliteBackend};
use std::sync::{Arc, Mutex};

/// Wraps an in-memory backend and records which collections were read
/// with `fetch_one`.
pub struct CountingBackend {
    pub inner: Arc<SqliteBackend>,
    reads: Mutex<Vec<Collection>>,
}

impl CountingBackend {
    pub fn new(inner: Arc<SqliteBackend>) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_one_count(&self, collection: Collection) -> usize {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == collection)
            .count()
    }
}

impl Backend for CountingBackend {
    fn current_identity(&self) -> Option<Identity> {
        self.inner.current_identity()
    }

    fn fetch(&self, collection: Collection, query: &Query) -> Result<Vec<Record>, BackendError> {
        self.inner.fetch(collection, query)
    }

    fn fetch_one(&self, collection: Collection, filter: &Filter) -> Result<Record, BackendError> {
        self.reads.lock().unwrap().push(collection);
        self.inner.fetch_one(collection, filter)
    }

    fn insert(&self, collection: Collection, record: Record) -> Result<Record, BackendError> {
        self.inner.insert(collection, record)
    }

    fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<(), BackendError> {
        self.inner.update(collection, filter, patch)
    }

    fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), BackendError> {
        self.inner.delete(collection, filter)
    }
}
