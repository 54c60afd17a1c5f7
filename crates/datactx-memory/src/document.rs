//! Document store kept in process memory.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use asupersync::{Cx, Outcome};
use datactx_core::Error;
use datactx_document::{BackendStatus, Document, DocumentStore};

#[derive(Debug, Default)]
struct DocState {
    collections: HashMap<String, BTreeMap<String, Document>>,
    rejected: HashMap<String, u16>,
    faulted: HashSet<String>,
    requests: usize,
}

impl DocState {
    /// Apply per-key fault injection; `None` means serve the request normally.
    fn intercept(&mut self, key: &str) -> Option<Outcome<BackendStatus, Error>> {
        self.requests += 1;
        if self.faulted.contains(key) {
            return Some(Outcome::Err(Error::backend(format!(
                "injected fault for document {key}"
            ))));
        }
        self.rejected
            .get(key)
            .map(|code| Outcome::Ok(BackendStatus(*code)))
    }
}

/// An in-process [`DocumentStore`].
///
/// Creating an existing key answers 409, replacing or removing a missing key
/// answers 404. Cloning yields another handle to the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<Mutex<DocState>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DocState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every request for `key` with `code` instead of serving it.
    pub fn reject_key(&self, key: impl Into<String>, code: u16) {
        self.lock().rejected.insert(key.into(), code);
    }

    /// Fail every request for `key` with a backend fault.
    pub fn fault_key(&self, key: impl Into<String>) {
        self.lock().faulted.insert(key.into());
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        let mut state = self.lock();
        state.rejected.clear();
        state.faulted.clear();
    }

    /// Stored document, if any.
    pub fn document(&self, collection: &str, key: &str) -> Option<Document> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.lock().collections.get(collection).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Number of keyed requests received.
    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    fn write(
        &self,
        collection: &str,
        key: &str,
        document: Option<&Document>,
        create: bool,
    ) -> Outcome<BackendStatus, Error> {
        let mut state = self.lock();
        if let Some(outcome) = state.intercept(key) {
            return outcome;
        }
        let docs = state.collections.entry(collection.to_string()).or_default();
        let exists = docs.contains_key(key);
        match document {
            Some(_) if create && exists => Outcome::Ok(BackendStatus::CONFLICT),
            Some(_) if !create && !exists => Outcome::Ok(BackendStatus::NOT_FOUND),
            Some(document) => {
                docs.insert(key.to_string(), document.clone());
                Outcome::Ok(if create {
                    BackendStatus::CREATED
                } else {
                    BackendStatus::OK
                })
            }
            None if docs.remove(key).is_some() => Outcome::Ok(BackendStatus::NO_CONTENT),
            None => Outcome::Ok(BackendStatus::NOT_FOUND),
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn create(
        &self,
        _cx: &Cx,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> impl Future<Output = Outcome<BackendStatus, Error>> + Send {
        let outcome = self.write(collection, key, Some(document), true);
        async move { outcome }
    }

    fn replace(
        &self,
        _cx: &Cx,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> impl Future<Output = Outcome<BackendStatus, Error>> + Send {
        let outcome = self.write(collection, key, Some(document), false);
        async move { outcome }
    }

    fn remove(
        &self,
        _cx: &Cx,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Outcome<BackendStatus, Error>> + Send {
        let outcome = self.write(collection, key, None, false);
        async move { outcome }
    }

    fn read(
        &self,
        _cx: &Cx,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Outcome<(BackendStatus, Option<Document>), Error>> + Send {
        let outcome = {
            let mut state = self.lock();
            match state.intercept(key) {
                Some(Outcome::Ok(status)) => Outcome::Ok((status, None)),
                Some(Outcome::Err(e)) => Outcome::Err(e),
                Some(Outcome::Cancelled(r)) => Outcome::Cancelled(r),
                Some(Outcome::Panicked(p)) => Outcome::Panicked(p),
                None => {
                    let found = state
                        .collections
                        .get(collection)
                        .and_then(|docs| docs.get(key))
                        .cloned();
                    let status = if found.is_some() {
                        BackendStatus::OK
                    } else {
                        BackendStatus::NOT_FOUND
                    };
                    Outcome::Ok((status, found))
                }
            }
        };
        async move { outcome }
    }

    fn read_all(
        &self,
        _cx: &Cx,
        collection: &str,
    ) -> impl Future<Output = Outcome<(BackendStatus, Vec<Document>), Error>> + Send {
        let documents = self
            .lock()
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        async move { Outcome::Ok((BackendStatus::OK, documents)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;

    fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => panic!("unexpected error: {e}"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    }

    fn doc(name: &str) -> Document {
        let mut document = Document::new();
        document.insert("Name".to_string(), serde_json::Value::from(name));
        document
    }

    #[test]
    fn test_status_codes() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let store = MemoryDocumentStore::new();

        rt.block_on(async {
            let created = unwrap_outcome(store.create(&cx, "w", "A", &doc("x")).await);
            assert_eq!(created, BackendStatus::CREATED);
            let dup = unwrap_outcome(store.create(&cx, "w", "A", &doc("y")).await);
            assert_eq!(dup, BackendStatus::CONFLICT);
            let missing = unwrap_outcome(store.replace(&cx, "w", "B", &doc("y")).await);
            assert_eq!(missing, BackendStatus::NOT_FOUND);
            let replaced = unwrap_outcome(store.replace(&cx, "w", "A", &doc("z")).await);
            assert_eq!(replaced, BackendStatus::OK);
            let removed = unwrap_outcome(store.remove(&cx, "w", "A").await);
            assert_eq!(removed, BackendStatus::NO_CONTENT);
            let gone = unwrap_outcome(store.remove(&cx, "w", "A").await);
            assert_eq!(gone, BackendStatus::NOT_FOUND);
        });
        assert!(store.is_empty("w"));
        assert_eq!(store.request_count(), 6);
    }

    #[test]
    fn test_injected_failures() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let store = MemoryDocumentStore::new();
        store.reject_key("A", 503);
        store.fault_key("B");

        rt.block_on(async {
            let rejected = unwrap_outcome(store.create(&cx, "w", "A", &doc("x")).await);
            assert_eq!(rejected, BackendStatus::UNAVAILABLE);
            let faulted = store.create(&cx, "w", "B", &doc("x")).await;
            assert!(matches!(faulted, Outcome::Err(ref e) if e.is_backend()));

            store.heal();
            let created = unwrap_outcome(store.create(&cx, "w", "A", &doc("x")).await);
            assert!(created.is_valid());
        });
        assert_eq!(store.len("w"), 1);
        assert_eq!(store.document("w", "A"), Some(doc("x")));
    }
}
