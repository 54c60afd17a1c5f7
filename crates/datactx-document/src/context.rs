//! Data context over a [`DocumentStore`].

use std::future::Future;

use asupersync::{Cx, Outcome};
use datactx_core::mapper::{self, EntityMeta};
use datactx_core::{
    DataContext, DocumentConfig, Entity, Error, Result, SettingsSource, StatusResult, Value,
    try_outcome, try_result,
};

use crate::store::{BackendStatus, Document, DocumentStore, document_key};

/// CRUD over a document backend.
///
/// Each entity becomes one document in the collection named after its table
/// (with the configured prefix), stored under its key rendered as text.
#[derive(Debug)]
pub struct DocumentContext<S: DocumentStore> {
    config: DocumentConfig,
    store: S,
}

impl<S: DocumentStore> DocumentContext<S> {
    pub fn new(store: S, config: DocumentConfig) -> Self {
        Self { config, store }
    }

    /// Build a context from string settings (`CollectionPrefix`).
    pub fn from_settings(store: S, settings: &impl SettingsSource) -> Self {
        Self::new(store, DocumentConfig::from_settings(settings))
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Prefixed collection name of `E`.
    pub fn collection<E: Entity>(&self) -> String {
        self.config.collection_name(E::TABLE_NAME)
    }
}

fn keyed_document<E: Entity>(entity: &E) -> Result<(String, Document)> {
    let meta = EntityMeta::of::<E>()?;
    let field = meta.require_key()?;
    let key = mapper::get_field(field.name, entity)?;
    Ok((document_key(&key)?, mapper::to_document(entity)?))
}

fn checked_key<E: Entity>(key: &Value) -> Result<String> {
    let meta = EntityMeta::of::<E>()?;
    let field = meta.require_key()?;
    meta.check(field, key)?;
    document_key(key)
}

fn keyed_documents<E: Entity>(entities: &[E], verb: &str) -> Result<Vec<(String, Document)>> {
    if entities.is_empty() {
        return Err(Error::malformed(format!("{verb} batch contains no entities")));
    }
    entities.iter().map(keyed_document).collect()
}

fn single(status: BackendStatus, verb: &str) -> StatusResult<u64> {
    if !status.is_valid() {
        tracing::debug!(status = status.code(), verb, "Document request rejected");
    }
    StatusResult::from_fan_out(u64::from(status.is_valid()), 1, verb)
}

/// Await every request, then count the valid outcomes.
///
/// Rejected and faulted requests are logged and left out of the count.
async fn join_fan_out<F>(
    collection: &str,
    keys: Vec<&str>,
    requests: Vec<F>,
    verb: &str,
) -> Outcome<StatusResult<u64>, Error>
where
    F: Future<Output = Outcome<BackendStatus, Error>>,
{
    let total = requests.len() as u64;
    let results = futures::future::join_all(requests).await;

    let mut succeeded = 0u64;
    for (key, result) in keys.into_iter().zip(results) {
        match result {
            Outcome::Ok(status) if status.is_valid() => succeeded += 1,
            Outcome::Ok(status) => {
                tracing::warn!(
                    collection,
                    key,
                    status = status.code(),
                    "Fan-out request rejected"
                );
            }
            Outcome::Err(e) => {
                tracing::warn!(collection, key, error = %e, "Fan-out request faulted");
            }
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    tracing::info!(collection, succeeded, total, "Fan-out batch joined");
    Outcome::Ok(StatusResult::from_fan_out(succeeded, total, verb))
}

impl<S: DocumentStore> DataContext for DocumentContext<S> {
    #[tracing::instrument(level = "debug", skip(self, cx, entity), fields(table = E::TABLE_NAME))]
    async fn insert<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> Outcome<StatusResult<u64>, Error> {
        let collection = self.collection::<E>();
        let (key, document) = try_result!(keyed_document(entity));
        let status = try_outcome!(self.store.create(cx, &collection, &key, &document).await);
        Outcome::Ok(single(status, "inserted"))
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entities), fields(table = E::TABLE_NAME, count = entities.len()))]
    async fn insert_all<E: Entity>(
        &mut self,
        cx: &Cx,
        entities: &[E],
    ) -> Outcome<StatusResult<u64>, Error> {
        let collection = self.collection::<E>();
        let documents = try_result!(keyed_documents(entities, "insert"));
        let store = &self.store;
        let requests = documents
            .iter()
            .map(|(key, document)| store.create(cx, &collection, key, document))
            .collect();
        let keys = documents.iter().map(|(key, _)| key.as_str()).collect();
        join_fan_out(&collection, keys, requests, "inserted").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entity), fields(table = E::TABLE_NAME))]
    async fn update<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> Outcome<StatusResult<u64>, Error> {
        let collection = self.collection::<E>();
        let (key, document) = try_result!(keyed_document(entity));
        let status = try_outcome!(self.store.replace(cx, &collection, &key, &document).await);
        Outcome::Ok(single(status, "updated"))
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entities), fields(table = E::TABLE_NAME, count = entities.len()))]
    async fn update_all<E: Entity>(
        &mut self,
        cx: &Cx,
        entities: &[E],
    ) -> Outcome<StatusResult<u64>, Error> {
        let collection = self.collection::<E>();
        let documents = try_result!(keyed_documents(entities, "update"));
        let store = &self.store;
        let requests = documents
            .iter()
            .map(|(key, document)| store.replace(cx, &collection, key, document))
            .collect();
        let keys = documents.iter().map(|(key, _)| key.as_str()).collect();
        join_fan_out(&collection, keys, requests, "updated").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entity), fields(table = E::TABLE_NAME))]
    async fn delete<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> Outcome<StatusResult<u64>, Error> {
        let collection = self.collection::<E>();
        let (key, _) = try_result!(keyed_document(entity));
        let status = try_outcome!(self.store.remove(cx, &collection, &key).await);
        Outcome::Ok(single(status, "deleted"))
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = E::TABLE_NAME))]
    async fn delete_by_key<E: Entity>(
        &mut self,
        cx: &Cx,
        key: Value,
    ) -> Outcome<StatusResult<u64>, Error> {
        let collection = self.collection::<E>();
        let id = try_result!(checked_key::<E>(&key));
        let status = try_outcome!(self.store.remove(cx, &collection, &id).await);
        Outcome::Ok(single(status, "deleted"))
    }

    #[tracing::instrument(level = "debug", skip(self, cx, keys), fields(table = E::TABLE_NAME, count = keys.len()))]
    async fn delete_all<E: Entity>(
        &mut self,
        cx: &Cx,
        keys: &[Value],
    ) -> Outcome<StatusResult<u64>, Error> {
        if keys.is_empty() {
            return Outcome::Err(Error::malformed("delete batch contains no keys"));
        }
        let collection = self.collection::<E>();
        let ids = try_result!(
            keys.iter()
                .map(checked_key::<E>)
                .collect::<Result<Vec<_>>>()
        );
        let store = &self.store;
        let requests = ids
            .iter()
            .map(|id| store.remove(cx, &collection, id))
            .collect();
        let labels = ids.iter().map(String::as_str).collect();
        join_fan_out(&collection, labels, requests, "deleted").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = E::TABLE_NAME))]
    async fn select<E: Entity + Default>(
        &mut self,
        cx: &Cx,
        key: Value,
    ) -> Outcome<StatusResult<E>, Error> {
        let collection = self.collection::<E>();
        let id = try_result!(checked_key::<E>(&key));
        let (status, document) = try_outcome!(self.store.read(cx, &collection, &id).await);
        match document {
            Some(document) if status.is_valid() => {
                let entity = try_result!(mapper::from_document::<E>(&document));
                Outcome::Ok(StatusResult::ok(entity, "found 1 item(s)"))
            }
            _ if status == BackendStatus::NOT_FOUND => Outcome::Ok(StatusResult::fail("not found")),
            _ => Outcome::Ok(StatusResult::fail(format!(
                "backend returned status {status}"
            ))),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = E::TABLE_NAME))]
    async fn select_all<E: Entity + Default>(
        &mut self,
        cx: &Cx,
    ) -> Outcome<StatusResult<Vec<E>>, Error> {
        let collection = self.collection::<E>();
        let (status, documents) = try_outcome!(self.store.read_all(cx, &collection).await);
        if !status.is_valid() {
            return Outcome::Ok(StatusResult::fail(format!(
                "backend returned status {status}"
            )));
        }
        let entities = try_result!(
            documents
                .iter()
                .map(mapper::from_document::<E>)
                .collect::<Result<Vec<E>>>()
        );
        let message = format!("found {} item(s)", entities.len());
        Outcome::Ok(StatusResult::ok(entities, message))
    }
}
