//! The uniform create/read/update/delete contract.

use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::entity::Entity;
use crate::error::Error;
use crate::status::StatusResult;
use crate::value::Value;

/// CRUD operations offered to upstream callers, implemented by every backend
/// family (relational and document).
///
/// Faults (`Outcome::Err`) mean the data layer itself is broken or misconfigured;
/// an `Outcome::Ok` carrying an unsuccessful [`StatusResult`] means the operation
/// ran but found nothing to do.
pub trait DataContext {
    /// Insert one entity. Payload: affected count.
    fn insert<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> impl Future<Output = Outcome<StatusResult<u64>, Error>>;

    /// Insert several entities as one batch.
    fn insert_all<E: Entity>(
        &mut self,
        cx: &Cx,
        entities: &[E],
    ) -> impl Future<Output = Outcome<StatusResult<u64>, Error>>;

    /// Update one entity, matched by its key.
    fn update<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> impl Future<Output = Outcome<StatusResult<u64>, Error>>;

    /// Update several entities as one batch.
    fn update_all<E: Entity>(
        &mut self,
        cx: &Cx,
        entities: &[E],
    ) -> impl Future<Output = Outcome<StatusResult<u64>, Error>>;

    /// Delete the row/document matching the entity's key.
    fn delete<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> impl Future<Output = Outcome<StatusResult<u64>, Error>>;

    /// Delete by key value.
    fn delete_by_key<E: Entity>(
        &mut self,
        cx: &Cx,
        key: Value,
    ) -> impl Future<Output = Outcome<StatusResult<u64>, Error>>;

    /// Delete every row/document whose key is in `keys`.
    fn delete_all<E: Entity>(
        &mut self,
        cx: &Cx,
        keys: &[Value],
    ) -> impl Future<Output = Outcome<StatusResult<u64>, Error>>;

    /// Fetch one entity by key; unsuccessful status when absent.
    fn select<E: Entity + Default>(
        &mut self,
        cx: &Cx,
        key: Value,
    ) -> impl Future<Output = Outcome<StatusResult<E>, Error>>;

    /// Fetch every entity of the type.
    fn select_all<E: Entity + Default>(
        &mut self,
        cx: &Cx,
    ) -> impl Future<Output = Outcome<StatusResult<Vec<E>>, Error>>;
}
