//! Data context over a relational [`Driver`].

use std::fmt;

use asupersync::{Cx, Outcome};
use datactx_core::mapper;
use datactx_core::{
    Connection, ContextConfig, DataContext, Driver, Entity, Error, ParamSet, Result, Row, SettingsSource,
    StatusResult, Value, try_outcome, try_result,
};
use datactx_query::{Command, CommandBuilder};

use crate::unit_of_work::{Finish, UnitOfWork, UnitOfWorkRegistry};

/// CRUD over a relational backend.
///
/// Every operation builds its command first, so malformed input is rejected
/// before a connection is opened. It then opens a connection for the
/// configured dialect and runs the command on it.
///
/// In immediate commit mode the connection is closed before the operation
/// returns, whether it succeeded or not. In caller-controlled mode a
/// transaction is begun on it and the unit of work stays registered until
/// [`commit`](Self::commit) or [`rollback`](Self::rollback).
///
/// A context is not meant to be shared between tasks: operations take
/// `&mut self`.
pub struct RelationalContext<D: Driver> {
    config: ContextConfig,
    driver: D,
    commands: CommandBuilder,
    registry: UnitOfWorkRegistry<D::Conn>,
}

impl<D: Driver> fmt::Debug for RelationalContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalContext")
            .field("config", &self.config)
            .field("pending_units", &self.registry.ids())
            .finish_non_exhaustive()
    }
}

impl<D: Driver> RelationalContext<D> {
    /// Create a context. The driver must speak the configured dialect.
    pub fn new(config: ContextConfig, driver: D) -> Result<Self> {
        if driver.dialect() != config.dialect {
            return Err(Error::UnsupportedDialect(format!(
                "context configured for {} but driver speaks {}",
                config.dialect,
                driver.dialect()
            )));
        }
        tracing::debug!(
            dialect = %config.dialect,
            commit_mode = ?config.commit_mode,
            table_prefix = %config.table_prefix,
            "Created relational context"
        );
        Ok(Self {
            commands: CommandBuilder::from_config(&config),
            config,
            driver,
            registry: UnitOfWorkRegistry::new(),
        })
    }

    /// Build a context from string settings.
    pub fn from_settings(driver: D, settings: &impl SettingsSource) -> Result<Self> {
        Self::new(ContextConfig::from_settings(settings)?, driver)
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The command builder used by this context.
    pub fn commands(&self) -> &CommandBuilder {
        &self.commands
    }

    /// Number of units of work awaiting commit or rollback.
    pub fn pending_units(&self) -> usize {
        self.registry.len()
    }

    /// Ids of the units of work awaiting commit or rollback.
    pub fn pending_unit_ids(&self) -> Vec<u64> {
        self.registry.ids()
    }

    /// Commit every pending unit of work and close its connection.
    ///
    /// Returns how many units were finished. Units whose connection was
    /// closed elsewhere are dropped without being counted.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(pending = self.registry.len()))]
    pub async fn commit(&mut self, cx: &Cx) -> Outcome<usize, Error> {
        tracing::info!("Committing pending units of work");
        self.registry.finish_all(cx, Finish::Commit).await
    }

    /// Roll back every pending unit of work and close its connection.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(pending = self.registry.len()))]
    pub async fn rollback(&mut self, cx: &Cx) -> Outcome<usize, Error> {
        tracing::info!("Rolling back pending units of work");
        self.registry.finish_all(cx, Finish::Rollback).await
    }

    /// Run a raw parameterized query and map each row onto `E` by storage name.
    ///
    /// Columns that map to no field of `E` are ignored.
    #[tracing::instrument(level = "debug", skip(self, cx, params), fields(table = E::TABLE_NAME))]
    pub async fn query<E: Entity + Default>(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: ParamSet,
    ) -> Outcome<StatusResult<Vec<E>>, Error> {
        let command = try_result!(self.raw_command(sql, params));
        let rows = try_outcome!(self.run_query(cx, &command).await);
        let entities = try_result!(
            rows.iter()
                .map(mapper::from_row::<E>)
                .collect::<Result<Vec<E>>>()
        );
        let message = format!("found {} row(s)", entities.len());
        Outcome::Ok(StatusResult::ok(entities, message))
    }

    /// Run a raw parameterized command and report the affected-row count.
    #[tracing::instrument(level = "debug", skip(self, cx, params))]
    pub async fn execute(
        &mut self,
        cx: &Cx,
        sql: &str,
        params: ParamSet,
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = try_result!(self.raw_command(sql, params));
        let affected = try_outcome!(self.run_execute(cx, &command).await);
        Outcome::Ok(StatusResult::from_affected(affected, "affected"))
    }

    fn raw_command(&self, sql: &str, params: ParamSet) -> Result<Command> {
        if sql.trim().is_empty() {
            return Err(Error::malformed("command text is empty"));
        }
        if params.dialect() != self.config.dialect {
            return Err(Error::malformed(format!(
                "{} parameters passed to a {} context",
                params.dialect(),
                self.config.dialect
            )));
        }
        Ok(Command::new(sql, params))
    }

    /// Open a connection; in caller-controlled mode also begin a transaction.
    async fn acquire(&mut self, cx: &Cx) -> Outcome<UnitOfWork<D::Conn>, Error> {
        let connection = try_outcome!(
            self.driver
                .connect(cx, &self.config.connection_string)
                .await
        );
        let mut unit = UnitOfWork::new(self.registry.next_id(), connection);

        if !self.config.commit_mode.is_immediate() {
            let begun = unit.begin(cx).await;
            if !matches!(begun, Outcome::Ok(())) {
                if let Err(e) = unit.close(cx).await {
                    tracing::warn!(unit = unit.id(), error = %e, "Failed to close unit after begin failed");
                }
            }
            try_outcome!(begun);
        }

        tracing::debug!(unit = unit.id(), "Acquired connection");
        Outcome::Ok(unit)
    }

    /// Close or register the unit once its operation has run.
    ///
    /// In immediate mode the connection is always closed; a close failure
    /// only replaces a successful outcome. In caller-controlled mode the unit
    /// is registered as the backend left it.
    async fn release<T>(
        &mut self,
        cx: &Cx,
        mut unit: UnitOfWork<D::Conn>,
        outcome: Outcome<T, Error>,
    ) -> Outcome<T, Error> {
        if !self.config.commit_mode.is_immediate() {
            self.registry.register(unit);
            return outcome;
        }

        match (unit.close(cx).await, outcome) {
            (Ok(()), outcome) => outcome,
            (Err(e), Outcome::Ok(_)) => Outcome::Err(e),
            (Err(e), outcome) => {
                tracing::warn!(unit = unit.id(), error = %e, "Failed to close connection");
                outcome
            }
        }
    }

    async fn run_execute(&mut self, cx: &Cx, command: &Command) -> Outcome<u64, Error> {
        tracing::debug!(sql = %command.sql(), params = command.params().len(), "Executing command");
        let unit = try_outcome!(self.acquire(cx).await);
        let outcome = unit
            .connection()
            .execute(cx, command.sql(), command.params())
            .await;
        self.release(cx, unit, outcome).await
    }

    async fn run_query(&mut self, cx: &Cx, command: &Command) -> Outcome<Vec<Row>, Error> {
        tracing::debug!(sql = %command.sql(), params = command.params().len(), "Running query");
        let unit = try_outcome!(self.acquire(cx).await);
        let outcome = unit
            .connection()
            .query(cx, command.sql(), command.params())
            .await;
        self.release(cx, unit, outcome).await
    }

    async fn affected(
        &mut self,
        cx: &Cx,
        command: Result<Command>,
        verb: &str,
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = try_result!(command);
        let affected = try_outcome!(self.run_execute(cx, &command).await);
        tracing::info!(affected, verb, "Command executed");
        Outcome::Ok(StatusResult::from_affected(affected, verb))
    }
}

impl<D: Driver> DataContext for RelationalContext<D> {
    #[tracing::instrument(level = "debug", skip(self, cx, entity), fields(table = E::TABLE_NAME))]
    async fn insert<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = self.commands.insert(entity, 0);
        self.affected(cx, command, "inserted").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entities), fields(table = E::TABLE_NAME, count = entities.len()))]
    async fn insert_all<E: Entity>(
        &mut self,
        cx: &Cx,
        entities: &[E],
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = self.commands.insert_all(entities);
        self.affected(cx, command, "inserted").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entity), fields(table = E::TABLE_NAME))]
    async fn update<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = self.commands.update(entity, 0);
        self.affected(cx, command, "updated").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entities), fields(table = E::TABLE_NAME, count = entities.len()))]
    async fn update_all<E: Entity>(
        &mut self,
        cx: &Cx,
        entities: &[E],
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = self.commands.update_all(entities);
        self.affected(cx, command, "updated").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, entity), fields(table = E::TABLE_NAME))]
    async fn delete<E: Entity>(
        &mut self,
        cx: &Cx,
        entity: &E,
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = self.commands.delete(entity);
        self.affected(cx, command, "deleted").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = E::TABLE_NAME))]
    async fn delete_by_key<E: Entity>(
        &mut self,
        cx: &Cx,
        key: Value,
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = self.commands.delete_by_key::<E>(key);
        self.affected(cx, command, "deleted").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, keys), fields(table = E::TABLE_NAME, count = keys.len()))]
    async fn delete_all<E: Entity>(
        &mut self,
        cx: &Cx,
        keys: &[Value],
    ) -> Outcome<StatusResult<u64>, Error> {
        let command = self.commands.delete_all::<E>(keys);
        self.affected(cx, command, "deleted").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = E::TABLE_NAME))]
    async fn select<E: Entity + Default>(
        &mut self,
        cx: &Cx,
        key: Value,
    ) -> Outcome<StatusResult<E>, Error> {
        let command = try_result!(self.commands.select::<E>(key));
        let rows = try_outcome!(self.run_query(cx, &command).await);
        let Some(row) = rows.first() else {
            return Outcome::Ok(StatusResult::fail("not found"));
        };
        let entity = try_result!(mapper::from_row::<E>(row));
        Outcome::Ok(StatusResult::ok(entity, "found 1 row(s)"))
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = E::TABLE_NAME))]
    async fn select_all<E: Entity + Default>(
        &mut self,
        cx: &Cx,
    ) -> Outcome<StatusResult<Vec<E>>, Error> {
        let command = try_result!(self.commands.select_all::<E>());
        let rows = try_outcome!(self.run_query(cx, &command).await);
        let entities = try_result!(
            rows.iter()
                .map(mapper::from_row::<E>)
                .collect::<Result<Vec<E>>>()
        );
        let message = format!("found {} row(s)", entities.len());
        Outcome::Ok(StatusResult::ok(entities, message))
    }
}
