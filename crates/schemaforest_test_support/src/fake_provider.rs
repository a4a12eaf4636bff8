use async_trait::async_trait;
use schemaforest_core::{
    ConnectionId, DatabaseInfo, ForeignKeyMeta, MetadataProvider, TableStructure, TreeError,
    TriggerMeta,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;

type TableKey = (ConnectionId, String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeProviderStats {
    pub database_info_calls: usize,
    pub table_structure_calls: usize,
    pub foreign_key_calls: usize,
    pub trigger_calls: usize,
    pub requested_tables: Vec<TableKey>,
}

#[derive(Default)]
struct FakeProviderState {
    databases: RwLock<HashMap<ConnectionId, DatabaseInfo>>,
    database_errors: RwLock<HashMap<ConnectionId, String>>,
    structures: RwLock<HashMap<TableKey, TableStructure>>,
    structure_errors: RwLock<HashMap<TableKey, String>>,
    foreign_keys: RwLock<HashMap<TableKey, Vec<ForeignKeyMeta>>>,
    triggers: RwLock<HashMap<TableKey, Vec<TriggerMeta>>>,
    reports_relations: AtomicBool,
    delay: RwLock<Option<Duration>>,
    gate: RwLock<Option<Arc<Notify>>>,
    requested_tables: Mutex<Vec<TableKey>>,
    database_info_calls: AtomicUsize,
    table_structure_calls: AtomicUsize,
    foreign_key_calls: AtomicUsize,
    trigger_calls: AtomicUsize,
}

/// In-memory `MetadataProvider` with scripted answers and call counters.
///
/// Clones share state, so a test can hand one copy to the tree and keep
/// another to inspect what was requested.
#[derive(Clone, Default)]
pub struct FakeMetadataProvider {
    state: Arc<FakeProviderState>,
}

impl FakeMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(self, connection_id: ConnectionId, tables: &[&str]) -> Self {
        self.with_database(
            connection_id,
            DatabaseInfo {
                name: None,
                tables: tables.iter().map(|t| t.to_string()).collect(),
            },
        )
    }

    pub fn with_database(self, connection_id: ConnectionId, info: DatabaseInfo) -> Self {
        rwlock_write(&self.state.databases).insert(connection_id, info);
        self
    }

    pub fn with_database_error(
        self,
        connection_id: ConnectionId,
        message: impl Into<String>,
    ) -> Self {
        rwlock_write(&self.state.database_errors).insert(connection_id, message.into());
        self
    }

    pub fn with_structure(
        self,
        connection_id: ConnectionId,
        table: impl Into<String>,
        structure: TableStructure,
    ) -> Self {
        rwlock_write(&self.state.structures).insert((connection_id, table.into()), structure);
        self
    }

    pub fn with_structure_error(
        self,
        connection_id: ConnectionId,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        rwlock_write(&self.state.structure_errors)
            .insert((connection_id, table.into()), message.into());
        self
    }

    /// Report foreign keys and triggers instead of answering "not supported".
    /// Tables without scripted entries then report none.
    pub fn with_relations(self) -> Self {
        self.state.reports_relations.store(true, Ordering::Relaxed);
        self
    }

    pub fn with_foreign_keys(
        self,
        connection_id: ConnectionId,
        table: impl Into<String>,
        foreign_keys: Vec<ForeignKeyMeta>,
    ) -> Self {
        rwlock_write(&self.state.foreign_keys).insert((connection_id, table.into()), foreign_keys);
        self.with_relations()
    }

    pub fn with_triggers(
        self,
        connection_id: ConnectionId,
        table: impl Into<String>,
        triggers: Vec<TriggerMeta>,
    ) -> Self {
        rwlock_write(&self.state.triggers).insert((connection_id, table.into()), triggers);
        self.with_relations()
    }

    /// Sleep before answering any table-level request.
    pub fn with_delay(self, delay: Duration) -> Self {
        *rwlock_write(&self.state.delay) = Some(delay);
        self
    }

    /// Hold every table-level request until the gate is notified once per
    /// request.
    pub fn with_gate(self, gate: Arc<Notify>) -> Self {
        *rwlock_write(&self.state.gate) = Some(gate);
        self
    }

    pub fn set_tables(&self, connection_id: ConnectionId, tables: &[&str]) {
        rwlock_write(&self.state.databases).insert(
            connection_id,
            DatabaseInfo {
                name: None,
                tables: tables.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    pub fn set_structure(
        &self,
        connection_id: ConnectionId,
        table: impl Into<String>,
        structure: TableStructure,
    ) {
        rwlock_write(&self.state.structures).insert((connection_id, table.into()), structure);
    }

    pub fn stats(&self) -> FakeProviderStats {
        FakeProviderStats {
            database_info_calls: self.state.database_info_calls.load(Ordering::Relaxed),
            table_structure_calls: self.state.table_structure_calls.load(Ordering::Relaxed),
            foreign_key_calls: self.state.foreign_key_calls.load(Ordering::Relaxed),
            trigger_calls: self.state.trigger_calls.load(Ordering::Relaxed),
            requested_tables: mutex_lock(&self.state.requested_tables).clone(),
        }
    }

    pub fn as_provider_arc(self) -> Arc<dyn MetadataProvider> {
        Arc::new(self)
    }

    async fn table_request(&self, table: &str, connection_id: ConnectionId) -> TableKey {
        let key = (connection_id, table.to_string());
        mutex_lock(&self.state.requested_tables).push(key.clone());

        let gate = rwlock_read(&self.state.gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let delay = *rwlock_read(&self.state.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        key
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadataProvider {
    async fn database_info(&self, connection_id: ConnectionId) -> Result<DatabaseInfo, TreeError> {
        self.state
            .database_info_calls
            .fetch_add(1, Ordering::Relaxed);

        if let Some(message) = rwlock_read(&self.state.database_errors).get(&connection_id) {
            return Err(TreeError::provider(message.clone()));
        }

        rwlock_read(&self.state.databases)
            .get(&connection_id)
            .cloned()
            .ok_or(TreeError::UnknownConnection(connection_id))
    }

    async fn table_structure(
        &self,
        table: &str,
        connection_id: ConnectionId,
    ) -> Result<TableStructure, TreeError> {
        self.state
            .table_structure_calls
            .fetch_add(1, Ordering::Relaxed);

        let key = self.table_request(table, connection_id).await;

        if let Some(message) = rwlock_read(&self.state.structure_errors).get(&key) {
            return Err(TreeError::provider(message.clone()));
        }

        Ok(rwlock_read(&self.state.structures)
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn foreign_keys(
        &self,
        table: &str,
        connection_id: ConnectionId,
    ) -> Result<Option<Vec<ForeignKeyMeta>>, TreeError> {
        self.state.foreign_key_calls.fetch_add(1, Ordering::Relaxed);

        let key = self.table_request(table, connection_id).await;
        if !self.state.reports_relations.load(Ordering::Relaxed) {
            return Ok(None);
        }

        Ok(Some(
            rwlock_read(&self.state.foreign_keys)
                .get(&key)
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn triggers(
        &self,
        table: &str,
        connection_id: ConnectionId,
    ) -> Result<Option<Vec<TriggerMeta>>, TreeError> {
        self.state.trigger_calls.fetch_add(1, Ordering::Relaxed);

        let key = self.table_request(table, connection_id).await;
        if !self.state.reports_relations.load(Ordering::Relaxed) {
            return Ok(None);
        }

        Ok(Some(
            rwlock_read(&self.state.triggers)
                .get(&key)
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
