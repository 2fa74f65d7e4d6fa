// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection CRUD.
//!
//! Config maps are encrypted at rest and mirrored in plaintext into the
//! engine's config registry, keyed by connection name. Reads never return
//! config values; the map is write-only at the API surface.

use super::ServiceError;
use skiff_adapters::{CredentialCipher, TransferEngine};
use skiff_core::{Clock, ConfigMap, ConnectionId};
use skiff_storage::{ConnectionRecord, ConnectionStore, TaskStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Input shape for create/update.
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub name: String,
    pub provider_type: String,
    pub config: ConfigMap,
}

/// Read shape: the config map is omitted entirely (write-only).
#[derive(Debug, Clone)]
pub struct ConnectionView {
    pub id: ConnectionId,
    pub name: String,
    pub provider_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub struct ConnectionService<C: Clock> {
    store: ConnectionStore,
    tasks: TaskStore,
    cipher: CredentialCipher,
    engine: Arc<dyn TransferEngine>,
    clock: C,
}

impl<C: Clock> ConnectionService<C> {
    pub fn new(
        store: ConnectionStore,
        tasks: TaskStore,
        cipher: CredentialCipher,
        engine: Arc<dyn TransferEngine>,
        clock: C,
    ) -> Self {
        Self { store, tasks, cipher, engine, clock }
    }

    /// Mirror every stored connection into the engine registry. Called at
    /// startup, before any trigger source starts.
    pub async fn load_sections(&self) -> Result<usize, ServiceError> {
        let records = self.store.list().await?;
        let count = records.len();
        for record in &records {
            let config = self.cipher.decrypt(&record.encrypted_config)?;
            self.engine.set_section(&record.name, section(record, config));
        }
        debug!(count, "mirrored connection configs into the engine");
        Ok(count)
    }

    pub async fn create(&self, input: NewConnection) -> Result<ConnectionView, ServiceError> {
        validate(&input)?;
        let now = self.clock.now_utc();
        let record = ConnectionRecord {
            id: ConnectionId::new(),
            name: input.name,
            provider_type: input.provider_type,
            encrypted_config: self.cipher.encrypt(&input.config)?,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&record).await?;
        self.engine.set_section(&record.name, section(&record, input.config));
        info!(connection = %record.name, "connection created");
        Ok(view(&record))
    }

    pub async fn update(
        &self,
        id: &ConnectionId,
        input: NewConnection,
    ) -> Result<ConnectionView, ServiceError> {
        validate(&input)?;
        let previous = self.store.get(id).await?;
        let record = ConnectionRecord {
            id: id.clone(),
            name: input.name,
            provider_type: input.provider_type,
            encrypted_config: self.cipher.encrypt(&input.config)?,
            created_at: previous.created_at,
            updated_at: self.clock.now_utc(),
        };
        self.store.update(&record).await?;
        if previous.name != record.name {
            self.engine.delete_section(&previous.name);
        }
        // Invalidates cached handles for the name in the same critical
        // section as the config write.
        self.engine.set_section(&record.name, section(&record, input.config));
        info!(connection = %record.name, "connection updated");
        Ok(view(&record))
    }

    /// Rejected with Conflict while tasks reference the connection.
    pub async fn delete(&self, id: &ConnectionId) -> Result<(), ServiceError> {
        let record = self.store.get(id).await?;
        self.store.delete(id).await?;
        self.engine.delete_section(&record.name);
        info!(connection = %record.name, "connection deleted");
        Ok(())
    }

    pub async fn get(&self, id: &ConnectionId) -> Result<ConnectionView, ServiceError> {
        Ok(view(&self.store.get(id).await?))
    }

    pub async fn list(&self) -> Result<Vec<ConnectionView>, ServiceError> {
        Ok(self.store.list().await?.iter().map(view).collect())
    }

    /// Tasks referencing a connection, for integrity surfaces in the API.
    pub async fn task_count(&self, id: &ConnectionId) -> Result<usize, ServiceError> {
        Ok(self.tasks.list_by_connection(id).await?.len())
    }
}

fn validate(input: &NewConnection) -> Result<(), ServiceError> {
    if input.name.trim().is_empty() {
        return Err(ServiceError::Validation("connection name must not be empty".into()));
    }
    if input.provider_type.trim().is_empty() {
        return Err(ServiceError::Validation("provider type must not be empty".into()));
    }
    Ok(())
}

/// Engine section: the config map plus the provider type tag.
fn section(record: &ConnectionRecord, mut config: ConfigMap) -> ConfigMap {
    config.insert("type".to_string(), record.provider_type.clone());
    config
}

fn view(record: &ConnectionRecord) -> ConnectionView {
    ConnectionView {
        id: record.id.clone(),
        name: record.name.clone(),
        provider_type: record.provider_type.clone(),
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

#[cfg(test)]
#[path = "connections_tests.rs"]
mod tests;
