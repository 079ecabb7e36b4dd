//! # Instance Registry
//!
//! Concurrency-safe index of configuration identity to instance record.
//!
//! ## Key Features
//!
//! - **Lazy, idempotent creation**: `find_or_create` never yields two records for one
//!   identity, even under concurrent calls
//! - **Short critical sections**: no lifecycle work happens under the registry lock;
//!   fan-out callers iterate a snapshot instead
//! - **Terminal clear**: `clear` closes the registry, after which creation is a
//!   caller-discipline error

use crate::error::{FactoryError, FactoryResult};
use crate::instance::{InstanceManager, InstanceManagerFactory, InstanceOptions};
use crate::types::Pid;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// One configuration identity bound to its instance manager
#[derive(Debug)]
pub struct InstanceRecord {
    pub record_id: Uuid,
    pub pid: Pid,
    pub created_at: DateTime<Utc>,
    manager: Arc<dyn InstanceManager>,
    /// Serializes change-count acceptance and reconfiguration for this identity
    updates: Arc<AsyncMutex<()>>,
    retired: AtomicBool,
}

impl InstanceRecord {
    fn new(pid: Pid, manager: Arc<dyn InstanceManager>) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            pid,
            created_at: Utc::now(),
            manager,
            updates: Arc::new(AsyncMutex::new(())),
            retired: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> &Arc<dyn InstanceManager> {
        &self.manager
    }

    /// Wait for exclusive update access to this record. Updates queue in arrival order.
    pub async fn lock_updates(&self) -> OwnedMutexGuard<()> {
        self.updates.clone().lock_owned().await
    }

    /// Whether the record has been removed from its registry. A retired record never
    /// comes back; updates must go to a fresh record instead.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

#[derive(Default)]
struct RegistryInner {
    records: HashMap<Pid, Arc<InstanceRecord>>,
    closed: bool,
}

/// Registry of per-configuration instances owned by one factory
pub struct InstanceRegistry {
    factory_pid: Pid,
    options: InstanceOptions,
    manager_factory: Arc<dyn InstanceManagerFactory>,
    inner: Mutex<RegistryInner>,
}

impl InstanceRegistry {
    pub fn new(
        factory_pid: Pid,
        options: InstanceOptions,
        manager_factory: Arc<dyn InstanceManagerFactory>,
    ) -> Self {
        Self {
            factory_pid,
            options,
            manager_factory,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Return the record for `pid`, creating its instance manager if this is the first
    /// time the identity is seen. The flag reports whether a record was created.
    pub fn find_or_create(&self, pid: &Pid) -> FactoryResult<(Arc<InstanceRecord>, bool)> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(FactoryError::RegistryClosed {
                factory: self.factory_pid.clone(),
            });
        }

        if let Some(record) = inner.records.get(pid) {
            return Ok((record.clone(), false));
        }

        let manager = self.manager_factory.create(pid, self.options);
        let record = Arc::new(InstanceRecord::new(pid.clone(), manager));
        inner.records.insert(pid.clone(), record.clone());

        debug!(
            factory = %self.factory_pid,
            pid = %pid,
            record_id = %record.record_id,
            "Created instance record"
        );
        Ok((record, true))
    }

    pub fn get(&self, pid: &Pid) -> Option<Arc<InstanceRecord>> {
        self.inner.lock().records.get(pid).cloned()
    }

    /// Remove and return the record for `pid`. Removing an absent identity is a no-op.
    pub fn remove(&self, pid: &Pid) -> Option<Arc<InstanceRecord>> {
        let removed = self.inner.lock().records.remove(pid);
        if let Some(record) = &removed {
            record.retire();
            debug!(factory = %self.factory_pid, pid = %pid, "Removed instance record");
        }
        removed
    }

    /// Point-in-time copy of all records, safe to iterate without the registry lock
    pub fn snapshot_all(&self) -> Vec<Arc<InstanceRecord>> {
        self.inner.lock().records.values().cloned().collect()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.inner.lock().records.keys().cloned().collect()
    }

    /// Drop every record and close the registry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.records.len();
        for (_, record) in inner.records.drain() {
            record.retire();
        }
        inner.closed = true;
        debug!(factory = %self.factory_pid, cleared = count, "Instance registry cleared");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InstanceRegistry")
            .field("factory_pid", &self.factory_pid)
            .field("records", &inner.records.len())
            .field("closed", &inner.closed)
            .finish()
    }
}
