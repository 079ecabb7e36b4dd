//! # Configuration Component Factory
//!
//! Coordinates a factory's own activation state with the per-configuration instances it
//! spawns. Configuration updates lazily create one instance per PID; factory-level
//! enable, disable and dispose fan out across every registered instance with
//! per-instance failure isolation.
//!
//! ## Locking
//!
//! ```text
//! record updates (async Mutex)              per identity, across reconfigure
//!   └─> state (RwLock) ──> registry (Mutex)  held only for lookups and inserts
//! change counts (DashMap)                   per-identity entry locks
//! instance transitions                      run on snapshots, no factory lock held
//! ```
//!
//! The disposed check and the registry insert of an update happen under the state read
//! lock, so disposal never races with the creation of a new record. Each record carries
//! an update lock held from change-count acceptance through reconfiguration, so updates
//! for one identity reach its instance in acceptance order. Deletion removes the record
//! and forgets its baseline under the state write lock; acceptance re-checks the record
//! under the read lock and retries on a fresh record if it was retired meanwhile.

use super::state::{
    FactoryDescriptor, FactoryState, FanoutSummary, RegisteredComponent, UpdateOutcome,
};
use crate::config::FactoryConfig;
use crate::constants::{properties as keys, DisposeReason};
use crate::error::InstanceResult;
use crate::instance::{InstanceManager, InstanceManagerFactory, InstanceOptions};
use crate::registry::{ChangeCountTracker, InstanceRecord, InstanceRegistry};
use crate::types::{ChangeCount, Pid, Properties};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// The factory's own (non-instance) configuration
#[derive(Debug, Default)]
struct OwnConfiguration {
    properties: Option<Properties>,
    change_count: Option<u64>,
}

/// Verdict on an update once its record's update lock is held
enum Admission {
    Accepted,
    /// The record was retired while the update waited
    Retry,
    Rejected(UpdateOutcome),
}

/// Lifecycle coordinator for a factory whose instances are created from configuration
#[derive(Debug)]
pub struct ConfigurationComponentFactory {
    id: Uuid,
    descriptor: FactoryDescriptor,
    config: FactoryConfig,
    state: RwLock<FactoryState>,
    own: Mutex<OwnConfiguration>,
    registry: InstanceRegistry,
    change_counts: ChangeCountTracker,
}

impl ConfigurationComponentFactory {
    pub fn new(
        descriptor: FactoryDescriptor,
        config: FactoryConfig,
        manager_factory: Arc<dyn InstanceManagerFactory>,
    ) -> Self {
        // Configuration-created instances are always immediate
        let registry = InstanceRegistry::new(
            descriptor.configuration_pid.clone(),
            InstanceOptions::immediate(),
            manager_factory,
        );

        let factory = Self {
            id: Uuid::new_v4(),
            descriptor,
            config,
            state: RwLock::new(FactoryState::NotActivated),
            own: Mutex::new(OwnConfiguration::default()),
            registry,
            change_counts: ChangeCountTracker::new(),
        };

        info!(
            factory_id = %factory.id,
            factory = %factory.descriptor.configuration_pid,
            component = %factory.descriptor.name,
            fanout = factory.config.backwards_compatible_fanout,
            "Created configuration component factory"
        );
        factory
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn descriptor(&self) -> &FactoryDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> FactoryState {
        *self.state.read()
    }

    pub fn instance_count(&self) -> usize {
        self.registry.len()
    }

    pub fn instance(&self, pid: &Pid) -> Option<Arc<dyn InstanceManager>> {
        self.registry
            .get(pid)
            .map(|record| record.manager().clone())
    }

    fn factory_pid(&self) -> &Pid {
        &self.descriptor.configuration_pid
    }

    /// Activate the factory and, in backwards-compatible mode, enable every registered
    /// instance on its own task.
    ///
    /// With `synchronous == false` the enable tasks are detached, failures are only
    /// logged and the summary is marked `detached`; otherwise they are joined and
    /// reported in the summary.
    #[instrument(skip(self), fields(factory = %self.descriptor.configuration_pid))]
    pub async fn factory_enable(&self, synchronous: bool) -> FanoutSummary {
        {
            let mut state = self.state.write();
            match *state {
                FactoryState::Disposed => {
                    debug!("Ignoring enable of disposed factory");
                    return FanoutSummary::default();
                }
                FactoryState::Activated => {
                    debug!("Factory already activated");
                    return FanoutSummary::default();
                }
                FactoryState::NotActivated => *state = FactoryState::Activated,
            }
        }
        info!("Factory activated");

        if !self.config.backwards_compatible_fanout {
            return FanoutSummary::default();
        }

        let records = self.registry.snapshot_all();
        let mut summary = FanoutSummary {
            attempted: records.len(),
            ..FanoutSummary::default()
        };

        let handles: Vec<_> = records
            .into_iter()
            .map(|record| {
                let pid = record.pid.clone();
                let task = spawn_enable(self.factory_pid().clone(), record.manager().clone());
                (pid, task)
            })
            .collect();

        if !synchronous {
            debug!(dispatched = summary.attempted, "Dispatched instance enables");
            return FanoutSummary::detached(summary.attempted);
        }

        for (pid, task) in handles {
            match task.await {
                Ok(true) => {}
                Ok(false) => summary.failed.push(pid),
                Err(e) => {
                    error!(pid = %pid, error = %e, "Instance enable task did not complete");
                    summary.failed.push(pid);
                }
            }
        }

        info!(
            enabled = summary.succeeded(),
            failed = summary.failed.len(),
            "Factory instance enable fan-out complete"
        );
        summary
    }

    /// Deactivate the factory and disable every registered instance. Instances stay in
    /// the registry so a later enable picks them up with their last configuration.
    #[instrument(skip(self), fields(factory = %self.descriptor.configuration_pid))]
    pub async fn factory_disable(&self) -> FanoutSummary {
        {
            let mut state = self.state.write();
            if state.is_disposed() {
                debug!("Ignoring disable of disposed factory");
                return FanoutSummary::default();
            }
            *state = FactoryState::NotActivated;
        }

        let mut summary = FanoutSummary::default();
        for record in self.registry.snapshot_all() {
            summary.attempted += 1;
            if let Err(e) = isolate(record.manager().disable()).await {
                warn!(pid = %record.pid, error = %e, "Instance failed to disable");
                summary.failed.push(record.pid.clone());
            }
        }

        info!(
            disabled = summary.succeeded(),
            failed = summary.failed.len(),
            "Factory deactivated"
        );
        summary
    }

    /// Dispose every instance, clear the registry and retire the factory. Terminal and
    /// idempotent.
    #[instrument(skip(self), fields(factory = %self.descriptor.configuration_pid))]
    pub async fn factory_dispose(&self, reason: DisposeReason) -> FanoutSummary {
        {
            let mut state = self.state.write();
            if state.is_disposed() {
                debug!("Factory already disposed");
                return FanoutSummary::default();
            }
            *state = FactoryState::Disposed;
        }

        let mut summary = FanoutSummary::default();
        for record in self.registry.snapshot_all() {
            summary.attempted += 1;
            if let Err(e) = isolate(record.manager().dispose(reason)).await {
                warn!(pid = %record.pid, error = %e, "Instance failed to dispose");
                summary.failed.push(record.pid.clone());
            }
        }

        self.registry.clear();
        self.change_counts.clear();
        *self.own.lock() = OwnConfiguration::default();

        info!(
            reason = %reason,
            disposed = summary.attempted,
            failed = summary.failed.len(),
            "Factory disposed"
        );
        summary
    }

    /// Apply a configuration update delivered for `pid`.
    ///
    /// Updates for the factory's own PID reconfigure the factory; any other PID is
    /// routed to its instance, created on first sight. Stale change counts are dropped.
    #[instrument(skip(self, properties), fields(factory = %self.descriptor.configuration_pid))]
    pub async fn on_configuration_updated(
        &self,
        pid: &Pid,
        properties: Properties,
        change_count: ChangeCount,
    ) -> UpdateOutcome {
        if pid == self.factory_pid() {
            return self.reconfigure_factory(properties, change_count);
        }

        let (record, created, serial) = loop {
            let (record, created) = {
                let state = self.state.read();
                if state.is_disposed() {
                    debug!(pid = %pid, "Ignoring configuration update for disposed factory");
                    return UpdateOutcome::Ignored;
                }

                match self.registry.find_or_create(pid) {
                    Ok(found) => found,
                    Err(e) => {
                        error!(pid = %pid, error = %e, "Registry rejected configuration update");
                        return UpdateOutcome::Ignored;
                    }
                }
            };

            let serial = record.lock_updates().await;
            match self.admit_update(&record, change_count) {
                Admission::Accepted => break (record, created, serial),
                Admission::Retry => {
                    debug!(pid = %pid, record_id = %record.record_id, "Record retired while update waited, retrying");
                }
                Admission::Rejected(outcome) => return outcome,
            }
        };

        let manager = record.manager().clone();
        let applied = isolate(manager.reconfigure(properties, change_count, self.factory_pid())).await;
        drop(serial);
        if let Err(e) = applied {
            warn!(pid = %pid, error = %e, "Instance rejected configuration");
            return UpdateOutcome::Failed { reason: e };
        }

        if self.state().is_activated() && !manager.state().is_enabled() {
            // Fire and forget; activation completes on its own task
            drop(spawn_enable(self.factory_pid().clone(), manager));
        }

        debug!(pid = %pid, change_count = %change_count, created, "Configuration update applied");
        UpdateOutcome::Applied { created }
    }

    /// Handle deletion of the configuration for `pid`. Returns whether anything was
    /// removed; deleting an unknown identity is a no-op.
    #[instrument(skip(self), fields(factory = %self.descriptor.configuration_pid))]
    pub async fn on_configuration_deleted(&self, pid: &Pid) -> bool {
        if self.state().is_disposed() {
            debug!(pid = %pid, "Ignoring configuration deletion for disposed factory");
            return false;
        }

        if pid == self.factory_pid() {
            let mut own = self.own.lock();
            let existed = own.properties.take().is_some();
            own.change_count = None;
            info!("Factory configuration deleted");
            return existed;
        }

        let removed = {
            let state = self.state.write();
            if state.is_disposed() {
                return false;
            }
            let removed = self.registry.remove(pid);
            if removed.is_some() {
                self.change_counts.forget(pid);
            }
            removed
        };
        let Some(record) = removed else {
            debug!(pid = %pid, "Ignoring deletion of unknown configuration");
            return false;
        };

        debug!(pid = %pid, "Disposing instance after configuration deletion");
        if let Err(e) = isolate(record.manager().dispose(DisposeReason::ConfigurationDeleted)).await
        {
            warn!(pid = %pid, error = %e, "Instance failed to dispose");
        }
        true
    }

    /// Last applied change count for `pid`, or `None` when no such configuration is known
    pub fn change_count_for(&self, pid: &Pid) -> Option<u64> {
        if pid == self.factory_pid() {
            return self.own.lock().change_count;
        }
        self.registry.get(pid)?;
        self.change_counts.current_count(pid).value()
    }

    /// The factory itself followed by every registered instance
    pub fn components(&self) -> Vec<RegisteredComponent> {
        let mut components = vec![RegisteredComponent::Factory {
            pid: self.factory_pid().clone(),
            state: self.state(),
        }];
        components.extend(
            self.registry
                .snapshot_all()
                .into_iter()
                .map(|record| RegisteredComponent::Instance(record.manager().clone())),
        );
        components
    }

    /// Properties the factory is published with
    pub fn service_properties(&self) -> Properties {
        let mut properties = self.own.lock().properties.clone().unwrap_or_default();
        properties.insert(
            keys::COMPONENT_NAME.to_string(),
            Value::String(self.descriptor.name.clone()),
        );
        properties.insert(
            keys::SERVICE_PID.to_string(),
            Value::String(self.factory_pid().to_string()),
        );
        properties.insert(
            keys::SERVICE_DESCRIPTION.to_string(),
            Value::String(format!(
                "{} {}",
                keys::FACTORY_DESCRIPTION_PREFIX,
                self.descriptor.name
            )),
        );
        properties
    }

    /// The factory's own properties, if its configuration exists
    pub fn factory_properties(&self) -> Option<Properties> {
        self.own.lock().properties.clone()
    }

    /// Decide whether an update holding `record`'s update lock may be applied. Runs under
    /// the state read lock so it cannot interleave with a deletion or disposal.
    fn admit_update(&self, record: &InstanceRecord, change_count: ChangeCount) -> Admission {
        let state = self.state.read();
        if state.is_disposed() {
            debug!(pid = %record.pid, "Ignoring configuration update for disposed factory");
            return Admission::Rejected(UpdateOutcome::Ignored);
        }
        if record.is_retired() {
            return Admission::Retry;
        }
        if !self.change_counts.accept(&record.pid, change_count) {
            return Admission::Rejected(UpdateOutcome::Stale);
        }
        Admission::Accepted
    }

    fn reconfigure_factory(&self, properties: Properties, change_count: ChangeCount) -> UpdateOutcome {
        if self.state().is_disposed() {
            debug!("Ignoring factory reconfiguration after dispose");
            return UpdateOutcome::Ignored;
        }

        let mut own = self.own.lock();
        if let ChangeCount::Known(count) = change_count {
            if own.change_count.is_some_and(|baseline| count <= baseline) {
                debug!(change_count = count, "Rejected stale factory configuration");
                return UpdateOutcome::Stale;
            }
            own.change_count = Some(count);
        }
        own.properties = Some(properties);

        info!(change_count = %change_count, "Factory configuration updated");
        UpdateOutcome::FactoryReconfigured
    }
}

/// Enable one instance on its own task. The task yields `false` on failure.
fn spawn_enable(
    factory: Pid,
    manager: Arc<dyn InstanceManager>,
) -> tokio::task::JoinHandle<bool> {
    tokio::spawn(async move {
        match isolate(manager.enable(false)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    factory = %factory,
                    pid = %manager.pid(),
                    error = %e,
                    "Instance failed to enable"
                );
                false
            }
        }
    })
}

/// Run one instance operation so that neither its error nor a panic escapes
async fn isolate<F>(operation: F) -> Result<(), String>
where
    F: Future<Output = InstanceResult<()>>,
{
    match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
