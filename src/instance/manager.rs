//! # Instance Manager Contract
//!
//! The seams between the factory and the per-configuration component instances it
//! spawns, plus the business-logic hooks a component plugs into.

use super::states::InstanceState;
use crate::constants::DisposeReason;
use crate::error::InstanceResult;
use crate::types::{ChangeCount, Pid, Properties};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Construction parameters for an instance manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceOptions {
    /// Activate as soon as the instance is enabled instead of waiting for first use
    pub immediate: bool,
}

impl InstanceOptions {
    pub fn immediate() -> Self {
        Self { immediate: true }
    }

    pub fn delayed() -> Self {
        Self { immediate: false }
    }
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self::immediate()
    }
}

/// Lifecycle state machine for one component instance bound to a configuration.
///
/// Every call fails independently; callers fanning out across many instances are
/// expected to catch each failure on its own.
#[async_trait]
pub trait InstanceManager: Send + Sync + Debug {
    /// Configuration identity this instance is bound to
    fn pid(&self) -> &Pid;

    /// Current state, readable without waiting on an in-flight transition
    fn state(&self) -> InstanceState;

    /// Enable the instance. With `synchronous == false` activation may complete
    /// after this call returns.
    async fn enable(&self, synchronous: bool) -> InstanceResult<()>;

    async fn disable(&self) -> InstanceResult<()>;

    /// Tear the instance down for good
    async fn dispose(&self, reason: DisposeReason) -> InstanceResult<()>;

    /// Apply a new property set delivered for `target`
    async fn reconfigure(
        &self,
        properties: Properties,
        change_count: ChangeCount,
        target: &Pid,
    ) -> InstanceResult<()>;
}

/// Builds instance managers for newly seen configuration identities.
///
/// Runs inside the registry's critical section, so implementations must be cheap
/// and must not block.
pub trait InstanceManagerFactory: Send + Sync {
    fn create(&self, pid: &Pid, options: InstanceOptions) -> Arc<dyn InstanceManager>;
}

impl<F> InstanceManagerFactory for F
where
    F: Fn(&Pid, InstanceOptions) -> Arc<dyn InstanceManager> + Send + Sync,
{
    fn create(&self, pid: &Pid, options: InstanceOptions) -> Arc<dyn InstanceManager> {
        self(pid, options)
    }
}

/// Business logic of a component: what happens when an instance activates and
/// deactivates
#[async_trait]
pub trait ComponentLifecycle: Send + Sync {
    async fn activate(&self, pid: &Pid, properties: &Properties) -> anyhow::Result<()>;

    async fn deactivate(&self, pid: &Pid, reason: DisposeReason) -> anyhow::Result<()>;
}
