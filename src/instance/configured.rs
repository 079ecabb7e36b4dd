//! # Configured Instance
//!
//! Stock [`InstanceManager`] implementation: a state machine that drives a
//! [`ComponentLifecycle`] through enable, activate, deactivate, disable and dispose.
//!
//! ```text
//! Disabled --Enable--> Enabled --Activate--> Active
//!    ^                  |   ^                  |
//!    +-----Disable------+   +---Deactivate-----+
//!
//! any non-terminal state --Dispose--> Disposed
//! ```
//!
//! State reads go through an atomic mirror so the coordinator can inspect an instance
//! without waiting; transitions are serialized by an async mutex that is held across
//! the component callbacks.

use super::events::InstanceEvent;
use super::manager::{ComponentLifecycle, InstanceManager, InstanceManagerFactory, InstanceOptions};
use super::states::InstanceState;
use crate::constants::DisposeReason;
use crate::error::{InstanceError, InstanceResult};
use crate::types::{ChangeCount, Pid, Properties};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct InstanceData {
    properties: Properties,
    change_count: ChangeCount,
    target: Option<Pid>,
    last_error: Option<String>,
}

struct InstanceInner {
    pid: Pid,
    options: InstanceOptions,
    lifecycle: Arc<dyn ComponentLifecycle>,
    state: AtomicU8,
    data: Mutex<InstanceData>,
}

/// Thread-safe instance state machine bound to one configuration identity
#[derive(Clone)]
pub struct ConfiguredInstance {
    inner: Arc<InstanceInner>,
}

impl ConfiguredInstance {
    pub fn new(pid: Pid, options: InstanceOptions, lifecycle: Arc<dyn ComponentLifecycle>) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                pid,
                options,
                lifecycle,
                state: AtomicU8::new(InstanceState::Disabled as u8),
                data: Mutex::new(InstanceData {
                    properties: Properties::new(),
                    change_count: ChangeCount::Unknown,
                    target: None,
                    last_error: None,
                }),
            }),
        }
    }

    /// Manager factory building a [`ConfiguredInstance`] per identity around one
    /// shared component implementation
    pub fn factory(lifecycle: Arc<dyn ComponentLifecycle>) -> Arc<dyn InstanceManagerFactory> {
        Arc::new(move |pid: &Pid, options: InstanceOptions| -> Arc<dyn InstanceManager> {
            Arc::new(ConfiguredInstance::new(pid.clone(), options, lifecycle.clone()))
        })
    }

    pub fn options(&self) -> InstanceOptions {
        self.inner.options
    }

    pub async fn properties(&self) -> Properties {
        self.inner.data.lock().await.properties.clone()
    }

    /// Change count of the last applied configuration
    pub async fn change_count(&self) -> ChangeCount {
        self.inner.data.lock().await.change_count
    }

    /// Identity the last configuration was targeted at
    pub async fn target(&self) -> Option<Pid> {
        self.inner.data.lock().await.target.clone()
    }

    /// Most recent activation or deactivation failure, cleared on successful activation
    pub async fn last_error(&self) -> Option<String> {
        self.inner.data.lock().await.last_error.clone()
    }

    /// Activate an enabled instance on first use. Already-active instances are left as is.
    pub async fn activate(&self) -> InstanceResult<()> {
        let mut data = self.inner.data.lock().await;
        if self.state() == InstanceState::Active {
            return Ok(());
        }
        self.activate_locked(&mut data).await
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        &self,
        current: InstanceState,
        event: &InstanceEvent,
    ) -> InstanceResult<InstanceState> {
        let target = match (current, event) {
            (InstanceState::Disposed, _) => {
                return Err(InstanceError::Disposed {
                    pid: self.inner.pid.clone(),
                })
            }

            (InstanceState::Disabled, InstanceEvent::Enable) => InstanceState::Enabled,
            (InstanceState::Enabled, InstanceEvent::Activate) => InstanceState::Active,
            (InstanceState::Active, InstanceEvent::Deactivate(_)) => InstanceState::Enabled,
            (InstanceState::Enabled | InstanceState::Active, InstanceEvent::Disable) => {
                InstanceState::Disabled
            }
            (_, InstanceEvent::Dispose(_)) => InstanceState::Disposed,

            (from, event) => {
                return Err(InstanceError::InvalidTransition {
                    pid: self.inner.pid.clone(),
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    fn set_state(&self, state: InstanceState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    async fn activate_locked(&self, data: &mut InstanceData) -> InstanceResult<()> {
        let target = self.determine_target_state(self.state(), &InstanceEvent::Activate)?;
        let pid = &self.inner.pid;

        match self.inner.lifecycle.activate(pid, &data.properties).await {
            Ok(()) => {
                self.set_state(target);
                data.last_error = None;
                info!(pid = %pid, change_count = %data.change_count, "Component instance activated");
                Ok(())
            }
            Err(e) => {
                let err = InstanceError::ActivationFailed {
                    pid: pid.clone(),
                    reason: format!("{e:#}"),
                };
                warn!(pid = %pid, error = %err, "Component instance failed to activate");
                data.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Deactivate an active component. A failing deactivation is recorded but the
    /// instance is treated as deactivated regardless.
    async fn deactivate_locked(&self, data: &mut InstanceData, reason: DisposeReason) {
        if self.state() != InstanceState::Active {
            return;
        }
        let pid = &self.inner.pid;

        if let Err(e) = self.inner.lifecycle.deactivate(pid, reason).await {
            let err = InstanceError::DeactivationFailed {
                pid: pid.clone(),
                reason: format!("{e:#}"),
            };
            warn!(pid = %pid, reason = %reason, error = %err, "Component instance failed to deactivate cleanly");
            data.last_error = Some(err.to_string());
        }

        self.set_state(InstanceState::Enabled);
        info!(pid = %pid, reason = %reason, "Component instance deactivated");
    }
}

impl fmt::Debug for ConfiguredInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredInstance")
            .field("pid", &self.inner.pid)
            .field("options", &self.inner.options)
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl InstanceManager for ConfiguredInstance {
    fn pid(&self) -> &Pid {
        &self.inner.pid
    }

    fn state(&self) -> InstanceState {
        InstanceState::from(self.inner.state.load(Ordering::Acquire))
    }

    async fn enable(&self, synchronous: bool) -> InstanceResult<()> {
        let mut data = self.inner.data.lock().await;
        let current = self.state();
        if current.is_enabled() {
            return Ok(());
        }

        let target = self.determine_target_state(current, &InstanceEvent::Enable)?;
        self.set_state(target);
        info!(pid = %self.inner.pid, synchronous, "Component instance enabled");

        if !self.inner.options.immediate {
            return Ok(());
        }
        if synchronous {
            return self.activate_locked(&mut data).await;
        }

        drop(data);
        let instance = self.clone();
        tokio::spawn(async move {
            let mut data = instance.inner.data.lock().await;
            // Disabled or disposed before the activation got to run
            if instance.state() != InstanceState::Enabled {
                return;
            }
            // Failure is already logged and recorded by activate_locked
            let _ = instance.activate_locked(&mut data).await;
        });
        Ok(())
    }

    async fn disable(&self) -> InstanceResult<()> {
        let mut data = self.inner.data.lock().await;
        let current = self.state();
        if current == InstanceState::Disabled {
            return Ok(());
        }

        let target = self.determine_target_state(current, &InstanceEvent::Disable)?;
        self.deactivate_locked(&mut data, DisposeReason::Disabled).await;
        self.set_state(target);
        info!(pid = %self.inner.pid, "Component instance disabled");
        Ok(())
    }

    async fn dispose(&self, reason: DisposeReason) -> InstanceResult<()> {
        let mut data = self.inner.data.lock().await;
        let current = self.state();
        if current.is_terminal() {
            debug!(pid = %self.inner.pid, "Component instance already disposed");
            return Ok(());
        }

        let target = self.determine_target_state(current, &InstanceEvent::Dispose(reason))?;
        self.deactivate_locked(&mut data, reason).await;
        self.set_state(target);
        info!(pid = %self.inner.pid, reason = %reason, "Component instance disposed");
        Ok(())
    }

    async fn reconfigure(
        &self,
        properties: Properties,
        change_count: ChangeCount,
        target: &Pid,
    ) -> InstanceResult<()> {
        let mut data = self.inner.data.lock().await;
        if self.state().is_terminal() {
            return Err(InstanceError::Disposed {
                pid: self.inner.pid.clone(),
            });
        }

        if let (ChangeCount::Known(incoming), ChangeCount::Known(applied)) =
            (change_count, data.change_count)
        {
            if incoming <= applied {
                debug!(
                    pid = %self.inner.pid,
                    incoming,
                    applied,
                    "Ignoring reconfiguration with stale change count"
                );
                return Ok(());
            }
        }

        data.properties = properties;
        data.change_count = change_count;
        data.target = Some(target.clone());
        debug!(
            pid = %self.inner.pid,
            target = %target,
            change_count = %change_count,
            "Component instance reconfigured"
        );

        if self.state() == InstanceState::Active {
            self.deactivate_locked(&mut data, DisposeReason::ConfigurationModified)
                .await;
            return self.activate_locked(&mut data).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingLifecycle {
        calls: SyncMutex<Vec<String>>,
        fail_activation: bool,
    }

    impl RecordingLifecycle {
        fn failing() -> Self {
            Self {
                fail_activation: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ComponentLifecycle for RecordingLifecycle {
        async fn activate(&self, pid: &Pid, properties: &Properties) -> anyhow::Result<()> {
            if self.fail_activation {
                anyhow::bail!("activation refused");
            }
            let port = properties.get("port").cloned().unwrap_or_default();
            self.calls.lock().push(format!("activate:{pid}:{port}"));
            Ok(())
        }

        async fn deactivate(&self, pid: &Pid, reason: DisposeReason) -> anyhow::Result<()> {
            self.calls.lock().push(format!("deactivate:{pid}:{reason}"));
            Ok(())
        }
    }

    fn props(port: u16) -> Properties {
        let mut properties = Properties::new();
        properties.insert("port".to_string(), json!(port));
        properties
    }

    fn instance(lifecycle: Arc<RecordingLifecycle>, options: InstanceOptions) -> ConfiguredInstance {
        ConfiguredInstance::new(Pid::from("svc.1"), options, lifecycle)
    }

    #[tokio::test]
    async fn test_immediate_instance_activates_on_synchronous_enable() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let instance = instance(lifecycle.clone(), InstanceOptions::immediate());

        instance
            .reconfigure(props(8080), ChangeCount::Known(1), &Pid::from("svc.1"))
            .await
            .unwrap();
        instance.enable(true).await.unwrap();

        assert_eq!(instance.state(), InstanceState::Active);
        assert_eq!(lifecycle.calls(), vec!["activate:svc.1:8080"]);
        assert_eq!(instance.change_count().await, ChangeCount::Known(1));
    }

    #[tokio::test]
    async fn test_asynchronous_enable_activates_in_background() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let instance = instance(lifecycle.clone(), InstanceOptions::immediate());

        instance.enable(false).await.unwrap();

        for _ in 0..100 {
            if instance.state() == InstanceState::Active {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(instance.state(), InstanceState::Active);
    }

    #[tokio::test]
    async fn test_delayed_instance_waits_for_first_use() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let instance = instance(lifecycle.clone(), InstanceOptions::delayed());

        instance.enable(true).await.unwrap();
        assert_eq!(instance.state(), InstanceState::Enabled);
        assert!(lifecycle.calls().is_empty());

        instance.activate().await.unwrap();
        assert_eq!(instance.state(), InstanceState::Active);
    }

    #[tokio::test]
    async fn test_failed_activation_leaves_instance_enabled() {
        let lifecycle = Arc::new(RecordingLifecycle::failing());
        let instance = instance(lifecycle, InstanceOptions::immediate());

        let result = instance.enable(true).await;
        assert!(matches!(result, Err(InstanceError::ActivationFailed { .. })));
        assert_eq!(instance.state(), InstanceState::Enabled);
        assert!(instance
            .last_error()
            .await
            .unwrap()
            .contains("activation refused"));
    }

    #[tokio::test]
    async fn test_disable_deactivates_and_keeps_configuration() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let instance = instance(lifecycle.clone(), InstanceOptions::immediate());
        instance
            .reconfigure(props(9000), ChangeCount::Known(2), &Pid::from("svc.1"))
            .await
            .unwrap();
        instance.enable(true).await.unwrap();

        instance.disable().await.unwrap();
        assert_eq!(instance.state(), InstanceState::Disabled);
        assert_eq!(instance.properties().await, props(9000));

        // Disabling twice is a no-op
        instance.disable().await.unwrap();
        assert_eq!(
            lifecycle.calls(),
            vec!["activate:svc.1:9000", "deactivate:svc.1:disabled"]
        );
    }

    #[tokio::test]
    async fn test_reconfigure_cycles_active_component() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let instance = instance(lifecycle.clone(), InstanceOptions::immediate());
        instance.enable(true).await.unwrap();

        instance
            .reconfigure(props(7000), ChangeCount::Known(3), &Pid::from("svc.1"))
            .await
            .unwrap();

        assert_eq!(instance.state(), InstanceState::Active);
        assert_eq!(
            lifecycle.calls(),
            vec![
                "activate:svc.1:null",
                "deactivate:svc.1:configuration_modified",
                "activate:svc.1:7000",
            ]
        );
    }

    #[tokio::test]
    async fn test_reconfigure_keeps_newest_generation() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let instance = instance(lifecycle.clone(), InstanceOptions::immediate());
        instance.enable(true).await.unwrap();
        let target = Pid::from("svc.1");

        instance
            .reconfigure(props(9000), ChangeCount::Known(9), &target)
            .await
            .unwrap();
        instance
            .reconfigure(props(7000), ChangeCount::Known(7), &target)
            .await
            .unwrap();
        instance
            .reconfigure(props(7000), ChangeCount::Known(9), &target)
            .await
            .unwrap();

        assert_eq!(instance.properties().await, props(9000));
        assert_eq!(instance.change_count().await, ChangeCount::Known(9));
        // Only the first reconfiguration cycled the component
        assert_eq!(
            lifecycle.calls(),
            vec![
                "activate:svc.1:null",
                "deactivate:svc.1:configuration_modified",
                "activate:svc.1:9000",
            ]
        );

        // Out-of-band updates always apply
        instance
            .reconfigure(props(6000), ChangeCount::Unknown, &target)
            .await
            .unwrap();
        assert_eq!(instance.properties().await, props(6000));
    }

    #[tokio::test]
    async fn test_disposed_instance_rejects_further_operations() {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let instance = instance(lifecycle.clone(), InstanceOptions::immediate());
        instance.enable(true).await.unwrap();

        instance
            .dispose(DisposeReason::ConfigurationDeleted)
            .await
            .unwrap();
        assert_eq!(instance.state(), InstanceState::Disposed);
        assert!(lifecycle
            .calls()
            .contains(&"deactivate:svc.1:configuration_deleted".to_string()));

        // Second dispose is a no-op
        instance.dispose(DisposeReason::Disposed).await.unwrap();

        assert!(matches!(
            instance.enable(true).await,
            Err(InstanceError::Disposed { .. })
        ));
        assert!(matches!(
            instance
                .reconfigure(Properties::new(), ChangeCount::Unknown, &Pid::from("svc.1"))
                .await,
            Err(InstanceError::Disposed { .. })
        ));
    }

    #[test]
    fn test_transition_table() {
        let instance = instance(
            Arc::new(RecordingLifecycle::default()),
            InstanceOptions::immediate(),
        );

        assert_eq!(
            instance
                .determine_target_state(InstanceState::Disabled, &InstanceEvent::Enable)
                .unwrap(),
            InstanceState::Enabled
        );
        assert_eq!(
            instance
                .determine_target_state(
                    InstanceState::Active,
                    &InstanceEvent::Deactivate(DisposeReason::Disabled)
                )
                .unwrap(),
            InstanceState::Enabled
        );
        assert!(matches!(
            instance.determine_target_state(InstanceState::Disabled, &InstanceEvent::Activate),
            Err(InstanceError::InvalidTransition { .. })
        ));
        assert!(matches!(
            instance.determine_target_state(InstanceState::Disposed, &InstanceEvent::Enable),
            Err(InstanceError::Disposed { .. })
        ));
    }
}
