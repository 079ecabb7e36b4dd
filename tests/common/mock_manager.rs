use async_trait::async_trait;
use component_factory::{
    ChangeCount, DisposeReason, InstanceError, InstanceManager, InstanceManagerFactory,
    InstanceOptions, InstanceResult, InstanceState, Pid, Properties,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How a scripted manager reacts to `enable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnableBehavior {
    #[default]
    Succeed,
    Fail,
    Panic,
}

/// Instance manager double that records every call it receives
#[derive(Debug)]
pub struct ScriptedManager {
    pid: Pid,
    enable_behavior: EnableBehavior,
    reconfigure_delays: HashMap<u64, Duration>,
    state: Mutex<InstanceState>,
    pub applied_counts: Mutex<Vec<ChangeCount>>,
    pub properties: Mutex<Option<Properties>>,
    pub dispose_reasons: Mutex<Vec<DisposeReason>>,
    pub enable_calls: Mutex<Vec<bool>>,
}

impl ScriptedManager {
    pub fn new(pid: Pid, enable_behavior: EnableBehavior) -> Self {
        Self::with_delays(pid, enable_behavior, HashMap::new())
    }

    /// Manager whose `reconfigure` stalls for the given duration on specific change counts
    pub fn with_delays(
        pid: Pid,
        enable_behavior: EnableBehavior,
        reconfigure_delays: HashMap<u64, Duration>,
    ) -> Self {
        Self {
            pid,
            enable_behavior,
            reconfigure_delays,
            state: Mutex::new(InstanceState::Disabled),
            applied_counts: Mutex::new(Vec::new()),
            properties: Mutex::new(None),
            dispose_reasons: Mutex::new(Vec::new()),
            enable_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn applied_counts(&self) -> Vec<ChangeCount> {
        self.applied_counts.lock().clone()
    }

    pub fn dispose_reasons(&self) -> Vec<DisposeReason> {
        self.dispose_reasons.lock().clone()
    }

    /// Poll until the manager reaches `expected`, giving up after a second
    pub async fn wait_for_state(&self, expected: InstanceState) -> bool {
        for _ in 0..200 {
            if self.state() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

#[async_trait]
impl InstanceManager for ScriptedManager {
    fn pid(&self) -> &Pid {
        &self.pid
    }

    fn state(&self) -> InstanceState {
        *self.state.lock()
    }

    async fn enable(&self, synchronous: bool) -> InstanceResult<()> {
        self.enable_calls.lock().push(synchronous);
        match self.enable_behavior {
            EnableBehavior::Fail => Err(InstanceError::ActivationFailed {
                pid: self.pid.clone(),
                reason: "scripted failure".to_string(),
            }),
            EnableBehavior::Panic => panic!("scripted panic in {}", self.pid),
            EnableBehavior::Succeed => {
                let mut state = self.state.lock();
                if state.is_terminal() {
                    return Err(InstanceError::Disposed {
                        pid: self.pid.clone(),
                    });
                }
                *state = InstanceState::Active;
                Ok(())
            }
        }
    }

    async fn disable(&self) -> InstanceResult<()> {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return Err(InstanceError::Disposed {
                pid: self.pid.clone(),
            });
        }
        *state = InstanceState::Disabled;
        Ok(())
    }

    async fn dispose(&self, reason: DisposeReason) -> InstanceResult<()> {
        self.dispose_reasons.lock().push(reason);
        *self.state.lock() = InstanceState::Disposed;
        Ok(())
    }

    async fn reconfigure(
        &self,
        properties: Properties,
        change_count: ChangeCount,
        _target: &Pid,
    ) -> InstanceResult<()> {
        if let Some(delay) = change_count
            .value()
            .and_then(|count| self.reconfigure_delays.get(&count))
        {
            tokio::time::sleep(*delay).await;
        }
        if self.state().is_terminal() {
            return Err(InstanceError::Disposed {
                pid: self.pid.clone(),
            });
        }
        self.applied_counts.lock().push(change_count);
        *self.properties.lock() = Some(properties);
        Ok(())
    }
}

/// Manager factory that hands out [`ScriptedManager`]s and remembers every one it built
#[derive(Debug, Default)]
pub struct ScriptedManagerFactory {
    behaviors: Mutex<HashMap<Pid, EnableBehavior>>,
    delays: Mutex<HashMap<Pid, HashMap<u64, Duration>>>,
    created: Mutex<Vec<Arc<ScriptedManager>>>,
}

impl ScriptedManagerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, pid: &str, behavior: EnableBehavior) {
        self.behaviors.lock().insert(Pid::from(pid), behavior);
    }

    /// Make the manager created for `pid` take `delay` to apply change count `count`
    pub fn slow_reconfigure(&self, pid: &str, count: u64, delay: Duration) {
        self.delays
            .lock()
            .entry(Pid::from(pid))
            .or_default()
            .insert(count, delay);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    /// Most recently created manager for `pid`
    pub fn manager(&self, pid: &str) -> Arc<ScriptedManager> {
        let pid = Pid::from(pid);
        self.created
            .lock()
            .iter()
            .rev()
            .find(|manager| manager.pid() == &pid)
            .cloned()
            .unwrap_or_else(|| panic!("no manager created for {pid}"))
    }
}

impl InstanceManagerFactory for ScriptedManagerFactory {
    fn create(&self, pid: &Pid, options: InstanceOptions) -> Arc<dyn InstanceManager> {
        assert!(options.immediate, "factory instances must be immediate");
        let behavior = self.behaviors.lock().get(pid).copied().unwrap_or_default();
        let delays = self.delays.lock().get(pid).cloned().unwrap_or_default();
        let manager = Arc::new(ScriptedManager::with_delays(pid.clone(), behavior, delays));
        self.created.lock().push(manager.clone());
        manager
    }
}

pub fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
