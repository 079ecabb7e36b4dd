use crate::instance::InstanceManager;
use crate::types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Activation state of the factory itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryState {
    #[default]
    NotActivated,
    Activated,
    /// Terminal; configuration events and lifecycle calls are ignored
    Disposed,
}

impl FactoryState {
    pub fn is_activated(&self) -> bool {
        matches!(self, Self::Activated)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl fmt::Display for FactoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotActivated => write!(f, "not_activated"),
            Self::Activated => write!(f, "activated"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Static description of a configuration component factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryDescriptor {
    /// Component name
    pub name: String,
    /// Configuration identity of the factory's own configuration
    pub configuration_pid: Pid,
}

impl FactoryDescriptor {
    pub fn new(name: impl Into<String>, configuration_pid: impl Into<Pid>) -> Self {
        Self {
            name: name.into(),
            configuration_pid: configuration_pid.into(),
        }
    }
}

/// Result of applying one configuration update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update targeted the factory's own configuration and was stored
    FactoryReconfigured,
    /// The update was applied to an instance; `created` when the instance is new
    Applied { created: bool },
    /// The change count was not newer than the last applied one
    Stale,
    /// The factory is disposed; nothing was applied
    Ignored,
    /// The instance rejected the new properties
    Failed { reason: String },
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::FactoryReconfigured | Self::Applied { .. })
    }
}

/// Per-instance outcome of a fan-out across the registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    pub attempted: usize,
    pub failed: Vec<Pid>,
    /// The per-instance operations were dispatched but not awaited, so only
    /// `attempted` is known
    pub detached: bool,
}

impl FanoutSummary {
    /// Summary for `attempted` operations left running on their own tasks
    pub fn detached(attempted: usize) -> Self {
        Self {
            attempted,
            failed: Vec::new(),
            detached: true,
        }
    }

    /// Instances confirmed to have completed the operation; zero when detached
    pub fn succeeded(&self) -> usize {
        if self.detached {
            return 0;
        }
        self.attempted - self.failed.len()
    }

    /// Every attempted operation is known to have succeeded
    pub fn is_clean(&self) -> bool {
        !self.detached && self.failed.is_empty()
    }
}

/// Entry published to the service layer: the factory itself plus each instance
#[derive(Debug, Clone)]
pub enum RegisteredComponent {
    Factory { pid: Pid, state: FactoryState },
    Instance(Arc<dyn InstanceManager>),
}

impl RegisteredComponent {
    pub fn pid(&self) -> &Pid {
        match self {
            Self::Factory { pid, .. } => pid,
            Self::Instance(manager) => manager.pid(),
        }
    }
}
