use crate::types::Pid;
use thiserror::Error;

/// Failures raised by a single instance manager
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstanceError {
    #[error("Instance {pid} has been disposed")]
    Disposed { pid: Pid },

    #[error("Invalid instance transition for {pid} from {from} on {event}")]
    InvalidTransition {
        pid: Pid,
        from: String,
        event: String,
    },

    #[error("Activation failed for {pid}: {reason}")]
    ActivationFailed { pid: Pid, reason: String },

    #[error("Deactivation failed for {pid}: {reason}")]
    DeactivationFailed { pid: Pid, reason: String },
}

impl InstanceError {
    pub fn pid(&self) -> &Pid {
        match self {
            Self::Disposed { pid }
            | Self::InvalidTransition { pid, .. }
            | Self::ActivationFailed { pid, .. }
            | Self::DeactivationFailed { pid, .. } => pid,
        }
    }
}

/// Failures surfaced by the factory and its registry
#[derive(Error, Debug)]
pub enum FactoryError {
    /// A registry operation ran after the registry was cleared
    #[error("Instance registry for {factory} is closed")]
    RegistryClosed { factory: Pid },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Instance(#[from] InstanceError),
}

impl From<config::ConfigError> for FactoryError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type InstanceResult<T> = Result<T, InstanceError>;
pub type FactoryResult<T> = Result<T, FactoryError>;
