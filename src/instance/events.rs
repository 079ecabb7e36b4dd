use crate::constants::DisposeReason;
use serde::{Deserialize, Serialize};

/// Events that drive instance state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InstanceEvent {
    Enable,
    Activate,
    /// Deactivate the component but keep the instance enabled
    Deactivate(DisposeReason),
    Disable,
    Dispose(DisposeReason),
}

impl InstanceEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Activate => "activate",
            Self::Deactivate(_) => "deactivate",
            Self::Disable => "disable",
            Self::Dispose(_) => "dispose",
        }
    }

    pub fn reason(&self) -> Option<DisposeReason> {
        match self {
            Self::Deactivate(reason) | Self::Dispose(reason) => Some(*reason),
            _ => None,
        }
    }
}
