use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one configuration-bound component instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum InstanceState {
    /// Initial state; the instance exists but takes no part in the system
    #[default]
    Disabled = 0,
    /// Enabled but the component has not been activated yet
    Enabled = 1,
    /// The component is activated with its current properties
    Active = 2,
    /// Terminal state; no further transitions allowed
    Disposed = 3,
}

impl InstanceState {
    /// Check if the instance has been enabled (whether or not it is activated)
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled | Self::Active)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl From<u8> for InstanceState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Disabled,
            1 => Self::Enabled,
            2 => Self::Active,
            _ => Self::Disposed,
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabled => write!(f, "enabled"),
            Self::Active => write!(f, "active"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

impl std::str::FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "enabled" => Ok(Self::Enabled),
            "active" => Ok(Self::Active),
            "disposed" => Ok(Self::Disposed),
            _ => Err(format!("Invalid instance state: {s}")),
        }
    }
}
