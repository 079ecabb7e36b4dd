//! # System Constants
//!
//! Reason codes and well-known service property keys used across the component
//! lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known service property keys published for a factory
pub mod properties {
    pub const COMPONENT_NAME: &str = "component.name";
    pub const SERVICE_PID: &str = "service.pid";
    pub const SERVICE_DESCRIPTION: &str = "service.description";

    /// Prefix of the description published for configurable factories
    pub const FACTORY_DESCRIPTION_PREFIX: &str = "Configurable (nonstandard) Factory Component";
}

/// Why a component instance is being deactivated or disposed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposeReason {
    #[default]
    Unspecified,
    /// The instance or its factory was disabled
    Disabled,
    ReferenceUnsatisfied,
    /// The instance is being cycled to pick up new properties
    ConfigurationModified,
    ConfigurationDeleted,
    Disposed,
    /// The owning bundle/module is stopping
    BundleStopped,
}

impl DisposeReason {
    /// Numeric reason code as exchanged with component runtimes
    pub fn code(&self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Disabled => 1,
            Self::ReferenceUnsatisfied => 2,
            Self::ConfigurationModified => 3,
            Self::ConfigurationDeleted => 4,
            Self::Disposed => 5,
            Self::BundleStopped => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Disabled),
            2 => Some(Self::ReferenceUnsatisfied),
            3 => Some(Self::ConfigurationModified),
            4 => Some(Self::ConfigurationDeleted),
            5 => Some(Self::Disposed),
            6 => Some(Self::BundleStopped),
            _ => None,
        }
    }
}

impl fmt::Display for DisposeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspecified"),
            Self::Disabled => write!(f, "disabled"),
            Self::ReferenceUnsatisfied => write!(f, "reference_unsatisfied"),
            Self::ConfigurationModified => write!(f, "configuration_modified"),
            Self::ConfigurationDeleted => write!(f, "configuration_deleted"),
            Self::Disposed => write!(f, "disposed"),
            Self::BundleStopped => write!(f, "bundle_stopped"),
        }
    }
}
