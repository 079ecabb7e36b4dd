//! # Core Types
//!
//! Identity and payload types shared by the registry, the change-count tracker and
//! the factory coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Property set delivered with a configuration update
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Persistent identifier of one configuration object.
///
/// Unique within a factory's registry and never mutated once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(String);

impl Pid {
    pub fn new(pid: impl Into<String>) -> Self {
        Self(pid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pid {
    fn from(pid: &str) -> Self {
        Self(pid.to_string())
    }
}

impl From<String> for Pid {
    fn from(pid: String) -> Self {
        Self(pid)
    }
}

impl AsRef<str> for Pid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Change sequence number carried by a configuration update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCount {
    /// Out-of-band update; always accepted and never recorded as a baseline
    Unknown,
    /// A real generation number from the configuration source
    Known(u64),
}

impl ChangeCount {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            Self::Unknown => None,
            Self::Known(count) => Some(*count),
        }
    }
}

impl From<u64> for ChangeCount {
    fn from(count: u64) -> Self {
        Self::Known(count)
    }
}

impl From<Option<u64>> for ChangeCount {
    fn from(count: Option<u64>) -> Self {
        count.map_or(Self::Unknown, Self::Known)
    }
}

impl fmt::Display for ChangeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Known(count) => write!(f, "{count}"),
        }
    }
}
