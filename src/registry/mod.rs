//! # Registry Infrastructure
//!
//! Concurrent bookkeeping owned by a configuration component factory.
//!
//! ```text
//! Registry Infrastructure
//! ├── InstanceRegistry      (PID -> instance record, lazy creation)
//! └── ChangeCountTracker    (PID -> last applied change count)
//! ```

pub mod change_count;
pub mod instance_registry;

pub use change_count::ChangeCountTracker;
pub use instance_registry::{InstanceRecord, InstanceRegistry};
