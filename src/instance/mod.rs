//! # Instance Management
//!
//! Lifecycle state machine for one component instance bound to one configuration
//! identity, and the traits the factory uses to create and drive such instances.
//!
//! - [`InstanceManager`] - the contract the factory drives
//! - [`InstanceManagerFactory`] - builds a manager for a newly seen identity
//! - [`ComponentLifecycle`] - business-logic hooks invoked on activate/deactivate
//! - [`ConfiguredInstance`] - the stock state machine implementation

pub mod configured;
pub mod events;
pub mod manager;
pub mod states;

pub use configured::ConfiguredInstance;
pub use events::InstanceEvent;
pub use manager::{ComponentLifecycle, InstanceManager, InstanceManagerFactory, InstanceOptions};
pub use states::InstanceState;
