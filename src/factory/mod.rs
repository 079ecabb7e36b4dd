//! # Factory Lifecycle
//!
//! The coordinator that keeps a factory's activation state, its per-configuration
//! instances and their change counts in step.

pub mod coordinator;
pub mod state;

pub use coordinator::ConfigurationComponentFactory;
pub use state::{
    FactoryDescriptor, FactoryState, FanoutSummary, RegisteredComponent, UpdateOutcome,
};
