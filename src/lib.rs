#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Component Factory Core
//!
//! Lifecycle manager for configuration-instantiated components.
//!
//! ## Overview
//!
//! A configuration component factory never creates instances on request. Instead, one
//! instance is spawned lazily the first time a configuration object with a new PID
//! appears, and torn down when that configuration is deleted. The factory keeps three
//! lifecycles in step:
//!
//! - the factory's own activation state (not activated, activated, disposed)
//! - each per-configuration instance's state (disabled, enabled, active, disposed)
//! - the change count of each configuration, used to drop stale and replayed updates
//!
//! ## Module Organization
//!
//! - [`factory`] - the lifecycle coordinator and its outcomes
//! - [`registry`] - instance registry and change-count tracker
//! - [`instance`] - per-instance state machine and manager traits
//! - [`types`] - PID, change count and property types
//! - [`config`] - layered runtime configuration
//! - [`logging`] - structured logging setup
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use component_factory::config::FactoryConfig;
//! use component_factory::constants::DisposeReason;
//! use component_factory::factory::{ConfigurationComponentFactory, FactoryDescriptor};
//! use component_factory::instance::{ComponentLifecycle, ConfiguredInstance};
//! use component_factory::types::{ChangeCount, Pid, Properties};
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! #[async_trait::async_trait]
//! impl ComponentLifecycle for Greeter {
//!     async fn activate(&self, pid: &Pid, _properties: &Properties) -> anyhow::Result<()> {
//!         println!("hello from {pid}");
//!         Ok(())
//!     }
//!
//!     async fn deactivate(&self, _pid: &Pid, _reason: DisposeReason) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let factory = ConfigurationComponentFactory::new(
//!     FactoryDescriptor::new("org.example.Greeter", "org.example.greeter"),
//!     FactoryConfig::default(),
//!     ConfiguredInstance::factory(Arc::new(Greeter)),
//! );
//!
//! factory.factory_enable(true).await;
//! let outcome = factory
//!     .on_configuration_updated(
//!         &Pid::from("org.example.greeter.1"),
//!         Properties::new(),
//!         ChangeCount::Known(1),
//!     )
//!     .await;
//! assert!(outcome.is_applied());
//! factory.factory_dispose(DisposeReason::BundleStopped).await;
//! # });
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod factory;
pub mod instance;
pub mod logging;
pub mod registry;
pub mod types;

pub use config::{FactoryConfig, LoggingConfig};
pub use constants::DisposeReason;
pub use error::{FactoryError, FactoryResult, InstanceError, InstanceResult};
pub use factory::{
    ConfigurationComponentFactory, FactoryDescriptor, FactoryState, FanoutSummary,
    RegisteredComponent, UpdateOutcome,
};
pub use instance::{
    ComponentLifecycle, ConfiguredInstance, InstanceManager, InstanceManagerFactory,
    InstanceOptions, InstanceState,
};
pub use registry::{ChangeCountTracker, InstanceRecord, InstanceRegistry};
pub use types::{ChangeCount, Pid, Properties};
