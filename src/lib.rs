//! # service-container - Embedded Inversion-of-Control Container
//!
//! A small IoC runtime that builds application components by constructor
//! injection, manages their lifetimes, and starts lifecycle-managed
//! components, all without runtime reflection or code generation. Types are
//! described to the container with [`ComponentDescriptor`]s.
//!
//! ## Features
//!
//! - **Constructor injection** - the greediest constructor whose parameters are all registered wins
//! - **Lifestyles** - singleton, transient and caller-supplied fixed instances
//! - **Open generics** - register `Repository<_>` once, resolve `Repository<Order>`
//! - **Auto-start** - components implementing [`AutoStart`] are started when built
//! - **Catalog registration** - [`ServiceRegistrator`] registers everything a [`TypeFinder`] declares
//! - **Lock-free** - `DashMap` tables, safe to share across threads
//! - **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use service_container::prelude::*;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 { 42 }
//! }
//!
//! struct Scheduler {
//!     clock: Arc<dyn Clock>,
//! }
//!
//! let container = Container::new();
//!
//! container.register_instance(
//!     "clock",
//!     ServiceType::of::<dyn Clock>(),
//!     Instance::new(Arc::new(FixedClock) as Arc<dyn Clock>),
//! )?;
//!
//! container.register_self(
//!     "scheduler",
//!     ComponentDescriptor::builder::<Scheduler>()
//!         .constructor([ServiceType::of::<dyn Clock>()], |args| {
//!             Ok(Scheduler { clock: args.get_dyn(0)? })
//!         })
//!         .build(),
//!     Lifestyle::Singleton,
//! )?;
//!
//! let scheduler = container.get_concrete::<Scheduler>()?;
//! assert_eq!(scheduler.clock.now(), 42);
//! # Ok::<(), ContainerError>(())
//! ```
//!
//! ## Auto-start components
//!
//! ```rust
//! use service_container::prelude::*;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! static STARTED: AtomicBool = AtomicBool::new(false);
//!
//! struct Indexer;
//!
//! impl AutoStart for Indexer {
//!     fn start(&self) -> Result<()> {
//!         STARTED.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_self(
//!     "indexer",
//!     ComponentDescriptor::builder::<Indexer>()
//!         .constructor([], |_| Ok(Indexer))
//!         .auto_start()
//!         .build(),
//!     Lifestyle::Singleton,
//! )?;
//!
//! assert!(STARTED.load(Ordering::SeqCst));
//! # Ok::<(), ContainerError>(())
//! ```

mod config;
mod container;
mod error;
mod factory;
pub mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod registrator;
mod selector;
mod service_type;
mod storage;

pub use config::*;
pub use container::*;
pub use error::*;
pub use factory::{Arguments, Component, ComponentDescriptor, Constructor, DescriptorBuilder};
pub use lifecycle::AutoStart;
pub use provider::*;
pub use registrator::*;
pub use service_type::*;

#[cfg(feature = "derive")]
pub use service_container_derive::Component;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AutoStart, Component, ComponentDescriptor, Container, ContainerConfig, ContainerError,
        Injectable, Instance, Lifestyle, Result, ServiceRegistrator, ServiceType, TypeFinder,
    };
    pub use std::sync::Arc;
}
