//! # Reconcile
//!
//! Single-resource reconciliation: take one resource description, pick the
//! implementation that fits the host, drive the resource toward the
//! requested state (or run one action on it) and report what the system
//! looks like afterwards.
//!
//! ## Core Concepts
//!
//! - **Descriptor**: the declared shape of a kind (properties, actions)
//! - **Provider**: one platform-specific strategy for a kind
//! - **Facts**: the host description that drives provider selection
//! - **Engine**: the declarative and imperative strategies
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{Engine, NoListener, Registry, Request};
//!
//! let mut registry = Registry::new();
//! registry.register(file_type());
//!
//! let request = Request::from_json(
//!     r#"{"type": "file", "attributes": {"path": "/tmp/x", "content": "hi"}}"#,
//! )?;
//! let outcome = Engine::new(&registry, &runner).execute(&request, &mut NoListener)?;
//! println!("{}", reconcile::serializer::to_json(&outcome.state, false));
//! ```
//!
//! ## Collaborator Traits
//!
//! - [`CommandRunner`]: runs external commands for providers
//! - [`EventListener`]: receives resolution, change and action notices
//!
//! This keeps the core free of process spawning and output surfaces.

pub mod context;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod facts;
pub mod property;
pub mod provider;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod resource;
pub mod serializer;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, CommandRunner, EventListener, NoCommands, NoListener};
pub use descriptor::{ActionEffect, ActionSpec, ENSURE, NOTHING, ResourceDescriptor};
pub use engine::{Engine, Outcome};
pub use error::{Error, ErrorCategory, Result};
pub use facts::FactContext;
pub use property::{PropertyKind, PropertyRole, PropertySpec};
pub use provider::{ABSENT, Provider, apply_action, converge_properties};
pub use registry::{Registry, ResourceType};
pub use request::{DeclarativeRequest, ImperativeRequest, Request};
pub use resolver::Resolver;
pub use resource::{PROVIDER, ResourceInstance};
pub use types::{CommandOutput, EvaluationStatus, Event, EventStatus, PropertyMap};
