//! Policy enforcement for the Turnstile engine.
//!
//! The [`Enforcer`] composes a validated model with a mutable policy set,
//! role-mapping policies and their inheritance graphs, a matcher
//! environment carrying built-in and user-defined functions, and a
//! pluggable persistence [`Adapter`]. The [`registry`] module wraps an
//! enforcer in a dedicated task so services can share one instance by name
//! with strictly serialized operations.

#![warn(missing_docs, clippy::pedantic)]

mod adapter;
mod builtins;
mod csv;
mod enforcer;
mod error;
mod file;
mod mapping;
mod memory;
pub mod registry;

pub use adapter::{Adapter, PolicyFilter, PolicyRecord};
pub use enforcer::Enforcer;
pub use error::{AdapterError, AdapterResult, EnforcerError, EnforcerResult};
pub use file::FileAdapter;
pub use mapping::MappingPolicy;
pub use memory::MemoryAdapter;
