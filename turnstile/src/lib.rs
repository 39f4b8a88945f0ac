//! Turnstile: an embeddable PERM-model access-control engine.
//!
//! Depend on this crate to pull in the whole engine; the member crates are
//! re-exported behind feature flags so lighter integrations (say, just the
//! matcher compiler) can disable what they do not need.

#![warn(missing_docs, clippy::pedantic)]

/// Matcher expression compiler and evaluator (always available).
pub use turnstile_matcher as matcher;

/// Ordered INI configuration reader (enabled by the `config` feature).
#[cfg(feature = "config")]
pub use turnstile_config as config;

/// Role inheritance graphs (enabled by the `roles` feature).
#[cfg(feature = "roles")]
pub use turnstile_roles as roles;

/// Model loading and validation (enabled by the `model` feature).
#[cfg(feature = "model")]
pub use turnstile_model as model;

/// Enforcement, adapters, and named instances (enabled by the `enforcer`
/// feature).
#[cfg(feature = "enforcer")]
pub use turnstile_enforcer as enforcer;
