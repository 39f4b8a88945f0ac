//! PERM model loading and validation.
//!
//! A model file describes what a request looks like (`request_definition`),
//! what a policy rule looks like (`policy_definition`), how a request
//! matches a policy (`matchers`), how multiple matches combine into a
//! decision (`policy_effect`), and optionally which role-mapping names
//! exist (`role_definition`). [`Model`] parses and validates all of that
//! once; afterwards it constructs [`Request`]s and [`Policy`]s, evaluates
//! the compiled matcher per request/policy pair, and folds matched policies
//! through the effect rule.

#![warn(missing_docs, clippy::pedantic)]

mod attr;
mod definition;
mod effect;
mod error;
mod model;
mod policy;

pub use attr::AttrValue;
pub use definition::{PolicyDefinition, RequestDefinition, RoleArity, RoleMapping};
pub use effect::PolicyEffect;
pub use error::{ModelError, ModelResult};
pub use model::Model;
pub use policy::{Policy, Request};
