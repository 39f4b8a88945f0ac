//! Error types for adapters and the enforcer.

use thiserror::Error;
use turnstile_model::ModelError;

/// Result alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors surfaced by persistence adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Underlying I/O failure while reading or writing policy storage.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// A load was requested but the adapter has nothing to load from.
    #[error("No adapter set and no policy file provided")]
    NoPolicySource,
    /// Adapter backend failure.
    #[error("adapter backend error: {reason}")]
    Backend {
        /// Human-readable context provided by the backend.
        reason: String,
    },
}

impl AdapterError {
    /// Convenience helper to construct backend errors.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result alias for enforcer operations.
pub type EnforcerResult<T> = Result<T, EnforcerError>;

/// Errors surfaced by enforcer operations.
///
/// [`EnforcerError::AlreadyExisted`] and [`EnforcerError::Nonexistent`] are
/// returned as error values so the caller decides whether a duplicate add
/// or a missing remove is actually a problem.
#[derive(Debug, Error)]
pub enum EnforcerError {
    /// The policy or mapping policy to add is already present.
    #[error("already existed")]
    AlreadyExisted,
    /// The policy or mapping policy to remove is absent.
    #[error("nonexistent")]
    Nonexistent,
    /// A mapping policy names a role mapping the model does not declare.
    #[error("mapping name not found: {name}")]
    MappingNotFound {
        /// The undeclared name.
        name: String,
    },
    /// A mapping tuple whose arity does not match the declared role mapping.
    #[error("invalid mapping policy")]
    InvalidMapping,
    /// Model validation failure.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Adapter failure, propagated unchanged.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
