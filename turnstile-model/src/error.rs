//! Error types for model validation and request/policy construction.

use thiserror::Error;
use turnstile_config::ConfigError;
use turnstile_matcher::CompileError;

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors produced while loading a model or constructing requests and
/// policies against it.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A required section is absent from the config file.
    #[error("missing {section} section in the config file")]
    MissingSection {
        /// Name of the absent section.
        section: &'static str,
    },
    /// The `request_definition` section is empty, holds more than one entry,
    /// or its attribute list is malformed.
    #[error("invalid request definition")]
    InvalidRequestDefinition,
    /// A `policy_definition` entry has a malformed attribute list.
    #[error("invalid policy definition")]
    InvalidPolicyDefinition,
    /// The `policy_effect` rule is not one of the two recognized strings.
    #[error("invalid policy effect rule")]
    InvalidPolicyEffect,
    /// The `matchers` section is empty or holds more than one entry.
    #[error("invalid matchers")]
    InvalidMatchers,
    /// A `role_definition` value is not `_,_` or `_,_,_`, or a name repeats.
    #[error("invalid role definition")]
    InvalidRoleDefinition,
    /// A request tuple with the wrong arity or a non-string, non-number
    /// value.
    #[error("invalid request")]
    InvalidRequest,
    /// A policy tuple with an arity matching neither the definition nor the
    /// definition minus the implicit `eft`.
    #[error("invalid policy")]
    InvalidPolicy,
    /// A supplied `eft` value other than `"allow"` or `"deny"`.
    #[error("invalid value for the eft attribute: {value}")]
    InvalidEft {
        /// The offending value, rendered for the message.
        value: String,
    },
    /// A policy attribute value that is neither a string nor a number.
    #[error("invalid attribute value type")]
    InvalidAttrType,
    /// A policy tuple whose key matches no policy definition.
    #[error("policy with key {key} is undefined")]
    UndefinedPolicyKey {
        /// The unknown key.
        key: String,
    },
    /// Config file reading or parsing failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The matcher expression failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
}
