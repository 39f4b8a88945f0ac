//! Ordered INI-style configuration reading for the Turnstile engine.
//!
//! Model files are plain INI: bracketed section headers, `key = value`
//! entries, `#`/`;` comments. Unlike general-purpose INI crates, this reader
//! preserves the insertion order of sections and of keys within a section,
//! keeps duplicate keys as separate entries, and collects key/value lines
//! that appear before any header under [`DEFAULT_SECTION`]. All of that is
//! load-bearing for model validation downstream.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ini;

pub use error::{ConfigError, ConfigResult};
pub use ini::{Config, DEFAULT_SECTION, Section};
