//! Role inheritance graphs.
//!
//! Each role-mapping name declared in a model (`g`, `g2`, ...) owns a
//! [`RoleGroup`]: a directed graph over role identifiers where an edge
//! `A -> B` means "A has role B". [`RoleGroup::has_inheritance`] answers
//! transitive reachability queries, and [`stub_2`]/[`stub_3`] package a
//! group snapshot as a matcher function so `g(r.sub, p.sub)` works inside
//! matcher expressions.

#![warn(missing_docs, clippy::pedantic)]

mod graph;
mod stub;

pub use graph::RoleGroup;
pub use stub::{stub_2, stub_3};
