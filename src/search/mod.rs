//! Tree Search Module
//!
//! - Query: compiles simple criteria constraints into predicates
//! - Matcher: pre-order predicate and text search over a subtree

pub mod matcher;
pub mod query;

pub use matcher::{matches_node, search, search_string, Exclude};
pub use query::{Constraints, Predicate, Prop, Query, Test, Value};
