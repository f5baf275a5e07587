//! DOM Module - Arena-based content tree
//!
//! Implements the offset-addressed tree using:
//! - Arena allocation for nodes
//! - NodeId (u32) indices for cache-friendly traversal
//! - String interning for control names, tags and class lists
//! - Generation-checked handles for references that outlive a rebuild

pub mod builder;
pub mod document;
pub mod node;
pub mod strings;

pub use builder::{parse_document, ChangeSeq, TreeBuilder};
pub use document::{ChildIter, DescendantIter, Document};
pub use node::{ControlField, Node, NodeAttribute, NodeHandle, NodeId, NodeKind};
pub use strings::StringPool;
