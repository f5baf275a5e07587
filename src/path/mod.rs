//! Relative Path Engine
//!
//! Compact step-code language for relative tree navigation:
//! - `b`/`a`: previous/next text in document flow
//! - `u`/`d`: parent/first child
//! - `l`/`r`: previous/next sibling
//! - `c{...}`: check without moving
//! - upper-case steps repeat until the following check holds
//!
//! Compiled expressions are cached in an LRU keyed by source text.

pub mod axes;
pub mod compiler;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use compiler::{CompiledPath, CompiledStep, PathCache};
pub use eval::walk;
pub use parser::Axis;
