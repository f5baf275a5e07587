//! Search Strategy Module
//!
//! - Sequential search: one root at a time (search module)
//! - Parallel search: several context roots at once (Rayon)

pub mod parallel;

pub use parallel::search_roots;
