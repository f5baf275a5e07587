//! Core stream parsing primitives
//!
//! This module contains the fundamental building blocks for reading the
//! host's tagged content stream:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Entities: entity decoding with Cow (zero-copy when possible)
//! - Attributes: attribute parsing and extraction

pub mod attributes;
pub mod entities;
pub mod scanner;
