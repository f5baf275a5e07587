//! Stream Reader Module
//!
//! - StreamReader: zero-copy pull parser over the host's content stream
//! - Events: stream event types for pull parsing

pub mod events;
pub mod slice;

pub use events::{StartTag, StreamEvent};
pub use slice::{ReadError, StreamReader};
