//! webaccess_core - Rule engine for screen reader web navigation
//!
//! Layers:
//! A: Tagged stream reader (reader, core)
//! B: Offset-addressed content tree (dom)
//! C: Tree search and relative path walker (search, path, strategy)
//! D: Declarative rules, results, zones and mutations (rule)
//! E: Shared manager and background worker (resource, scheduler)
//!
//! The host supplies content through [`ContentSource`] and receives
//! updates through [`HostSink`]. Logging goes through `tracing`; the crate
//! never installs a subscriber.

pub mod config;
pub mod core;
pub mod dom;
pub mod error;
pub mod host;
pub mod path;
pub mod reader;
pub mod resource;
pub mod rule;
pub mod scheduler;
pub mod search;
pub mod strategy;

pub use config::Config;
pub use dom::{parse_document, ChangeSeq, Document, NodeHandle, NodeId, NodeKind, TreeBuilder};
pub use error::{Error, NotReadyReason, Result};
pub use host::{ContentSource, HostSink, NullSink, StaticContent};
pub use path::{walk, CompiledPath, PathCache};
pub use resource::{ManagerRef, ManagerResource};
pub use rule::{
    AutoAction, Direction, GestureTarget, ManagerState, MutatedControl, NavHit, QuickNav, Rule,
    RuleDef, RuleManager, RuleResult, RuleType, Snapshot, Zone,
};
pub use scheduler::{Message, Scheduler};
pub use search::{search, Constraints, Exclude, Query};
