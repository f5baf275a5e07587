//! Rule Module - Declarative rules evaluated against the content tree
//!
//! - `def`: serde definitions as stored by the host
//! - `rules`, `criteria`: compiled rules and their ordered alternatives
//! - `properties`, `mutation`: property table and control mutation templates
//! - `context`: one evaluation pass (memo, cycle detection, page title)
//! - `snapshot`: immutable results of an update
//! - `manager`: layers, update cycle, navigation and auto actions
//! - `zone`: identity-tracked navigation restriction

pub mod context;
pub mod criteria;
pub mod def;
pub mod layers;
pub mod manager;
pub mod mutation;
pub mod properties;
pub mod result;
pub mod rules;
pub mod snapshot;
pub mod types;
pub mod zone;

pub use criteria::Criteria;
pub use def::{ConstraintValue, CriteriaDef, PropertyData, RuleDef};
pub use layers::{Layer, Layers};
pub use manager::{GestureTarget, ManagerState, NavHit, QuickNav, RuleManager};
pub use mutation::{AttrValue, MutatedControl, Mutation};
pub use properties::{Properties, PropertyChain, PropertyKey, PropertyValue};
pub use result::{AutoAction, RuleResult};
pub use rules::Rule;
pub use snapshot::Snapshot;
pub use types::{Direction, RuleType, BUILTIN_ACTIONS, MOVETO, USER_LAYER};
pub use zone::Zone;
