//! Control Mutations
//!
//! A rule may transform the controls it matches, e.g. present a clickable
//! `div` as a button. Every result carrying a mutation folds its template
//! into the `MutatedControl` entry of its control, later results winning
//! per attribute.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;

use super::types::RuleType;
use crate::dom::NodeId;

const ROLE_BUTTON: u32 = 9;
const ROLE_HEADING: u32 = 40;
const ROLE_LINK: u32 = 19;
const ROLE_SECTION: u32 = 86;

/// Value of a mutated attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(u32),
    Bool(bool),
    Str(Cow<'static, str>),
}

/// Template applied to a matched control
#[derive(Debug)]
pub struct Mutation {
    pub id: &'static str,
    pub attrs: &'static [(&'static str, AttrValue)],
    /// Also set `name` to the result label
    pub mutate_name: bool,
}

macro_rules! heading {
    ($id:literal, $level:literal) => {
        Mutation {
            id: $id,
            attrs: &[
                ("role", AttrValue::Int(ROLE_HEADING)),
                ("level", AttrValue::Str(Cow::Borrowed($level))),
            ],
            mutate_name: false,
        }
    };
}

pub static MUTATIONS: [Mutation; 15] = [
    Mutation {
        id: "button",
        attrs: &[("role", AttrValue::Int(ROLE_BUTTON))],
        mutate_name: false,
    },
    heading!("heading.1", "1"),
    heading!("heading.2", "2"),
    heading!("heading.3", "3"),
    heading!("heading.4", "4"),
    heading!("heading.5", "5"),
    heading!("heading.6", "6"),
    Mutation {
        id: "labelled",
        attrs: &[],
        mutate_name: true,
    },
    Mutation {
        id: "landmark.region",
        attrs: &[("landmark", AttrValue::Str(Cow::Borrowed("region")))],
        mutate_name: true,
    },
    Mutation {
        id: "landmark.nav.named",
        attrs: &[("landmark", AttrValue::Str(Cow::Borrowed("navigation")))],
        mutate_name: true,
    },
    Mutation {
        id: "landmark.nav.unnamed",
        attrs: &[("landmark", AttrValue::Str(Cow::Borrowed("navigation")))],
        mutate_name: false,
    },
    Mutation {
        id: "link",
        attrs: &[("role", AttrValue::Int(ROLE_LINK))],
        mutate_name: false,
    },
    Mutation {
        id: "section",
        attrs: &[("role", AttrValue::Int(ROLE_SECTION))],
        mutate_name: false,
    },
    Mutation {
        id: "table.data",
        attrs: &[("table-layout", AttrValue::Bool(false))],
        mutate_name: false,
    },
    Mutation {
        id: "table.layout",
        attrs: &[("table-layout", AttrValue::Bool(true))],
        mutate_name: false,
    },
];

const ZONE_MUTATIONS: [&str; 7] = [
    "labelled",
    "section",
    "landmark.region",
    "landmark.nav.named",
    "landmark.nav.unnamed",
    "table.data",
    "table.layout",
];

/// Look up a template by id
pub fn mutation(id: &str) -> Option<&'static Mutation> {
    MUTATIONS.iter().find(|m| m.id == id)
}

/// Whether rules of `rule_type` may use template `id`
pub fn is_available(rule_type: RuleType, id: &str) -> bool {
    match rule_type {
        RuleType::Marker => mutation(id).is_some(),
        RuleType::Zone => ZONE_MUTATIONS.contains(&id),
        _ => false,
    }
}

/// Template ids available to `rule_type`, in presentation order
pub fn available(rule_type: RuleType) -> Vec<&'static str> {
    MUTATIONS
        .iter()
        .map(|m| m.id)
        .filter(|id| is_available(rule_type, id))
        .collect()
}

/// Effective mutations of one control
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutatedControl {
    pub control_id: u64,
    #[serde(skip)]
    pub node: NodeId,
    pub start: u32,
    pub end: u32,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl MutatedControl {
    pub fn new(control_id: u64, node: NodeId, start: u32, end: u32) -> Self {
        MutatedControl {
            control_id,
            node,
            start,
            end,
            attrs: BTreeMap::new(),
        }
    }

    /// Fold a template in, `label` feeding the `name` attribute
    pub fn apply(&mut self, mutation: &Mutation, label: &str) {
        for (key, value) in mutation.attrs {
            self.attrs.insert((*key).to_string(), value.clone());
        }
        if mutation.mutate_name {
            self.attrs
                .insert("name".to_string(), AttrValue::Str(Cow::Owned(label.to_string())));
        }
    }

    pub fn get(&self, attr: &str) -> Option<&AttrValue> {
        self.attrs.get(attr)
    }
}
