//! Rule Definitions
//!
//! In-memory JSON form of rules as handed over by the host. Loading turns a
//! `RuleDef` into a validated `Rule`; dumping goes the other way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::properties::PropertyValue;
use super::types::RuleType;
use crate::search::Constraints;

/// Constraint authored either as text or as a bare integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    Int(i64),
    Str(String),
}

impl ConstraintValue {
    fn into_text(self) -> String {
        match self {
            ConstraintValue::Int(value) => value.to_string(),
            ConstraintValue::Str(value) => value,
        }
    }
}

pub type PropertyData = BTreeMap<String, Option<PropertyValue>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CriteriaDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_page_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ConstraintValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<ConstraintValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub gestures: BTreeMap<String, String>,
    /// Property overrides
    #[serde(alias = "overrides", skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertyData,
}

impl CriteriaDef {
    /// Search constraints, blank values dropped
    pub fn constraints(&self) -> Constraints {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }
        Constraints {
            text: keep(self.text.clone()),
            role: keep(self.role.clone().map(ConstraintValue::into_text)),
            tag: keep(self.tag.clone()),
            id: keep(self.id.clone()),
            class_name: keep(self.class_name.clone()),
            states: keep(self.states.clone().map(ConstraintValue::into_text)),
            src: keep(self.src.clone()),
            relative_path: keep(self.relative_path.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleDef {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<CriteriaDef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gestures: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertyData,
}

impl RuleDef {
    pub fn new(name: impl Into<String>, rule_type: RuleType) -> Self {
        RuleDef {
            name: name.into(),
            rule_type,
            comment: None,
            criteria: Vec::new(),
            gestures: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }
}
