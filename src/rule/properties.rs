//! Rule Properties
//!
//! Properties resolve through a chain: criteria level, then rule level, then
//! the global default. An empty string or a missing value is "not set" and
//! falls through; `false` is a value and does not.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::mutation;
use super::types::RuleType;

/// Property value as authored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Str(String),
}

impl PropertyValue {
    fn is_empty(&self) -> bool {
        matches!(self, PropertyValue::Str(s) if s.is_empty())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Str,
}

/// Known properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    AutoAction,
    Multiple,
    FormMode,
    Skip,
    SayName,
    CustomName,
    CustomValue,
    Mutation,
    SubModule,
}

/// Table entry of a property
#[derive(Debug)]
pub struct PropertySpec {
    pub key: PropertyKey,
    pub name: &'static str,
    pub rule_types: &'static [RuleType],
    pub value_type: ValueType,
    /// Editors offer a fixed set of choices
    pub restricted: bool,
}

use RuleType::{Marker, PageTitle1, PageTitle2, Parent, Zone};

pub static PROPERTIES: [PropertySpec; 9] = [
    PropertySpec {
        key: PropertyKey::AutoAction,
        name: "autoAction",
        rule_types: &[Marker, Zone],
        value_type: ValueType::Str,
        restricted: true,
    },
    PropertySpec {
        key: PropertyKey::Multiple,
        name: "multiple",
        rule_types: &[Marker, Parent, Zone],
        value_type: ValueType::Bool,
        restricted: false,
    },
    PropertySpec {
        key: PropertyKey::FormMode,
        name: "formMode",
        rule_types: &[Marker, Zone],
        value_type: ValueType::Bool,
        restricted: false,
    },
    PropertySpec {
        key: PropertyKey::Skip,
        name: "skip",
        rule_types: &[Marker, Zone],
        value_type: ValueType::Bool,
        restricted: false,
    },
    PropertySpec {
        key: PropertyKey::SayName,
        name: "sayName",
        rule_types: &[Marker, Zone],
        value_type: ValueType::Bool,
        restricted: false,
    },
    PropertySpec {
        key: PropertyKey::CustomName,
        name: "customName",
        rule_types: &[Marker, Zone],
        value_type: ValueType::Str,
        restricted: false,
    },
    PropertySpec {
        key: PropertyKey::CustomValue,
        name: "customValue",
        rule_types: &[Marker, PageTitle1, PageTitle2, Zone],
        value_type: ValueType::Str,
        restricted: false,
    },
    PropertySpec {
        key: PropertyKey::Mutation,
        name: "mutation",
        rule_types: &[Marker, Zone],
        value_type: ValueType::Str,
        restricted: true,
    },
    PropertySpec {
        key: PropertyKey::SubModule,
        name: "subModule",
        rule_types: &[Zone],
        value_type: ValueType::Str,
        restricted: false,
    },
];

impl PropertyKey {
    pub const COUNT: usize = 9;

    pub fn all() -> impl Iterator<Item = PropertyKey> {
        PROPERTIES.iter().map(|spec| spec.key)
    }

    #[inline]
    pub fn spec(self) -> &'static PropertySpec {
        &PROPERTIES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn from_name(name: &str) -> Option<PropertyKey> {
        PROPERTIES.iter().find(|spec| spec.name == name).map(|spec| spec.key)
    }

    pub fn supports(self, rule_type: RuleType) -> bool {
        self.spec().rule_types.contains(&rule_type)
    }

    /// Global default; `None` for the empty string defaults
    pub fn default_value(self) -> Option<PropertyValue> {
        match self.spec().value_type {
            ValueType::Bool => Some(PropertyValue::Bool(false)),
            ValueType::Str => None,
        }
    }

    /// Properties rules of `rule_type` may set
    pub fn for_rule_type(rule_type: RuleType) -> impl Iterator<Item = PropertyKey> {
        PropertyKey::all().filter(move |key| key.supports(rule_type))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Property values set at one level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: [Option<PropertyValue>; PropertyKey::COUNT],
}

impl Properties {
    /// Load authored values, rejecting what `rule_type` does not support
    pub fn load(
        rule_type: RuleType,
        data: &BTreeMap<String, Option<PropertyValue>>,
    ) -> Result<Properties, String> {
        let mut properties = Properties::default();
        for (name, value) in data {
            let key = PropertyKey::from_name(name)
                .ok_or_else(|| format!("unexpected property: {name}"))?;
            properties.set(rule_type, key, value.clone())?;
        }
        Ok(properties)
    }

    /// Value set at this level
    #[inline]
    pub fn get(&self, key: PropertyKey) -> Option<&PropertyValue> {
        self.values[key as usize].as_ref()
    }

    /// Set a value, `None` or an empty string clearing it
    pub fn set(
        &mut self,
        rule_type: RuleType,
        key: PropertyKey,
        value: Option<PropertyValue>,
    ) -> Result<(), String> {
        let value = value.filter(|v| !v.is_empty());
        if !key.supports(rule_type) && value.is_some() && value != key.default_value() {
            return Err(format!("property not supported for rule type {rule_type}: {key}"));
        }
        match (&value, key.spec().value_type) {
            (None, _) | (Some(PropertyValue::Bool(_)), ValueType::Bool) => {}
            (Some(PropertyValue::Str(id)), ValueType::Str) => {
                if key == PropertyKey::Mutation && !mutation::is_available(rule_type, id) {
                    return Err(format!("unknown mutation for rule type {rule_type}: {id}"));
                }
            }
            (Some(other), expected) => {
                return Err(format!(
                    "property {key} only supports {expected:?} values: {other}"
                ));
            }
        }
        // An unsupported property set to its default is accepted but not kept
        self.values[key as usize] = if key.supports(rule_type) { value } else { None };
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Values set at this level that differ from what `parent` resolves to,
    /// in table order
    pub fn dump(&self, parent: PropertyChain<'_>) -> BTreeMap<String, PropertyValue> {
        PropertyKey::all()
            .filter_map(|key| {
                let value = self.get(key)?;
                (parent.value(key).as_ref() != Some(value))
                    .then(|| (key.name().to_string(), value.clone()))
            })
            .collect()
    }
}

/// Resolution chain over up to two levels
#[derive(Debug, Clone, Copy)]
pub struct PropertyChain<'a> {
    levels: [Option<&'a Properties>; 2],
}

impl<'a> PropertyChain<'a> {
    /// Chain of nothing: every property resolves to its default
    pub const DEFAULTS: PropertyChain<'static> = PropertyChain { levels: [None, None] };

    /// Chain for criteria-level `first` over rule-level `second`
    pub fn new(first: &'a Properties, second: Option<&'a Properties>) -> Self {
        PropertyChain {
            levels: [Some(first), second],
        }
    }

    fn lookup(&self, key: PropertyKey) -> Option<&'a PropertyValue> {
        self.levels.iter().flatten().find_map(|level| level.get(key))
    }

    /// Resolved value, falling back to the default
    pub fn value(&self, key: PropertyKey) -> Option<PropertyValue> {
        self.lookup(key).cloned().or_else(|| key.default_value())
    }

    pub fn flag(&self, key: PropertyKey) -> bool {
        matches!(self.lookup(key), Some(PropertyValue::Bool(true)))
    }

    pub fn text(&self, key: PropertyKey) -> Option<&'a str> {
        match self.lookup(key) {
            Some(PropertyValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}
