//! Search Query
//!
//! Compiles simple criteria constraints (`role`, `tag`, `className`...)
//! into a predicate set. Each constraint value is a small expression:
//!
//! - `&` separates groups that must all match
//! - `|` separates alternatives within a group
//! - a leading `!` negates an alternative
//! - a `*` anywhere turns equality into a substring test
//!
//! `className` is a space-separated list, so spaces act as `&`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::CompiledPath;

/// Node property a predicate tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prop {
    Role,
    States,
    Tag,
    Id,
    ClassName,
    Src,
}

impl Prop {
    pub fn key(self) -> &'static str {
        match self {
            Prop::Role => "role",
            Prop::States => "states",
            Prop::Tag => "tag",
            Prop::Id => "id",
            Prop::ClassName => "className",
            Prop::Src => "src",
        }
    }

    /// Integer-valued properties
    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, Prop::Role | Prop::States)
    }
}

/// Predicate test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Test {
    Eq,
    NotEq,
    /// Substring
    In,
    NotIn,
}

impl Test {
    /// Negative tests prune the subtree of a node they match
    #[inline]
    pub fn is_negative(self) -> bool {
        matches!(self, Test::NotEq | Test::NotIn)
    }

    #[inline]
    pub fn is_substring(self) -> bool {
        matches!(self, Test::In | Test::NotIn)
    }

    pub fn key(self) -> &'static str {
        match self {
            Test::Eq => "eq",
            Test::NotEq => "notEq",
            Test::In => "in",
            Test::NotIn => "notIn",
        }
    }
}

/// Allowed value of a predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// One `test_prop#group` predicate: any of `values` may satisfy it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub test: Test,
    pub prop: Prop,
    pub group: usize,
    pub values: Vec<Value>,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}#{}=", self.test.key(), self.prop.key(), self.group)?;
        let values: Vec<String> = self.values.iter().map(Value::to_string).collect();
        write!(f, "{values:?}")
    }
}

/// Simple search constraints of a criteria set
///
/// Values are kept in their authored text form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

impl Constraints {
    /// Set a constraint by its key, returning false for unknown keys
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key {
            "text" => &mut self.text,
            "role" => &mut self.role,
            "tag" => &mut self.tag,
            "id" => &mut self.id,
            "className" => &mut self.class_name,
            "states" => &mut self.states,
            "src" => &mut self.src,
            "relativePath" => &mut self.relative_path,
            _ => return false,
        };
        *slot = Some(value.into());
        true
    }

    fn prop_values(&self) -> [(Prop, Option<&str>); 6] {
        [
            (Prop::ClassName, self.class_name.as_deref()),
            (Prop::Id, self.id.as_deref()),
            (Prop::Role, self.role.as_deref()),
            (Prop::Src, self.src.as_deref()),
            (Prop::States, self.states.as_deref()),
            (Prop::Tag, self.tag.as_deref()),
        ]
    }
}

/// Compiled predicate set plus text and relative-path conditions
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    /// Some text run within the matched subtree contains one of these
    pub text: Option<Vec<String>>,
    /// The text preceding the matched node contains this
    pub prev_text: Option<String>,
    /// Path walked from each match; failed walks are dropped
    pub relative_path: Option<Arc<CompiledPath>>,
}

impl Query {
    /// Compile constraints, leaving `relativePath` to the caller
    ///
    /// `owner` names the rule in error messages.
    pub fn build(owner: &str, constraints: &Constraints) -> Result<Query> {
        let mut query = Query::default();

        if let Some(text) = constraints.text.as_deref().filter(|t| !t.is_empty()) {
            match text.strip_prefix('<') {
                Some(prev) => query.prev_text = Some(prev.to_string()),
                None => query.text = Some(vec![text.to_string()]),
            }
        }

        for (prop, expr) in constraints.prop_values() {
            let Some(expr) = expr.filter(|e| !e.is_empty()) else {
                continue;
            };
            let expr = if prop == Prop::ClassName {
                expr.replace(' ', "&")
            } else {
                expr.to_string()
            };
            for (group, group_expr) in expr.split('&').enumerate() {
                query.add_group(owner, prop, group, group_expr)?;
            }
        }
        Ok(query)
    }

    fn add_group(&mut self, owner: &str, prop: Prop, group: usize, expr: &str) -> Result<()> {
        let mut buckets: [(Test, Vec<Value>); 4] = [
            (Test::Eq, Vec::new()),
            (Test::NotEq, Vec::new()),
            (Test::In, Vec::new()),
            (Test::NotIn, Vec::new()),
        ];
        for alternative in expr.trim().split('|') {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                continue;
            }
            let (negated, body) = match alternative.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, alternative),
            };
            let substring = body.contains('*');
            let slot = match (negated, substring) {
                (false, false) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (true, true) => 3,
            };
            let value = if substring {
                Value::Str(body.replace('*', ""))
            } else if prop.is_numeric() {
                body.parse::<i64>().map(Value::Int).map_err(|_| {
                    Error::malformed_criteria(
                        owner,
                        format!("{} must be an integer: {body:?}", prop.key()),
                    )
                })?
            } else {
                Value::Str(body.to_string())
            };
            buckets[slot].1.push(value);
        }
        for (test, values) in buckets {
            if !values.is_empty() {
                self.predicates.push(Predicate {
                    test,
                    prop,
                    group,
                    values,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn with_relative_path(mut self, path: Arc<CompiledPath>) -> Self {
        self.relative_path = Some(path);
        self
    }

    /// True when the query matches every node
    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty()
            && self.text.is_none()
            && self.prev_text.is_none()
            && self.relative_path.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints(pairs: &[(&str, &str)]) -> Constraints {
        let mut c = Constraints::default();
        for (key, value) in pairs {
            assert!(c.set(key, *value));
        }
        c
    }

    #[test]
    fn test_groups_and_alternatives() {
        let query = Query::build("r", &constraints(&[("tag", "div|span&!p*")])).unwrap();
        assert_eq!(
            query.predicates,
            vec![
                Predicate {
                    test: Test::Eq,
                    prop: Prop::Tag,
                    group: 0,
                    values: vec![Value::Str("div".into()), Value::Str("span".into())],
                },
                Predicate {
                    test: Test::NotIn,
                    prop: Prop::Tag,
                    group: 1,
                    values: vec![Value::Str("p".into())],
                },
            ]
        );
    }

    #[test]
    fn test_class_name_spaces_are_groups() {
        let query = Query::build("r", &constraints(&[("className", "nav main*")])).unwrap();
        assert_eq!(query.predicates.len(), 2);
        assert_eq!(query.predicates[0].test, Test::Eq);
        assert_eq!(query.predicates[1].test, Test::In);
        assert_eq!(query.predicates[1].group, 1);
        assert_eq!(query.predicates[1].values, vec![Value::Str("main".into())]);
    }

    #[test]
    fn test_numeric_properties() {
        let query = Query::build("r", &constraints(&[("role", "19|!40"), ("states", "4*")]))
            .unwrap();
        assert!(query.predicates.iter().any(|p| p.test == Test::Eq
            && p.prop == Prop::Role
            && p.values == vec![Value::Int(19)]));
        assert!(query.predicates.iter().any(|p| p.test == Test::In
            && p.prop == Prop::States
            && p.values == vec![Value::Str("4".into())]));

        let err = Query::build("menu", &constraints(&[("role", "link")])).unwrap_err();
        assert!(matches!(err, Error::MalformedCriteria { rule, .. } if rule == "menu"));
    }

    #[test]
    fn test_text_and_prev_text() {
        let query = Query::build("r", &constraints(&[("text", "Search")])).unwrap();
        assert_eq!(query.text, Some(vec!["Search".to_string()]));
        assert_eq!(query.prev_text, None);

        let query = Query::build("r", &constraints(&[("text", "<Label:")])).unwrap();
        assert_eq!(query.prev_text.as_deref(), Some("Label:"));
        assert!(query.text.is_none());
    }

    #[test]
    fn test_empty_constraints() {
        let query = Query::build("r", &constraints(&[("tag", ""), ("id", " | ")])).unwrap();
        assert!(query.is_unconstrained());
    }

    #[test]
    fn test_predicate_display() {
        let query = Query::build("r", &constraints(&[("id", "!main")])).unwrap();
        assert_eq!(query.predicates[0].to_string(), "notEq_id#0=[\"main\"]");
    }
}
