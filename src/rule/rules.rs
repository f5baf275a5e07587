//! Rules
//!
//! A rule is a named, typed list of criteria alternatives. Its results come
//! from the first alternative that yields any; later alternatives are never
//! merged in.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::error;

use super::context::Evaluator;
use super::criteria::Criteria;
use super::def::RuleDef;
use super::properties::{Properties, PropertyChain, PropertyKey};
use super::result::RuleResult;
use super::types::RuleType;
use crate::error::{Error, Result};
use crate::path::PathCache;

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub rule_type: RuleType,
    pub layer: String,
    pub comment: Option<String>,
    pub criteria: Vec<Criteria>,
    pub properties: Properties,
    /// Gesture id to action id
    pub gestures: BTreeMap<String, String>,
}

impl Rule {
    /// Validate and compile a definition into `layer`
    ///
    /// The first offending property or criteria rejects the whole rule.
    pub fn load(layer: &str, def: &RuleDef, paths: &PathCache) -> Result<Rule> {
        if def.name.trim().is_empty() {
            return Err(Error::malformed_criteria("", "rule name is empty"));
        }
        let properties = Properties::load(def.rule_type, &def.properties)
            .map_err(|reason| Error::malformed_criteria(&def.name, reason))?;
        let criteria = def
            .criteria
            .iter()
            .map(|c| Criteria::load(&def.name, def.rule_type, c, paths))
            .collect::<Result<Vec<_>>>()?;
        Ok(Rule {
            name: def.name.clone(),
            rule_type: def.rule_type,
            layer: layer.to_string(),
            comment: def.comment.clone(),
            criteria,
            properties,
            gestures: def.gestures.clone(),
        })
    }

    pub fn dump(&self) -> RuleDef {
        RuleDef {
            name: self.name.clone(),
            rule_type: self.rule_type,
            comment: self.comment.clone(),
            criteria: self
                .criteria
                .iter()
                .map(|c| c.dump(&self.properties))
                .collect(),
            gestures: self.gestures.clone(),
            properties: self
                .properties
                .dump(PropertyChain::DEFAULTS)
                .into_iter()
                .map(|(key, value)| (key, Some(value)))
                .collect(),
        }
    }

    /// Rule-level values over defaults
    pub fn properties(&self) -> PropertyChain<'_> {
        PropertyChain::new(&self.properties, None)
    }

    pub fn label(&self) -> &str {
        self.properties()
            .text(PropertyKey::CustomName)
            .unwrap_or(&self.name)
    }

    /// Action bound to `gesture` on the rule or any of its criteria
    ///
    /// Criteria bindings are applied after the rule's, the last one winning.
    pub fn gesture_action(&self, gesture: &str) -> Option<&str> {
        self.criteria
            .iter()
            .rev()
            .find_map(|c| c.gestures.get(gesture))
            .or_else(|| self.gestures.get(gesture))
            .map(String::as_str)
    }

    /// Results of this rule for the evaluation in progress, memoized
    pub fn get_results(self: &Arc<Self>, ev: &mut Evaluator<'_>) -> Result<Vec<RuleResult>> {
        ev.rule_results(self)
    }

    /// Evaluate the alternatives in order, the first non-empty one winning
    ///
    /// Lookup failures only void the offending alternative.
    pub(crate) fn evaluate(self: &Arc<Self>, ev: &mut Evaluator<'_>) -> Vec<RuleResult> {
        for (position, criteria) in self.criteria.iter().enumerate() {
            match criteria.iter_results(self, position, ev) {
                Ok(results) if !results.is_empty() => return results,
                Ok(_) => {}
                Err(err) => {
                    error!(
                        rule = %self.name,
                        layer = %self.layer,
                        criteria = position,
                        error = %err,
                        "criteria skipped"
                    );
                }
            }
        }
        Vec::new()
    }
}
