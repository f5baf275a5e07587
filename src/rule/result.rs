//! Rule Results
//!
//! A result binds one criteria alternative of a rule to a matched node. It
//! keeps the rule alive through an `Arc`, so a snapshot stays queryable
//! after its rules are unloaded.

use std::fmt;
use std::sync::Arc;

use super::criteria::Criteria;
use super::properties::{PropertyChain, PropertyKey};
use super::rules::Rule;
use super::types::RuleType;
use crate::dom::{Document, NodeHandle, NodeId};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RuleResult {
    rule: Arc<Rule>,
    criteria: usize,
    pub node: NodeHandle,
    pub start: u32,
    pub end: u32,
    pub control_id: u64,
    /// Span of the context root when not the document root
    pub context: Option<(u32, u32)>,
    /// 1-based rank as counted by the criteria search
    pub index: u32,
}

impl RuleResult {
    pub(crate) fn new(
        rule: &Arc<Rule>,
        criteria: usize,
        doc: &Document,
        node: NodeId,
        context: Option<(u32, u32)>,
        index: u32,
    ) -> Self {
        let (start, end, control_id) = doc
            .get_node(node)
            .map_or((0, 0, 0), |n| (n.offset, n.end(), n.control_id));
        RuleResult {
            rule: Arc::clone(rule),
            criteria,
            node: doc.handle(node),
            start,
            end,
            control_id,
            context,
            index,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.rule.name
    }

    #[inline]
    pub fn rule_type(&self) -> RuleType {
        self.rule.rule_type
    }

    #[inline]
    pub fn layer(&self) -> &str {
        &self.rule.layer
    }

    pub fn criteria(&self) -> &Criteria {
        &self.rule.criteria[self.criteria]
    }

    /// Position of the matching alternative within the rule
    pub fn criteria_index(&self) -> usize {
        self.criteria
    }

    /// Criteria overrides over rule values over defaults
    pub fn properties(&self) -> PropertyChain<'_> {
        PropertyChain::new(&self.criteria().properties, Some(&self.rule.properties))
    }

    /// Custom name, else the rule name
    pub fn label(&self) -> &str {
        self.properties()
            .text(PropertyKey::CustomName)
            .unwrap_or(&self.rule.name)
    }

    /// Custom value, else the text of the matched node
    pub fn value(&self, doc: &Document) -> Result<String> {
        if let Some(value) = self.properties().text(PropertyKey::CustomValue) {
            return Ok(value.to_string());
        }
        let id = doc.resolve(self.node)?;
        Ok(doc.text_of(id).to_string())
    }

    /// Label and inner text, as offered in result lists
    pub fn title(&self, doc: &Document) -> Result<String> {
        let id = doc.resolve(self.node)?;
        Ok(format!("{} - {}", self.label(), doc.inner_text(id)))
    }

    #[inline]
    pub fn contains_offset(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl PartialEq for RuleResult {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.rule, &other.rule)
            && self.criteria == other.criteria
            && self.node == other.node
            && self.index == other.index
    }
}

impl fmt::Display for RuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}#{} at ({}, {})",
            self.rule.layer, self.rule.name, self.index, self.start, self.end
        )
    }
}

/// Action triggered by the auto-action sweep, for the host to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoAction {
    pub action: String,
    pub rule: String,
    pub layer: String,
    pub label: String,
    pub node: NodeHandle,
    pub start: u32,
    pub control_id: u64,
}

impl AutoAction {
    pub fn new(result: &RuleResult, action: &str) -> Self {
        AutoAction {
            action: action.to_string(),
            rule: result.name().to_string(),
            layer: result.layer().to_string(),
            label: result.label().to_string(),
            node: result.node,
            start: result.start,
            control_id: result.control_id,
        }
    }
}
