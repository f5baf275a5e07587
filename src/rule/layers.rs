//! Rule Layers
//!
//! Ordered tiers of rules (e.g. built-in, shared, user). A rule name exists
//! at most once per layer; the same name may live in several layers.

use std::sync::Arc;

use super::rules::Rule;
use super::types::USER_LAYER;

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    rules: Vec<Arc<Rule>>,
}

impl Layer {
    fn new(name: &str) -> Self {
        Layer {
            name: name.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

/// Layers in tier order, lowest first
#[derive(Debug, Clone, Default)]
pub struct Layers {
    layers: Vec<Layer>,
}

impl Layers {
    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Tier of a layer, 0 being the lowest
    pub fn position(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.name == name)
    }

    /// Create an empty layer at `index` (appended when `None`), replacing
    /// any layer of the same name
    pub fn insert(&mut self, name: &str, index: Option<usize>) {
        self.remove(name);
        let index = index.map_or(self.layers.len(), |i| i.min(self.layers.len()));
        self.layers.insert(index, Layer::new(name));
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.layers.len();
        self.layers.retain(|layer| layer.name != name);
        self.layers.len() != before
    }

    /// Add a rule to its layer, creating the layer on top when missing and
    /// replacing a rule of the same name
    pub fn add_rule(&mut self, rule: Rule) {
        if self.get(&rule.layer).is_none() {
            self.insert(&rule.layer, None);
        }
        let rule = Arc::new(rule);
        let Some(layer) = self.layers.iter_mut().find(|l| l.name == rule.layer) else {
            return;
        };
        match layer.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(slot) => *slot = rule,
            None => layer.rules.push(rule),
        }
    }

    pub fn remove_rule(&mut self, layer: &str, name: &str) -> Option<Arc<Rule>> {
        let layer = self.layers.iter_mut().find(|l| l.name == layer)?;
        let index = layer.rules.iter().position(|r| r.name == name)?;
        Some(layer.rules.remove(index))
    }

    /// Every rule, layers in tier order
    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.layers.iter().flat_map(|layer| layer.rules.iter())
    }

    /// Look up a rule
    ///
    /// Without a layer, the first layer in tier order holding the rule wins,
    /// the user layer coming last.
    pub fn rule(&self, name: &str, layer: Option<&str>) -> Option<&Arc<Rule>> {
        if let Some(layer) = layer {
            return self.get(layer)?.get(name);
        }
        self.layers
            .iter()
            .filter(|l| l.name != USER_LAYER)
            .chain(self.layers.iter().filter(|l| l.name == USER_LAYER))
            .find_map(|l| l.get(name))
    }

    /// Look up a rule referenced from `layer`: that layer first, then tier
    /// order
    pub fn lookup_from(&self, name: &str, layer: &str) -> Option<&Arc<Rule>> {
        self.get(layer)
            .and_then(|l| l.get(name))
            .or_else(|| self.layers.iter().find_map(|l| l.get(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathCache;
    use crate::rule::def::RuleDef;
    use crate::rule::types::RuleType;

    fn rule(layer: &str, name: &str) -> Rule {
        Rule::load(layer, &RuleDef::new(name, RuleType::Marker), &PathCache::new(1)).unwrap()
    }

    #[test]
    fn test_insert_order() {
        let mut layers = Layers::default();
        layers.insert("user", None);
        layers.insert("builtin", Some(0));
        layers.insert("shared", Some(1));
        assert_eq!(layers.names(), ["builtin", "shared", "user"]);
        layers.insert("builtin", Some(99));
        assert_eq!(layers.names(), ["shared", "user", "builtin"]);
        assert!(layers.remove("shared"));
        assert!(!layers.remove("shared"));
        assert_eq!(layers.position("builtin"), Some(1));
    }

    #[test]
    fn test_rule_lookup_prefers_non_user_layers() {
        let mut layers = Layers::default();
        layers.add_rule(rule("user", "menu"));
        layers.add_rule(rule("shared", "menu"));
        layers.add_rule(rule("user", "footer"));
        assert_eq!(layers.rule("menu", None).unwrap().layer, "shared");
        assert_eq!(layers.rule("menu", Some("user")).unwrap().layer, "user");
        assert_eq!(layers.rule("footer", None).unwrap().layer, "user");
        assert!(layers.rule("footer", Some("shared")).is_none());
        assert!(layers.rule("ghost", None).is_none());
    }

    #[test]
    fn test_lookup_from_own_layer_first() {
        let mut layers = Layers::default();
        layers.add_rule(rule("shared", "menu"));
        layers.add_rule(rule("user", "menu"));
        layers.add_rule(rule("shared", "footer"));
        assert_eq!(layers.lookup_from("menu", "user").unwrap().layer, "user");
        assert_eq!(layers.lookup_from("footer", "user").unwrap().layer, "shared");
    }

    #[test]
    fn test_add_replaces_and_remove() {
        let mut layers = Layers::default();
        layers.add_rule(rule("user", "menu"));
        layers.add_rule(rule("user", "menu"));
        assert_eq!(layers.rules().count(), 1);
        assert!(layers.remove_rule("user", "menu").is_some());
        assert!(layers.remove_rule("user", "menu").is_none());
        assert_eq!(layers.len(), 1);
    }
}
