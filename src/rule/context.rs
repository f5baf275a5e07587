//! Evaluation Context
//!
//! State of one evaluation pass over a document: the per-rule memo that
//! lets context constraints reuse results of other rules, the set of rules
//! being evaluated (to break reference cycles) and the results collected so
//! far, from which the page title is computed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::error;

use super::layers::Layers;
use super::result::RuleResult;
use super::rules::Rule;
use super::types::RuleType;
use crate::config::Config;
use crate::dom::Document;
use crate::error::{Error, Result};

pub struct Evaluator<'a> {
    doc: &'a Document,
    layers: &'a Layers,
    config: &'a Config,
    window_title: Option<&'a str>,
    memo: HashMap<*const Rule, Vec<RuleResult>>,
    in_progress: HashSet<*const Rule>,
    collected: Vec<RuleResult>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        doc: &'a Document,
        layers: &'a Layers,
        config: &'a Config,
        window_title: Option<&'a str>,
    ) -> Self {
        Evaluator {
            doc,
            layers,
            config,
            window_title,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
            collected: Vec::new(),
        }
    }

    #[inline]
    pub fn doc(&self) -> &'a Document {
        self.doc
    }

    #[inline]
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Rule referenced from a criteria of `layer`
    pub fn lookup(&self, name: &str, layer: &str) -> Option<Arc<Rule>> {
        self.layers.lookup_from(name, layer).cloned()
    }

    /// Results of `rule`, evaluated at most once per pass
    pub fn rule_results(&mut self, rule: &Arc<Rule>) -> Result<Vec<RuleResult>> {
        let key = Arc::as_ptr(rule);
        if let Some(results) = self.memo.get(&key) {
            return Ok(results.clone());
        }
        if !self.in_progress.insert(key) {
            return Err(Error::lookup(format!(
                "cyclic reference to rule \"{}\" in layer \"{}\"",
                rule.name, rule.layer
            )));
        }
        let results = rule.evaluate(self);
        self.in_progress.remove(&key);
        self.memo.insert(key, results.clone());
        Ok(results)
    }

    fn title_part(&self, rule_type: RuleType) -> Option<String> {
        self.collected
            .iter()
            .find(|result| result.rule_type() == rule_type)
            .and_then(|result| result.value(self.doc).ok())
    }

    /// Page title from the title results collected so far
    ///
    /// The primary part falls back to the host window title.
    pub fn page_title(&self) -> String {
        let primary = self
            .title_part(RuleType::PageTitle1)
            .or_else(|| self.window_title.map(str::to_string));
        let secondary = self.title_part(RuleType::PageTitle2);
        [primary, secondary]
            .into_iter()
            .flatten()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(&self.config.title_separator)
    }

    /// Evaluate every rule, page title rules first
    ///
    /// Returns all results sorted by start offset, and the page title.
    pub fn evaluate_all(mut self) -> (Vec<RuleResult>, String) {
        let mut rules: Vec<Arc<Rule>> = self.layers.rules().cloned().collect();
        rules.sort_by_key(|rule| !rule.rule_type.is_page_title());
        for rule in &rules {
            match self.rule_results(rule) {
                Ok(results) => self.collected.extend(results),
                Err(err) => {
                    error!(rule = %rule.name, layer = %rule.layer, error = %err, "rule skipped");
                }
            }
        }
        let title = self.page_title();
        let mut results = self.collected;
        results.sort_by_key(|result| result.start);
        (results, title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathCache;
    use crate::rule::testing::{page, rules};

    const PAGE: &str = concat!(
        "<control role=\"52\">",
        "<control role=\"40\" IAccessible2::attribute_tag=\"h1\"><text>Shop</text></control>",
        "<control role=\"40\" IAccessible2::attribute_tag=\"h2\"><text>Cart</text></control>",
        "</control>"
    );

    fn layers(json: &str) -> Layers {
        let paths = PathCache::new(4);
        let mut layers = Layers::default();
        for def in rules(json) {
            layers.add_rule(Rule::load("user", &def, &paths).unwrap());
        }
        layers
    }

    #[test]
    fn test_page_title_joins_parts() {
        let doc = page(PAGE);
        let config = Config::default();
        let layers = layers(
            r#"[{"name": "t1", "type": "pageTitle1", "criteria": [{"tag": "h1"}]},
                {"name": "t2", "type": "pageTitle2", "criteria": [{"tag": "h2"}]}]"#,
        );
        let mut ev = Evaluator::new(&doc, &layers, &config, Some("Window"));
        for rule in layers.rules() {
            let results = ev.rule_results(rule).unwrap();
            ev.collected.extend(results);
        }
        assert_eq!(ev.page_title(), "Shop - Cart");
    }

    #[test]
    fn test_page_title_falls_back_to_window_title() {
        let doc = page(PAGE);
        let config = Config::default();
        let layers = layers(r#"[{"name": "t2", "type": "pageTitle2", "criteria": [{"tag": "h2"}]}]"#);
        let empty = Layers::default();
        let ev = Evaluator::new(&doc, &empty, &config, Some(" Window "));
        assert_eq!(ev.page_title(), "Window");

        let mut ev = Evaluator::new(&doc, &layers, &config, None);
        let rule = Arc::clone(layers.rules().next().unwrap());
        let results = ev.rule_results(&rule).unwrap();
        ev.collected.extend(results);
        assert_eq!(ev.page_title(), "Cart");
    }

    #[test]
    fn test_results_are_memoized() {
        let doc = page(PAGE);
        let config = Config::default();
        let layers = layers(r#"[{"name": "h", "type": "marker", "criteria": [{"role": 40}]}]"#);
        let rule = Arc::clone(layers.rules().next().unwrap());
        let mut ev = Evaluator::new(&doc, &layers, &config, None);
        let first = ev.rule_results(&rule).unwrap();
        let second = ev.rule_results(&rule).unwrap();
        assert_eq!(first, second);
        assert_eq!(ev.memo.len(), 1);
    }

    #[test]
    fn test_evaluate_all_sorts_by_start() {
        let doc = page(PAGE);
        let config = Config::default();
        let layers = layers(
            r#"[{"name": "second", "type": "marker", "criteria": [{"tag": "h2"}]},
                {"name": "first", "type": "marker", "criteria": [{"tag": "h1"}]}]"#,
        );
        let (results, title) = Evaluator::new(&doc, &layers, &config, Some("Shop")).evaluate_all();
        let names: Vec<_> = results.iter().map(RuleResult::name).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(title, "Shop");
    }
}
