//! Criteria
//!
//! One alternative of a rule: context constraints (page title, page type,
//! parent rules), simple search constraints compiled to a query, an
//! optional 1-based index and property overrides.
//!
//! Context expressions use `&` between groups, `|` between alternatives and
//! a leading `!` to negate a group.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::trace;

use super::context::Evaluator;
use super::def::{ConstraintValue, CriteriaDef};
use super::properties::{Properties, PropertyChain, PropertyKey};
use super::result::RuleResult;
use super::rules::Rule;
use super::types::RuleType;
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::path::PathCache;
use crate::search::{Constraints, Exclude, Query};
use crate::strategy::search_roots;

#[derive(Debug, Clone)]
pub struct Criteria {
    pub name: Option<String>,
    pub comment: Option<String>,
    pub context_page_title: Option<String>,
    pub context_page_type: Option<String>,
    pub context_parent: Option<String>,
    pub constraints: Constraints,
    /// Keep only the nth match, 1-based
    pub index: Option<u32>,
    pub properties: Properties,
    pub gestures: BTreeMap<String, String>,
    query: Query,
}

/// Roots resolved from `contextParent`
struct ContextRoots {
    roots: Vec<NodeId>,
    excluded: HashSet<NodeId>,
    multiple: bool,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Split a context expression into `(negated, alternatives)` groups
fn groups(expr: &str) -> impl Iterator<Item = (bool, Vec<&str>)> {
    expr.split('&').filter_map(|group| {
        let group = group.trim();
        if group.is_empty() {
            return None;
        }
        let (negated, body) = match group.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, group),
        };
        let names = body
            .split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        Some((negated, names))
    })
}

impl Criteria {
    /// Validate and compile a definition of a rule named `rule`
    pub fn load(rule: &str, rule_type: RuleType, def: &CriteriaDef, paths: &PathCache) -> Result<Criteria> {
        let properties = Properties::load(rule_type, &def.properties)
            .map_err(|reason| Error::malformed_criteria(rule, reason))?;
        let constraints = def.constraints();
        let mut query = Query::build(rule, &constraints)?;
        if let Some(path) = constraints.relative_path.as_deref() {
            let compiled = paths
                .get_or_compile(path)
                .map_err(|err| Error::malformed_criteria(rule, err.to_string()))?;
            query = query.with_relative_path(compiled);
        }
        Ok(Criteria {
            name: non_blank(&def.name),
            comment: non_blank(&def.comment),
            context_page_title: non_blank(&def.context_page_title),
            context_page_type: non_blank(&def.context_page_type),
            context_parent: non_blank(&def.context_parent),
            constraints,
            index: def.index.filter(|&index| index > 0),
            properties,
            gestures: def.gestures.clone(),
            query,
        })
    }

    /// Definition with the overrides that differ from `rule`'s values
    pub fn dump(&self, rule: &Properties) -> CriteriaDef {
        let int_or_text = |value: &Option<String>| {
            value.as_ref().map(|v| match v.parse() {
                Ok(int) => ConstraintValue::Int(int),
                Err(_) => ConstraintValue::Str(v.clone()),
            })
        };
        let c = &self.constraints;
        CriteriaDef {
            name: self.name.clone(),
            comment: self.comment.clone(),
            context_page_title: self.context_page_title.clone(),
            context_page_type: self.context_page_type.clone(),
            context_parent: self.context_parent.clone(),
            text: c.text.clone(),
            role: int_or_text(&c.role),
            tag: c.tag.clone(),
            id: c.id.clone(),
            class_name: c.class_name.clone(),
            states: c.states.as_ref().map(|v| ConstraintValue::Str(v.clone())),
            src: c.src.clone(),
            relative_path: c.relative_path.clone(),
            index: self.index,
            gestures: self.gestures.clone(),
            properties: self
                .properties
                .dump(PropertyChain::new(rule, None))
                .into_iter()
                .map(|(key, value)| (key, Some(value)))
                .collect(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Custom name override, else the criteria name, else the rule label
    pub fn label<'a>(&'a self, rule: &'a Rule) -> &'a str {
        PropertyChain::new(&self.properties, None)
            .text(PropertyKey::CustomName)
            .or(self.name.as_deref())
            .unwrap_or_else(|| rule.label())
    }

    /// Check `contextPageTitle` against `title`
    ///
    /// A leading `!` negates; a leading `\` escapes the first character.
    pub fn check_context_page_title(&self, title: &str) -> bool {
        let Some(expr) = self.context_page_title.as_deref().map(str::trim) else {
            return true;
        };
        let (negated, expr) = match expr.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, expr),
        };
        let expr = expr.strip_prefix('\\').unwrap_or(expr);
        (expr == title) != negated
    }

    /// Check `contextPageType`: every group must (or, negated, must not)
    /// have a page type rule with results
    fn check_context_page_type(&self, rule: &Rule, ev: &mut Evaluator<'_>) -> Result<bool> {
        let Some(expr) = self.context_page_type.as_deref() else {
            return Ok(true);
        };
        for (negated, names) in groups(expr) {
            let mut found = false;
            for name in names {
                let other = ev.lookup(name, &rule.layer).ok_or_else(|| {
                    Error::lookup(format!("contextPageType: rule not found: \"{name}\""))
                })?;
                if !other.get_results(ev)?.is_empty() {
                    if negated {
                        return Ok(false);
                    }
                    found = true;
                    break;
                }
            }
            if !found && !negated {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolve `contextParent` into search roots
    ///
    /// `None` when a group resolves to no node: the criteria has no result.
    fn context_roots(&self, rule: &Rule, ev: &mut Evaluator<'_>) -> Result<Option<ContextRoots>> {
        let mut roots: BTreeSet<NodeId> = BTreeSet::new();
        let mut excluded = HashSet::new();
        let mut multiple: Option<bool> = None;
        let Some(expr) = self.context_parent.as_deref() else {
            return Ok(Some(ContextRoots {
                roots: Vec::new(),
                excluded,
                multiple: false,
            }));
        };
        for (negated, names) in groups(expr) {
            let mut alternatives = BTreeSet::new();
            for name in names {
                let other = ev.lookup(name, &rule.layer).ok_or_else(|| {
                    Error::lookup(format!("contextParent: rule not found: \"{name}\""))
                })?;
                if !negated && other.properties().flag(PropertyKey::Multiple) {
                    if multiple.is_none() {
                        multiple = Some(true);
                    }
                } else {
                    multiple = Some(false);
                }
                let nodes = other.get_results(ev)?.into_iter().map(|r| r.node.id);
                if negated {
                    excluded.extend(nodes);
                } else {
                    alternatives.extend(nodes);
                }
            }
            if negated {
                continue;
            }
            if alternatives.is_empty() {
                return Ok(None);
            }
            if roots.is_empty() {
                roots = alternatives;
                continue;
            }
            let doc = ev.doc();
            let narrowed: BTreeSet<NodeId> = roots
                .iter()
                .flat_map(|&a| alternatives.iter().filter_map(move |&b| doc.deepest(a, b)))
                .collect();
            if narrowed.is_empty() {
                return Ok(None);
            }
            roots = narrowed;
        }
        Ok(Some(ContextRoots {
            roots: roots.into_iter().collect(),
            excluded,
            multiple: multiple == Some(true),
        }))
    }

    /// Results of this alternative of `rule`, in search order
    ///
    /// `position` is the index of this criteria within the rule.
    pub fn iter_results(
        &self,
        rule: &Arc<Rule>,
        position: usize,
        ev: &mut Evaluator<'_>,
    ) -> Result<Vec<RuleResult>> {
        if !self.check_context_page_title(&ev.page_title()) {
            return Ok(Vec::new());
        }
        if !self.check_context_page_type(rule, ev)? {
            return Ok(Vec::new());
        }
        let Some(context) = self.context_roots(rule, ev)? else {
            return Ok(Vec::new());
        };

        let doc = ev.doc();
        let main = doc.root();
        let multiple = PropertyChain::new(&self.properties, Some(&rule.properties))
            .flag(PropertyKey::Multiple);
        let limit = if multiple {
            None
        } else {
            Some(self.index.unwrap_or(1) as usize)
        };
        let roots = if context.roots.is_empty() {
            vec![main]
        } else {
            context.roots
        };
        let exclude = if context.excluded.is_empty() {
            Exclude::None
        } else {
            Exclude::Nodes(&context.excluded)
        };
        let found = search_roots(
            doc,
            &roots,
            &self.query,
            exclude,
            limit,
            ev.config().parallel_roots_threshold,
        );

        let mut results = Vec::new();
        let mut index = 0;
        for (&root, nodes) in roots.iter().zip(found) {
            if context.multiple {
                index = 0;
            }
            let span = (root != main)
                .then(|| doc.get_node(root).map(|n| (n.offset, n.end())))
                .flatten();
            trace!(rule = %rule.name, root = %doc.describe(root), found = nodes.len(), "searched");
            for node in nodes {
                index += 1;
                if let Some(wanted) = self.index {
                    if index < wanted {
                        continue;
                    }
                    if index > wanted {
                        break;
                    }
                }
                results.push(RuleResult::new(rule, position, doc, node, span, index));
                if !multiple && !context.multiple {
                    return Ok(results);
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::testing::{evaluate, page, rules};

    // body > [ nav.menu > [a "Home", a "News"], main#content > [h1 "Title", a "More"], a "Legal" ]
    const PAGE: &str = concat!(
        "<control role=\"52\" IAccessible2::attribute_tag=\"body\">",
        "<control role=\"86\" IAccessible2::attribute_tag=\"nav\" IAccessible2::attribute_class=\"menu\">",
        "<control role=\"19\" IAccessible2::attribute_tag=\"a\"><text>Home</text></control>",
        "<control role=\"19\" IAccessible2::attribute_tag=\"a\"><text>News</text></control>",
        "</control>",
        "<control role=\"86\" IAccessible2::attribute_tag=\"main\" IAccessible2::attribute_id=\"content\">",
        "<control role=\"40\" IAccessible2::attribute_tag=\"h1\"><text>Title</text></control>",
        "<control role=\"19\" IAccessible2::attribute_tag=\"a\"><text>More</text></control>",
        "</control>",
        "<control role=\"19\" IAccessible2::attribute_tag=\"a\"><text>Legal</text></control>",
        "</control>"
    );

    fn labels(snapshot: &crate::rule::Snapshot, name: &str) -> Vec<String> {
        let doc = snapshot.doc();
        snapshot
            .results_by_name(name, None)
            .map(|r| doc.text_of(r.node.id).to_string())
            .collect()
    }

    #[test]
    fn test_index_selects_nth_match() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[{"name": "second", "type": "marker", "criteria": [{"role": 19, "index": 2}]}]"#),
        );
        assert_eq!(labels(&snapshot, "second"), ["News"]);
        assert_eq!(snapshot.results()[0].index, 2);
    }

    #[test]
    fn test_multiple_returns_all_matches() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[{"name": "links", "type": "marker", "properties": {"multiple": true},
                       "criteria": [{"role": 19}]}]"#),
        );
        assert_eq!(labels(&snapshot, "links"), ["Home", "News", "More", "Legal"]);
    }

    #[test]
    fn test_context_parent_restricts_roots() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[
                {"name": "main", "type": "parent", "criteria": [{"id": "content"}]},
                {"name": "nav", "type": "parent", "criteria": [{"tag": "nav"}]},
                {"name": "inMain", "type": "marker", "properties": {"multiple": true},
                 "criteria": [{"role": 19, "contextParent": "main"}]},
                {"name": "notNav", "type": "marker", "properties": {"multiple": true},
                 "criteria": [{"role": 19, "contextParent": "!nav"}]},
                {"name": "either", "type": "marker", "properties": {"multiple": true},
                 "criteria": [{"role": 19, "contextParent": "main|nav"}]}
            ]"#),
        );
        assert_eq!(labels(&snapshot, "inMain"), ["More"]);
        assert_eq!(labels(&snapshot, "notNav"), ["More", "Legal"]);
        assert_eq!(labels(&snapshot, "either"), ["Home", "News", "More"]);
        let in_main = snapshot.results_by_name("inMain", None).next().unwrap();
        assert_eq!(in_main.context, Some((8, 17)));
    }

    #[test]
    fn test_context_parent_groups_reduce_to_deepest() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[
                {"name": "body", "type": "parent", "criteria": [{"tag": "body"}]},
                {"name": "main", "type": "parent", "criteria": [{"id": "content"}]},
                {"name": "nav", "type": "parent", "criteria": [{"tag": "nav"}]},
                {"name": "both", "type": "marker", "criteria": [{"role": 19, "contextParent": "body & main"}]},
                {"name": "disjoint", "type": "marker", "criteria": [{"role": 19, "contextParent": "nav & main"}]}
            ]"#),
        );
        assert_eq!(labels(&snapshot, "both"), ["More"]);
        assert!(labels(&snapshot, "disjoint").is_empty());
    }

    #[test]
    fn test_multiple_context_restarts_index_per_root() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[
                {"name": "blocks", "type": "parent", "properties": {"multiple": true},
                 "criteria": [{"role": 86}]},
                {"name": "firstLink", "type": "marker", "criteria": [{"role": 19, "contextParent": "blocks"}]},
                {"name": "secondLink", "type": "marker", "criteria": [{"role": 19, "index": 2, "contextParent": "blocks"}]}
            ]"#),
        );
        assert_eq!(labels(&snapshot, "firstLink"), ["Home", "More"]);
        assert_eq!(labels(&snapshot, "secondLink"), ["News"]);
    }

    #[test]
    fn test_context_page_type() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[
                {"name": "home", "type": "pageType", "criteria": [{"text": "Home"}]},
                {"name": "cart", "type": "pageType", "criteria": [{"text": "Cart"}]},
                {"name": "onHome", "type": "marker", "criteria": [{"role": 40, "contextPageType": "home"}]},
                {"name": "onCart", "type": "marker", "criteria": [{"role": 40, "contextPageType": "cart"}]},
                {"name": "notCart", "type": "marker", "criteria": [{"role": 40, "contextPageType": "!cart"}]},
                {"name": "anyOf", "type": "marker", "criteria": [{"role": 40, "contextPageType": "cart|home"}]}
            ]"#),
        );
        assert_eq!(labels(&snapshot, "onHome"), ["Title"]);
        assert!(labels(&snapshot, "onCart").is_empty());
        assert_eq!(labels(&snapshot, "notCart"), ["Title"]);
        assert_eq!(labels(&snapshot, "anyOf"), ["Title"]);
        assert_eq!(snapshot.page_types(), ["home"]);
    }

    #[test]
    fn test_context_page_title() {
        let def = CriteriaDef {
            context_page_title: Some("!\\!Shop".into()),
            ..Default::default()
        };
        let criteria = Criteria::load("t", RuleType::Marker, &def, &PathCache::new(4)).unwrap();
        assert!(!criteria.check_context_page_title("!Shop"));
        assert!(criteria.check_context_page_title("Shop"));

        let def = CriteriaDef {
            context_page_title: Some(" Shop ".into()),
            ..Default::default()
        };
        let criteria = Criteria::load("t", RuleType::Marker, &def, &PathCache::new(4)).unwrap();
        assert!(criteria.check_context_page_title("Shop"));
        assert!(!criteria.check_context_page_title("Shop - Cart"));
    }

    #[test]
    fn test_relative_path_moves_result() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[{"name": "afterTitle", "type": "marker",
                       "criteria": [{"role": 40, "relativePath": "r"}]}]"#),
        );
        assert_eq!(labels(&snapshot, "afterTitle"), ["More"]);
    }

    #[test]
    fn test_load_rejects_malformed_criteria() {
        let paths = PathCache::new(4);
        let def = CriteriaDef {
            role: Some(ConstraintValue::Str("link".into())),
            ..Default::default()
        };
        let err = Criteria::load("bad", RuleType::Marker, &def, &paths).unwrap_err();
        assert!(matches!(err, Error::MalformedCriteria { ref rule, .. } if rule == "bad"));

        let def = CriteriaDef {
            relative_path: Some("uq".into()),
            ..Default::default()
        };
        assert!(Criteria::load("bad", RuleType::Marker, &def, &paths).is_err());
    }

    #[test]
    fn test_dump_keeps_authored_constraints() {
        let def = CriteriaDef {
            role: Some(ConstraintValue::Int(19)),
            class_name: Some("nav top".into()),
            index: Some(0),
            ..Default::default()
        };
        let criteria = Criteria::load("r", RuleType::Marker, &def, &PathCache::new(4)).unwrap();
        let dumped = criteria.dump(&Properties::default());
        assert_eq!(dumped.role, Some(ConstraintValue::Int(19)));
        assert_eq!(dumped.class_name.as_deref(), Some("nav top"));
        assert_eq!(dumped.index, None);
    }
}
