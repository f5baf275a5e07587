//! Result Snapshots
//!
//! The immutable outcome of one update: the document it was computed on,
//! the results sorted by start offset, the mutated-control index, the page
//! title and the matched page types. Readers share it through an `Arc` and
//! never observe a half-finished update.

use std::collections::HashMap;
use std::sync::Arc;

use super::mutation::{mutation, MutatedControl};
use super::properties::PropertyKey;
use super::result::RuleResult;
use super::types::{Direction, RuleType};
use crate::dom::Document;

#[derive(Debug)]
pub struct Snapshot {
    doc: Arc<Document>,
    results: Vec<RuleResult>,
    /// Mutated controls in order of first mutation
    mutated: Vec<MutatedControl>,
    mutated_by_id: HashMap<u64, usize>,
    page_title: String,
    page_types: Vec<String>,
}

impl Snapshot {
    /// Index `results`, which must already be sorted by start offset
    pub fn new(doc: Arc<Document>, results: Vec<RuleResult>, page_title: String) -> Self {
        let mut mutated: Vec<MutatedControl> = Vec::new();
        let mut mutated_by_id = HashMap::new();
        let mut page_types: Vec<String> = Vec::new();
        for result in &results {
            if result.rule_type() == RuleType::PageType
                && !page_types.iter().any(|name| name == result.name())
            {
                page_types.push(result.name().to_string());
            }
            let Some(template) = result
                .properties()
                .text(PropertyKey::Mutation)
                .and_then(mutation)
            else {
                continue;
            };
            let slot = *mutated_by_id.entry(result.control_id).or_insert_with(|| {
                mutated.push(MutatedControl::new(
                    result.control_id,
                    result.node.id,
                    result.start,
                    result.end,
                ));
                mutated.len() - 1
            });
            mutated[slot].apply(template, result.label());
        }
        Snapshot {
            doc,
            results,
            mutated,
            mutated_by_id,
            page_title,
            page_types,
        }
    }

    pub fn doc(&self) -> &Arc<Document> {
        &self.doc
    }

    pub fn generation(&self) -> u64 {
        self.doc.generation()
    }

    /// Every result, sorted by start offset
    pub fn results(&self) -> &[RuleResult] {
        &self.results
    }

    /// Results of the rules named `name`, restricted to `layer` when given
    pub fn results_by_name<'s>(
        &'s self,
        name: &'s str,
        layer: Option<&'s str>,
    ) -> impl Iterator<Item = &'s RuleResult> + 's {
        self.results
            .iter()
            .filter(move |r| r.name() == name && layer.is_none_or(|layer| r.layer() == layer))
    }

    /// 1-based rank of `result` among the results of its rule and layer
    pub fn rank_of(&self, result: &RuleResult) -> Option<u32> {
        self.results_by_name(result.name(), Some(result.layer()))
            .position(|r| r == result)
            .map(|position| position as u32 + 1)
    }

    /// Results whose span contains `offset`, innermost first
    pub fn results_at(&self, offset: u32) -> Vec<&RuleResult> {
        self.results
            .iter()
            .rev()
            .filter(|r| r.contains_offset(offset))
            .collect()
    }

    /// Innermost result at `offset` among `types` (every type when empty)
    pub fn result_at(&self, offset: u32, types: &[RuleType]) -> Option<&RuleResult> {
        self.results_at(offset)
            .into_iter()
            .find(|r| types.is_empty() || types.contains(&r.rule_type()))
    }

    pub fn mutated_control(&self, control_id: u64) -> Option<&MutatedControl> {
        self.mutated_by_id
            .get(&control_id)
            .map(|&slot| &self.mutated[slot])
    }

    pub fn mutated_controls(&self) -> &[MutatedControl] {
        &self.mutated
    }

    /// Mutated controls in navigation order from `offset`
    ///
    /// Without an offset every entry qualifies.
    pub fn iter_mutated_controls(
        &self,
        direction: Direction,
        offset: Option<u32>,
    ) -> Box<dyn Iterator<Item = &MutatedControl> + '_> {
        let mut sorted: Vec<&MutatedControl> = self.mutated.iter().collect();
        sorted.sort_by_key(|entry| entry.start);
        match (direction, offset) {
            (Direction::Next, None) => Box::new(sorted.into_iter()),
            (Direction::Next, Some(offset)) => {
                Box::new(sorted.into_iter().filter(move |e| e.start > offset))
            }
            (Direction::Previous | Direction::Up, None) => Box::new(sorted.into_iter().rev()),
            (Direction::Previous, Some(offset)) => {
                Box::new(sorted.into_iter().rev().filter(move |e| e.start < offset))
            }
            (Direction::Up, Some(offset)) => Box::new(
                sorted
                    .into_iter()
                    .rev()
                    .filter(move |e| e.start < offset && offset <= e.end),
            ),
        }
    }

    pub fn page_title(&self) -> &str {
        &self.page_title
    }

    /// Names of the page type rules with results, first match first
    pub fn page_types(&self) -> &[String] {
        &self.page_types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::mutation::AttrValue;
    use crate::rule::testing::{evaluate, page, rules};

    // body > [ nav > [a "Home"], h2 "Title", main > [h3 "Sub", a "More"] ]
    const PAGE: &str = concat!(
        "<control role=\"52\" controlIdentifier_ID=\"1\">",
        "<control role=\"86\" IAccessible2::attribute_tag=\"nav\" controlIdentifier_ID=\"2\">",
        "<control role=\"19\" controlIdentifier_ID=\"3\"><text>Home</text></control>",
        "</control>",
        "<control role=\"8\" IAccessible2::attribute_tag=\"div\" IAccessible2::attribute_class=\"title\" controlIdentifier_ID=\"4\">",
        "<text>Title</text>",
        "</control>",
        "<control role=\"86\" IAccessible2::attribute_tag=\"main\" controlIdentifier_ID=\"5\">",
        "<control role=\"8\" IAccessible2::attribute_class=\"sub\" controlIdentifier_ID=\"6\"><text>Sub</text></control>",
        "<control role=\"19\" controlIdentifier_ID=\"7\"><text>More</text></control>",
        "</control>",
        "</control>"
    );

    const RULES: &str = r#"[
        {"name": "nav", "type": "zone", "properties": {"mutation": "landmark.nav.named", "customName": "Menu"},
         "criteria": [{"tag": "nav"}]},
        {"name": "title", "type": "marker", "properties": {"mutation": "heading.2"},
         "criteria": [{"className": "title"}]},
        {"name": "titleLink", "type": "marker", "properties": {"mutation": "link"},
         "criteria": [{"className": "title"}]},
        {"name": "sub", "type": "marker", "properties": {"mutation": "heading.3"},
         "criteria": [{"className": "sub"}]},
        {"name": "shop", "type": "pageType", "criteria": [{"text": "Home"}]},
        {"name": "home", "type": "pageType", "criteria": [{"text": "More"}]}
    ]"#;

    #[test]
    fn test_mutations_fold_per_control() {
        let snapshot = evaluate(page(PAGE), rules(RULES));
        assert_eq!(snapshot.mutated_controls().len(), 3);

        let nav = snapshot.mutated_control(2).unwrap();
        assert_eq!(nav.get("landmark"), Some(&AttrValue::Str("navigation".into())));
        assert_eq!(nav.get("name"), Some(&AttrValue::Str("Menu".into())));

        // Both templates land on the title control, the later one winning on role
        let title = snapshot.mutated_control(4).unwrap();
        assert_eq!(title.get("role"), Some(&AttrValue::Int(19)));
        assert_eq!(title.get("level"), Some(&AttrValue::Str("2".into())));
        assert!(snapshot.mutated_control(3).is_none());
    }

    fn ids<'s>(iter: impl Iterator<Item = &'s MutatedControl>) -> Vec<u64> {
        iter.map(|e| e.control_id).collect()
    }

    #[test]
    fn test_iter_mutated_controls() {
        let snapshot = evaluate(page(PAGE), rules(RULES));
        // nav (0, 4), title (4, 9), sub (9, 12)
        assert_eq!(ids(snapshot.iter_mutated_controls(Direction::Next, None)), [2, 4, 6]);
        assert_eq!(ids(snapshot.iter_mutated_controls(Direction::Next, Some(4))), [6]);
        assert_eq!(ids(snapshot.iter_mutated_controls(Direction::Previous, Some(9))), [4, 2]);
        assert_eq!(ids(snapshot.iter_mutated_controls(Direction::Up, Some(6))), [4]);
        assert_eq!(ids(snapshot.iter_mutated_controls(Direction::Up, Some(4))), [2]);
    }

    #[test]
    fn test_results_at_innermost_first() {
        let snapshot = evaluate(
            page(PAGE),
            rules(r#"[
                {"name": "main", "type": "zone", "criteria": [{"tag": "main"}]},
                {"name": "sub", "type": "marker", "criteria": [{"className": "sub"}]}
            ]"#),
        );
        let names: Vec<_> = snapshot.results_at(10).iter().map(|r| r.name()).collect();
        assert_eq!(names, ["sub", "main"]);
        assert_eq!(snapshot.result_at(10, &[RuleType::Zone]).unwrap().name(), "main");
        assert!(snapshot.results_at(2).is_empty());
    }

    #[test]
    fn test_page_types_and_rank() {
        let snapshot = evaluate(page(PAGE), rules(RULES));
        assert_eq!(snapshot.page_types(), ["shop", "home"]);
        let sub = snapshot.results_by_name("sub", Some("user")).next().unwrap();
        assert_eq!(snapshot.rank_of(sub), Some(1));
        assert_eq!(snapshot.results_by_name("sub", Some("shared")).count(), 0);
    }
}
