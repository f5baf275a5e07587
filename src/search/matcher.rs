//! Tree Search
//!
//! Pre-order predicate search over a document subtree. The first matching
//! node of a branch wins: its subtree is never explored further.

use std::collections::HashSet;

use tracing::trace;

use super::query::{Predicate, Prop, Query, Value};
use crate::dom::{Document, NodeId};
use crate::path;

/// Nodes the search must not explore
#[derive(Debug, Clone, Copy, Default)]
pub enum Exclude<'e> {
    #[default]
    None,
    /// These nodes and their subtrees are skipped
    Nodes(&'e HashSet<NodeId>),
    /// Only the start node is examined
    Subtree,
}

impl Exclude<'_> {
    #[inline]
    fn skips(&self, id: NodeId) -> bool {
        matches!(self, Exclude::Nodes(set) if set.contains(&id))
    }
}

/// Outcome of the predicate set on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Match,
    NoMatch,
    /// A negative predicate matched: the whole subtree is out
    Prune,
}

/// Search `root`'s subtree, returning at most `limit` nodes in document order
pub fn search(
    doc: &Document,
    root: NodeId,
    query: &Query,
    exclude: Exclude<'_>,
    limit: Option<usize>,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    if exclude.skips(root) || limit == Some(0) {
        return out;
    }
    let mut searcher = Searcher {
        doc,
        query,
        exclude,
        remaining: limit,
        visited: 0,
    };
    searcher.search_node(root, &mut out);
    trace!(
        root,
        visited = searcher.visited,
        found = out.len(),
        "search"
    );
    out
}

/// Text nodes of `root`'s subtree containing any of `texts`
pub fn search_string(
    doc: &Document,
    root: NodeId,
    texts: &[String],
    exclude: Exclude<'_>,
    limit: Option<usize>,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut remaining = limit;
    search_string_into(doc, root, texts, exclude, &mut remaining, &mut out);
    out
}

fn search_string_into(
    doc: &Document,
    id: NodeId,
    texts: &[String],
    exclude: Exclude<'_>,
    remaining: &mut Option<usize>,
    out: &mut Vec<NodeId>,
) {
    if let Some(text) = doc.text(id) {
        if texts.iter().any(|t| text.contains(t.as_str())) {
            out.push(id);
            if let Some(n) = remaining {
                *n = n.saturating_sub(1);
            }
        }
        return;
    }
    if matches!(exclude, Exclude::Subtree) {
        return;
    }
    for child in doc.children(id) {
        if *remaining == Some(0) {
            break;
        }
        if exclude.skips(child) {
            continue;
        }
        search_string_into(doc, child, texts, exclude, remaining, out);
    }
}

struct Searcher<'a, 'e> {
    doc: &'a Document,
    query: &'a Query,
    exclude: Exclude<'e>,
    remaining: Option<usize>,
    visited: usize,
}

impl Searcher<'_, '_> {
    #[inline]
    fn exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    fn emit(&mut self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let Some(n) = self.remaining.as_mut() {
            *n = n.saturating_sub(1);
        }
    }

    fn search_node(&mut self, id: NodeId, out: &mut Vec<NodeId>) {
        self.visited += 1;
        match evaluate(self.doc, id, &self.query.predicates) {
            Verdict::Prune => {}
            Verdict::Match => self.collect_match(id, out),
            Verdict::NoMatch => {
                if matches!(self.exclude, Exclude::Subtree) {
                    return;
                }
                for child in self.doc.children(id) {
                    if self.exhausted() {
                        break;
                    }
                    if self.exclude.skips(child) {
                        continue;
                    }
                    self.search_node(child, out);
                }
            }
        }
    }

    /// Apply text, previous-text and relative-path conditions to a match
    fn collect_match(&mut self, id: NodeId, out: &mut Vec<NodeId>) {
        let candidates = if let Some(texts) = &self.query.text {
            // With a relative path every text match is walked; without one
            // the text search itself honours the limit
            let limit = if self.query.relative_path.is_some() {
                None
            } else {
                self.remaining
            };
            search_string(self.doc, id, texts, self.exclude, limit)
        } else if let Some(prev) = &self.query.prev_text {
            let found = self
                .doc
                .prev_text(id)
                .and_then(|t| self.doc.text(t))
                .is_some_and(|t| t.contains(prev.as_str()));
            if !found {
                return;
            }
            vec![id]
        } else {
            vec![id]
        };

        match &self.query.relative_path {
            Some(path) => {
                for candidate in candidates {
                    if self.exhausted() {
                        break;
                    }
                    if let Some(target) = path::walk(self.doc, candidate, path) {
                        self.emit(target, out);
                    }
                }
            }
            None => {
                for candidate in candidates {
                    if self.exhausted() {
                        break;
                    }
                    self.emit(candidate, out);
                }
            }
        }
    }
}

/// Evaluate every predicate against one node
fn evaluate(doc: &Document, id: NodeId, predicates: &[Predicate]) -> Verdict {
    let mut verdict = Verdict::Match;
    for predicate in predicates {
        let hit = match matches_property(doc, id, predicate) {
            Some(hit) => hit,
            // Missing property: only positive tests care
            None => {
                if !predicate.test.is_negative() {
                    verdict = Verdict::NoMatch;
                }
                continue;
            }
        };
        match (predicate.test.is_negative(), hit) {
            (true, true) => return Verdict::Prune,
            (false, false) => verdict = Verdict::NoMatch,
            _ => {}
        }
    }
    verdict
}

/// Whether any of the node's values for the property satisfies any allowed
/// value, `None` when the node does not carry the property
fn matches_property(doc: &Document, id: NodeId, predicate: &Predicate) -> Option<bool> {
    let substring = predicate.test.is_substring();
    let values = &predicate.values;
    doc.get_node(id)?;
    match predicate.prop {
        Prop::Role => Some(matches_int(doc.role(id), values, substring)),
        Prop::States => {
            doc.control(id)?;
            Some(
                doc.states(id)
                    .iter()
                    .any(|&s| matches_int(s, values, substring)),
            )
        }
        Prop::ClassName => {
            let class_name = doc.class_name(id)?;
            Some(
                class_name
                    .split(' ')
                    .any(|c| matches_str(c, values, substring)),
            )
        }
        Prop::Tag => doc.tag(id).map(|v| matches_str(v, values, substring)),
        Prop::Id => doc.dom_id(id).map(|v| matches_str(v, values, substring)),
        Prop::Src => doc.src(id).map(|v| matches_str(v, values, substring)),
    }
}

fn matches_int(candidate: u32, values: &[Value], substring: bool) -> bool {
    if substring {
        let text = candidate.to_string();
        return matches_str(&text, values, true);
    }
    values.iter().any(|v| match v {
        Value::Int(v) => *v == i64::from(candidate),
        Value::Str(v) => v.parse::<i64>() == Ok(i64::from(candidate)),
    })
}

fn matches_str(candidate: &str, values: &[Value], substring: bool) -> bool {
    if substring {
        if candidate.is_empty() {
            return false;
        }
        return values.iter().any(|v| match v {
            Value::Str(v) => candidate.contains(v.as_str()),
            Value::Int(v) => candidate.contains(&v.to_string()),
        });
    }
    values.iter().any(|v| match v {
        Value::Str(v) => v == candidate,
        Value::Int(v) => v.to_string() == candidate,
    })
}

/// Check a single node against a query without descending
pub fn matches_node(doc: &Document, id: NodeId, query: &Query) -> bool {
    !search(doc, id, query, Exclude::Subtree, Some(1)).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;
    use crate::search::Constraints;

    const PAGE: &str = concat!(
        "<control role=\"52\" IAccessible2::attribute_tag=\"body\">",
        "<control role=\"36\" IAccessible2::attribute_tag=\"nav\" HTMLAttrib::class=\"menu top\">",
        "<control role=\"19\" IAccessible2::attribute_tag=\"a\" HTMLAttrib::id=\"home\">",
        "<text>Home</text></control>",
        "<control role=\"19\" states=\"4 16\" IAccessible2::attribute_tag=\"a\">",
        "<text>News</text></control>",
        "</control>",
        "<control role=\"19\" IAccessible2::attribute_tag=\"a\" HTMLAttrib::class=\"ad\">",
        "<text>Buy</text></control>",
        "<control role=\"8\" IAccessible2::attribute_tag=\"p\">",
        "<text>Label:</text><text>A</text><text>B</text><text>C</text></control>",
        "</control>"
    );

    fn query(pairs: &[(&str, &str)]) -> Query {
        let mut c = Constraints::default();
        for (key, value) in pairs {
            c.set(key, *value);
        }
        Query::build("test", &c).unwrap()
    }

    fn texts(doc: &Document, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| doc.text_of(id).to_string()).collect()
    }

    #[test]
    fn test_search_by_role_in_document_order() {
        let doc = parse_document(PAGE).unwrap();
        let found = search(&doc, doc.root(), &query(&[("role", "19")]), Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["Home", "News", "Buy"]);
    }

    #[test]
    fn test_limit_caps_results() {
        let doc = parse_document(PAGE).unwrap();
        let found = search(&doc, doc.root(), &query(&[("role", "19")]), Exclude::None, Some(2));
        assert_eq!(texts(&doc, &found), ["Home", "News"]);
    }

    #[test]
    fn test_negative_predicate_prunes_subtree() {
        let doc = parse_document(PAGE).unwrap();
        let q = query(&[("tag", "a"), ("className", "!menu")]);
        let found = search(&doc, doc.root(), &q, Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["Buy"]);
    }

    #[test]
    fn test_missing_property_fails_positive_tests() {
        let doc = parse_document(PAGE).unwrap();
        // Text nodes have no id; controls without one do not match either
        let found = search(&doc, doc.root(), &query(&[("id", "*o*")]), Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["Home"]);
        let found = search(&doc, doc.root(), &query(&[("id", "!home"), ("tag", "a")]), Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["News", "Buy"]);
    }

    #[test]
    fn test_states_any_of() {
        let doc = parse_document(PAGE).unwrap();
        let found = search(&doc, doc.root(), &query(&[("states", "16")]), Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["News"]);
    }

    #[test]
    fn test_text_search_returns_text_node() {
        let doc = parse_document(PAGE).unwrap();
        let found = search(&doc, doc.root(), &query(&[("text", "C")]), Exclude::None, None);
        assert_eq!(found.len(), 1);
        assert_eq!(doc.text(found[0]), Some("C"));
        // "Buy" contains "B" too
        let found = search(&doc, doc.root(), &query(&[("text", "B")]), Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["Buy", "B"]);
    }

    #[test]
    fn test_prev_text() {
        let doc = parse_document(PAGE).unwrap();
        let found = search(&doc, doc.root(), &query(&[("text", "<Label"), ("role", "0")]), Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["A"]);
    }

    #[test]
    fn test_exclude_nodes() {
        let doc = parse_document(PAGE).unwrap();
        let nav = doc.children(doc.root()).next().unwrap();
        let excluded: HashSet<NodeId> = [nav].into_iter().collect();
        let found = search(&doc, doc.root(), &query(&[("role", "19")]), Exclude::Nodes(&excluded), None);
        assert_eq!(texts(&doc, &found), ["Buy"]);
        assert!(search(&doc, nav, &query(&[]), Exclude::Nodes(&excluded), None).is_empty());
    }

    #[test]
    fn test_exclude_subtree_checks_start_only() {
        let doc = parse_document(PAGE).unwrap();
        let q = query(&[("role", "19")]);
        assert!(search(&doc, doc.root(), &q, Exclude::Subtree, None).is_empty());
        let nav = doc.children(doc.root()).next().unwrap();
        assert!(matches_node(&doc, nav, &query(&[("tag", "nav")])));
        assert!(!matches_node(&doc, nav, &q));
    }

    #[test]
    fn test_search_string_limit() {
        let doc = parse_document(PAGE).unwrap();
        let needles = vec!["e".to_string(), "u".to_string()];
        let found = search_string(&doc, doc.root(), &needles, Exclude::None, None);
        assert_eq!(texts(&doc, &found), ["Home", "News", "Buy", "Label:"]);
        let found = search_string(&doc, doc.root(), &needles, Exclude::None, Some(1));
        assert_eq!(texts(&doc, &found), ["Home"]);
    }
}
