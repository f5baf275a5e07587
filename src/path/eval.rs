//! Path Walker
//!
//! Walks a compiled path from a start node. A check searches the current
//! node (its whole subtree on a `d` step) with a limit of one; a repeated
//! step keeps moving until its check holds.

use tracing::trace;

use super::axes::navigate;
use super::compiler::CompiledPath;
use super::parser::Axis;
use crate::dom::{Document, NodeId};
use crate::search::{search, Exclude, Query};

/// Walk `path` from `start`, `None` when the path cannot be walked
pub fn walk(doc: &Document, start: NodeId, path: &CompiledPath) -> Option<NodeId> {
    let mut node = start;
    for step in &path.steps {
        node = match &step.check {
            None => navigate(doc, node, step.axis?, false)?,
            Some(check) => walk_until(doc, node, step.axis, check)?,
        };
    }
    trace!(path = %path.source, start, end = node, "walk");
    Some(node)
}

fn walk_until(doc: &Document, mut node: NodeId, axis: Option<Axis>, check: &Query) -> Option<NodeId> {
    let exclude = if axis == Some(Axis::Down) {
        Exclude::None
    } else {
        Exclude::Subtree
    };
    // Every move visits a different node, so the tree size bounds the loop
    for _ in 0..=doc.node_count() {
        if let Some(&found) = search(doc, node, check, exclude, Some(1)).first() {
            return Some(found);
        }
        node = navigate(doc, node, axis?, true)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;
    use proptest::prelude::*;

    // body(0) > [
    //   list(1) > [ item(2) > t"one"(3), item(4) > t"two"(5) ],
    //   heading(6) > t"Title"(7),
    //   para(8) > t"end"(9)
    // ]
    const PAGE: &str = concat!(
        "<control role=\"52\" IAccessible2::attribute_tag=\"body\">",
        "<control role=\"33\" IAccessible2::attribute_tag=\"ul\">",
        "<control role=\"34\" IAccessible2::attribute_tag=\"li\"><text>one</text></control>",
        "<control role=\"34\" IAccessible2::attribute_tag=\"li\"><text>two</text></control>",
        "</control>",
        "<control role=\"40\" IAccessible2::attribute_tag=\"h2\"><text>Title</text></control>",
        "<control role=\"8\" IAccessible2::attribute_tag=\"p\"><text>end</text></control>",
        "</control>"
    );

    fn walk_str(doc: &Document, start: NodeId, path: &str) -> Option<NodeId> {
        walk(doc, start, &CompiledPath::compile(path).unwrap())
    }

    #[test]
    fn test_plain_moves() {
        let doc = parse_document(PAGE).unwrap();
        assert_eq!(walk_str(&doc, 3, "uu"), Some(1));
        assert_eq!(walk_str(&doc, 2, "rd"), Some(5));
        assert_eq!(walk_str(&doc, 2, "l"), None);
        assert_eq!(walk_str(&doc, 2, ""), Some(2));
    }

    #[test]
    fn test_repeated_move_until_check() {
        let doc = parse_document(PAGE).unwrap();
        assert_eq!(walk_str(&doc, 3, "U{'tag': 'ul'}"), Some(1));
        // The check holds on the start node: no move at all
        assert_eq!(walk_str(&doc, 2, "U{'tag': 'li'}"), Some(2));
        assert_eq!(walk_str(&doc, 3, "U{'tag': 'table'}"), None);
        assert_eq!(walk_str(&doc, 1, "R{'role': 8}"), Some(8));
    }

    #[test]
    fn test_down_check_searches_subtree() {
        let doc = parse_document(PAGE).unwrap();
        assert_eq!(walk_str(&doc, 0, "D{'text': 'two'}"), Some(5));
        assert_eq!(walk_str(&doc, 0, "D{'tag': 'h2'}"), Some(6));
    }

    #[test]
    fn test_check_only_step() {
        let doc = parse_document(PAGE).unwrap();
        assert_eq!(walk_str(&doc, 6, "c{'role': 40}d"), Some(7));
        assert_eq!(walk_str(&doc, 6, "c{'role': 41}d"), None);
    }

    #[test]
    fn test_after_and_before_with_checks() {
        let doc = parse_document(PAGE).unwrap();
        assert_eq!(walk_str(&doc, 2, "A{'tag': 'p'}"), Some(8));
        assert_eq!(walk_str(&doc, 8, "B{'tag': 'li'}"), Some(4));
        assert_eq!(walk_str(&doc, 8, "b"), Some(6));
    }

    proptest! {
        #[test]
        fn prop_walk_is_deterministic(start in 0u32..10, path in "[baudlr]{0,6}") {
            let doc = parse_document(PAGE).unwrap();
            let compiled = CompiledPath::compile(&path).unwrap();
            let first = walk(&doc, start, &compiled);
            let second = walk(&doc, start, &compiled);
            prop_assert_eq!(first, second);
            if let Some(end) = first {
                prop_assert!(doc.get_node(end).is_some());
            }
        }
    }
}
