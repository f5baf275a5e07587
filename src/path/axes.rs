//! Path Axes Implementation
//!
//! One move per call along:
//! - before: previous text in flow, then its parent
//! - after: next node in pre-order with a greater offset
//! - up, down (first child), left and right (siblings)

use super::parser::Axis;
use crate::dom::{Document, NodeId};

/// Move one step from `context`
///
/// With `pending_check`, the `after` axis stops at the very next node in
/// pre-order so that every node on the way can be checked.
pub fn navigate(doc: &Document, context: NodeId, axis: Axis, pending_check: bool) -> Option<NodeId> {
    match axis {
        Axis::Before => before_axis(doc, context),
        Axis::After => after_axis(doc, context, pending_check),
        Axis::Up => doc.parent(context),
        Axis::Down => doc.get_node(context)?.first_child,
        Axis::Left => doc.get_node(context)?.prev_sibling,
        Axis::Right => doc.get_node(context)?.next_sibling,
    }
}

fn before_axis(doc: &Document, context: NodeId) -> Option<NodeId> {
    let text = doc.prev_text(context)?;
    doc.parent(text)
}

fn after_axis(doc: &Document, context: NodeId, pending_check: bool) -> Option<NodeId> {
    let offset = doc.get_node(context)?.offset;
    let mut current = context;
    loop {
        current = next_in_preorder(doc, current)?;
        if pending_check || doc.get_node(current)?.offset > offset {
            return Some(current);
        }
    }
}

/// Next node in pre-order: first child, else the next sibling of the
/// nearest ancestor that has one
pub fn next_in_preorder(doc: &Document, id: NodeId) -> Option<NodeId> {
    let node = doc.get_node(id)?;
    if let Some(child) = node.first_child {
        return Some(child);
    }
    let mut current = Some(id);
    while let Some(cid) = current {
        let node = doc.get_node(cid)?;
        if let Some(sibling) = node.next_sibling {
            return Some(sibling);
        }
        current = node.parent;
    }
    None
}
