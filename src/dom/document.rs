//! Content Document - Arena-based tree representation
//!
//! Efficient tree storage with:
//! - Arena allocation for nodes and control fields
//! - NodeId indices for traversal (parent, siblings, previous text)
//! - String interning for names, tags and class lists
//! - One text buffer; every subtree's text is a contiguous slice of it
//!
//! A document is immutable once built and is dropped as a whole when the
//! next one replaces it.

use std::sync::atomic::{AtomicU64, Ordering};

use super::node::{ControlField, Node, NodeAttribute, NodeHandle, NodeId, NodeKind};
use super::strings::StringPool;
use crate::error::{Error, Result};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A parsed content tree stored in arena format
#[derive(Debug)]
pub struct Document {
    generation: u64,
    /// Host change sequence observed when the build started
    pub(super) change_seq: u64,
    /// Arena of nodes; the root is always node 0
    pub(super) nodes: Vec<Node>,
    pub(super) controls: Vec<ControlField>,
    pub(super) attributes: Vec<NodeAttribute>,
    pub strings: StringPool,
    /// Concatenated text runs in document order
    pub(super) text: String,
}

impl Document {
    pub(super) fn new() -> Self {
        Document {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            change_seq: 0,
            nodes: Vec::with_capacity(256),
            controls: Vec::with_capacity(64),
            attributes: Vec::with_capacity(256),
            strings: StringPool::new(),
            text: String::new(),
        }
    }

    /// Process-unique identifier of this tree
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Host change sequence this document was built from
    #[inline]
    pub fn change_seq(&self) -> u64 {
        self.change_seq
    }

    /// Root node ID
    #[inline]
    pub fn root(&self) -> NodeId {
        0
    }

    /// Total size of the content in characters
    pub fn len(&self) -> u32 {
        self.nodes.first().map_or(0, |n| n.size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get a node by ID
    #[inline]
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// Take a generation-checked handle on a node
    pub fn handle(&self, id: NodeId) -> NodeHandle {
        NodeHandle {
            generation: self.generation,
            id,
        }
    }

    /// Resolve a handle taken on this document
    pub fn resolve(&self, handle: NodeHandle) -> Result<NodeId> {
        if handle.generation != self.generation {
            return Err(Error::StaleGeneration {
                expected: self.generation,
                found: handle.generation,
            });
        }
        match self.get_node(handle.id) {
            Some(_) => Ok(handle.id),
            None => Err(Error::lookup(format!("node {}", handle.id))),
        }
    }

    // ------------------------------------------------------------------
    // Node fields
    // ------------------------------------------------------------------

    /// Control fields (Control nodes only)
    pub fn control(&self, id: NodeId) -> Option<&ControlField> {
        let index = self.get_node(id)?.control?;
        self.controls.get(index as usize)
    }

    /// Role of a control, 0 for text and formatting nodes
    pub fn role(&self, id: NodeId) -> u32 {
        self.control(id).map_or(0, |c| c.role)
    }

    pub fn states(&self, id: NodeId) -> &[u32] {
        self.control(id).map_or(&[], |c| c.states.as_slice())
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.control(id).and_then(|c| self.strings.get(c.name_id))
    }

    /// Lowercased HTML tag name
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.control(id).and_then(|c| self.strings.get(c.tag_id))
    }

    /// HTML id attribute
    pub fn dom_id(&self, id: NodeId) -> Option<&str> {
        self.control(id).and_then(|c| self.strings.get(c.id_id))
    }

    pub fn class_name(&self, id: NodeId) -> Option<&str> {
        self.control(id).and_then(|c| self.strings.get(c.class_id))
    }

    pub fn src(&self, id: NodeId) -> Option<&str> {
        self.control(id).and_then(|c| self.strings.get(c.src_id))
    }

    /// Raw stream attributes of a control or formatting node
    pub fn attributes(&self, id: NodeId) -> &[NodeAttribute] {
        if let Some(node) = self.get_node(id) {
            let start = node.attr_start as usize;
            let end = start + node.attr_count as usize;
            self.attributes.get(start..end).unwrap_or(&[])
        } else {
            &[]
        }
    }

    /// Get raw attribute value by name
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|attr| self.strings.get(attr.name_id) == Some(name))
            .map(|attr| self.strings.get(attr.value_id).unwrap_or(""))
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// Text run carried by a Text node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.is_text() {
            self.text.get(node.text_start as usize..node.text_end as usize)
        } else {
            None
        }
    }

    /// Text of the whole subtree, as the host presents it
    pub fn text_of(&self, id: NodeId) -> &str {
        self.get_node(id)
            .and_then(|node| self.text.get(node.text_start as usize..node.text_end as usize))
            .unwrap_or("")
    }

    /// Text runs of the subtree separated by spaces
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for run in std::iter::once(id)
            .chain(self.descendants(id))
            .filter_map(|n| self.text(n))
            .filter(|run| !run.is_empty())
        {
            out.push_str(run);
            if !run.ends_with('\n') {
                out.push(' ');
            }
        }
        out.truncate(out.trim_end_matches(' ').len());
        out
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    /// Last Text node preceding this node in document flow
    pub fn prev_text(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.prev_text
    }

    /// Text node whose span contains `offset`
    pub fn search_offset(&self, offset: u32) -> Option<NodeId> {
        self.search_offset_from(self.root(), offset)
    }

    /// Text node within `id`'s subtree whose span contains `offset`
    pub fn search_offset_from(&self, id: NodeId, offset: u32) -> Option<NodeId> {
        let mut current = id;
        loop {
            let node = self.get_node(current)?;
            if node.is_text() {
                return node.spans(offset).then_some(current);
            }
            // Zero-sized formatting nodes never hold an offset
            current = self
                .children(current)
                .find(|&c| self.get_node(c).is_some_and(|n| n.size > 0 && n.spans(offset)))?;
        }
    }

    /// Text node immediately following a subtree
    pub fn next_text_node(&self, id: NodeId) -> Option<NodeId> {
        let end = self.get_node(id)?.end();
        self.search_offset(end)
    }

    /// Check whether `b` is a strict descendant of `a`
    pub fn contains(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(outer), Some(inner)) = (self.get_node(a), self.get_node(b)) else {
            return false;
        };
        if inner.depth <= outer.depth {
            return false;
        }
        let mut current = inner.parent;
        while let Some(id) = current {
            if id == a {
                return true;
            }
            current = self.get_node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Given two nodes on the same branch, the one closest to the tip
    pub fn deepest(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        if a == b || self.contains(a, b) {
            Some(b)
        } else if self.contains(b, a) {
            Some(a)
        } else {
            None
        }
    }

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        let first = self.get_node(id).and_then(|n| n.first_child);
        ChildIter {
            doc: self,
            next: first,
        }
    }

    /// Iterate over all descendants of a node in pre-order (excluding itself)
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        if let Some(node) = self.get_node(id) {
            let mut child_id = node.last_child;
            while let Some(cid) = child_id {
                stack.push(cid);
                child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
            }
        }
        DescendantIter { doc: self, stack }
    }

    /// Short human-readable description for logs
    pub fn describe(&self, id: NodeId) -> String {
        match self.get_node(id) {
            Some(node) if node.kind == NodeKind::Control => format!(
                "control role={} tag={} id={} at {}+{}",
                self.role(id),
                self.tag(id).unwrap_or(""),
                self.dom_id(id).unwrap_or(""),
                node.offset,
                node.size
            ),
            Some(node) => format!("{:?} {:?} at {}", node.kind, self.text_of(id), node.offset),
            None => format!("<missing node {id}>"),
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Append a node and link it to its parent
    pub(super) fn push_node(&mut self, mut node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        if let Some(parent_id) = node.parent {
            let index = self
                .nodes
                .get(parent_id as usize)
                .and_then(|p| p.last_child)
                .and_then(|last| self.nodes.get(last as usize))
                .map_or(0, |last| last.index + 1);
            node.index = index;
            self.nodes.push(node);
            self.link_child(parent_id, id);
        } else {
            self.nodes.push(node);
        }
        id
    }

    /// Link a child node to its parent
    fn link_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        let last_child_opt = self.nodes[parent_id as usize].last_child;

        if let Some(last_child_id) = last_child_opt {
            self.nodes[child_id as usize].prev_sibling = Some(last_child_id);
            self.nodes[last_child_id as usize].next_sibling = Some(child_id);
        } else {
            self.nodes[parent_id as usize].first_child = Some(child_id);
        }
        self.nodes[parent_id as usize].last_child = Some(child_id);
    }

    #[inline]
    pub(super) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }
}

/// Iterator over child nodes
pub struct ChildIter<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
}

impl<'d> Iterator for ChildIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator over descendant nodes
pub struct DescendantIter<'d> {
    doc: &'d Document,
    stack: Vec<NodeId>,
}

impl<'d> Iterator for DescendantIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if let Some(node) = self.doc.get_node(current) {
            let mut child_id = node.last_child;
            while let Some(id) = child_id {
                self.stack.push(id);
                child_id = self.doc.get_node(id).and_then(|n| n.prev_sibling);
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::builder::parse_document;

    const PAGE: &str = concat!(
        "<control role=\"52\" controlIdentifier_ID=\"1\" IAccessible2::attribute_tag=\"body\">",
        "<control role=\"40\" controlIdentifier_ID=\"2\" IAccessible2::attribute_tag=\"h1\">",
        "<text>Title</text>",
        "</control>",
        "<control role=\"19\" controlIdentifier_ID=\"3\" IHTMLDOMNode::nodeName=\"A\" ",
        "HTMLAttrib::class=\"nav main\">",
        "<text>Home</text><text language=\"en\"></text><text>\n</text>",
        "</control>",
        "</control>"
    );

    #[test]
    fn test_offsets_and_sizes() {
        let doc = parse_document(PAGE).unwrap();
        assert_eq!(doc.len(), 10);
        let children: Vec<_> = doc.children(doc.root()).collect();
        assert_eq!(children.len(), 2);
        let link = doc.get_node(children[1]).unwrap();
        assert_eq!((link.offset, link.size), (5, 5));
        assert_eq!(link.index, 1);
        assert_eq!(doc.tag(children[1]), Some("a"));
        assert_eq!(doc.class_name(children[1]), Some("nav main"));
    }

    #[test]
    fn test_text_queries() {
        let doc = parse_document(PAGE).unwrap();
        assert_eq!(doc.text_of(doc.root()), "TitleHome\n");
        assert_eq!(doc.inner_text(doc.root()), "Title Home \n");
        let home = doc.search_offset(6).unwrap();
        assert_eq!(doc.text(home), Some("Home"));
        assert_eq!(doc.search_offset(10), None);
        let next = doc.next_text_node(home).unwrap();
        assert_eq!(doc.text(next), Some("\n"));
    }

    #[test]
    fn test_prev_text_and_format_nodes() {
        let doc = parse_document(PAGE).unwrap();
        let link = doc.children(doc.root()).nth(1).unwrap();
        let format = doc.children(link).nth(1).unwrap();
        assert!(!doc.get_node(format).unwrap().is_text());
        assert_eq!(doc.get_attribute(format, "language"), Some("en"));
        let prev = doc.prev_text(format).unwrap();
        assert_eq!(doc.text(prev), Some("Home"));
        assert_eq!(doc.get_node(format).unwrap().control_id, 3);
        assert_eq!(doc.role(format), 0);
    }

    #[test]
    fn test_contains_and_deepest() {
        let doc = parse_document(PAGE).unwrap();
        let root = doc.root();
        let heading = doc.children(root).next().unwrap();
        let title = doc.children(heading).next().unwrap();
        let link = doc.children(root).nth(1).unwrap();
        assert!(doc.contains(root, title));
        assert!(!doc.contains(title, root));
        assert!(!doc.contains(heading, heading));
        assert_eq!(doc.deepest(root, title), Some(title));
        assert_eq!(doc.deepest(title, heading), Some(title));
        assert_eq!(doc.deepest(heading, heading), Some(heading));
        assert_eq!(doc.deepest(heading, link), None);
    }

    #[test]
    fn test_handles_are_generation_checked() {
        let first = parse_document(PAGE).unwrap();
        let second = parse_document(PAGE).unwrap();
        let handle = first.handle(1);
        assert_eq!(first.resolve(handle).unwrap(), 1);
        assert!(matches!(
            second.resolve(handle),
            Err(crate::Error::StaleGeneration { .. })
        ));
    }

    #[test]
    fn test_descendants_preorder() {
        let doc = parse_document(PAGE).unwrap();
        let offsets: Vec<u32> = doc
            .descendants(doc.root())
            .map(|id| doc.get_node(id).unwrap().offset)
            .collect();
        let mut sorted = offsets.clone();
        sorted.sort();
        assert_eq!(offsets, sorted);
        assert_eq!(offsets.len(), doc.node_count() - 1);
    }
}
