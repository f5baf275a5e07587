//! Content Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of content node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Control boundary (link, heading, list item...)
    Control,
    /// Formatting boundary without text
    Format,
    /// Formatting boundary carrying a run of text
    Text,
}

/// A content node in the arena
///
/// Offsets and sizes count characters in the host's flattened text.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Parent node (None for the root)
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Last Text node that precedes this node in document flow
    pub prev_text: Option<NodeId>,
    /// Position among the parent's children
    pub index: u32,
    pub depth: u16,
    pub offset: u32,
    pub size: u32,
    /// Identifier of the enclosing control
    pub control_id: u64,
    /// Index into the control arena (Control nodes only)
    pub control: Option<u32>,
    /// Byte range of this subtree's text in the document text buffer
    pub text_start: u32,
    pub text_end: u32,
    /// Start of attributes in attribute arena
    pub attr_start: u32,
    pub attr_count: u16,
}

impl Node {
    /// Create a new control node
    pub fn control(control: u32, control_id: u64, parent: Option<NodeId>, depth: u16) -> Self {
        let mut node = Node::new(NodeKind::Control, parent, depth, control_id);
        node.control = Some(control);
        node
    }

    /// Create a new formatting node; it becomes Text once it receives data
    pub fn format(control_id: u64, parent: Option<NodeId>, depth: u16) -> Self {
        Node::new(NodeKind::Format, parent, depth, control_id)
    }

    fn new(kind: NodeKind, parent: Option<NodeId>, depth: u16, control_id: u64) -> Self {
        Node {
            kind,
            parent,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            prev_text: None,
            index: 0,
            depth,
            offset: 0,
            size: 0,
            control_id,
            control: None,
            text_start: 0,
            text_end: 0,
            attr_start: 0,
            attr_count: 0,
        }
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.kind == NodeKind::Control
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    /// Exclusive end offset
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }

    /// Check whether `offset` falls within `[offset, offset + size)`
    #[inline]
    pub fn spans(&self, offset: u32) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

/// Accessibility fields of a control node
///
/// Strings are ids into the document's string pool; 0 means absent.
#[derive(Debug, Clone, Default)]
pub struct ControlField {
    pub role: u32,
    pub states: Vec<u32>,
    pub name_id: u32,
    pub tag_id: u32,
    pub id_id: u32,
    pub class_id: u32,
    pub src_id: u32,
}

/// Stored raw attribute
#[derive(Debug, Clone, Copy)]
pub struct NodeAttribute {
    pub name_id: u32,
    pub value_id: u32,
}

/// Generation-checked reference to a node
///
/// Only valid against the document it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub generation: u64,
    pub id: NodeId,
}
