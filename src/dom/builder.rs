//! Tree Builder
//!
//! Turns the host's tagged content stream into a [`Document`]. Offsets are
//! accumulated in characters while events are consumed, so every node's
//! span is known when its end tag is seen.
//!
//! [`TreeBuilder`] wraps the parse with the host handshake: a size check to
//! skip unchanged content, a second size check to detect content that kept
//! mutating during the parse, and cooperative cancellation against the
//! host's change sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::document::Document;
use super::node::{ControlField, Node, NodeAttribute, NodeId, NodeKind};
use crate::core::entities::decode_code_point;
use crate::error::{Error, NotReadyReason, Result};
use crate::host::ContentSource;
use crate::reader::{ReadError, StartTag, StreamEvent, StreamReader};

/// Number of stream events between two cancellation checks
const CHECKPOINT_INTERVAL: usize = 256;

const TAG_KEYS: &[&str] = &["IAccessible2::attribute_tag", "IHTMLDOMNode::nodeName", "tag"];
const ID_KEYS: &[&str] = &["IAccessible2::attribute_id", "HTMLAttrib::id", "id"];
const CLASS_KEYS: &[&str] = &[
    "IAccessible2::attribute_class",
    "HTMLAttrib::class",
    "HTMLAttrib::className",
    "class",
];
const SRC_KEYS: &[&str] = &["IAccessible2::attribute_src", "HTMLAttrib::src", "src"];

/// Monotonic counter of host content-change notifications
///
/// Shared between the host-facing notifier, the builder and the rule manager.
#[derive(Debug, Clone, Default)]
pub struct ChangeSeq(Arc<AtomicU64>);

impl ChangeSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new content change, returning the new sequence number
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

/// Parse a content stream into a document
pub fn parse_document(input: &str) -> Result<Document> {
    build(input, || false)
}

/// Parse with a cancellation probe polled every few hundred events
fn build(input: &str, cancelled: impl Fn() -> bool) -> Result<Document> {
    let mut state = BuildState::new();
    let mut reader = StreamReader::new(input);
    let mut events = 0usize;

    while let Some(event) = reader.next_event().map_err(malformed)? {
        events += 1;
        if events % CHECKPOINT_INTERVAL == 0 && cancelled() {
            return Err(NotReadyReason::Cancelled.into());
        }
        let position = reader.position();
        state.handle(event).map_err(|message| {
            Error::NotReady(NotReadyReason::Malformed {
                position,
                message: message.to_string(),
            })
        })?;
    }

    if !state.stack.is_empty() {
        return Err(Error::NotReady(NotReadyReason::Malformed {
            position: input.len(),
            message: "unclosed element".to_string(),
        }));
    }
    if state.doc.node_count() == 0 || state.doc.is_empty() {
        return Err(NotReadyReason::Empty.into());
    }
    Ok(state.doc)
}

fn malformed(err: ReadError) -> Error {
    Error::NotReady(NotReadyReason::Malformed {
        position: err.position,
        message: err.message.to_string(),
    })
}

/// Open element on the build stack; `unich` elements carry no node
struct OpenElement<'a> {
    name: &'a str,
    node: Option<NodeId>,
}

struct BuildState<'a> {
    doc: Document,
    stack: Vec<OpenElement<'a>>,
    /// Running character offset
    offset: u32,
    last_text: Option<NodeId>,
}

impl<'a> BuildState<'a> {
    fn new() -> Self {
        BuildState {
            doc: Document::new(),
            stack: Vec::with_capacity(32),
            offset: 0,
            last_text: None,
        }
    }

    /// Innermost open node
    fn current(&self) -> Option<NodeId> {
        self.stack.iter().rev().find_map(|e| e.node)
    }

    fn handle(&mut self, event: StreamEvent<'a>) -> std::result::Result<(), &'static str> {
        match event {
            StreamEvent::Start(tag) => self.open(tag, false),
            StreamEvent::Empty(tag) => self.open(tag, true),
            StreamEvent::End(name) => self.close(name),
            StreamEvent::Text(data) => self.character_data(&data),
        }
    }

    fn open(&mut self, tag: StartTag<'a>, is_empty: bool) -> std::result::Result<(), &'static str> {
        let node = match tag.name {
            "unich" => {
                if let Some(value) = tag.get("value") {
                    let ch = decode_code_point(value);
                    self.character_data(ch.encode_utf8(&mut [0u8; 4]))?;
                }
                None
            }
            "control" | "text" => {
                if self.stack.is_empty() && self.doc.node_count() > 0 {
                    return Err("multiple top-level elements");
                }
                Some(self.push_node(&tag))
            }
            _ => return Err("unknown element"),
        };
        if is_empty {
            if let Some(id) = node {
                self.finish_node(id);
            }
        } else {
            self.stack.push(OpenElement {
                name: tag.name,
                node,
            });
        }
        Ok(())
    }

    fn push_node(&mut self, tag: &StartTag<'a>) -> NodeId {
        let parent = self.current();
        let depth = self.stack.iter().filter(|e| e.node.is_some()).count() as u16;
        let inherited_id = parent
            .and_then(|p| self.doc.get_node(p))
            .map_or(0, |p| p.control_id);

        let mut node = if tag.name == "control" {
            let field = self.control_field(tag);
            let control_id = tag
                .get("controlIdentifier_ID")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            let index = self.doc.controls.len() as u32;
            self.doc.controls.push(field);
            Node::control(index, control_id, parent, depth)
        } else {
            Node::format(inherited_id, parent, depth)
        };

        node.offset = self.offset;
        node.prev_text = self.last_text;
        node.text_start = self.doc.text.len() as u32;
        node.attr_start = self.doc.attributes.len() as u32;
        node.attr_count = tag.attributes.len().min(u16::MAX as usize) as u16;
        for attr in tag.attributes.iter().take(u16::MAX as usize) {
            let name_id = self.doc.strings.intern(attr.name);
            let value_id = self.doc.strings.intern(&attr.value);
            self.doc.attributes.push(NodeAttribute { name_id, value_id });
        }
        self.doc.push_node(node)
    }

    fn control_field(&mut self, tag: &StartTag<'a>) -> ControlField {
        let strings = &mut self.doc.strings;
        let tag_name = tag.get_first(TAG_KEYS).map(str::to_lowercase);
        ControlField {
            role: tag
                .get("role")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            states: tag
                .get("states")
                .map(|v| v.split_whitespace().filter_map(|s| s.parse().ok()).collect())
                .unwrap_or_default(),
            name_id: strings.intern(tag.get("name").unwrap_or("")),
            tag_id: strings.intern(tag_name.as_deref().unwrap_or("")),
            id_id: strings.intern(tag.get_first(ID_KEYS).unwrap_or("")),
            class_id: strings.intern(tag.get_first(CLASS_KEYS).unwrap_or("")),
            src_id: strings.intern(tag.get_first(SRC_KEYS).unwrap_or("")),
        }
    }

    fn close(&mut self, name: &str) -> std::result::Result<(), &'static str> {
        let open = self.stack.pop().ok_or("unexpected end tag")?;
        if open.name != name {
            return Err("mismatched end tag");
        }
        if let Some(id) = open.node {
            self.finish_node(id);
        }
        Ok(())
    }

    /// Fix the node's span now that all of its content has been seen
    fn finish_node(&mut self, id: NodeId) {
        let offset = self.offset;
        let text_end = self.doc.text.len() as u32;
        let node = self.doc.node_mut(id);
        node.size = offset - node.offset;
        node.text_end = text_end;
    }

    fn character_data(&mut self, data: &str) -> std::result::Result<(), &'static str> {
        let target = self
            .current()
            .filter(|&id| self.doc.get_node(id).is_some_and(|n| !n.is_control()));
        let Some(id) = target else {
            if data.trim().is_empty() {
                return Ok(());
            }
            return Err("character data outside text element");
        };
        if data.is_empty() {
            return Ok(());
        }
        self.doc.text.push_str(data);
        self.offset += data.chars().count() as u32;
        self.doc.node_mut(id).kind = NodeKind::Text;
        self.last_text = Some(id);
        Ok(())
    }
}

/// Rebuilds the document when the host reports new content
pub struct TreeBuilder {
    seq: ChangeSeq,
    cancel_superseded: bool,
    /// Host size at the last build attempt
    last_size: Option<u32>,
}

impl TreeBuilder {
    pub fn new(seq: ChangeSeq, cancel_superseded: bool) -> Self {
        TreeBuilder {
            seq,
            cancel_superseded,
            last_size: None,
        }
    }

    /// Change sequence shared with the notifier
    pub fn seq(&self) -> &ChangeSeq {
        &self.seq
    }

    /// Forget the last seen size so the next update rebuilds
    pub fn reset(&mut self) {
        self.last_size = None;
    }

    /// Build a new document if the host content changed
    ///
    /// Returns `Ok(None)` when the host size is unchanged and `force` is not
    /// set. Any failure is [`Error::NotReady`]; the caller retries later.
    pub fn update(&mut self, source: &dyn ContentSource, force: bool) -> Result<Option<Document>> {
        let Some(size) = source.total_size() else {
            self.last_size = None;
            return Err(NotReadyReason::Absent.into());
        };
        if !force && self.last_size == Some(size) {
            return Ok(None);
        }
        self.last_size = Some(size);

        let start_seq = self.seq.current();
        let Some(content) = source.content() else {
            return Err(NotReadyReason::Absent.into());
        };
        if size == 0 || content.is_empty() {
            return Err(NotReadyReason::Empty.into());
        }

        let seq = &self.seq;
        let cancel = self.cancel_superseded;
        let mut doc = build(&content, || cancel && seq.current() != start_seq).inspect_err(|err| {
            warn!(error = %err, "content stream not ready");
        })?;

        let after = source.total_size();
        if after != Some(size) {
            warn!(before = size, after = ?after, "content changed during parse");
            // Let the next poll rebuild whatever the new size is
            self.last_size = None;
            return Err(NotReadyReason::SizeChanged {
                before: size,
                after: after.unwrap_or(0),
            }
            .into());
        }

        doc.change_seq = start_seq;
        debug!(
            generation = doc.generation(),
            nodes = doc.node_count(),
            size = doc.len(),
            "document built"
        );
        Ok(Some(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    fn reason(result: Result<Document>) -> NotReadyReason {
        match result {
            Err(Error::NotReady(reason)) => reason,
            other => panic!("expected not ready, got {other:?}"),
        }
    }

    #[test]
    fn test_control_fields() {
        let doc = parse_document(concat!(
            "<control role=\"19\" states=\"16 4\" controlIdentifier_ID=\"77\" name=\"Go\" ",
            "IHTMLDOMNode::nodeName=\"A\" HTMLAttrib::id=\"home\" ",
            "HTMLAttrib::className=\"btn primary\" HTMLAttrib::src=\"x.png\">",
            "<text>Go</text></control>"
        ))
        .unwrap();
        let root = doc.root();
        assert_eq!(doc.role(root), 19);
        assert_eq!(doc.states(root), &[16, 4]);
        assert_eq!(doc.get_node(root).unwrap().control_id, 77);
        assert_eq!(doc.name(root), Some("Go"));
        assert_eq!(doc.tag(root), Some("a"));
        assert_eq!(doc.dom_id(root), Some("home"));
        assert_eq!(doc.class_name(root), Some("btn primary"));
        assert_eq!(doc.src(root), Some("x.png"));
    }

    #[test]
    fn test_ia2_attributes_take_precedence() {
        let doc = parse_document(concat!(
            "<control IAccessible2::attribute_tag=\"nav\" IHTMLDOMNode::nodeName=\"DIV\" ",
            "IAccessible2::attribute_class=\"\" HTMLAttrib::class=\"menu\">",
            "<text>x</text></control>"
        ))
        .unwrap();
        assert_eq!(doc.tag(0), Some("nav"));
        assert_eq!(doc.class_name(0), Some("menu"));
        assert_eq!(doc.dom_id(0), None);
    }

    #[test]
    fn test_unich_and_text_chunks() {
        let doc = parse_document(
            "<control><text>caf<unich value=\"233\"/> <unich value=\"bad\"/></text></control>",
        )
        .unwrap();
        let text = doc.children(0).next().unwrap();
        assert_eq!(doc.text(text), Some("café \u{fffd}"));
        assert_eq!(doc.len(), 6);
    }

    #[test]
    fn test_whitespace_between_elements_is_ignored() {
        let doc = parse_document("<control>\n  <text>a</text>\n</control>\n").unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.node_count(), 2);
    }

    #[test]
    fn test_malformed_streams() {
        for input in [
            "<control>stray</control>",
            "<control><para>x</para></control>",
            "<control><text>x</control></text>",
            "<control><text>x</text>",
            "<control><text>x</text></control><control/>",
            "<control role=\"1\"",
        ] {
            assert!(
                matches!(reason(parse_document(input)), NotReadyReason::Malformed { .. }),
                "{input}"
            );
        }
    }

    #[test]
    fn test_empty_streams() {
        assert_eq!(reason(parse_document("")), NotReadyReason::Empty);
        assert_eq!(reason(parse_document("<control><text/></control>")), NotReadyReason::Empty);
    }

    #[test]
    fn test_cancellation_checkpoint() {
        let mut input = String::from("<control>");
        for _ in 0..300 {
            input.push_str("<text>x</text>");
        }
        input.push_str("</control>");
        assert_eq!(reason(build(&input, || true)), NotReadyReason::Cancelled);
        assert!(build(&input, || false).is_ok());
    }

    /// Host double whose size can change between the two size checks
    struct Host {
        content: String,
        sizes: Mutex<Vec<u32>>,
    }

    impl ContentSource for Host {
        fn total_size(&self) -> Option<u32> {
            let mut sizes = self.sizes.lock().unwrap();
            if sizes.len() > 1 {
                Some(sizes.remove(0))
            } else {
                sizes.first().copied()
            }
        }

        fn content(&self) -> Option<String> {
            Some(self.content.clone())
        }
    }

    #[test]
    fn test_update_skips_unchanged_size() {
        let host = Host {
            content: "<control><text>abc</text></control>".into(),
            sizes: Mutex::new(vec![3]),
        };
        let mut builder = TreeBuilder::new(ChangeSeq::new(), true);
        assert!(builder.update(&host, false).unwrap().is_some());
        assert!(builder.update(&host, false).unwrap().is_none());
        assert!(builder.update(&host, true).unwrap().is_some());
    }

    #[test]
    fn test_update_detects_size_change() {
        let host = Host {
            content: "<control><text>abc</text></control>".into(),
            sizes: Mutex::new(vec![3, 4]),
        };
        let mut builder = TreeBuilder::new(ChangeSeq::new(), true);
        let err = builder.update(&host, false).unwrap_err();
        assert!(matches!(
            err,
            Error::NotReady(NotReadyReason::SizeChanged { before: 3, after: 4 })
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_update_records_change_seq() {
        let host = Host {
            content: "<control><text>abc</text></control>".into(),
            sizes: Mutex::new(vec![3]),
        };
        let seq = ChangeSeq::new();
        seq.bump();
        seq.bump();
        let mut builder = TreeBuilder::new(seq, true);
        let doc = builder.update(&host, false).unwrap().unwrap();
        assert_eq!(doc.change_seq(), 2);
    }

    #[derive(Debug, Clone)]
    enum Shape {
        Text(String),
        Format,
        Control(Vec<Shape>),
    }

    fn shape_strategy() -> impl Strategy<Value = Shape> {
        let leaf = prop_oneof![
            "[a-z é]{1,6}".prop_map(Shape::Text),
            Just(Shape::Format),
        ];
        leaf.prop_recursive(4, 48, 5, |inner| {
            prop::collection::vec(inner, 0..5).prop_map(Shape::Control)
        })
    }

    fn render(shape: &Shape, out: &mut String) {
        match shape {
            Shape::Text(text) => {
                out.push_str("<text>");
                out.push_str(text);
                out.push_str("</text>");
            }
            Shape::Format => out.push_str("<text/>"),
            Shape::Control(children) => {
                out.push_str("<control role=\"10\">");
                for child in children {
                    render(child, out);
                }
                out.push_str("</control>");
            }
        }
    }

    fn expected_size(shape: &Shape) -> u32 {
        match shape {
            Shape::Text(text) => text.chars().count() as u32,
            Shape::Format => 0,
            Shape::Control(children) => children.iter().map(expected_size).sum(),
        }
    }

    proptest! {
        #[test]
        fn prop_sizes_sum_and_children_are_contiguous(children in prop::collection::vec(shape_strategy(), 1..6)) {
            let root = Shape::Control(children);
            let mut input = String::new();
            render(&root, &mut input);
            let total = expected_size(&root);
            let parsed = parse_document(&input);
            if total == 0 {
                prop_assert!(parsed.is_err());
                return Ok(());
            }
            let doc = parsed.unwrap();
            prop_assert_eq!(doc.len(), total);
            prop_assert_eq!(doc.text_of(doc.root()).chars().count() as u32, total);

            for id in std::iter::once(doc.root()).chain(doc.descendants(doc.root())) {
                let node = doc.get_node(id).unwrap();
                let children: Vec<_> = doc.children(id).collect();
                if children.is_empty() {
                    continue;
                }
                let sum: u32 = children.iter().map(|&c| doc.get_node(c).unwrap().size).sum();
                prop_assert_eq!(node.size, sum);
                let mut cursor = node.offset;
                for &c in &children {
                    let child = doc.get_node(c).unwrap();
                    prop_assert_eq!(child.offset, cursor);
                    cursor = child.end();
                }
                prop_assert_eq!(cursor, node.end());
            }
        }
    }
}
