//! Host collaborator traits
//!
//! The screen reader integration supplies content through [`ContentSource`]
//! and receives notifications through [`HostSink`].

use std::sync::RwLock;

use crate::rule::{AutoAction, Snapshot};

/// Provider of the tagged content stream
pub trait ContentSource: Send + Sync {
    /// Size of the host's flattened text in characters, `None` when unavailable
    fn total_size(&self) -> Option<u32>;

    /// The whole tagged content stream
    fn content(&self) -> Option<String>;

    /// Title of the host window, used when no page title rule matched
    fn window_title(&self) -> Option<String> {
        None
    }
}

/// Receiver of engine notifications
pub trait HostSink: Send + Sync {
    /// A new set of results is available
    fn rules_updated(&self, _snapshot: &Snapshot) {}

    fn page_title_changed(&self, _title: &str) {}

    /// Execute an automatic action chosen by the auto-action sweep
    fn execute_action(&self, _action: &AutoAction) {}
}

/// Sink that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl HostSink for NullSink {}

/// In-memory content source, handy for hosts that already hold the stream
///
/// The reported size is computed once when the stream is set.
#[derive(Debug, Default)]
pub struct StaticContent {
    state: RwLock<Option<(String, u32)>>,
    title: Option<String>,
}

impl StaticContent {
    pub fn new(content: impl Into<String>) -> Self {
        let source = StaticContent::default();
        source.set(content);
        source
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the stream; the host then signals a content change
    pub fn set(&self, content: impl Into<String>) {
        let content = content.into();
        let size = crate::dom::parse_document(&content).map_or(0, |doc| doc.len());
        if let Ok(mut guard) = self.state.write() {
            *guard = Some((content, size));
        }
    }

    /// Drop the stream, as when the host document goes away
    pub fn clear(&self) {
        if let Ok(mut guard) = self.state.write() {
            *guard = None;
        }
    }
}

impl ContentSource for StaticContent {
    fn total_size(&self) -> Option<u32> {
        self.state.read().ok()?.as_ref().map(|(_, size)| *size)
    }

    fn content(&self) -> Option<String> {
        self.state.read().ok()?.as_ref().map(|(content, _)| content.clone())
    }

    fn window_title(&self) -> Option<String> {
        self.title.clone()
    }
}
