//! Stream Event Types
//!
//! Event types for pull-parser style processing of the content stream.

use crate::core::attributes::Attribute;
use std::borrow::Cow;

/// Content stream parsing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent<'a> {
    /// Start of an element: <name attrs...>
    Start(StartTag<'a>),
    /// End of an element: </name>
    End(&'a str),
    /// Empty element: <name attrs.../>
    Empty(StartTag<'a>),
    /// Character data between tags (entities decoded)
    Text(Cow<'a, str>),
}

/// Start tag event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag<'a> {
    /// Element name
    pub name: &'a str,
    /// Element attributes in stream order
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> StartTag<'a> {
    pub fn new(name: &'a str, attributes: Vec<Attribute<'a>>) -> Self {
        StartTag { name, attributes }
    }

    /// Get an attribute value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_ref())
    }

    /// First non-empty value among several alternative attribute names
    pub fn get_first(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .find(|value| !value.is_empty())
    }
}

impl<'a> StreamEvent<'a> {
    /// Check if this is a text event
    pub fn is_text(&self) -> bool {
        matches!(self, StreamEvent::Text(_))
    }

    /// Get as start tag if applicable
    pub fn as_start(&self) -> Option<&StartTag<'a>> {
        match self {
            StreamEvent::Start(t) | StreamEvent::Empty(t) => Some(t),
            _ => None,
        }
    }
}
