//! Rule Types and Actions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a rule, serialized under its wire name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    #[serde(rename = "marker")]
    Marker,
    #[serde(rename = "zone")]
    Zone,
    #[serde(rename = "pageType")]
    PageType,
    #[serde(rename = "parent")]
    Parent,
    #[serde(rename = "pageTitle1")]
    PageTitle1,
    #[serde(rename = "pageTitle2")]
    PageTitle2,
}

impl RuleType {
    pub const ALL: [RuleType; 6] = [
        RuleType::Marker,
        RuleType::Zone,
        RuleType::PageType,
        RuleType::Parent,
        RuleType::PageTitle1,
        RuleType::PageTitle2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::Marker => "marker",
            RuleType::Zone => "zone",
            RuleType::PageType => "pageType",
            RuleType::Parent => "parent",
            RuleType::PageTitle1 => "pageTitle1",
            RuleType::PageTitle2 => "pageTitle2",
        }
    }

    pub fn from_name(name: &str) -> Option<RuleType> {
        RuleType::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Page title rules are evaluated before all others
    #[inline]
    pub fn is_page_title(self) -> bool {
        matches!(self, RuleType::PageTitle1 | RuleType::PageTitle2)
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action ids every host understands
pub const BUILTIN_ACTIONS: [&str; 5] = ["moveto", "sayall", "speak", "activate", "mouseMove"];

/// Action that moves the caret to a result
pub const MOVETO: &str = "moveto";

/// Layer holding the user's own rules
pub const USER_LAYER: &str = "user";

/// Direction of an incremental query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Next,
    Previous,
    /// Entries enclosing the offset
    Up,
}
