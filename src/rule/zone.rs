//! Navigation Zones
//!
//! A zone restricts navigation to the span of a zone result. It is tracked
//! by identity (layer, rule name, rank among that rule's results) and
//! re-resolved after every update, never by node.

use std::fmt;
use std::ops::Range;

use super::result::RuleResult;

#[derive(Debug, Clone)]
pub struct Zone {
    pub layer: String,
    pub rule_name: String,
    /// 1-based rank among the results of the rule
    pub result_index: u32,
    /// `None` once the zone could not be re-resolved
    span: Option<(u32, u32)>,
}

impl Zone {
    pub fn new(result: &RuleResult, result_index: u32) -> Self {
        Zone {
            layer: result.layer().to_string(),
            rule_name: result.name().to_string(),
            result_index,
            span: Some((result.start, result.end)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.span.is_some()
    }

    pub fn start(&self) -> Option<u32> {
        self.span.map(|(start, _)| start)
    }

    pub fn end(&self) -> Option<u32> {
        self.span.map(|(_, end)| end)
    }

    pub fn contains_offset(&self, offset: u32) -> bool {
        self.span
            .is_some_and(|(start, end)| start <= offset && offset < end)
    }

    /// A result belongs to the zone when it starts inside it
    pub fn contains_result(&self, result: &RuleResult) -> bool {
        self.contains_offset(result.start)
    }

    pub fn contains_range(&self, range: &Range<u32>) -> bool {
        self.span
            .is_some_and(|(start, end)| start <= range.start && range.end <= end)
    }

    pub fn is_at_start(&self, offset: u32) -> bool {
        self.start() == Some(offset)
    }

    pub fn is_at_end(&self, offset: u32) -> bool {
        self.end() == Some(offset)
    }

    /// Clamp `range` to the zone, reporting whether it moved
    pub fn restrict(&self, range: &mut Range<u32>) -> bool {
        let Some((start, end)) = self.span else {
            return false;
        };
        let mut clamped = false;
        for bound in [&mut range.start, &mut range.end] {
            if *bound < start {
                *bound = start;
                clamped = true;
            } else if *bound > end {
                *bound = end;
                clamped = true;
            }
        }
        clamped
    }

    /// Re-resolve against the results of the same rule and layer
    ///
    /// Invalidates the zone when the rule no longer has `result_index`
    /// results.
    pub fn update<'r>(&mut self, candidates: impl IntoIterator<Item = &'r RuleResult>) -> bool {
        let position = (self.result_index as usize).saturating_sub(1);
        self.span = candidates
            .into_iter()
            .nth(position)
            .map(|result| (result.start, result.end));
        self.span.is_some()
    }
}

impl PartialEq for Zone {
    fn eq(&self, other: &Self) -> bool {
        self.rule_name == other.rule_name && self.span == other.span
    }
}

impl Eq for Zone {}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some((start, end)) => write!(f, "zone {:?} at ({start}, {end})", self.rule_name),
            None => write!(f, "zone {:?} (invalidated)", self.rule_name),
        }
    }
}
