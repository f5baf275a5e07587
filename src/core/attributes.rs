//! Attribute Parsing
//!
//! Parses `name="value"` pairs from tag content. The host always quotes
//! values, so anything else is reported as malformed.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char};
use memchr::memchr;
use std::borrow::Cow;

/// A parsed attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Attribute name as written by the host
    pub name: &'a str,
    /// Attribute value (entities decoded)
    pub value: Cow<'a, str>,
}

impl<'a> Attribute<'a> {
    pub fn new(name: &'a str, value: Cow<'a, str>) -> Self {
        Attribute { name, value }
    }
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'.
pub fn parse_attributes(input: &str) -> Result<Vec<Attribute<'_>>, &'static str> {
    let bytes = input.as_bytes();
    let mut attrs = Vec::new();
    let mut pos = 0;

    loop {
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let name_start = pos;
        if !is_name_start_char(bytes[pos]) {
            return Err("attribute name must start with a letter, underscore, or colon");
        }
        while pos < bytes.len() && is_name_char(bytes[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            return Err("attribute value required");
        }
        pos += 1;
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }

        let quote = match bytes.get(pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err("attribute value must be quoted"),
        };
        pos += 1;
        let value_start = pos;
        let Some(len) = memchr(quote, &bytes[value_start..]) else {
            return Err("attribute value has mismatched quotes");
        };
        pos = value_start + len;
        attrs.push(Attribute::new(name, decode_text(&input[value_start..pos])));
        pos += 1; // Skip closing quote
    }

    Ok(attrs)
}

/// Check if byte is whitespace
#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_attributes() {
        let attrs = parse_attributes(" role=\"10\" states=\"16 32\"").unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, "role");
        assert_eq!(attrs[0].value, "10");
        assert_eq!(attrs[1].name, "states");
        assert_eq!(attrs[1].value, "16 32");
    }

    #[test]
    fn test_single_quoted_and_host_names() {
        let attrs = parse_attributes(" IAccessible2::attribute_tag='DIV'").unwrap();
        assert_eq!(attrs[0].name, "IAccessible2::attribute_tag");
        assert_eq!(attrs[0].value, "DIV");
    }

    #[test]
    fn test_entity_in_value() {
        let attrs = parse_attributes(" name=\"&lt;hello&gt;\"").unwrap();
        assert_eq!(attrs[0].value, "<hello>");
    }

    #[test]
    fn test_whitespace_handling() {
        let attrs = parse_attributes("  id  =  \"test\"  ").unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].value, "test");
        assert!(parse_attributes("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(parse_attributes(" id").is_err());
        assert!(parse_attributes(" id=test").is_err());
        assert!(parse_attributes(" id=\"test").is_err());
        assert!(parse_attributes(" =\"x\"").is_err());
    }
}
