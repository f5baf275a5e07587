//! Entity Decoding
//!
//! Handles decoding of the entities the host may emit in the content stream:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - A few common HTML named entities
//! - Numeric character references: &#123; &#x7B;
//!
//! Text without a `&` is returned borrowed.

use memchr::memchr;
use std::borrow::Cow;

/// Replacement for code points that do not map to a `char`
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Decode entity references in a text run or attribute value
#[inline]
pub fn decode_text(input: &str) -> Cow<'_, str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

fn decode_entities(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(amp_pos) = memchr(b'&', &bytes[pos..]) else {
            result.push_str(&input[pos..]);
            break;
        };
        result.push_str(&input[pos..pos + amp_pos]);
        pos += amp_pos;

        match memchr(b';', &bytes[pos..]) {
            Some(semi_offset) => match decode_entity(&input[pos + 1..pos + semi_offset]) {
                Some(c) => {
                    result.push(c);
                    pos += semi_offset + 1;
                }
                None => {
                    // Unknown entity, keep as-is
                    result.push('&');
                    pos += 1;
                }
            },
            None => {
                result.push('&');
                pos += 1;
            }
        }
    }

    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        return decode_numeric_entity(numeric);
    }

    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        "copy" => Some('\u{00A9}'),
        "reg" => Some('\u{00AE}'),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "hellip" => Some('\u{2026}'),
        _ => None,
    }
}

/// Decode a numeric character reference (after the '#')
fn decode_numeric_entity(entity: &str) -> Option<char> {
    let codepoint = match entity.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => entity.parse::<u32>().ok()?,
    };
    char::from_u32(codepoint)
}

/// Decode the `value` of a `<unich>` element into a character
///
/// Anything that is not a valid Unicode scalar value, including text that
/// does not parse as an integer, becomes U+FFFD.
pub fn decode_code_point(value: &str) -> char {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(REPLACEMENT_CHAR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entities() {
        let result = decode_text("Hello, World!");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_basic_entities() {
        let result = decode_text("&lt;hello&gt; &amp; &quot;world&quot;");
        assert_eq!(result, "<hello> & \"world\"");
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(decode_text("&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(decode_text("&#x1F600;"), "😀");
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(decode_text("&unknown; & more"), "&unknown; & more");
        assert_eq!(decode_text("&#xD800;"), "&#xD800;");
    }

    #[test]
    fn test_decode_code_point() {
        assert_eq!(decode_code_point("233"), 'é');
        assert_eq!(decode_code_point("55296"), REPLACEMENT_CHAR);
        assert_eq!(decode_code_point("abc"), REPLACEMENT_CHAR);
    }
}
