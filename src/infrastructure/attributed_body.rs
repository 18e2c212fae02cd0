//! Text recovery from `message.attributedBody`.
//!
//! Newer Messages versions leave `message.text` NULL and store the body in
//! an `NSAttributedString` typedstream. The string payload follows the
//! `NSString` class marker as `+`, a length, then UTF-8 bytes.

const NSSTRING_MARKER: &[u8] = b"NSString";

/// Bytes after the marker searched for the `+` payload tag.
const PAYLOAD_WINDOW: usize = 20;

/// Extracts the plain text from an `attributedBody` blob.
#[must_use]
pub fn decode_attributed_body(data: &[u8]) -> Option<String> {
    let marker = find_subsequence(data, NSSTRING_MARKER)?;
    let start = marker + NSSTRING_MARKER.len();
    let end = (start + PAYLOAD_WINDOW).min(data.len());

    (start..end)
        .filter(|&i| data[i] == b'+')
        .find_map(|i| read_payload(data, i + 1))
}

/// Reads a length-prefixed string starting at `pos`.
///
/// Lengths below 0x80 are a single byte; 0x81 and 0x82 prefix a 2- or
/// 3-byte little-endian length.
fn read_payload(data: &[u8], pos: usize) -> Option<String> {
    let tag = *data.get(pos)?;
    let (text_start, len) = match tag {
        0x00..=0x7f => (pos + 1, usize::from(tag)),
        0x81 => {
            let b = data.get(pos + 1..pos + 3)?;
            (pos + 3, usize::from(b[0]) | usize::from(b[1]) << 8)
        }
        0x82 => {
            let b = data.get(pos + 1..pos + 4)?;
            (
                pos + 4,
                usize::from(b[0]) | usize::from(b[1]) << 8 | usize::from(b[2]) << 16,
            )
        }
        _ => return None,
    };

    let bytes = data.get(text_start..text_start + len)?;
    let text = std::str::from_utf8(bytes).ok()?.trim();

    (!text.is_empty()).then(|| text.to_string())
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(prefix: &[u8], text: &str) -> Vec<u8> {
        let mut data = b"\x04\x0bstreamtyped\x81\xe8\x03\x84\x01@\x84\x84\x84\x12NSAttributedString\x00\x84\x84\x08NSObject\x00\x85\x92\x84\x84\x84\x08NSString\x01\x94\x84\x01+".to_vec();
        data.extend_from_slice(prefix);
        data.extend_from_slice(text.as_bytes());
        data.extend_from_slice(b"\x86\x84\x02iI\x01");
        data
    }

    #[test]
    fn test_short_body() {
        let data = blob(&[5], "hello");
        assert_eq!(decode_attributed_body(&data), Some("hello".to_string()));
    }

    #[test]
    fn test_two_byte_length() {
        let text = "a".repeat(300);
        let data = blob(&[0x81, 0x2c, 0x01], &text);
        assert_eq!(decode_attributed_body(&data), Some(text));
    }

    #[test]
    fn test_unicode_body() {
        let text = "café ☕";
        let len = u8::try_from(text.len()).unwrap();
        let data = blob(&[len], text);
        assert_eq!(decode_attributed_body(&data), Some(text.to_string()));
    }

    #[test]
    fn test_garbage_returns_none() {
        assert_eq!(decode_attributed_body(b"not a typedstream"), None);
        assert_eq!(decode_attributed_body(b""), None);
        // Truncated payload
        assert_eq!(decode_attributed_body(b"NSString\x01+\x20abc"), None);
    }
}
