//! Filesystem-safe names for conversation folders.

/// Characters that are unsafe in a path segment on macOS, Linux or Windows.
const FORBIDDEN_CHARS: &[char] = &[':', '/', '\\', '<', '>', '"', '|', '?', '*'];

/// Longest folder name produced, in characters.
pub const MAX_NAME_CHARS: usize = 100;

/// Turns an arbitrary display string into a safe path segment.
///
/// Never returns an empty string.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    let truncated: String = trimmed.chars().take(MAX_NAME_CHARS).collect();

    if truncated.is_empty() {
        "Unknown".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_forbidden_characters() {
        assert_eq!(sanitize("Alice (+1:555/123)"), "Alice (+1_555_123)");
        assert_eq!(sanitize(r#"a\b<c>d"e|f?g*h"#), "a_b_c_d_e_f_g_h");
    }

    #[test]
    fn test_strips_whitespace_and_dots() {
        assert_eq!(sanitize("  ..Bob.. "), "Bob");
        assert_eq!(sanitize("\tcarol\n"), "carol");
    }

    #[test]
    fn test_empty_becomes_unknown() {
        assert_eq!(sanitize(""), "Unknown");
        assert_eq!(sanitize(" . . "), "Unknown");
    }

    #[test]
    fn test_truncates_by_characters() {
        let long = "é".repeat(150);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_output_invariants_over_samples() {
        let samples = [
            "",
            "???",
            "////",
            "   ",
            "...",
            "+15551234567",
            "me@example.com",
            "Family 👨‍👩‍👧",
            "a:b:c:d:e:f:g:h:i:j:k:l:m:n:o:p:q:r:s:t:u:v:w:x:y:z:a:b:c:d:e:f:g:h:i:j:k:l:m:n:o:p:q:r:s:t:u:v:w:x:y:z",
        ];

        for sample in samples {
            let out = sanitize(sample);
            assert!(!out.is_empty(), "{sample:?}");
            assert!(out.chars().count() <= MAX_NAME_CHARS, "{sample:?}");
            assert!(!out.contains(FORBIDDEN_CHARS), "{sample:?}");
        }
    }
}
