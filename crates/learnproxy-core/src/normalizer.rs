//! Path normalization: maps concrete URL paths to pattern keys by
//! detecting dynamic segments.
//!
//! The normalizer is pure, deterministic, and infallible: unparseable input
//! is returned unchanged rather than raising an error.

use once_cell::sync::Lazy;
use regex::Regex;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());
static HEX_HASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{16,}$").unwrap());
static BASE64_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+={0,2}$").unwrap());
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)+$").unwrap());

/// Replace dynamic path segments with placeholders, yielding a stable
/// grouping key for an endpoint.
///
/// Detectors run in priority order per segment; the first match wins:
/// UUID → `{id}`, integer → `{id}`, hex hash → `{hash}`, base64-ish token →
/// `{token}`, slug → `{slug}`. Empty segments and the leading/trailing `/`
/// are preserved structurally.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return path.to_string();
    }

    let leading_slash = path.starts_with('/');
    let trailing_slash = path.len() > 1 && path.ends_with('/');

    let segments: Vec<&str> = path.split('/').collect();
    let normalized: Vec<String> = segments
        .iter()
        .map(|segment| normalize_segment(segment))
        .collect();

    let mut joined = normalized.join("/");
    if leading_slash && !joined.starts_with('/') {
        joined = format!("/{}", joined);
    }
    if trailing_slash && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}

fn normalize_segment(segment: &str) -> String {
    if segment.is_empty() {
        return String::new();
    }
    if is_uuid(segment) {
        return "{id}".to_string();
    }
    if INTEGER_RE.is_match(segment) {
        return "{id}".to_string();
    }
    if HEX_HASH_RE.is_match(segment) {
        return "{hash}".to_string();
    }
    if is_base64_token(segment) {
        return "{token}".to_string();
    }
    if is_slug(segment) {
        return "{slug}".to_string();
    }
    segment.to_string()
}

fn is_uuid(segment: &str) -> bool {
    UUID_RE.is_match(segment)
}

fn is_base64_token(segment: &str) -> bool {
    if segment.len() < 16 || !BASE64_RE.is_match(segment) {
        return false;
    }
    let has_digit = segment.chars().any(|c| c.is_ascii_digit());
    let has_letter = segment.chars().any(|c| c.is_ascii_alphabetic());
    has_digit && has_letter
}

fn is_slug(segment: &str) -> bool {
    if segment.len() < 4 || !segment.contains('-') {
        return false;
    }
    if segment.starts_with('-') || segment.ends_with('-') {
        return false;
    }
    SLUG_RE.is_match(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn integer_segment_becomes_id() {
        assert_eq!(normalize("/users/42"), "/users/{id}");
        assert_eq!(normalize("/users/-7"), "/users/{id}");
    }

    #[test]
    fn uuid_segment_becomes_id() {
        assert_eq!(
            normalize("/orders/550e8400-e29b-41d4-a716-446655440000"),
            "/orders/{id}"
        );
        assert_eq!(
            normalize("/orders/550E8400-E29B-41D4-A716-446655440000"),
            "/orders/{id}"
        );
    }

    #[test]
    fn hex_hash_becomes_hash() {
        assert_eq!(
            normalize("/commits/abcdef0123456789abcdef"),
            "/commits/{hash}"
        );
    }

    #[test]
    fn base64_token_becomes_token() {
        assert_eq!(normalize("/files/aZ9bK2mN8pQ1rS3t"), "/files/{token}");
    }

    #[test]
    fn slug_becomes_slug() {
        assert_eq!(normalize("/posts/my-first-post"), "/posts/{slug}");
    }

    #[test]
    fn short_hyphenated_word_is_not_a_slug() {
        // length >= 4 required; "ab-c" is 4 chars but check still applies elsewhere
        assert_eq!(normalize("/a/ab"), "/a/ab");
    }

    #[test]
    fn priority_uuid_before_integer_and_slug() {
        // a UUID also matches none of the others first, but ensure ordering
        // doesn't misfire on plain words.
        assert_eq!(normalize("/users/profile"), "/users/profile");
    }

    #[test]
    fn preserves_structure() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/users/42/"), "/users/{id}/");
        assert_eq!(normalize("//double-slash"), "//{slug}");
    }

    #[test]
    fn determinism() {
        let p = "/users/42/orders/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize(p), normalize(p));
    }

    #[test]
    fn stability_idempotent() {
        let paths = [
            "/users/42",
            "/orders/550e8400-e29b-41d4-a716-446655440000",
            "/posts/my-first-post",
            "/files/aZ9bK2mN8pQ1rS3t",
            "/plain/path",
        ];
        for p in paths {
            let once = normalize(p);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize not stable for {p}");
        }
    }

    #[test]
    fn never_panics_on_arbitrary_input() {
        let inputs = ["", "/", "///", "%%%", "/\u{0}/", "a".repeat(10_000).as_str()];
        for input in inputs {
            let _ = normalize(input);
        }
    }

    proptest! {
        /// Property 1: normalize is a pure function of its input.
        #[test]
        fn prop_determinism(p in ".*") {
            prop_assert_eq!(normalize(&p), normalize(&p));
        }

        /// Property 2: normalize is idempotent once applied.
        #[test]
        fn prop_stability(p in ".*") {
            let once = normalize(&p);
            let twice = normalize(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
