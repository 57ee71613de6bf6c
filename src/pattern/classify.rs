use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("UUID_RE: hardcoded regex is valid")
});

static INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("INT_RE: hardcoded regex is valid"));

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("DATE_RE: hardcoded regex is valid")
});

static HASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[0-9a-f]{32}|[0-9a-f]{40}|[0-9a-f]{64})$")
        .expect("HASH_RE: hardcoded regex is valid")
});

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)+$").expect("SLUG_RE: hardcoded regex is valid")
});

/// Classification of one URL path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Uuid,
    Int,
    Date,
    Hash,
    Slug,
    /// Kept verbatim in the pattern, never parameterized
    Literal,
    /// Catch-all a position is promoted to after mixed types were observed
    #[serde(rename = "string")]
    Generic,
}

impl SegmentType {
    /// True for every type that parameterizes its position
    pub fn is_dynamic(self) -> bool {
        !matches!(self, Self::Literal)
    }

    /// Placeholder used in pattern paths, e.g. `<int>`
    pub fn marker(self) -> &'static str {
        match self {
            Self::Uuid => "<uuid>",
            Self::Int => "<int>",
            Self::Date => "<date>",
            Self::Hash => "<hash>",
            Self::Slug => "<slug>",
            Self::Generic => "<string>",
            Self::Literal => "",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uuid => "uuid",
            Self::Int => "int",
            Self::Date => "date",
            Self::Hash => "hash",
            Self::Slug => "slug",
            Self::Literal => "literal",
            Self::Generic => "string",
        };
        f.write_str(name)
    }
}

/// Classifies a path segment
///
/// Checks run in a fixed priority: UUID, all digits, ISO date, 32/40/64-char
/// hex hash, lowercase hyphenated slug. Anything else (including the empty
/// segment) is a literal. Digits come before hashes, so a 32-digit number is
/// an `Int`.
///
/// # Examples
///
/// ```
/// use reconmap::pattern::{classify_segment, SegmentType};
///
/// assert_eq!(classify_segment("550e8400-e29b-41d4-a716-446655440000"), SegmentType::Uuid);
/// assert_eq!(classify_segment("12345"), SegmentType::Int);
/// assert_eq!(classify_segment("2025-01-15"), SegmentType::Date);
/// assert_eq!(classify_segment("my-first-post"), SegmentType::Slug);
/// assert_eq!(classify_segment("users"), SegmentType::Literal);
/// ```
pub fn classify_segment(segment: &str) -> SegmentType {
    if UUID_RE.is_match(segment) {
        SegmentType::Uuid
    } else if INT_RE.is_match(segment) {
        SegmentType::Int
    } else if DATE_RE.is_match(segment) {
        SegmentType::Date
    } else if HASH_RE.is_match(segment) {
        SegmentType::Hash
    } else if SLUG_RE.is_match(segment) {
        SegmentType::Slug
    } else {
        SegmentType::Literal
    }
}
