//! Canonical grouping keys
//!
//! Two records that produce the same [`CanonicalKey`] are treated as the same
//! work. Signals, from most to least trustworthy:
//! 1. external identifier (DOI)
//! 2. canonical link (URL)
//! 3. normalized title, plus publication year when known
//!
//! `GroupingMode::Auto` walks that list and takes the first hit.

use crate::models::Record;
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Normalized titles shorter than this are too weak to group on
pub const MIN_TITLE_KEY_LEN: usize = 8;

const IDENTIFIER_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9 ]").expect("valid regex"));
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").expect("valid regex"));

/// Which signal produced a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    Identifier,
    Link,
    Title,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Identifier => write!(f, "doi"),
            KeyKind::Link => write!(f, "url"),
            KeyKind::Title => write!(f, "title"),
        }
    }
}

/// Grouping signature for one record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey {
    pub kind: KeyKind,
    pub value: String,
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}='{}'", self.kind, self.value)
    }
}

/// Grouping heuristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    /// DOI, then URL, then title/year
    #[default]
    Auto,
    /// DOI only
    #[value(name = "doi", alias = "identifier")]
    #[serde(rename = "doi", alias = "identifier")]
    Identifier,
    /// URL only
    #[value(name = "url", alias = "link")]
    #[serde(rename = "url", alias = "link")]
    Link,
    /// Normalized title and year only
    Title,
}

impl GroupingMode {
    /// Strategies tried in order for this mode
    pub fn strategies(self) -> &'static [KeyKind] {
        match self {
            GroupingMode::Auto => &[KeyKind::Identifier, KeyKind::Link, KeyKind::Title],
            GroupingMode::Identifier => &[KeyKind::Identifier],
            GroupingMode::Link => &[KeyKind::Link],
            GroupingMode::Title => &[KeyKind::Title],
        }
    }
}

impl std::str::FromStr for GroupingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <GroupingMode as ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| format!("Unknown group mode: {} (expected auto, doi, url or title)", s))
    }
}

impl std::fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupingMode::Auto => write!(f, "auto"),
            GroupingMode::Identifier => write!(f, "doi"),
            GroupingMode::Link => write!(f, "url"),
            GroupingMode::Title => write!(f, "title"),
        }
    }
}

/// Grouping key for `record` under `mode`, or `None` if it has no usable signal
///
/// Notes and attachments never get a key.
pub fn canonical_key(record: &Record, mode: GroupingMode) -> Option<CanonicalKey> {
    if record.item_type.is_child_type() {
        return None;
    }

    mode.strategies().iter().find_map(|&kind| {
        let value = match kind {
            KeyKind::Identifier => record.identifier().and_then(normalize_identifier),
            KeyKind::Link => record.url.as_deref().and_then(normalize_link),
            KeyKind::Title => title_key(record),
        }?;
        Some(CanonicalKey { kind, value })
    })
}

/// Lower-case, strip resolver prefixes
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let mut value = raw.trim().to_lowercase();
    for prefix in IDENTIFIER_PREFIXES {
        if let Some(rest) = value.strip_prefix(prefix) {
            value = rest.trim().to_string();
        }
    }
    (!value.is_empty()).then_some(value)
}

/// Lower-case, drop fragment and trailing slashes
pub fn normalize_link(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let without_fragment = lowered.split('#').next().unwrap_or_default();
    let value = without_fragment.trim_end_matches('/');
    (!value.is_empty()).then(|| value.to_string())
}

/// Lower-case, collapse whitespace, keep `[a-z0-9 ]`, trim
///
/// Whitespace is collapsed before punctuation is dropped, so `"a - b"` keeps
/// two spaces and stays distinct from `"a: b"`.
pub fn normalize_title(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let spaced = WHITESPACE.replace_all(&lowered, " ");
    NON_ALNUM.replace_all(&spaced, "").trim().to_string()
}

/// Year field, else the first 4-digit run of the date string
pub fn publication_year(record: &Record) -> Option<String> {
    record.year().or_else(|| {
        record
            .date
            .as_deref()
            .and_then(|d| YEAR.find(d))
            .map(|m| m.as_str().to_string())
    })
}

fn title_key(record: &Record) -> Option<String> {
    let normalized = normalize_title(record.title.as_deref()?);
    if normalized.len() < MIN_TITLE_KEY_LEN {
        return None;
    }
    Some(match publication_year(record) {
        Some(year) => format!("{}|{}", normalized, year),
        None => normalized,
    })
}
