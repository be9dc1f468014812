//! Global id generation and id-argument classification.
//!
//! Global ids are ULIDs: 26 Crockford-base32 characters, lexicographically
//! ordered by creation time, which makes them both sortable and
//! prefix-searchable. Short ids (`#N`) are allocated per board by the
//! storage layer.

use ulid::Ulid;

/// Length of a full global id.
pub const GLOBAL_ID_LEN: usize = 26;

/// Minimum prefix length accepted for prefix search.
pub const MIN_PREFIX_LEN: usize = 4;

/// Generates a fresh global task/board id.
pub fn new_global_id() -> String {
    Ulid::new().to_string()
}

/// Returns `true` if every character belongs to the Crockford base32
/// alphabet (case-insensitive; I, L, O and U are excluded).
pub fn is_base32(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            let c = c.to_ascii_uppercase();
            c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'L' | 'O' | 'U'))
        })
}

/// How an id argument should be looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdQuery {
    /// Board-scoped short id (`#N` or bare `N`).
    Short(i64),
    /// Full 26-char global id, normalised to uppercase.
    Full(String),
    /// Global-id prefix of at least [`MIN_PREFIX_LEN`] chars, normalised to
    /// uppercase. May match more than one task.
    Prefix(String),
}

/// Classifies a raw id argument.
///
/// Strips a leading `#`; all-digits means a board short id, a 26-char base32
/// string a full global id, and a shorter base32 string of at least 4 chars
/// a prefix search. Anything else is unresolvable (`None`) and the caller
/// reports not-found.
pub fn classify(raw: &str) -> Option<IdQuery> {
    let rest = raw.strip_prefix('#').unwrap_or(raw);
    if rest.is_empty() {
        return None;
    }
    if rest.chars().all(|c| c.is_ascii_digit()) {
        return rest.parse::<i64>().ok().filter(|n| *n > 0).map(IdQuery::Short);
    }
    if !is_base32(rest) {
        return None;
    }
    if rest.len() == GLOBAL_ID_LEN {
        return Some(IdQuery::Full(rest.to_ascii_uppercase()));
    }
    if rest.len() >= MIN_PREFIX_LEN {
        return Some(IdQuery::Prefix(rest.to_ascii_uppercase()));
    }
    None
}
