//! Taskell-compatible Markdown codec for the kaban board engine.
//!
//! The codec works on a storage-independent document model: the serializer
//! turns a [`BoardDoc`] into a deterministic Markdown document, the parser
//! turns the document back into a [`BoardDoc`] plus a list of non-fatal
//! [`ParseError`]s. For boards within the documented restrictions (no
//! newlines in titles, no tab or four-space-prefixed description lines),
//! `parse(serialize(doc))` reproduces the document exactly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

mod parse;
mod serialize;

pub use parse::parse;
pub use serialize::{SerializeOptions, serialize};

/// A whole board as a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDoc {
    pub name: String,
    pub columns: Vec<ColumnDoc>,
}

/// One column and its tasks, in position order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDoc {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,

    #[serde(default)]
    pub terminal: bool,

    pub tasks: Vec<TaskDoc>,
}

/// One task as represented in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDoc {
    pub title: String,

    /// Global id carried in a `<!-- id:... -->` trailer, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Whether the `✓` marker was present (task has a `completed_at`).
    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,

    /// Possibly multi-line; lines joined with `\n`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl TaskDoc {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A non-fatal problem found while parsing, with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Doubles backslashes and escapes a literal `<!--` so it cannot be read as
/// a metadata comment.
pub(crate) fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace("<!--", "\\<!--")
}

/// Reverses [`escape_text`]: a backslash makes the following character
/// literal.
pub(crate) fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escape_round_trip() {
        for text in [
            "plain",
            "back\\slash",
            "a <!-- sneaky --> comment",
            "\\<!--",
            "trailing\\",
        ] {
            assert_eq!(unescape_text(&escape_text(text)), text);
        }
    }

    #[test]
    fn escape_hides_comment_opener() {
        let escaped = escape_text("x <!-- y");
        assert!(!escaped.contains("<!--") || escaped.contains("\\<!--"));
    }
}
