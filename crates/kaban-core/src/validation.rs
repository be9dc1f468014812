//! Input validators shared by every service.
//!
//! Validation happens before any mutation, so a failed check never leaves a
//! partial write behind.

use crate::error::ErrorKind;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 32;

/// Maximum length of an agent (actor) name.
pub const MAX_AGENT_NAME_LEN: usize = 64;

/// Error type for validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    TitleRequired,

    #[error("title must be {MAX_TITLE_LEN} characters or less (got {0})")]
    TitleTooLong(usize),

    #[error("title must not have leading or trailing whitespace")]
    TitleUntrimmed,

    #[error("description must be {MAX_DESCRIPTION_LEN} characters or less (got {0})")]
    DescriptionTooLong(usize),

    #[error("invalid column id: {0:?} (expected a slug like 'in_progress')")]
    InvalidColumnId(String),

    #[error("invalid agent name: {0:?} (alphanumeric, '-' and '_' only, max {MAX_AGENT_NAME_LEN})")]
    InvalidAgentName(String),

    #[error("invalid label: {0:?} (non-empty, max {MAX_LABEL_LEN} characters)")]
    InvalidLabel(String),
}

impl ValidationError {
    /// All validation failures map to the same taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Result alias for validators.
pub type Result<T = ()> = std::result::Result<T, ValidationError>;

/// Validates a task title: non-empty, trimmed, at most [`MAX_TITLE_LEN`]
/// characters.
pub fn validate_title(title: &str) -> Result {
    if title.is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    if title.trim() != title {
        return Err(ValidationError::TitleUntrimmed);
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong(len));
    }
    Ok(())
}

/// Validates an optional description.
pub fn validate_description(description: &str) -> Result {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong(len));
    }
    Ok(())
}

/// Validates a column id slug: lowercase alphanumeric start, then lowercase
/// alphanumerics, `-` and `_`.
pub fn validate_column_id(id: &str) -> Result {
    let mut chars = id.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(ValidationError::InvalidColumnId(id.to_string()));
    }
    Ok(())
}

/// Validates an agent name: `^[A-Za-z0-9_-]{1,64}$`.
pub fn validate_agent_name(name: &str) -> Result {
    let len = name.chars().count();
    if len == 0 || len > MAX_AGENT_NAME_LEN {
        return Err(ValidationError::InvalidAgentName(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidAgentName(name.to_string()));
    }
    Ok(())
}

/// Validates a label set: each label non-empty and at most
/// [`MAX_LABEL_LEN`] characters.
pub fn validate_labels<S: AsRef<str>>(labels: &[S]) -> Result {
    for label in labels {
        let label = label.as_ref();
        if label.is_empty() || label.chars().count() > MAX_LABEL_LEN {
            return Err(ValidationError::InvalidLabel(label.to_string()));
        }
    }
    Ok(())
}
