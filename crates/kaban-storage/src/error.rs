//! Storage error types.

use kaban_core::ErrorKind;
use kaban_core::validation::ValidationError;

/// Errors that can occur during storage and service operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g., "task", "column", "board").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// An id prefix matched more than one task.
    #[error("ambiguous id prefix {prefix:?}: {matches} tasks match")]
    AmbiguousId {
        /// The prefix that was searched.
        prefix: String,
        /// How many tasks matched.
        matches: usize,
    },

    /// A validation constraint was violated before any mutation.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// Optimistic-concurrency token did not match the stored version.
    #[error("version conflict on task {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    /// The move is refused because open blockers exist.
    #[error("task {task_ref} is blocked by {}", blockers.join(", "))]
    Blocked {
        /// Short ref (`#N`) of the task being moved.
        task_ref: String,
        /// Short refs of the open blockers.
        blockers: Vec<String>,
    },

    /// The edit would introduce a dependency cycle.
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// The full cycle as short refs, first element repeated last.
        path: Vec<String>,
    },

    /// The link already exists.
    #[error("duplicate link: {from} {link_type} {to}")]
    DuplicateLink {
        from: String,
        to: String,
        link_type: String,
    },

    /// The operation was cancelled via its [`CancelToken`](kaban_core::CancelToken).
    #[error("operation cancelled")]
    Cancelled,

    /// Failed to establish or configure a database connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A schema migration failed.
    #[error("migration {name} failed: {reason}")]
    Migration {
        /// Name of the migration that failed.
        name: String,
        /// Underlying error description.
        reason: String,
    },

    /// The database stayed busy through every retry attempt.
    #[error("database busy after {attempts} attempts")]
    BusyAfterRetry { attempts: u32 },

    /// A raw SQLite query error.
    #[error("query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error (e.g. creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    // -- Constructors --------------------------------------------------------

    /// Creates a [`StorageError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a [`StorageError::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    // -- Taxonomy ------------------------------------------------------------

    /// Maps this error into the stable taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AmbiguousId { .. } => ErrorKind::AmbiguousId,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::VersionConflict { .. } => ErrorKind::Conflict,
            Self::Blocked { .. } => ErrorKind::Blocked,
            Self::Cycle { .. } => ErrorKind::Cycle,
            Self::DuplicateLink { .. } => ErrorKind::Duplicate,
            Self::Cancelled | Self::Serialization(_) => ErrorKind::General,
            Self::Connection(_)
            | Self::Migration { .. }
            | Self::BusyAfterRetry { .. }
            | Self::Query(_)
            | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// The numeric exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    // -- Predicates ----------------------------------------------------------

    /// Returns `true` if this is a [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ValidationError> for StorageError {
    fn from(e: ValidationError) -> Self {
        Self::Validation {
            message: e.to_string(),
        }
    }
}
