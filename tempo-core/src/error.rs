//! Error types for the Tempo system.

/// Result type alias for Tempo operations.
pub type Result<T> = std::result::Result<T, TempoError>;

/// Main error type for the Tempo system.
#[derive(Debug, thiserror::Error)]
pub enum TempoError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// A Git subprocess exited non-zero or could not be spawned. The message
    /// carries the full command string so the caller can see exactly what
    /// failed; these are never silently defaulted.
    #[error("git command failed: {command}")]
    GitCommandFailed { command: String },

    /// Caller contract violations (malformed task submissions etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Task machinery errors (join failures, poisoned workers)
    #[error("Task error: {0}")]
    Task(String),

    /// Benchmark harness errors
    #[error("Benchmark error: {0}")]
    Benchmark(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapped anyhow errors for compatibility
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TempoError {
    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new Git command error
    pub fn git_command(command: impl Into<String>) -> Self {
        Self::GitCommandFailed {
            command: command.into(),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new task error
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }

    /// Create a new benchmark error
    pub fn benchmark(msg: impl Into<String>) -> Self {
        Self::Benchmark(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a Git command error
    pub fn is_git_command(&self) -> bool {
        matches!(self, Self::GitCommandFailed { .. })
    }

    /// Check if this is an invalid input error
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
