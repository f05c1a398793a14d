//! Error types for backport operations

use thiserror::Error;

use crate::git::GitError;

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while replicating commits
///
/// `Cancelled` and `UnsafeWorkspace` end the whole run. Every other variant raised while an item
/// (a branch or a creation task) is being processed is recorded as that item's failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workspace is not safe to modify: {reason}")]
    UnsafeWorkspace { reason: String },

    #[error("Invalid branch pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Branch '{0}' does not exist locally or on the remote")]
    BranchNotFound(String),

    #[error("Replication aborted by user at commit {commit}")]
    Aborted { commit: String },

    #[error("Could not continue applying {commit}: {message}")]
    ContinueFailed { commit: String, message: String },

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must end the run instead of failing a single item
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::UnsafeWorkspace { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Cancelled.is_fatal());
        assert!(
            Error::UnsafeWorkspace {
                reason: "dirty".to_string()
            }
            .is_fatal()
        );
        assert!(
            !Error::Aborted {
                commit: "abc123".to_string()
            }
            .is_fatal()
        );
        assert!(!Error::BranchNotFound("release-1".to_string()).is_fatal());
    }

    #[test]
    fn test_invalid_pattern_message_names_pattern() {
        let source = regex::Regex::new("release-(").unwrap_err();
        let err = Error::InvalidPattern {
            pattern: "release-(".to_string(),
            source,
        };

        let msg = err.to_string();
        assert!(msg.contains("release-("));
    }
}
