//! Version-control port
//!
//! The replication engine never shells out directly. Everything it needs from the underlying
//! tool goes through the [`Git`] trait so that workflows can be driven against a scripted
//! repository in tests and against [`GitCli`] in production.

mod cli;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub use cli::GitCli;

/// Errors from invoking the underlying version-control tool
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Unexpected output from `{command}`: {output}")]
    Parse { command: String, output: String },
}

impl GitError {
    /// Text the tool printed when it failed, used to classify apply failures
    pub fn message(&self) -> String {
        match self {
            Self::Spawn { source, .. } => source.to_string(),
            Self::Command { stderr, .. } => stderr.clone(),
            Self::Parse { output, .. } => output.clone(),
        }
    }
}

/// History filters for message-based audits
///
/// Patterns are ORed, authors are ORed, and the three dimensions are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub patterns: Vec<String>,
    pub authors: Vec<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`
    pub since: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    pub until: Option<String>,
}

/// One commit returned by a history search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub subject: String,
}

/// Black-box operations against a single working tree
///
/// All methods block until the underlying subprocess exits. Implementations must not keep any
/// notion of "current branch" beyond what the repository itself reports.
pub trait Git {
    /// Directory holding the repository metadata (`.git`)
    fn git_dir(&self) -> Result<PathBuf, GitError>;

    /// Whether the working tree has no uncommitted changes to tracked files
    fn is_clean(&self) -> Result<bool, GitError>;

    /// Name of the checked out branch
    fn current_branch(&self) -> Result<String, GitError>;

    /// Identifier of the commit at HEAD
    fn head(&self) -> Result<String, GitError>;

    /// Raw `git branch -a` listing, one entry per line
    fn list_branches(&self) -> Result<Vec<String>, GitError>;

    fn local_branch_exists(&self, branch: &str) -> Result<bool, GitError>;

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool, GitError>;

    /// Upstream tracking ref of `branch`, if one is configured
    fn upstream(&self, branch: &str) -> Result<Option<String>, GitError>;

    fn checkout(&self, branch: &str) -> Result<(), GitError>;

    /// Create a local branch tracking `remote/branch` and check it out
    fn checkout_tracking(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Create `branch` from `base` and check it out
    fn create_branch(&self, branch: &str, base: &str) -> Result<(), GitError>;

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<(), GitError>;

    /// Commits `branch` has that `upstream` lacks, and the reverse
    fn ahead_behind(&self, branch: &str, upstream: &str) -> Result<(usize, usize), GitError>;

    fn cherry_pick(&self, commit: &str) -> Result<(), GitError>;

    fn cherry_pick_continue(&self) -> Result<(), GitError>;

    fn cherry_pick_skip(&self) -> Result<(), GitError>;

    fn cherry_pick_abort(&self) -> Result<(), GitError>;

    /// Content-only fingerprint of a commit's diff, or `None` when it cannot be derived
    fn patch_id(&self, commit: &str) -> Result<Option<String>, GitError>;

    /// The most recent `depth` commits reachable from `branch`, newest first
    fn recent_commits(&self, branch: &str, depth: usize) -> Result<Vec<String>, GitError>;

    fn search_log(&self, branch: &str, query: &LogQuery) -> Result<Vec<LogEntry>, GitError>;

    /// `<short-hash> <subject>` label for prompts and reports
    fn commit_summary(&self, commit: &str) -> Result<String, GitError>;
}
