//! Pre-mutation workspace checks

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::WorkspaceSession;

/// Marker files left behind by an interrupted operation, relative to the git dir
const IN_PROGRESS_MARKERS: &[(&str, &str)] = &[
    ("CHERRY_PICK_HEAD", "cherry-pick"),
    ("MERGE_HEAD", "merge"),
    ("REVERT_HEAD", "revert"),
    ("rebase-merge", "rebase"),
    ("rebase-apply", "rebase"),
];

/// Why the workspace cannot be modified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    UncommittedChanges,
    OperationInProgress(&'static str),
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UncommittedChanges => write!(f, "working tree has uncommitted changes"),
            Self::OperationInProgress(op) => write!(f, "a {} is in progress", op),
        }
    }
}

/// Probe the workspace without modifying it
pub fn inspect(session: &WorkspaceSession<'_>) -> Result<Option<Violation>> {
    let git = session.git();

    let git_dir = git.git_dir()?;
    for (marker, op) in IN_PROGRESS_MARKERS {
        if git_dir.join(marker).exists() {
            debug!(%marker, "safety::inspect: found in-progress marker");
            return Ok(Some(Violation::OperationInProgress(*op)));
        }
    }

    if !git.is_clean()? {
        return Ok(Some(Violation::UncommittedChanges));
    }

    Ok(None)
}

/// Whether the workspace is clean and not mid-operation
pub fn check_safe(session: &WorkspaceSession<'_>) -> Result<bool> {
    Ok(inspect(session)?.is_none())
}

/// Fail with [`Error::UnsafeWorkspace`] unless the workspace can be modified
pub fn ensure_safe(session: &WorkspaceSession<'_>) -> Result<()> {
    match inspect(session)? {
        None => Ok(()),
        Some(violation) => {
            warn!(%violation, "Workspace failed safety check");
            Err(Error::UnsafeWorkspace {
                reason: format!("{}; commit, stash or finish it first", violation),
            })
        }
    }
}
