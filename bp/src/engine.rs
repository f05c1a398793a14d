//! Ordered application of a commit list onto the checked out branch

use tracing::{debug, info};

use crate::error::Result;
use crate::prompt::Prompter;
use crate::recovery::{CommitApplier, NoteKind};
use crate::session::WorkspaceSession;

/// Aggregate result of replicating a commit list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replication {
    /// At least one commit produced new history
    pub has_changes: bool,
    /// Most notable non-fatal event, if any
    pub note: Option<String>,
    /// Commits that produced new history, in order
    pub applied: Vec<String>,
}

/// Apply `commits` in the given order onto the checked out `branch`
///
/// Each commit is driven to a handled state before the next one starts. An error from any commit
/// (an abort choice, a failed continue, a cancelled prompt) stops the remaining commits.
pub fn apply(
    commits: &[String],
    branch: &str,
    session: &WorkspaceSession<'_>,
    prompter: &dyn Prompter,
) -> Result<Replication> {
    debug!(%branch, count = commits.len(), "engine::apply: called");
    let applier = CommitApplier::new(session, prompter, branch);

    let mut replication = Replication::default();
    let mut notable: Option<(NoteKind, String)> = None;

    for commit in commits {
        let outcome = applier.apply(commit)?;
        debug_assert!(outcome.handled);

        if outcome.has_changes {
            replication.has_changes = true;
            replication.applied.push(commit.clone());
        }
        if let Some((kind, text)) = outcome.note {
            // Later notes of equal rank replace earlier ones
            if notable.as_ref().is_none_or(|(current, _)| kind >= *current) {
                notable = Some((kind, text));
            }
        }
    }

    replication.note = notable.map(|(_, text)| text);
    info!(
        %branch,
        applied = replication.applied.len(),
        total = commits.len(),
        "Replication finished"
    );
    Ok(replication)
}
