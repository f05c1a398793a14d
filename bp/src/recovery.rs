//! Per-commit apply with interactive failure recovery
//!
//! ```text
//! Attempting ──ok, head moved──────────────▶ Success
//!     │      ──ok, head unchanged──────────▶ NoOp
//!     │      ──"now empty"─────────────────▶ Skipped (no prompt)
//!     └─────── other failure ──▶ NeedsDecision(Conflict | Other)
//!
//! NeedsDecision ──retry──▶ abort in-progress apply ──▶ Attempting
//!               ──skip───▶ Skipped
//!               ──abort──▶ Aborted (error unwinds the whole chain)
//!               ──continue (conflicts only)──▶ Continuing
//!
//! Continuing ──ok──────────────▶ Resolved
//!            ──"empty"─────────▶ Skipped (no prompt)
//!            ──unmerged files──▶ NeedsDecision(Conflict) with a hint
//!            ──other failure───▶ error
//! ```

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::prompt::{DecisionRequest, FailureKind, Prompter, RecoveryOutcome};
use crate::session::WorkspaceSession;

const CONFLICT_OPTIONS: &[RecoveryOutcome] = &[
    RecoveryOutcome::Continue,
    RecoveryOutcome::Retry,
    RecoveryOutcome::Skip,
    RecoveryOutcome::Abort,
];

const OTHER_OPTIONS: &[RecoveryOutcome] = &[RecoveryOutcome::Retry, RecoveryOutcome::Skip, RecoveryOutcome::Abort];

const CONFLICT_HINT: &str = "resolve the conflicts in the working tree and stage them, then choose continue";

const UNMERGED_HINT: &str = "unmerged files remain; resolve them and `git add` each one before continuing";

/// Why a commit was handled without applying it, or other notable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoteKind {
    /// Applied cleanly but produced no new history
    NoOp,
    /// The patch was empty after resolution and was skipped automatically
    Empty,
    /// The operator chose to skip
    UserSkipped,
}

/// Terminal result for one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub handled: bool,
    pub has_changes: bool,
    pub note: Option<(NoteKind, String)>,
}

impl CommitOutcome {
    fn applied() -> Self {
        Self {
            handled: true,
            has_changes: true,
            note: None,
        }
    }

    fn unchanged(kind: NoteKind, note: String) -> Self {
        Self {
            handled: true,
            has_changes: false,
            note: Some((kind, note)),
        }
    }
}

/// States a single commit moves through
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Attempting,
    NeedsDecision {
        kind: FailureKind,
        message: String,
        hint: Option<&'static str>,
    },
    Continuing,
    Done(CommitOutcome),
}

/// Failure text classification
pub fn classify_failure(message: &str) -> Failure {
    let lower = message.to_lowercase();
    if lower.contains("now empty") || lower.contains("patch is empty") || lower.contains("nothing to commit") {
        Failure::Empty
    } else if lower.contains("conflict") || lower.contains("could not apply") || lower.contains("after resolving") {
        Failure::Needs(FailureKind::Conflict)
    } else {
        Failure::Needs(FailureKind::Other)
    }
}

fn mentions_unmerged(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("unmerged") || lower.contains("resolve your current index")
}

/// Outcome of classifying a failed apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Empty,
    Needs(FailureKind),
}

/// Drives one commit at a time to a terminal outcome
pub struct CommitApplier<'a, 'g> {
    session: &'a WorkspaceSession<'g>,
    prompter: &'a dyn Prompter,
    branch: &'a str,
}

impl<'a, 'g> CommitApplier<'a, 'g> {
    pub fn new(session: &'a WorkspaceSession<'g>, prompter: &'a dyn Prompter, branch: &'a str) -> Self {
        Self {
            session,
            prompter,
            branch,
        }
    }

    /// Apply `commit` to the checked out branch
    ///
    /// Returns only once the commit is handled. An `abort` choice, a failed continue or a
    /// cancelled prompt returns an error after the in-progress apply has been abandoned.
    pub fn apply(&self, commit: &str) -> Result<CommitOutcome> {
        let mut state = State::Attempting;
        loop {
            debug!(%commit, ?state, "CommitApplier::apply: state");
            state = match state {
                State::Attempting => self.attempt(commit)?,
                State::NeedsDecision { kind, message, hint } => self.decide(commit, kind, &message, hint)?,
                State::Continuing => self.continue_apply(commit)?,
                State::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn attempt(&self, commit: &str) -> Result<State> {
        let git = self.session.git();
        let before = git.head()?;

        match git.cherry_pick(commit) {
            Ok(()) => {
                let after = git.head()?;
                if after != before {
                    info!(%commit, branch = %self.branch, "Applied commit");
                    Ok(State::Done(CommitOutcome::applied()))
                } else {
                    info!(%commit, branch = %self.branch, "Commit produced no changes");
                    Ok(State::Done(CommitOutcome::unchanged(
                        NoteKind::NoOp,
                        format!("{} already present, nothing to apply", commit),
                    )))
                }
            }
            Err(e) => {
                let message = e.message();
                match classify_failure(&message) {
                    Failure::Empty => Ok(State::Done(self.skip_empty(commit))),
                    Failure::Needs(kind) => {
                        warn!(%commit, branch = %self.branch, ?kind, "Apply failed");
                        let hint = match kind {
                            FailureKind::Conflict => Some(CONFLICT_HINT),
                            FailureKind::Other => None,
                        };
                        Ok(State::NeedsDecision { kind, message, hint })
                    }
                }
            }
        }
    }

    fn decide(&self, commit: &str, kind: FailureKind, message: &str, hint: Option<&'static str>) -> Result<State> {
        let options = match kind {
            FailureKind::Conflict => CONFLICT_OPTIONS,
            FailureKind::Other => OTHER_OPTIONS,
        };
        let request = DecisionRequest {
            commit,
            branch: self.branch,
            kind,
            message,
            hint,
            options,
        };

        let choice = match self.prompter.decide(&request) {
            Ok(choice) => choice,
            Err(e) => {
                self.abandon(commit);
                return Err(e);
            }
        };
        info!(%commit, %choice, "Recovery decision");

        match choice {
            RecoveryOutcome::Continue if kind == FailureKind::Conflict => Ok(State::Continuing),
            RecoveryOutcome::Continue => Ok(State::NeedsDecision {
                kind,
                message: message.to_string(),
                hint: Some("continue is only available for conflicts"),
            }),
            RecoveryOutcome::Retry => {
                // A conflicted apply stays in progress and would block the next attempt
                self.abandon(commit);
                Ok(State::Attempting)
            }
            RecoveryOutcome::Skip => {
                self.abandon(commit);
                Ok(State::Done(CommitOutcome::unchanged(
                    NoteKind::UserSkipped,
                    format!("user selected skip for {}", commit),
                )))
            }
            RecoveryOutcome::Abort => {
                self.abandon(commit);
                Err(Error::Aborted {
                    commit: commit.to_string(),
                })
            }
        }
    }

    fn continue_apply(&self, commit: &str) -> Result<State> {
        match self.session.git().cherry_pick_continue() {
            Ok(()) => {
                info!(%commit, branch = %self.branch, "Applied commit after resolving conflicts");
                Ok(State::Done(CommitOutcome::applied()))
            }
            Err(e) => {
                let message = e.message();
                if classify_failure(&message) == Failure::Empty {
                    Ok(State::Done(self.skip_empty(commit)))
                } else if mentions_unmerged(&message) {
                    Ok(State::NeedsDecision {
                        kind: FailureKind::Conflict,
                        message,
                        hint: Some(UNMERGED_HINT),
                    })
                } else {
                    self.abandon(commit);
                    Err(Error::ContinueFailed {
                        commit: commit.to_string(),
                        message,
                    })
                }
            }
        }
    }

    fn skip_empty(&self, commit: &str) -> CommitOutcome {
        info!(%commit, "Patch is empty after resolution, skipping");
        if let Err(e) = self.session.git().cherry_pick_skip() {
            debug!(%commit, error = %e, "cherry-pick --skip failed");
        }
        CommitOutcome::unchanged(NoteKind::Empty, format!("{} was an empty submission, skipped", commit))
    }

    /// Best-effort abort of an in-progress apply
    fn abandon(&self, commit: &str) {
        if let Err(e) = self.session.git().cherry_pick_abort() {
            debug!(%commit, error = %e, "No apply to abort");
        }
    }
}
