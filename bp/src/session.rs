//! The single handle to the repository being modified
//!
//! Exactly one [`WorkspaceSession`] exists per run and every operation receives it explicitly.
//! [`RestoreGuard`] holds the obligation to switch back to the branch that was checked out when a
//! workflow began.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::git::Git;

/// The repository at the configured working directory
pub struct WorkspaceSession<'g> {
    git: &'g dyn Git,
}

impl<'g> WorkspaceSession<'g> {
    pub fn new(git: &'g dyn Git) -> Self {
        Self { git }
    }

    /// Underlying version-control port
    pub fn git(&self) -> &'g dyn Git {
        self.git
    }

    pub fn current_branch(&self) -> Result<String> {
        Ok(self.git.current_branch()?)
    }

    /// Record the checked out branch so it is restored when the guard is released
    ///
    /// A detached HEAD is recorded as its commit id and restored as a detached checkout.
    pub fn restore_point(&self) -> Result<RestoreGuard<'_, 'g>> {
        let branch = self.current_branch()?;
        let original = if branch == DETACHED {
            Original::Detached(self.git.head()?)
        } else {
            Original::Branch(branch)
        };
        debug!(?original, "WorkspaceSession::restore_point: recorded original position");
        Ok(RestoreGuard {
            session: self,
            original,
            released: false,
        })
    }
}

/// What `rev-parse --abbrev-ref HEAD` reports when no branch is checked out
const DETACHED: &str = "HEAD";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Original {
    Branch(String),
    Detached(String),
}

/// Switches back to the original branch on every exit path
///
/// Call [`RestoreGuard::restore`] on the normal path to collect a failure as a warning. If the
/// guard is dropped without that (an early `?` return), the restore is still attempted and a
/// failure is only logged.
pub struct RestoreGuard<'s, 'g> {
    session: &'s WorkspaceSession<'g>,
    original: Original,
    released: bool,
}

impl RestoreGuard<'_, '_> {
    /// Branch name, or the commit id when the workflow started detached
    pub fn original(&self) -> &str {
        match &self.original {
            Original::Branch(name) | Original::Detached(name) => name,
        }
    }

    /// Restore the original branch, returning a warning if that failed
    pub fn restore(mut self) -> Option<String> {
        self.released = true;
        self.switch_back().err()
    }

    fn is_at_original(&self) -> bool {
        let git = self.session.git();
        match &self.original {
            Original::Branch(name) => git.current_branch().is_ok_and(|current| current == *name),
            Original::Detached(id) => {
                git.current_branch().is_ok_and(|current| current == DETACHED)
                    && git.head().is_ok_and(|head| head == *id)
            }
        }
    }

    fn switch_back(&self) -> std::result::Result<(), String> {
        if self.is_at_original() {
            debug!(original = %self.original(), "RestoreGuard: already at original position");
            return Ok(());
        }

        let (target, what) = match &self.original {
            Original::Branch(name) => (name, "branch"),
            Original::Detached(id) => (id, "detached commit"),
        };
        if let Err(e) = self.session.git().checkout(target) {
            return Err(format!("Failed to switch back to original {} '{}': {}", what, target, e));
        }
        if !self.is_at_original() {
            return Err(format!("Checked out '{}' but HEAD is not back at the original {}", target, what));
        }
        info!(original = %target, "Restored original {}", what);
        Ok(())
    }
}

impl Drop for RestoreGuard<'_, '_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(warning) = self.switch_back() {
            warn!("{}", warning);
        }
    }
}
