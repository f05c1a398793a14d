//! Content fingerprints used to decide whether a change is already applied
//!
//! A fingerprint is the tool's stable patch id: it hashes the diff only, so a replicated commit
//! keeps the fingerprint of its source even though its hash, author date and message may differ.
//! Membership is only checked against the most recent `depth` commits of a branch; an equivalent
//! change older than that window is treated as not applied and will be attempted again.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::Result;
use crate::session::WorkspaceSession;

/// Content-derived identifier of a change
pub type Fingerprint = String;

/// Fingerprint lookups against one session
///
/// Source commit fingerprints never change during a run and are cached. Branch windows are
/// recomputed on every call because replication moves the branch.
pub struct FingerprintIndex<'s, 'g> {
    session: &'s WorkspaceSession<'g>,
    depth: usize,
    cache: RefCell<HashMap<String, Option<Fingerprint>>>,
}

impl<'s, 'g> FingerprintIndex<'s, 'g> {
    pub fn new(session: &'s WorkspaceSession<'g>, depth: usize) -> Self {
        debug!(depth, "FingerprintIndex::new: called");
        Self {
            session,
            depth,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Fingerprint of `commit`, or `None` when the tool cannot derive one (merge commits, unknown ids)
    pub fn fingerprint_of(&self, commit: &str) -> Result<Option<Fingerprint>> {
        if let Some(cached) = self.cache.borrow().get(commit) {
            return Ok(cached.clone());
        }

        let fingerprint = self.session.git().patch_id(commit)?;
        if fingerprint.is_none() {
            warn!(%commit, "No fingerprint for commit; it will be treated as not yet applied");
        }
        self.cache.borrow_mut().insert(commit.to_string(), fingerprint.clone());
        Ok(fingerprint)
    }

    /// Fingerprints of the most recent `depth` commits on `branch`
    pub fn recent_fingerprints(&self, branch: &str) -> Result<HashSet<Fingerprint>> {
        let commits = self.session.git().recent_commits(branch, self.depth)?;
        debug!(%branch, count = commits.len(), "FingerprintIndex::recent_fingerprints: scanning");

        let mut fingerprints = HashSet::with_capacity(commits.len());
        for commit in &commits {
            if let Some(fingerprint) = self.session.git().patch_id(commit)? {
                fingerprints.insert(fingerprint);
            }
        }
        Ok(fingerprints)
    }

    /// Whether an equivalent of `commit` is within the scan window of `branch`
    pub fn is_applied(&self, commit: &str, branch: &str) -> Result<bool> {
        let window = self.recent_fingerprints(branch)?;
        self.is_in_window(commit, &window)
    }

    fn is_in_window(&self, commit: &str, window: &HashSet<Fingerprint>) -> Result<bool> {
        Ok(match self.fingerprint_of(commit)? {
            Some(fingerprint) => window.contains(&fingerprint),
            None => false,
        })
    }

    /// Commits not yet applied to `branch`, in their original order
    pub fn filter_unapplied(&self, commits: &[String], branch: &str) -> Result<Vec<String>> {
        self.partition(commits, branch).map(|(_, unapplied)| unapplied)
    }

    /// Commits already applied to `branch`, in their original order
    pub fn find_applied(&self, commits: &[String], branch: &str) -> Result<Vec<String>> {
        self.partition(commits, branch).map(|(applied, _)| applied)
    }

    /// Split `commits` into (applied, unapplied) with one scan of the branch window
    pub fn partition(&self, commits: &[String], branch: &str) -> Result<(Vec<String>, Vec<String>)> {
        let window = self.recent_fingerprints(branch)?;
        let mut applied = Vec::new();
        let mut unapplied = Vec::new();
        for commit in commits {
            if self.is_in_window(commit, &window)? {
                debug!(%commit, %branch, "Change already present");
                applied.push(commit.clone());
            } else {
                unapplied.push(commit.clone());
            }
        }
        Ok((applied, unapplied))
    }
}
