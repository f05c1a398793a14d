//! In-memory repository used by unit tests
//!
//! Branches are plain lists of commit ids (oldest first). Cherry-picking appends a fresh id whose
//! fingerprint equals the source commit's, which mirrors how replication creates new hashes for
//! equivalent content.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use regex::Regex;

use crate::git::{Git, GitError, LogEntry, LogQuery};

/// Scripted behavior of one `cherry-pick <commit>` invocation
#[derive(Debug, Clone)]
pub enum ApplyStep {
    /// Applies cleanly and creates a new commit
    Apply,
    /// Succeeds without moving HEAD
    NoOp,
    /// Fails with the given message; messages mentioning a conflict leave the apply in progress
    Fail(String),
}

#[derive(Default)]
struct State {
    current: String,
    branches: HashMap<String, Vec<String>>,
    remote_branches: HashMap<String, Vec<String>>,
    upstreams: HashMap<String, String>,
    patch_ids: HashMap<String, Option<String>>,
    apply_script: HashMap<String, VecDeque<ApplyStep>>,
    continue_script: VecDeque<Result<(), String>>,
    ahead_behind: HashMap<String, (usize, usize)>,
    network_failures: HashMap<String, usize>,
    failing_checkouts: HashSet<String>,
    log_entries: HashMap<String, Vec<LogEntry>>,
    in_progress: Option<String>,
    detached_at: Option<String>,
    dirty: bool,
    git_dir: PathBuf,
    counter: usize,
    calls: Vec<String>,
}

pub struct MockGit {
    state: RefCell<State>,
}

fn fail(command: &str, stderr: &str) -> GitError {
    GitError::Command {
        command: format!("git {}", command),
        stderr: stderr.to_string(),
    }
}

impl MockGit {
    pub fn new(current: &str) -> Self {
        let mut state = State {
            current: current.to_string(),
            git_dir: PathBuf::from("/nonexistent/.git"),
            ..Default::default()
        };
        state.branches.insert(current.to_string(), Vec::new());
        Self {
            state: RefCell::new(state),
        }
    }

    pub fn add_branch(&self, name: &str, commits: &[&str]) {
        self.state
            .borrow_mut()
            .branches
            .insert(name.to_string(), commits.iter().map(|c| c.to_string()).collect());
    }

    pub fn add_remote_branch(&self, remote: &str, name: &str, commits: &[&str]) {
        self.state.borrow_mut().remote_branches.insert(
            format!("{}/{}", remote, name),
            commits.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn set_upstream(&self, branch: &str, upstream: &str) {
        self.state
            .borrow_mut()
            .upstreams
            .insert(branch.to_string(), upstream.to_string());
    }

    pub fn set_patch_id(&self, commit: &str, patch_id: Option<&str>) {
        self.state
            .borrow_mut()
            .patch_ids
            .insert(commit.to_string(), patch_id.map(str::to_string));
    }

    pub fn script_apply(&self, commit: &str, steps: Vec<ApplyStep>) {
        self.state
            .borrow_mut()
            .apply_script
            .insert(commit.to_string(), steps.into_iter().collect());
    }

    pub fn script_continue(&self, results: Vec<Result<(), &str>>) {
        self.state.borrow_mut().continue_script = results.into_iter().map(|r| r.map_err(str::to_string)).collect();
    }

    pub fn set_ahead_behind(&self, branch: &str, ahead: usize, behind: usize) {
        self.state
            .borrow_mut()
            .ahead_behind
            .insert(branch.to_string(), (ahead, behind));
    }

    /// Make the next `times` invocations of `op` (fetch, pull, push) fail
    pub fn fail_network(&self, op: &str, times: usize) {
        self.state.borrow_mut().network_failures.insert(op.to_string(), times);
    }

    pub fn fail_checkout(&self, branch: &str) {
        self.state.borrow_mut().failing_checkouts.insert(branch.to_string());
    }

    pub fn add_log_entry(&self, branch: &str, hash: &str, author: &str, date: &str, subject: &str) {
        self.state
            .borrow_mut()
            .log_entries
            .entry(branch.to_string())
            .or_default()
            .push(LogEntry {
                hash: hash.to_string(),
                author: author.to_string(),
                date: date.to_string(),
                subject: subject.to_string(),
            });
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.state.borrow_mut().dirty = dirty;
    }

    pub fn set_git_dir(&self, dir: impl Into<PathBuf>) {
        self.state.borrow_mut().git_dir = dir.into();
    }

    pub fn branch_commits(&self, branch: &str) -> Vec<String> {
        self.state.borrow().branches.get(branch).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }

    fn network(&self, op: &str, call: String) -> Result<(), GitError> {
        self.record(call.clone());
        let mut state = self.state.borrow_mut();
        if let Some(remaining) = state.network_failures.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(fail(&call, "fatal: unable to access remote: Could not resolve host"));
            }
        }
        Ok(())
    }

    fn fingerprint(&self, commit: &str) -> Option<String> {
        self.state
            .borrow()
            .patch_ids
            .get(commit)
            .cloned()
            .unwrap_or_else(|| Some(format!("pid-{}", commit)))
    }

    /// Append a replicated copy of `commit` to the current branch
    fn append_copy(&self, commit: &str) {
        let fingerprint = self.fingerprint(commit);
        let mut state = self.state.borrow_mut();
        state.counter += 1;
        let copy = format!("{}-copy{}", commit, state.counter);
        state.patch_ids.insert(copy.clone(), fingerprint);
        let current = state.current.clone();
        state.branches.entry(current).or_default().push(copy);
    }
}

impl Git for MockGit {
    fn git_dir(&self) -> Result<PathBuf, GitError> {
        Ok(self.state.borrow().git_dir.clone())
    }

    fn is_clean(&self) -> Result<bool, GitError> {
        Ok(!self.state.borrow().dirty)
    }

    fn current_branch(&self) -> Result<String, GitError> {
        Ok(self.state.borrow().current.clone())
    }

    fn head(&self) -> Result<String, GitError> {
        let state = self.state.borrow();
        if let Some(id) = &state.detached_at {
            return Ok(id.clone());
        }
        let commits = state.branches.get(&state.current).cloned().unwrap_or_default();
        Ok(commits
            .last()
            .cloned()
            .unwrap_or_else(|| format!("{}-root", state.current)))
    }

    fn list_branches(&self) -> Result<Vec<String>, GitError> {
        let state = self.state.borrow();
        let mut locals: Vec<&String> = state.branches.keys().collect();
        locals.sort();
        let mut lines: Vec<String> = locals
            .into_iter()
            .map(|b| {
                if *b == state.current {
                    format!("* {}", b)
                } else {
                    format!("  {}", b)
                }
            })
            .collect();

        let mut remotes: Vec<&String> = state.remote_branches.keys().collect();
        remotes.sort();
        if let Some(first) = remotes.first() {
            let remote = first.split('/').next().unwrap_or("origin");
            lines.push(format!("  remotes/{}/HEAD -> {}/main", remote, remote));
        }
        lines.extend(remotes.into_iter().map(|r| format!("  remotes/{}", r)));
        Ok(lines)
    }

    fn local_branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        Ok(self.state.borrow().branches.contains_key(branch))
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool, GitError> {
        Ok(self
            .state
            .borrow()
            .remote_branches
            .contains_key(&format!("{}/{}", remote, branch)))
    }

    fn upstream(&self, branch: &str) -> Result<Option<String>, GitError> {
        Ok(self.state.borrow().upstreams.get(branch).cloned())
    }

    fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.record(format!("checkout {}", branch));
        let mut state = self.state.borrow_mut();
        if state.failing_checkouts.contains(branch) {
            return Err(fail(&format!("checkout {}", branch), "error: checkout failed"));
        }
        if state.in_progress.is_some() {
            return Err(fail(
                &format!("checkout {}", branch),
                "error: you need to resolve your current index first",
            ));
        }
        if !state.branches.contains_key(branch) {
            // A commit id on any branch checks out detached
            if state.branches.values().any(|commits| commits.iter().any(|c| c == branch)) {
                state.detached_at = Some(branch.to_string());
                state.current = "HEAD".to_string();
                return Ok(());
            }
            return Err(fail(
                &format!("checkout {}", branch),
                &format!("error: pathspec '{}' did not match any file(s) known to git", branch),
            ));
        }
        state.current = branch.to_string();
        state.detached_at = None;
        Ok(())
    }

    fn checkout_tracking(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.record(format!("checkout -b {} --track {}/{}", branch, remote, branch));
        let mut state = self.state.borrow_mut();
        let remote_ref = format!("{}/{}", remote, branch);
        let commits = state
            .remote_branches
            .get(&remote_ref)
            .cloned()
            .ok_or_else(|| fail("checkout --track", "fatal: invalid reference"))?;
        state.branches.insert(branch.to_string(), commits);
        state.upstreams.insert(branch.to_string(), remote_ref);
        state.current = branch.to_string();
        state.detached_at = None;
        Ok(())
    }

    fn create_branch(&self, branch: &str, base: &str) -> Result<(), GitError> {
        self.record(format!("checkout -b {} {}", branch, base));
        let mut state = self.state.borrow_mut();
        if state.branches.contains_key(branch) {
            return Err(fail(
                "checkout -b",
                &format!("fatal: a branch named '{}' already exists", branch),
            ));
        }
        let commits = state.branches.get(base).cloned().unwrap_or_default();
        state.branches.insert(branch.to_string(), commits);
        state.current = branch.to_string();
        state.detached_at = None;
        Ok(())
    }

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.network("fetch", format!("fetch {} {}", remote, branch))
    }

    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.network("pull", format!("pull --ff-only {} {}", remote, branch))
    }

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<(), GitError> {
        let call = if set_upstream {
            format!("push --set-upstream {} {}", remote, branch)
        } else {
            format!("push {} {}", remote, branch)
        };
        self.network("push", call)?;

        let mut state = self.state.borrow_mut();
        let commits = state.branches.get(branch).cloned().unwrap_or_default();
        let remote_ref = format!("{}/{}", remote, branch);
        state.remote_branches.insert(remote_ref.clone(), commits);
        if set_upstream {
            state.upstreams.insert(branch.to_string(), remote_ref);
        }
        Ok(())
    }

    fn ahead_behind(&self, branch: &str, upstream: &str) -> Result<(usize, usize), GitError> {
        self.record(format!("rev-list --left-right --count {}...{}", branch, upstream));
        Ok(self.state.borrow().ahead_behind.get(branch).copied().unwrap_or((0, 0)))
    }

    fn cherry_pick(&self, commit: &str) -> Result<(), GitError> {
        self.record(format!("cherry-pick {}", commit));
        if self.state.borrow().in_progress.is_some() {
            return Err(fail(
                &format!("cherry-pick {}", commit),
                "error: cherry-pick is already in progress\nhint: try \"git cherry-pick (--continue | --abort | --quit)\"",
            ));
        }
        let step = self
            .state
            .borrow_mut()
            .apply_script
            .get_mut(commit)
            .and_then(VecDeque::pop_front)
            .unwrap_or(ApplyStep::Apply);

        match step {
            ApplyStep::Apply => {
                self.append_copy(commit);
                Ok(())
            }
            ApplyStep::NoOp => Ok(()),
            ApplyStep::Fail(message) => {
                if message.to_lowercase().contains("conflict") {
                    self.state.borrow_mut().in_progress = Some(commit.to_string());
                }
                Err(fail(&format!("cherry-pick {}", commit), &message))
            }
        }
    }

    fn cherry_pick_continue(&self) -> Result<(), GitError> {
        self.record("cherry-pick --continue".to_string());
        let result = self.state.borrow_mut().continue_script.pop_front().unwrap_or(Ok(()));
        match result {
            Ok(()) => {
                let pending = self.state.borrow_mut().in_progress.take();
                if let Some(commit) = pending {
                    self.append_copy(&commit);
                }
                Ok(())
            }
            Err(message) => Err(fail("cherry-pick --continue", &message)),
        }
    }

    fn cherry_pick_skip(&self) -> Result<(), GitError> {
        self.record("cherry-pick --skip".to_string());
        self.state.borrow_mut().in_progress = None;
        Ok(())
    }

    fn cherry_pick_abort(&self) -> Result<(), GitError> {
        self.record("cherry-pick --abort".to_string());
        let mut state = self.state.borrow_mut();
        if state.in_progress.take().is_none() {
            return Err(fail("cherry-pick --abort", "error: no cherry-pick or revert in progress"));
        }
        Ok(())
    }

    fn patch_id(&self, commit: &str) -> Result<Option<String>, GitError> {
        self.record(format!("patch-id {}", commit));
        Ok(self.fingerprint(commit))
    }

    fn recent_commits(&self, branch: &str, depth: usize) -> Result<Vec<String>, GitError> {
        let state = self.state.borrow();
        let commits = state
            .branches
            .get(branch)
            .ok_or_else(|| fail("rev-list", &format!("fatal: bad revision '{}'", branch)))?;
        Ok(commits.iter().rev().take(depth).cloned().collect())
    }

    fn search_log(&self, branch: &str, query: &LogQuery) -> Result<Vec<LogEntry>, GitError> {
        let state = self.state.borrow();
        let entries = state.log_entries.get(branch).cloned().unwrap_or_default();
        let patterns: Vec<Regex> = query.patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();

        Ok(entries
            .into_iter()
            .filter(|e| patterns.is_empty() || patterns.iter().any(|p| p.is_match(&e.subject)))
            .filter(|e| query.authors.is_empty() || query.authors.iter().any(|a| e.author.contains(a.as_str())))
            .filter(|e| query.since.as_ref().is_none_or(|s| e.date.as_str() >= s.as_str()))
            .filter(|e| query.until.as_ref().is_none_or(|u| e.date.as_str() <= u.as_str()))
            .collect())
    }

    fn commit_summary(&self, commit: &str) -> Result<String, GitError> {
        Ok(format!("{} subject of {}", commit, commit))
    }
}
