//! Step orchestration
//!
//! Every workflow follows the same shape: resolve the items, let the operator narrow them, pass
//! the safety gate, remember the checked out branch, process each item behind an error boundary,
//! restore the original branch, and return a [`StepReport`].

mod audit;
mod create;
mod custom;
mod push;
mod replicate;

use std::path::PathBuf;

use colored::Colorize;
use tracing::{debug, info, warn};

use crate::config::{Config, Step, StepKind};
use crate::error::{Error, Result};
use crate::fingerprint::FingerprintIndex;
use crate::git::GitError;
use crate::prompt::Prompter;
use crate::report::{ItemResult, RunSummary, StepReport};
use crate::safety;
use crate::session::WorkspaceSession;

/// Run-wide settings derived from configuration and CLI overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub workdir: PathBuf,
    pub remote: String,
    pub push: bool,
    pub scan_depth: usize,
    pub skip_selection: bool,
    pub network_retries: u32,
}

impl Settings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            workdir: config.resolved_workdir()?,
            remote: config.remote.clone(),
            push: config.push,
            scan_depth: config.scan_depth,
            skip_selection: config.skip_selection,
            network_retries: config.network_retries,
        })
    }
}

/// Composes resolution, fingerprint filtering and replication into workflows
pub struct Orchestrator<'a, 'g> {
    session: &'a WorkspaceSession<'g>,
    prompter: &'a dyn Prompter,
    settings: Settings,
    fingerprints: FingerprintIndex<'a, 'g>,
}

impl<'a, 'g> Orchestrator<'a, 'g> {
    pub fn new(session: &'a WorkspaceSession<'g>, prompter: &'a dyn Prompter, settings: Settings) -> Self {
        debug!(?settings, "Orchestrator::new: called");
        let fingerprints = FingerprintIndex::new(session, settings.scan_depth);
        Self {
            session,
            prompter,
            settings,
            fingerprints,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the selected steps in order, stopping after the first step that fails
    pub fn run(&self, steps: &[Step]) -> Result<RunSummary> {
        let labels: Vec<String> = steps
            .iter()
            .map(|s| format!("{} ({})", s.name, s.kind.tag()))
            .collect();
        let selected = self.select("Select steps to run", &labels, false)?;

        let mut summary = RunSummary::default();
        for index in selected {
            let step = &steps[index];
            eprintln!();
            eprintln!("{} {}", "▶".bright_cyan(), step.name.bold());

            let report = self.run_step(step)?;
            let failed = !report.succeeded();
            summary.steps.push(report);
            if failed {
                warn!(step = %step.name, "Step failed, stopping");
                summary.stopped_after = Some(step.name.clone());
                break;
            }
        }
        Ok(summary)
    }

    /// Dispatch one step to its workflow
    pub fn run_step(&self, step: &Step) -> Result<StepReport> {
        info!(step = %step.name, kind = step.kind.tag(), "Running step");
        match &step.kind {
            StepKind::CherryPick(params) => self.replicate_to_branches(&step.name, params),
            StepKind::CreateWithPick(params) => self.create_then_replicate(&step.name, params),
            StepKind::HasCommit(params) => self.audit_presence(&step.name, params),
            StepKind::Push(params) => self.push_many(&step.name, params),
            StepKind::Custom(params) => self.run_custom(&step.name, params),
        }
    }

    /// Let the operator narrow `labels`; returns selected indices
    fn select(&self, prompt: &str, labels: &[String], skip: bool) -> Result<Vec<usize>> {
        if labels.is_empty() || skip || self.settings.skip_selection {
            return Ok((0..labels.len()).collect());
        }
        self.prompter.multi_select(prompt, labels)
    }

    /// Keep only the selected entries of `items`
    fn narrow<T: Clone>(&self, prompt: &str, items: &[T], labels: &[String], skip: bool) -> Result<Vec<T>> {
        let selected = self.select(prompt, labels, skip)?;
        Ok(selected.into_iter().filter_map(|i| items.get(i).cloned()).collect())
    }

    /// Safety gate, original-branch restoration and the item loop body
    fn guarded(&self, report: &mut StepReport, body: impl FnOnce(&mut StepReport) -> Result<()>) -> Result<()> {
        safety::ensure_safe(self.session)?;
        let guard = self.session.restore_point()?;
        debug!(original = guard.original(), "Orchestrator::guarded: workspace is safe");

        body(report)?;

        if let Some(warning) = guard.restore() {
            warn!("{}", warning);
            report.warn(warning);
        }
        Ok(())
    }

    /// Convert an item-level error into a failed item; fatal errors pass through
    fn isolate(&self, name: &str, result: Result<ItemResult>) -> Result<ItemResult> {
        match result {
            Ok(item) => Ok(item),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(item = %name, error = %e, "Item failed");
                Ok(ItemResult::failed(name, e.to_string()))
            }
        }
    }

    fn announce(&self, item: &str) {
        eprintln!("  {} {}", "→".cyan(), item);
    }

    /// Run a network operation, offering a bounded number of interactive retries
    fn network<T>(&self, what: &str, mut op: impl FnMut() -> std::result::Result<T, GitError>) -> Result<T> {
        let mut retries = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(operation = %what, error = %e, "Network operation failed");
                    if retries >= self.settings.network_retries {
                        return Err(e.into());
                    }
                    retries += 1;
                    let prompt = format!("`{}` failed: {}. Retry?", what, e.message());
                    if !self.prompter.confirm(&prompt, true)? {
                        return Err(e.into());
                    }
                }
            }
        }
    }

    /// Check out `branch`, creating a tracking branch from `remote` when only the remote has it
    fn checkout_existing(&self, branch: &str, remote: &str) -> Result<()> {
        let git = self.session.git();
        if git.local_branch_exists(branch)? {
            git.checkout(branch)?;
        } else if git.remote_branch_exists(remote, branch)? {
            info!(%branch, %remote, "Creating local tracking branch");
            git.checkout_tracking(remote, branch)?;
        } else {
            return Err(Error::BranchNotFound(branch.to_string()));
        }
        Ok(())
    }

    /// Check out `branch` and fast-forward it from its upstream, if it has one
    fn prepare_branch(&self, branch: &str, remote: &str) -> Result<()> {
        self.checkout_existing(branch, remote)?;

        let git = self.session.git();
        if let Some(upstream) = git.upstream(branch)? {
            let (up_remote, up_branch) = split_upstream(&upstream, remote);
            self.network(&format!("git fetch {} {}", up_remote, up_branch), || {
                git.fetch(up_remote, up_branch)
            })?;
            self.network(&format!("git pull --ff-only {} {}", up_remote, up_branch), || {
                git.pull_ff_only(up_remote, up_branch)
            })?;
            debug!(%branch, %upstream, "Branch synced");
        }
        Ok(())
    }

    /// Push `branch`, establishing upstream tracking if it has none
    fn push_branch(&self, branch: &str, remote: &str) -> Result<()> {
        let git = self.session.git();
        let set_upstream = git.upstream(branch)?.is_none();
        self.network(&format!("git push {} {}", remote, branch), || {
            git.push(remote, branch, set_upstream)
        })?;
        info!(%branch, %remote, "Pushed branch");
        Ok(())
    }
}

/// Split `origin/release-1` into remote and branch, falling back to `default_remote`
fn split_upstream<'u>(upstream: &'u str, default_remote: &'u str) -> (&'u str, &'u str) {
    match upstream.split_once('/') {
        Some((remote, branch)) if !remote.is_empty() && !branch.is_empty() => (remote, branch),
        _ => (default_remote, upstream),
    }
}
