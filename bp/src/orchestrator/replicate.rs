//! Replicate a commit list onto existing branches

use tracing::{debug, info};

use super::Orchestrator;
use crate::branches;
use crate::config::CherryPickStep;
use crate::engine;
use crate::error::Result;
use crate::report::{ItemResult, StepReport};

impl Orchestrator<'_, '_> {
    pub(super) fn replicate_to_branches(&self, name: &str, step: &CherryPickStep) -> Result<StepReport> {
        let mut report = StepReport::new(name);
        let remote = step.remote.as_deref().unwrap_or(&self.settings.remote);
        let push = step.push.unwrap_or(self.settings.push);

        let resolved = branches::resolve(&step.target_branches, self.session)?;
        if resolved.is_empty() {
            report.warn("no branches matched the target specification");
            return Ok(report);
        }

        let skip = step.skip_branch_selection;
        let targets = self.narrow("Select target branches", &resolved, &resolved, skip)?;
        let commits = self.select_commits(&step.commit_hashes, skip)?;
        if targets.is_empty() || commits.is_empty() {
            report.warn("nothing selected");
            return Ok(report);
        }
        debug!(?targets, ?commits, "replicate_to_branches: selection done");

        self.guarded(&mut report, |report| {
            for branch in &targets {
                self.announce(branch);
                let result = self
                    .prepare_branch(branch, remote)
                    .and_then(|()| self.replicate_onto_current(branch, &commits, remote, push, false));
                report.push(self.isolate(branch, result)?);
            }
            Ok(())
        })?;
        Ok(report)
    }

    /// Offer the commit list for narrowing, labelled with each commit's summary
    fn select_commits(&self, commits: &[String], skip: bool) -> Result<Vec<String>> {
        if commits.len() <= 1 {
            return Ok(commits.to_vec());
        }
        let git = self.session.git();
        let labels: Vec<String> = commits
            .iter()
            .map(|c| git.commit_summary(c).unwrap_or_else(|_| c.clone()))
            .collect();
        self.narrow("Select commits to replicate", commits, &labels, skip)
    }

    /// Replicate the not-yet-applied part of `commits` onto the checked out `branch`
    ///
    /// `new_branch` forces a push when pushing is enabled, even if nothing was applied, so that a
    /// freshly created branch gets published.
    pub(super) fn replicate_onto_current(
        &self,
        branch: &str,
        commits: &[String],
        remote: &str,
        push: bool,
        new_branch: bool,
    ) -> Result<ItemResult> {
        let (present, pending) = self.fingerprints.partition(commits, branch)?;
        let details: Vec<String> = present.iter().map(|c| format!("{} already present", c)).collect();

        if pending.is_empty() {
            info!(%branch, "All commits already applied");
            if push && new_branch {
                self.push_branch(branch, remote)?;
            }
            return Ok(
                ItemResult::succeeded(branch, false, Some("all commits already applied".to_string()))
                    .with_details(details),
            );
        }

        let replication = engine::apply(&pending, branch, self.session, self.prompter)?;
        if push && (replication.has_changes || new_branch) {
            self.push_branch(branch, remote)?;
        }
        Ok(ItemResult::succeeded(branch, replication.has_changes, replication.note).with_details(details))
    }
}
