//! Publish many branches, refusing to push branches that are behind their upstream

use tracing::{info, warn};

use super::{Orchestrator, split_upstream};
use crate::branches;
use crate::config::PushStep;
use crate::error::Result;
use crate::report::{ItemResult, StepReport};

impl Orchestrator<'_, '_> {
    pub(super) fn push_many(&self, name: &str, step: &PushStep) -> Result<StepReport> {
        let mut report = StepReport::new(name);
        let remote = step.remote.as_deref().unwrap_or(&self.settings.remote);

        let resolved = branches::resolve(&step.target_branches, self.session)?;
        if resolved.is_empty() {
            report.warn("no branches matched the target specification");
            return Ok(report);
        }
        let targets = self.narrow("Select branches to push", &resolved, &resolved, false)?;
        if targets.is_empty() {
            report.warn("nothing selected");
            return Ok(report);
        }

        self.guarded(&mut report, |report| {
            for branch in &targets {
                self.announce(branch);
                let result = self.push_one(branch, remote);
                report.push(self.isolate(branch, result)?);
            }
            Ok(())
        })?;
        Ok(report)
    }

    fn push_one(&self, branch: &str, remote: &str) -> Result<ItemResult> {
        let git = self.session.git();
        self.checkout_existing(branch, remote)?;

        let Some(upstream) = git.upstream(branch)? else {
            self.network(&format!("git push --set-upstream {} {}", remote, branch), || {
                git.push(remote, branch, true)
            })?;
            info!(%branch, %remote, "Published branch");
            return Ok(ItemResult::succeeded(
                branch,
                true,
                Some(format!("published to {} with upstream tracking", remote)),
            ));
        };

        let (up_remote, up_branch) = split_upstream(&upstream, remote);
        self.network(&format!("git fetch {} {}", up_remote, up_branch), || {
            git.fetch(up_remote, up_branch)
        })?;

        let (ahead, behind) = git.ahead_behind(branch, &upstream)?;
        if behind > 0 {
            warn!(%branch, %upstream, behind, "Branch is behind upstream, not pushing");
            return Ok(ItemResult::failed(
                branch,
                format!("behind {} by {} commit(s); pull or rebase first", upstream, behind),
            ));
        }
        if ahead == 0 {
            return Ok(ItemResult::succeeded(branch, false, Some("already up to date".to_string())));
        }

        self.network(&format!("git push {} {}", remote, branch), || git.push(remote, branch, false))?;
        info!(%branch, %remote, ahead, "Pushed branch");
        Ok(ItemResult::succeeded(branch, true, Some(format!("pushed {} commit(s)", ahead))))
    }
}
