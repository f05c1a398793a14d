//! Report which branches contain given changes

use std::collections::HashSet;

use tracing::debug;

use super::Orchestrator;
use crate::branches;
use crate::config::HasCommitStep;
use crate::error::Result;
use crate::git::LogEntry;
use crate::report::{ItemResult, StepReport};

impl Orchestrator<'_, '_> {
    pub(super) fn audit_presence(&self, name: &str, step: &HasCommitStep) -> Result<StepReport> {
        let mut report = StepReport::new(name);

        let resolved = branches::resolve(&step.target_branches, self.session)?;
        if resolved.is_empty() {
            report.warn("no branches matched the target specification");
            return Ok(report);
        }
        let targets = self.narrow("Select branches to audit", &resolved, &resolved, false)?;
        if targets.is_empty() {
            report.warn("nothing selected");
            return Ok(report);
        }

        self.guarded(&mut report, |report| {
            for branch in &targets {
                self.announce(branch);
                let result = self.audit_branch(branch, step);
                report.push(self.isolate(branch, result)?);
            }
            Ok(())
        })?;
        Ok(report)
    }

    fn audit_branch(&self, branch: &str, step: &HasCommitStep) -> Result<ItemResult> {
        self.checkout_existing(branch, &self.settings.remote)?;

        let mut details = Vec::new();
        let mut problems = Vec::new();
        let mut found = 0;

        if !step.commit_hashes.is_empty() {
            let (present, missing) = self.fingerprints.partition(&step.commit_hashes, branch)?;
            found += present.len();
            details.extend(present.iter().map(|c| format!("present: {}", c)));
            if !missing.is_empty() {
                problems.push(format!(
                    "missing within last {} commit(s): {}",
                    self.fingerprints.depth(),
                    missing.join(", ")
                ));
            }
        }

        if !step.commit_messages.is_empty() {
            let (matches, unmatched) = self.search_messages(branch, step)?;
            if !unmatched.is_empty() {
                problems.push(format!("no commit matches {}", unmatched.join(", ")));
            }
            found += matches.len();
            details.extend(
                matches
                    .iter()
                    .map(|e| format!("match: {} {} {} {}", short(&e.hash), e.date, e.author, e.subject)),
            );
        }

        let item = if problems.is_empty() {
            ItemResult::succeeded(branch, false, Some(format!("{} commit(s) found", found)))
        } else {
            ItemResult::warned(branch, problems.join("; "))
        };
        Ok(item.with_details(details))
    }

    /// Union of every message check's matches, first occurrence wins, plus the checks
    /// that matched nothing
    fn search_messages(&self, branch: &str, step: &HasCommitStep) -> Result<(Vec<LogEntry>, Vec<String>)> {
        let git = self.session.git();
        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        let mut unmatched = Vec::new();
        for check in &step.commit_messages {
            let entries = git.search_log(branch, &check.to_query())?;
            debug!(%branch, check = %check.describe(), count = entries.len(), "Message check");
            if entries.is_empty() {
                unmatched.push(format!("[{}]", check.describe()));
            }
            matches.extend(entries.into_iter().filter(|e| seen.insert(e.hash.clone())));
        }
        Ok((matches, unmatched))
    }
}

fn short(hash: &str) -> &str {
    hash.get(..10).unwrap_or(hash)
}
