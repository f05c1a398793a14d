//! Create branches from a base and replicate commits onto them

use tracing::info;

use super::Orchestrator;
use crate::config::{CreateWithPickStep, ReplicationTask};
use crate::error::Result;
use crate::report::{ItemResult, StepReport};

impl Orchestrator<'_, '_> {
    pub(super) fn create_then_replicate(&self, name: &str, step: &CreateWithPickStep) -> Result<StepReport> {
        let mut report = StepReport::new(name);
        let remote = step.remote.as_deref().unwrap_or(&self.settings.remote);
        let push = step.push.unwrap_or(self.settings.push);

        if step.tasks.is_empty() {
            report.warn("no tasks configured");
            return Ok(report);
        }

        let labels: Vec<String> = step
            .tasks
            .iter()
            .map(|t| format!("{} → {} ({} commit(s))", t.base_branch, t.new_branch, t.commit_hashes.len()))
            .collect();
        let tasks = self.narrow("Select branches to create", &step.tasks, &labels, step.skip_task_selection)?;
        if tasks.is_empty() {
            report.warn("nothing selected");
            return Ok(report);
        }

        self.guarded(&mut report, |report| {
            for task in &tasks {
                self.announce(&format!("{} → {}", task.base_branch, task.new_branch));
                let result = self.run_task(task, remote, push);
                report.push(self.isolate(&task.new_branch, result)?);
            }
            Ok(())
        })?;
        Ok(report)
    }

    fn run_task(&self, task: &ReplicationTask, remote: &str, push: bool) -> Result<ItemResult> {
        let git = self.session.git();
        let new = task.new_branch.as_str();

        self.prepare_branch(&task.base_branch, remote)?;

        let exists = git.local_branch_exists(new)? || git.remote_branch_exists(remote, new)?;
        if exists {
            let prompt = format!("Branch '{}' already exists. Reuse it?", new);
            if !self.prompter.confirm(&prompt, false)? {
                info!(branch = %new, "Existing branch not reused");
                return Ok(ItemResult::warned(new, "branch already exists and was not reused"));
            }
            self.prepare_branch(new, remote)?;
            return self.replicate_onto_current(new, &task.commit_hashes, remote, push, false);
        }

        git.create_branch(new, &task.base_branch)?;
        info!(branch = %new, base = %task.base_branch, "Created branch");
        self.replicate_onto_current(new, &task.commit_hashes, remote, push, true)
    }
}
