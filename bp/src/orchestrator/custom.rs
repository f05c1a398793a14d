//! Operator-defined shell commands run in the working directory

use std::process::Command;

use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::config::CustomStep;
use crate::error::Result;
use crate::report::{ItemResult, StepReport};

/// Output lines kept in an item's details
const DETAIL_LINES: usize = 10;

impl Orchestrator<'_, '_> {
    pub(super) fn run_custom(&self, name: &str, step: &CustomStep) -> Result<StepReport> {
        let mut report = StepReport::new(name);
        if step.commands.is_empty() {
            report.warn("no commands configured");
            return Ok(report);
        }

        for command in &step.commands {
            self.announce(command);
            let item = self.run_command(command)?;
            let failed = item.is_failed();
            report.push(item);
            if failed {
                break;
            }
        }
        Ok(report)
    }

    fn run_command(&self, command: &str) -> Result<ItemResult> {
        debug!(%command, workdir = %self.settings.workdir.display(), "run_command: called");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.settings.workdir)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let details = tail(&stdout, &stderr);

        if output.status.success() {
            info!(%command, "Command succeeded");
            return Ok(ItemResult::succeeded(command, false, None).with_details(details));
        }

        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        warn!(%command, %status, "Command failed");
        Ok(ItemResult::failed(command, format!("command failed with {}", status)).with_details(details))
    }
}

fn tail(stdout: &str, stderr: &str) -> Vec<String> {
    let lines: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = lines.len().saturating_sub(DETAIL_LINES);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::super::tests::settings;
    use super::super::{Orchestrator, Settings};
    use super::tail;
    use crate::config::CustomStep;
    use crate::prompt::ScriptedPrompter;
    use crate::session::WorkspaceSession;
    use crate::testing::MockGit;

    #[test]
    fn test_tail_keeps_last_lines() {
        let stdout: String = (1..=12).map(|i| format!("line {}\n", i)).collect();
        let lines = tail(&stdout, "");
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "line 3");
        assert_eq!(tail("", "oops\n"), vec!["oops"]);
    }

    #[test]
    fn test_commands_run_in_workdir_and_stop_on_failure() {
        let dir = TempDir::new().unwrap();
        let git = MockGit::new("main");
        let session = WorkspaceSession::new(&git);
        let prompter = ScriptedPrompter::new(vec![]);
        let orchestrator = Orchestrator::new(
            &session,
            &prompter,
            Settings {
                workdir: dir.path().to_path_buf(),
                ..settings()
            },
        );
        let step = CustomStep {
            commands: vec![
                "echo hello > marker.txt".to_string(),
                "exit 3".to_string(),
                "touch never.txt".to_string(),
            ],
        };

        let report = orchestrator.run_custom("hooks", &step).unwrap();

        assert_eq!(report.items.len(), 2);
        assert!(report.items[0].is_succeeded());
        assert!(report.items[1].is_failed());
        assert!(dir.path().join("marker.txt").exists());
        assert!(!dir.path().join("never.txt").exists());
        assert!(git.calls().is_empty());
    }
}
