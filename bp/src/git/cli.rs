//! `git` subprocess implementation of the version-control port

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use super::{Git, GitError, LogEntry, LogQuery};

const FIELD_SEP: char = '\u{1f}';

/// Runs `git` against a fixed working directory
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    /// Create a port rooted at `workdir`
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        debug!(?workdir, "GitCli::new: called");
        Self { workdir }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.workdir)
            // Failure classification reads English messages
            .env("LC_ALL", "C")
            .env("GIT_EDITOR", "true")
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output, GitError> {
        let shown = format!("git {}", args.join(" "));
        debug!(command = %shown, "GitCli::output: running");
        self.command(args).output().map_err(|source| GitError::Spawn {
            command: shown,
            source,
        })
    }

    /// Run and return trimmed stdout, failing on non-zero exit
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(command_error(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run and report only whether the command succeeded
    fn succeeds(&self, args: &[&str]) -> Result<bool, GitError> {
        Ok(self.output(args)?.status.success())
    }
}

fn command_error(args: &[&str], output: &Output) -> GitError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    // cherry-pick reports some conditions (empty commits) on stdout
    let message = match (stderr.is_empty(), stdout.is_empty()) {
        (true, _) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    };
    GitError::Command {
        command: format!("git {}", args.join(" ")),
        stderr: message,
    }
}

impl Git for GitCli {
    fn git_dir(&self) -> Result<PathBuf, GitError> {
        let dir = PathBuf::from(self.run(&["rev-parse", "--git-dir"])?);
        if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(self.workdir.join(dir))
        }
    }

    fn is_clean(&self) -> Result<bool, GitError> {
        Ok(self.run(&["status", "--porcelain", "--untracked-files=no"])?.is_empty())
    }

    fn current_branch(&self) -> Result<String, GitError> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn head(&self) -> Result<String, GitError> {
        self.run(&["rev-parse", "HEAD"])
    }

    fn list_branches(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(&["branch", "-a", "--no-color"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn local_branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        let refname = format!("refs/heads/{}", branch);
        self.succeeds(&["rev-parse", "--verify", "--quiet", &refname])
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool, GitError> {
        let refname = format!("refs/remotes/{}/{}", remote, branch);
        self.succeeds(&["rev-parse", "--verify", "--quiet", &refname])
    }

    fn upstream(&self, branch: &str) -> Result<Option<String>, GitError> {
        let spec = format!("{}@{{upstream}}", branch);
        let output = self.output(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        let upstream = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if upstream.is_empty() { None } else { Some(upstream) })
    }

    fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["checkout", branch]).map(drop)
    }

    fn checkout_tracking(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        let start = format!("{}/{}", remote, branch);
        self.run(&["checkout", "-b", branch, "--track", &start]).map(drop)
    }

    fn create_branch(&self, branch: &str, base: &str) -> Result<(), GitError> {
        self.run(&["checkout", "-b", branch, base]).map(drop)
    }

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(&["fetch", remote, branch]).map(drop)
    }

    fn pull_ff_only(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(&["pull", "--ff-only", remote, branch]).map(drop)
    }

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<(), GitError> {
        if set_upstream {
            self.run(&["push", "--set-upstream", remote, branch]).map(drop)
        } else {
            self.run(&["push", remote, branch]).map(drop)
        }
    }

    fn ahead_behind(&self, branch: &str, upstream: &str) -> Result<(usize, usize), GitError> {
        let range = format!("{}...{}", branch, upstream);
        let out = self.run(&["rev-list", "--left-right", "--count", &range])?;
        parse_ahead_behind(&out).ok_or_else(|| GitError::Parse {
            command: format!("git rev-list --left-right --count {}", range),
            output: out,
        })
    }

    fn cherry_pick(&self, commit: &str) -> Result<(), GitError> {
        self.run(&["cherry-pick", commit]).map(drop)
    }

    fn cherry_pick_continue(&self) -> Result<(), GitError> {
        self.run(&["cherry-pick", "--continue"]).map(drop)
    }

    fn cherry_pick_skip(&self) -> Result<(), GitError> {
        self.run(&["cherry-pick", "--skip"]).map(drop)
    }

    fn cherry_pick_abort(&self) -> Result<(), GitError> {
        self.run(&["cherry-pick", "--abort"]).map(drop)
    }

    fn patch_id(&self, commit: &str) -> Result<Option<String>, GitError> {
        // Merge commits produce no diff here, which leaves patch-id with nothing to hash
        let diff = self.output(&["diff-tree", "-p", "--root", "--no-color", "--no-ext-diff", commit])?;
        if !diff.status.success() {
            // Unknown or unreadable commits have no fingerprint
            let err = command_error(&["diff-tree", "-p", commit], &diff);
            debug!(%commit, error = %err, "GitCli::patch_id: no diff");
            return Ok(None);
        }

        let mut child = self
            .command(&["patch-id", "--stable"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GitError::Spawn {
                command: "git patch-id --stable".to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&diff.stdout).map_err(|source| GitError::Spawn {
                command: "git patch-id --stable".to_string(),
                source,
            })?;
        }

        let output = child.wait_with_output().map_err(|source| GitError::Spawn {
            command: "git patch-id --stable".to_string(),
            source,
        })?;
        if !output.status.success() {
            return Err(command_error(&["patch-id", "--stable"], &output));
        }

        Ok(parse_patch_id(&String::from_utf8_lossy(&output.stdout)))
    }

    fn recent_commits(&self, branch: &str, depth: usize) -> Result<Vec<String>, GitError> {
        let count = format!("--max-count={}", depth);
        let out = self.run(&["rev-list", &count, branch])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn search_log(&self, branch: &str, query: &LogQuery) -> Result<Vec<LogEntry>, GitError> {
        let mut args: Vec<String> = vec![
            "log".to_string(),
            branch.to_string(),
            "--extended-regexp".to_string(),
            "--date=short".to_string(),
            "--format=%H%x1f%an%x1f%ad%x1f%s".to_string(),
        ];
        args.extend(query.patterns.iter().map(|p| format!("--grep={}", p)));
        args.extend(query.authors.iter().map(|a| format!("--author={}", a)));
        if let Some(since) = &query.since {
            args.push(format!("--since={} 00:00:00", since));
        }
        if let Some(until) = &query.until {
            args.push(format!("--until={} 23:59:59", until));
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&args)?;
        Ok(out.lines().filter_map(parse_log_line).collect())
    }

    fn commit_summary(&self, commit: &str) -> Result<String, GitError> {
        self.run(&["log", "-1", "--format=%h %s", commit])
    }
}

fn parse_ahead_behind(out: &str) -> Option<(usize, usize)> {
    let mut parts = out.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

fn parse_patch_id(out: &str) -> Option<String> {
    out.split_whitespace().next().map(str::to_string)
}

fn parse_log_line(line: &str) -> Option<LogEntry> {
    let mut fields = line.splitn(4, FIELD_SEP);
    Some(LogEntry {
        hash: fields.next()?.to_string(),
        author: fields.next()?.to_string(),
        date: fields.next()?.to_string(),
        subject: fields.next().unwrap_or_default().to_string(),
    })
}
