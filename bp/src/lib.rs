//! Backport - replicate a fixed set of commits onto many branches
//!
//! A configuration file lists steps. Each step resolves a set of branches (or branch creation
//! tasks), skips commits whose content already exists on the target, applies the rest in order
//! and walks the operator through conflicts. The checked out branch is restored when a step ends.
//!
//! # Modules
//!
//! - [`config`] - Configuration types and loading
//! - [`git`] - Version-control port and its subprocess implementation
//! - [`session`] - The repository handle and branch restoration
//! - [`safety`] - Pre-flight workspace checks
//! - [`branches`] - Target branch resolution
//! - [`fingerprint`] - Content-equivalence detection
//! - [`recovery`] - Per-commit apply and conflict recovery
//! - [`engine`] - Ordered replication of a commit list
//! - [`orchestrator`] - Step workflows
//! - [`prompt`] - Operator interaction
//! - [`report`] - Outcomes and summaries
//! - [`cli`] - Command-line interface

pub mod branches;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod git;
pub mod orchestrator;
pub mod prompt;
pub mod recovery;
pub mod report;
pub mod safety;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::{BranchSpec, Config, Step, StepKind};
pub use error::{Error, Result};
pub use git::{Git, GitCli, GitError};
pub use orchestrator::{Orchestrator, Settings};
pub use prompt::{Prompter, RecoveryOutcome, ScriptedPrompter, TerminalPrompter};
pub use report::{ItemResult, ItemStatus, RunSummary, StepReport};
pub use session::WorkspaceSession;
