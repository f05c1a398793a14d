//! Backport configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use eyre::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

use crate::error::Error;
use crate::git::LogQuery;

/// Default remote used for sync and push
pub const DEFAULT_REMOTE: &str = "origin";

/// Default number of recent commits scanned for fingerprints
pub const DEFAULT_SCAN_DEPTH: usize = 30;

/// Default number of times a failed network operation is offered for retry
pub const DEFAULT_NETWORK_RETRIES: u32 = 3;

/// File names searched in the current directory, in order
const LOCAL_CONFIG_NAMES: &[&str] = &["backport.yml", ".backport.yml"];

/// Main backport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Repository working directory (required)
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Remote used for sync and push unless a step overrides it
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Push after replicating unless a step overrides it
    #[serde(default)]
    pub push: bool,

    /// Number of recent commits scanned when deciding whether a change is already applied
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,

    /// Skip interactive step, branch, task and commit selection
    #[serde(default)]
    pub skip_selection: bool,

    /// How many times a failed fetch/pull/push is offered for retry
    #[serde(default = "default_network_retries")]
    pub network_retries: u32,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default)]
    pub log_level: Option<String>,

    /// Steps, run in order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Directory the configuration was loaded from, used to resolve a relative workdir
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

fn default_scan_depth() -> usize {
    DEFAULT_SCAN_DEPTH
}

fn default_network_retries() -> u32 {
    DEFAULT_NETWORK_RETRIES
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// An explicit path wins; otherwise `./backport.yml`, `./.backport.yml` and
    /// `~/.config/backport/backport.yml` are tried. Finding none is an error.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let path = Self::locate(config_path)?;
        let config = Self::load_from_file(&path).context(format!("Failed to load config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read only the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LogLevelOnly {
            log_level: Option<String>,
        }

        let path = Self::locate(config_path).ok()?;
        let content = fs::read_to_string(path).ok()?;
        serde_yaml::from_str::<LogLevelOnly>(&content).ok()?.log_level
    }

    fn locate(config_path: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(path) = config_path {
            return Ok(path.clone());
        }

        for name in LOCAL_CONFIG_NAMES {
            let local = PathBuf::from(name);
            if local.exists() {
                return Ok(local);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("backport").join("backport.yml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        Err(eyre::eyre!(
            "No configuration file found (tried {} and ~/.config/backport/backport.yml)",
            LOCAL_CONFIG_NAMES.join(", ")
        ))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let base_dir = path
            .as_ref()
            .parent()
            .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
            .map(Path::to_path_buf);

        let config = Self::from_yaml(&content, base_dir).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse configuration text; relative workdirs resolve against `base_dir`
    pub fn from_yaml(content: &str, base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.base_dir = base_dir;
        Ok(config)
    }

    /// Check required fields and cross-field constraints
    pub fn validate(&self) -> Result<(), Error> {
        if self.workdir.is_none() {
            return Err(Error::Config("missing required field 'workdir'".to_string()));
        }
        if self.steps.is_empty() {
            return Err(Error::Config("no steps configured".to_string()));
        }
        if self.scan_depth == 0 {
            return Err(Error::Config("'scanDepth' must be at least 1".to_string()));
        }
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }

    /// Absolute (or config-relative) working directory
    pub fn resolved_workdir(&self) -> Result<PathBuf, Error> {
        let workdir = self
            .workdir
            .as_ref()
            .ok_or_else(|| Error::Config("missing required field 'workdir'".to_string()))?;
        match &self.base_dir {
            Some(base) if workdir.is_relative() => Ok(base.join(workdir)),
            _ => Ok(workdir.clone()),
        }
    }
}

/// Accept either a single value or a list
fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Declarative description of the branches a step targets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BranchSpec {
    Name(String),
    List(Vec<String>),
    Pattern(BranchPattern),
}

/// Pattern-based branch selection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BranchPattern {
    #[serde(deserialize_with = "one_or_many")]
    pub patterns: Vec<String>,

    /// Treat patterns as regular expressions matched against all known branches
    #[serde(default)]
    pub is_regex: bool,
}

/// A configured step
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
}

/// Closed set of step kinds
#[derive(Debug, Clone)]
pub enum StepKind {
    CherryPick(CherryPickStep),
    CreateWithPick(CreateWithPickStep),
    HasCommit(HasCommitStep),
    Push(PushStep),
    Custom(CustomStep),
}

impl StepKind {
    /// The `uses` tag (or `run`) this kind is configured with
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CherryPick(_) => "cherry-pick",
            Self::CreateWithPick(_) => "create-with-pick",
            Self::HasCommit(_) => "has-commit",
            Self::Push(_) => "push",
            Self::Custom(_) => "run",
        }
    }
}

/// Replicate commits onto existing branches
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CherryPickStep {
    pub target_branches: BranchSpec,

    #[serde(deserialize_with = "one_or_many")]
    pub commit_hashes: Vec<String>,

    #[serde(default)]
    pub push: Option<bool>,

    #[serde(default)]
    pub remote: Option<String>,

    #[serde(default)]
    pub skip_branch_selection: bool,
}

/// Create branches from a base, then replicate commits onto them
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateWithPickStep {
    pub tasks: Vec<ReplicationTask>,

    #[serde(default)]
    pub push: Option<bool>,

    #[serde(default)]
    pub remote: Option<String>,

    #[serde(default)]
    pub skip_task_selection: bool,
}

/// One branch to create (or reuse) and the commits to replicate onto it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplicationTask {
    pub base_branch: String,
    pub new_branch: String,

    #[serde(deserialize_with = "one_or_many")]
    pub commit_hashes: Vec<String>,
}

/// Read-only audit of which changes a branch contains
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HasCommitStep {
    pub target_branches: BranchSpec,

    #[serde(default, deserialize_with = "one_or_many")]
    pub commit_hashes: Vec<String>,

    #[serde(default)]
    pub commit_messages: Vec<MessageCheck>,
}

/// History search criteria; every given dimension must match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageCheck {
    #[serde(default, deserialize_with = "one_or_many")]
    pub patterns: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub authors: Vec<String>,

    #[serde(default)]
    pub date: Option<DateFilter>,
}

impl MessageCheck {
    pub fn to_query(&self) -> LogQuery {
        let (since, until) = match &self.date {
            None => (None, None),
            Some(DateFilter::On(day)) => (Some(*day), Some(*day)),
            Some(DateFilter::Range { since, until }) => (*since, *until),
        };
        LogQuery {
            patterns: self.patterns.clone(),
            authors: self.authors.clone(),
            since: since.map(|d| d.format("%Y-%m-%d").to_string()),
            until: until.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Short human description for reports
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.patterns.is_empty() {
            parts.push(format!("message ~ {}", self.patterns.join(" | ")));
        }
        if !self.authors.is_empty() {
            parts.push(format!("author ~ {}", self.authors.join(" | ")));
        }
        match &self.date {
            None => {}
            Some(DateFilter::On(day)) => parts.push(format!("date = {}", day)),
            Some(DateFilter::Range { since, until }) => parts.push(format!(
                "date in {}..{}",
                since.map(|d| d.to_string()).unwrap_or_default(),
                until.map(|d| d.to_string()).unwrap_or_default()
            )),
        }
        parts.join(", ")
    }
}

/// A single day or an inclusive range
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DateFilter {
    On(NaiveDate),
    Range {
        since: Option<NaiveDate>,
        until: Option<NaiveDate>,
    },
}

/// Push many branches to a remote
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PushStep {
    pub target_branches: BranchSpec,

    #[serde(default)]
    pub remote: Option<String>,
}

/// Shell commands run in the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomStep {
    pub commands: Vec<String>,
}

impl Step {
    fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: &str| Error::Config(format!("step '{}': {}", self.name, reason));

        match &self.kind {
            StepKind::CherryPick(step) => {
                if step.commit_hashes.is_empty() {
                    return Err(invalid("'commitHashes' must not be empty"));
                }
            }
            StepKind::CreateWithPick(step) => {
                if step.tasks.is_empty() {
                    return Err(invalid("'tasks' must not be empty"));
                }
                for task in &step.tasks {
                    if task.base_branch.is_empty() || task.new_branch.is_empty() {
                        return Err(invalid("every task needs 'baseBranch' and 'newBranch'"));
                    }
                }
            }
            StepKind::HasCommit(step) => {
                if step.commit_hashes.is_empty() && step.commit_messages.is_empty() {
                    return Err(invalid("needs 'commitHashes' or 'commitMessages'"));
                }
                for check in &step.commit_messages {
                    if check.patterns.is_empty() && check.authors.is_empty() && check.date.is_none() {
                        return Err(invalid("a 'commitMessages' entry has no criteria"));
                    }
                    if let Some(DateFilter::Range {
                        since: Some(since),
                        until: Some(until),
                    }) = &check.date
                    {
                        if since > until {
                            return Err(invalid("date range 'since' is after 'until'"));
                        }
                    }
                }
            }
            StepKind::Push(_) => {}
            StepKind::Custom(step) => {
                if step.commands.is_empty() {
                    return Err(invalid("'run' must not be empty"));
                }
            }
        }
        Ok(())
    }
}

/// Wire shape of a step before dispatch on `uses` / `run`
#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    uses: Option<String>,

    #[serde(default)]
    run: Option<Value>,

    #[serde(flatten)]
    params: Mapping,
}

fn parse_params<T: serde::de::DeserializeOwned>(tag: &str, params: Mapping) -> std::result::Result<T, String> {
    serde_yaml::from_value(Value::Mapping(params)).map_err(|e| format!("invalid '{}' step: {}", tag, e))
}

impl TryFrom<RawStep> for Step {
    type Error = String;

    fn try_from(raw: RawStep) -> std::result::Result<Self, Self::Error> {
        let kind = match (raw.uses.as_deref(), raw.run) {
            (Some(_), Some(_)) => return Err("a step cannot have both 'uses' and 'run'".to_string()),
            (None, None) => return Err("a step needs either 'uses' or 'run'".to_string()),
            (None, Some(run)) => {
                if !raw.params.is_empty() {
                    return Err("a 'run' step takes no other fields besides 'name'".to_string());
                }
                let commands = match run {
                    Value::String(command) => vec![command],
                    Value::Sequence(items) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(command) => Ok(command),
                            _ => Err("'run' entries must be strings".to_string()),
                        })
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                    _ => return Err("'run' must be a string or a list of strings".to_string()),
                };
                StepKind::Custom(CustomStep { commands })
            }
            (Some(tag), None) => match tag {
                "cherry-pick" => StepKind::CherryPick(parse_params(tag, raw.params)?),
                "create-with-pick" => StepKind::CreateWithPick(parse_params(tag, raw.params)?),
                "has-commit" => StepKind::HasCommit(parse_params(tag, raw.params)?),
                "push" => StepKind::Push(parse_params(tag, raw.params)?),
                other => return Err(format!("unknown step kind 'uses: {}'", other)),
            },
        };

        let name = raw.name.unwrap_or_else(|| match &kind {
            StepKind::Custom(step) => step.commands.first().cloned().unwrap_or_default(),
            other => other.tag().to_string(),
        });

        Ok(Step { name, kind })
    }
}
