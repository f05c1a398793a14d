//! CLI argument definitions

use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use crate::config::Config;

/// Backport - replicate commits onto many branches
#[derive(Debug, Parser)]
#[command(
    name = "bp",
    about = "Replicate a fixed set of commits onto many branches with interactive conflict recovery",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Repository to operate on, overriding `workdir`
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Skip every selection prompt and take all items
    #[arg(short, long)]
    pub yes: bool,

    /// Number of recent commits searched for already-applied changes
    #[arg(long, value_name = "N")]
    pub scan_depth: Option<usize>,

    /// Run only the named step (repeatable)
    #[arg(short, long = "step", value_name = "NAME")]
    pub steps: Vec<String>,

    /// Summary output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl Cli {
    /// Apply command-line overrides on top of loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) -> Result<(), String> {
        debug!(
            workdir = ?self.workdir,
            yes = self.yes,
            scan_depth = ?self.scan_depth,
            steps = ?self.steps,
            "Cli::apply_overrides: called"
        );
        if let Some(workdir) = &self.workdir {
            config.workdir = Some(workdir.clone());
            config.base_dir = None;
        }
        if self.yes {
            config.skip_selection = true;
        }
        if let Some(depth) = self.scan_depth {
            if depth == 0 {
                return Err("--scan-depth must be at least 1".to_string());
            }
            config.scan_depth = depth;
        }
        if !self.steps.is_empty() {
            if let Some(unknown) = self.steps.iter().find(|s| !config.steps.iter().any(|step| &step.name == *s)) {
                return Err(format!("No step named '{}' in configuration", unknown));
            }
            config.steps.retain(|step| self.steps.contains(&step.name));
        }
        Ok(())
    }
}

/// Path of the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("backport")
        .join("logs")
        .join("backport.log")
}

/// Output format for the run summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
workdir: /tmp/repo
steps:
  - name: backport
    uses: cherry-pick
    targetBranches: release-1
    commitHashes: abc123
  - name: publish
    uses: push
    targetBranches: release-1
"#;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["bp", "-y", "--scan-depth", "50", "--step", "publish", "--format", "json"]);
        assert!(cli.yes);
        assert_eq!(cli.scan_depth, Some(50));
        assert_eq!(cli.steps, vec!["publish"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::from_yaml(CONFIG, None).unwrap();
        let cli = Cli::parse_from(["bp", "--workdir", "/srv/other", "--yes", "--step", "publish"]);

        cli.apply_overrides(&mut config).unwrap();
        assert_eq!(config.resolved_workdir().unwrap(), PathBuf::from("/srv/other"));
        assert!(config.skip_selection);
        assert_eq!(config.steps.len(), 1);
        assert_eq!(config.steps[0].name, "publish");
    }

    #[test]
    fn test_unknown_step_rejected() {
        let mut config = Config::from_yaml(CONFIG, None).unwrap();
        let cli = Cli::parse_from(["bp", "--step", "deploy"]);
        assert!(cli.apply_overrides(&mut config).unwrap_err().contains("deploy"));
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("backport/logs/backport.log"));
    }
}
