//! Per-item and per-step outcomes

use std::fmt;

use colored::Colorize;
use serde::Serialize;

/// Outcome bucket of one branch or task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ItemStatus {
    Succeeded { has_changes: bool, note: Option<String> },
    Warned { reason: String },
    Failed { reason: String },
}

/// Result of processing one item within a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub name: String,
    #[serde(flatten)]
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ItemResult {
    pub fn succeeded(name: impl Into<String>, has_changes: bool, note: Option<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Succeeded { has_changes, note },
            details: Vec::new(),
        }
    }

    pub fn warned(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Warned { reason: reason.into() },
            details: Vec::new(),
        }
    }

    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Failed { reason: reason.into() },
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ItemStatus::Failed { .. })
    }

    pub fn is_warned(&self) -> bool {
        matches!(self.status, ItemStatus::Warned { .. })
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self.status, ItemStatus::Succeeded { .. })
    }
}

/// Aggregated outcome of one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: String,
    pub items: Vec<ItemResult>,
    /// Warnings not tied to a single item, such as a failed branch restore
    pub warnings: Vec<String>,
}

impl StepReport {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, item: ItemResult) {
        self.items.push(item);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// True only if no item failed
    pub fn succeeded(&self) -> bool {
        !self.items.iter().any(ItemResult::is_failed)
    }

    pub fn successful(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|i| i.is_succeeded())
    }

    pub fn warned(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|i| i.is_warned())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|i| i.is_failed())
    }

    pub fn item(&self, name: &str) -> Option<&ItemResult> {
        self.items.iter().find(|i| i.name == name)
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = if self.succeeded() {
            "✓".green()
        } else {
            "✗".red()
        };
        writeln!(
            f,
            "{} {} ({} ok, {} warned, {} failed)",
            header,
            self.step.bold(),
            self.successful().count(),
            self.warned().count(),
            self.failed().count()
        )?;

        for item in &self.items {
            match &item.status {
                ItemStatus::Succeeded { has_changes, note } => {
                    let what = if *has_changes { "updated" } else { "no new changes" };
                    write!(f, "  {} {} {}", "✓".green(), item.name.cyan(), what.dimmed())?;
                    if let Some(note) = note {
                        write!(f, " ({})", note)?;
                    }
                    writeln!(f)?;
                }
                ItemStatus::Warned { reason } => {
                    writeln!(f, "  {} {} {}", "!".yellow(), item.name.cyan(), reason.yellow())?;
                }
                ItemStatus::Failed { reason } => {
                    writeln!(f, "  {} {} {}", "✗".red(), item.name.cyan(), reason.red())?;
                }
            }
            for detail in &item.details {
                writeln!(f, "      {}", detail.dimmed())?;
            }
        }

        for warning in &self.warnings {
            writeln!(f, "  {} {}", "warning:".yellow(), warning)?;
        }
        Ok(())
    }
}

/// Reports of every step that ran
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub steps: Vec<StepReport>,
    /// Name of the failed step that ended the run early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_after: Option<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(StepReport::succeeded)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.steps {
            write!(f, "{}", report)?;
        }
        if let Some(step) = &self.stopped_after {
            writeln!(f, "{} stopped after failed step '{}'", "✗".red(), step)?;
        } else if self.steps.is_empty() {
            writeln!(f, "{} no steps ran", "!".yellow())?;
        }
        Ok(())
    }
}
