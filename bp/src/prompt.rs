//! Interactive decision points
//!
//! Workflows never read the terminal directly. Selection, confirmation and recovery decisions go
//! through [`Prompter`], implemented by [`TerminalPrompter`] for operators and by
//! [`ScriptedPrompter`] for headless runs and tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Operator choice after a failed apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryOutcome {
    /// Resume the apply after the operator resolved conflicts
    Continue,
    /// Attempt the same commit again
    Retry,
    /// Leave this commit out and move on
    Skip,
    /// Stop replicating onto the current item
    Abort,
}

impl RecoveryOutcome {
    fn key(self) -> char {
        match self {
            Self::Continue => 'c',
            Self::Retry => 'r',
            Self::Skip => 's',
            Self::Abort => 'a',
        }
    }
}

impl fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Continue => "continue",
            Self::Retry => "retry",
            Self::Skip => "skip",
            Self::Abort => "abort",
        };
        write!(f, "{}", name)
    }
}

/// How an apply attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Merge conflict or patch that failed to apply; resolvable in the working tree
    Conflict,
    /// Anything the classifier does not recognize
    Other,
}

/// Context shown to the operator when an apply needs a decision
#[derive(Debug, Clone)]
pub struct DecisionRequest<'a> {
    pub commit: &'a str,
    pub branch: &'a str,
    pub kind: FailureKind,
    /// Output of the failed command
    pub message: &'a str,
    pub hint: Option<&'a str>,
    pub options: &'a [RecoveryOutcome],
}

/// Interaction capability injected into workflows
///
/// Returning [`Error::Cancelled`] from any method ends the run without further changes.
pub trait Prompter {
    /// Pick a subset of `options`; returns selected indices in ascending order
    fn multi_select(&self, prompt: &str, options: &[String]) -> Result<Vec<usize>>;

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Choose one of `request.options`
    fn decide(&self, request: &DecisionRequest<'_>) -> Result<RecoveryOutcome>;
}

/// Readline-backed prompts on the controlling terminal
pub struct TerminalPrompter {
    editor: RefCell<DefaultEditor>,
}

impl TerminalPrompter {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| Error::Prompt(format!("Failed to initialize readline: {}", e)))?;
        Ok(Self {
            editor: RefCell::new(editor),
        })
    }

    fn read_line(&self, prompt: &str) -> Result<String> {
        match self.editor.borrow_mut().readline(prompt) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Err(Error::Cancelled),
            Err(e) => Err(Error::Prompt(e.to_string())),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn multi_select(&self, prompt: &str, options: &[String]) -> Result<Vec<usize>> {
        eprint!("{}", selection_menu(prompt, options));

        loop {
            let line = self.read_line(&format!("{} ", "Select [all] (e.g. 1,3-4):".dimmed()))?;
            match parse_selection(&line, options.len()) {
                Some(selected) => return Ok(selected),
                None => eprintln!("{} Enter numbers between 1 and {}", "?".yellow(), options.len()),
            }
        }
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        let suffix = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let line = self.read_line(&format!("{} {} ", prompt, suffix.dimmed()))?;
            match line.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => eprintln!("{} Answer y or n", "?".yellow()),
            }
        }
    }

    fn decide(&self, request: &DecisionRequest<'_>) -> Result<RecoveryOutcome> {
        eprint!("{}", decision_banner(request));

        let menu: Vec<String> = request
            .options
            .iter()
            .map(|o| format!("[{}]{}", o.key(), &o.to_string()[1..]))
            .collect();
        loop {
            let line = self.read_line(&format!("{} ", menu.join(" ")))?;
            let choice = line.to_lowercase();
            let picked = request
                .options
                .iter()
                .find(|o| choice == o.to_string() || choice.chars().eq(std::iter::once(o.key())));
            match picked {
                Some(outcome) => return Ok(*outcome),
                None => eprintln!("{} Choose one of: {}", "?".yellow(), menu.join(", ")),
            }
        }
    }
}

/// Parse `1,3-4` style input into sorted zero-based indices; empty input selects everything
pub fn parse_selection(input: &str, len: usize) -> Option<Vec<usize>> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("all") {
        return Some((0..len).collect());
    }
    if input.eq_ignore_ascii_case("none") {
        return Some(Vec::new());
    }

    let mut selected = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?),
            None => {
                let n = part.parse::<usize>().ok()?;
                (n, n)
            }
        };
        if start == 0 || end > len || start > end {
            return None;
        }
        selected.extend((start - 1)..end);
    }
    selected.sort_unstable();
    selected.dedup();
    Some(selected)
}

/// Printed to stderr; stdout only carries the run summary
fn selection_menu(prompt: &str, options: &[String]) -> String {
    let mut text = format!("\n{}\n", prompt.bright_cyan());
    for (i, option) in options.iter().enumerate() {
        text.push_str(&format!("  {:>3}) {}\n", (i + 1).to_string().yellow(), option));
    }
    text
}

fn decision_banner(request: &DecisionRequest<'_>) -> String {
    let label = match request.kind {
        FailureKind::Conflict => "Conflict".red().bold(),
        FailureKind::Other => "Apply failed".red().bold(),
    };
    let mut text = format!(
        "\n{} applying {} onto {}\n",
        label,
        request.commit.yellow(),
        request.branch.cyan()
    );
    for line in request.message.lines().take(20) {
        text.push_str(&format!("  {}\n", line.dimmed()));
    }
    if let Some(hint) = request.hint {
        text.push_str(&format!("{} {}\n", "hint:".yellow(), hint));
    }
    text
}

/// One scripted response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Select(Vec<usize>),
    Confirm(bool),
    Decide(RecoveryOutcome),
    Cancel,
}

/// Prompter that replays a fixed sequence of answers
///
/// When the script runs out, selections take every option and confirmations take their default.
/// A decision with no scripted answer is an error so that tests notice unexpected prompts.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<Answer>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// Every prompt shown so far
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    /// Scripted answers that were never consumed
    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }

    fn next(&self, prompt: String) -> Option<Answer> {
        debug!(%prompt, "ScriptedPrompter: prompt");
        self.asked.borrow_mut().push(prompt);
        self.answers.borrow_mut().pop_front()
    }
}

impl Prompter for ScriptedPrompter {
    fn multi_select(&self, prompt: &str, options: &[String]) -> Result<Vec<usize>> {
        match self.next(format!("select: {}", prompt)) {
            None => Ok((0..options.len()).collect()),
            Some(Answer::Select(indices)) => Ok(indices.into_iter().filter(|i| *i < options.len()).collect()),
            Some(Answer::Cancel) => Err(Error::Cancelled),
            Some(other) => Err(Error::Prompt(format!("expected a selection answer, got {:?}", other))),
        }
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        match self.next(format!("confirm: {}", prompt)) {
            None => Ok(default),
            Some(Answer::Confirm(answer)) => Ok(answer),
            Some(Answer::Cancel) => Err(Error::Cancelled),
            Some(other) => Err(Error::Prompt(format!("expected a confirmation answer, got {:?}", other))),
        }
    }

    fn decide(&self, request: &DecisionRequest<'_>) -> Result<RecoveryOutcome> {
        let offered: Vec<String> = request.options.iter().map(ToString::to_string).collect();
        match self.next(format!("decide: {} [{}]", request.commit, offered.join(","))) {
            Some(Answer::Decide(outcome)) => Ok(outcome),
            Some(Answer::Cancel) => Err(Error::Cancelled),
            Some(other) => Err(Error::Prompt(format!("expected a decision answer, got {:?}", other))),
            None => Err(Error::Prompt(format!("no scripted decision for {}", request.commit))),
        }
    }
}
