//! Expansion of declarative branch specs into concrete branch names

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use tracing::debug;

use crate::config::BranchSpec;
use crate::error::{Error, Result};
use crate::session::WorkspaceSession;

/// Resolve `spec` to an ordered, duplicate-free list of branch names
///
/// Literal names and lists keep their configured order. Regex patterns are matched against every
/// known local and remote branch and the union of matches is returned sorted.
pub fn resolve(spec: &BranchSpec, session: &WorkspaceSession<'_>) -> Result<Vec<String>> {
    debug!(?spec, "branches::resolve: called");
    match spec {
        BranchSpec::Name(name) => Ok(vec![name.clone()]),
        BranchSpec::List(names) => Ok(dedup_preserving_order(names)),
        BranchSpec::Pattern(pattern) if !pattern.is_regex => Ok(dedup_preserving_order(&pattern.patterns)),
        BranchSpec::Pattern(pattern) => {
            let regexes = compile_patterns(&pattern.patterns)?;
            let known = known_branches(session)?;
            Ok(match_branches(&regexes, &known))
        }
    }
}

fn dedup_preserving_order(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names.iter().filter(|n| seen.insert(n.as_str())).cloned().collect()
}

/// Compile every pattern, failing on the first invalid one
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Branch names matching any of `regexes`, sorted
pub fn match_branches(regexes: &[Regex], known: &[String]) -> Vec<String> {
    let matched: BTreeSet<&String> = known
        .iter()
        .filter(|branch| regexes.iter().any(|re| re.is_match(branch)))
        .collect();
    matched.into_iter().cloned().collect()
}

/// All local and remote branch names with remote prefixes stripped
pub fn known_branches(session: &WorkspaceSession<'_>) -> Result<Vec<String>> {
    let listing = session.git().list_branches()?;
    Ok(normalize_listing(&listing))
}

/// Turn raw `git branch -a` lines into unique branch names
///
/// Drops the current-branch marker, symbolic aliases such as `remotes/origin/HEAD -> origin/main`
/// and detached-HEAD entries, and strips `remotes/<remote>/` prefixes.
pub fn normalize_listing(lines: &[String]) -> Vec<String> {
    let mut names = BTreeSet::new();
    for line in lines {
        let entry = line.trim_start_matches(['*', '+']).trim();
        if entry.is_empty() || entry.contains(" -> ") || entry.starts_with('(') {
            continue;
        }
        let name = match entry.strip_prefix("remotes/") {
            Some(remote_ref) => match remote_ref.split_once('/') {
                Some((_remote, branch)) => branch,
                None => continue,
            },
            None => entry,
        };
        names.insert(name.to_string());
    }
    names.into_iter().collect()
}
