//! Rule file loading.
//!
//! Turns the textual rule-file grammar into a populated [`PatternMatcher`].
//! The loader is best-effort: a bad line is logged and skipped, never
//! aborting the whole load.

use crate::error::RuleSetError;
use crate::pattern::PatternMatcher;
use crate::weekly::WeeklyRangesCatalog;
use std::path::Path;
use tracing::warn;

/// A single degraded line encountered while loading, surfaced for operator
/// tooling (the CLI's `check` subcommand) in addition to the `tracing::warn!`
/// emitted at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    SyntaxError { line: usize, message: String },
    MultipleAtSigns { line: usize },
    UnknownTimeRange { line: usize, name: String },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadWarning::SyntaxError { line, message } => {
                write!(f, "line {line}: {message}")
            }
            LoadWarning::MultipleAtSigns { line } => {
                write!(f, "line {line}: more than one '@' in rule line")
            }
            LoadWarning::UnknownTimeRange { line, name } => {
                write!(f, "line {line}: unknown time range '{name}', rule inserted without a gate")
            }
        }
    }
}

/// Result of [`load`]: the compiled matcher plus any lines that were
/// skipped or degraded along the way.
#[derive(Debug)]
pub struct LoadReport {
    pub matcher: PatternMatcher,
    pub warnings: Vec<LoadWarning>,
}

/// Parses `text` (the rule file contents) into a [`PatternMatcher`], binding
/// `@<name>` suffixes to entries in `catalog`.
///
/// Grammar: `<pattern>[ @<time_range_name>]`, `#` comments and blank lines
/// ignored, surrounding whitespace trimmed around the `@`.
pub fn load(text: &str, catalog: &WeeklyRangesCatalog) -> LoadReport {
    let mut matcher = PatternMatcher::new();
    let mut warnings = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let at_count = line.matches('@').count();
        if at_count > 1 {
            warn!(line_number, "more than one '@' in rule line, skipping");
            warnings.push(LoadWarning::MultipleAtSigns { line: line_number });
            continue;
        }

        let (pattern_text, gate_name) = match line.split_once('@') {
            Some((pat, name)) => (pat.trim(), Some(name.trim())),
            None => (line, None),
        };

        let time_gate = match gate_name {
            None => None,
            Some(name) if name.is_empty() => None,
            Some(name) => match catalog.get(name) {
                Some(ranges) => Some(ranges.clone()),
                None => {
                    warn!(line_number, name, "unknown time range, inserting rule without a gate");
                    warnings.push(LoadWarning::UnknownTimeRange {
                        line: line_number,
                        name: name.to_string(),
                    });
                    None
                }
            },
        };

        if let Err(err) = matcher.add(pattern_text, time_gate, line_number) {
            warn!(line_number, error = %err, "skipping malformed pattern");
            warnings.push(LoadWarning::SyntaxError { line: line_number, message: err.to_string() });
        }
    }

    LoadReport { matcher, warnings }
}

/// Reads `path` and loads it the same way [`load`] does. Unlike per-line
/// syntax problems, a missing or unreadable rule file fails the whole
/// startup instead of producing an empty matcher.
pub fn load_file(path: &Path, catalog: &WeeklyRangesCatalog) -> Result<LoadReport, RuleSetError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| RuleSetError::Read { path: path.to_path_buf(), source })?;
    Ok(load(&text, catalog))
}
