//! Pattern compilation and matching.
//!
//! This module is the static side of the engine: turning rule text into a
//! [`PatternMatcher`] that can be evaluated against a query name in
//! sub-linear time for the common suffix case.
//!
//! ## Evaluation order
//!
//! `Exact -> Suffix -> Prefix -> Substring -> Pattern`, first match wins,
//! first-inserted rule wins within a container. This ordering is load-bearing
//! and must not be reordered: a name that would match both a coarse suffix
//! rule and a narrower exact rule must resolve to the exact one.
//!
//! ## Extension points
//!
//! Adding a new pattern kind means: add a variant to [`PatternKind`], add a
//! classification arm in [`classify`], add a container to [`PatternMatcher`],
//! and insert it into `eval`'s ordered scan.

use crate::error::PatternError;
use crate::weekly::WeeklyRanges;
use regex::Regex;
use std::collections::HashMap;

pub(crate) type RuleId = usize;

/// How a compiled pattern matches a query name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Exact,
    Suffix,
    Prefix,
    Substring,
    Pattern,
}

/// A single compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: PatternKind,
    pub raw_text: String,
    pub line_number: usize,
    pub time_gate: Option<WeeklyRanges>,
}

/// Classifies normalized pattern text into a [`PatternKind`] and the key
/// used to index it. A leading `=` forces [`PatternKind::Exact`]; a `?`
/// anywhere forces [`PatternKind::Pattern`]; otherwise a single leading
/// and/or trailing `*` selects `Suffix`/`Prefix`/`Substring`, and anything
/// else containing `*` (including a doubled `**`) falls through to
/// `Pattern` so it is compiled as a regex instead of silently absorbed into
/// a label-aligned match.
fn classify(pattern: &str) -> Result<(PatternKind, String), PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }

    if let Some(rest) = pattern.strip_prefix('=') {
        if rest.is_empty() || rest.contains(['*', '?']) {
            return Err(PatternError::InvalidWildcard(pattern.to_string()));
        }
        return Ok((PatternKind::Exact, rest.to_string()));
    }

    if pattern.contains('?') {
        return classify_wildcard(pattern);
    }

    let after_prefix = pattern.strip_prefix('*');
    let starts = after_prefix.is_some();
    let without_leading = after_prefix.unwrap_or(pattern);

    let after_suffix = without_leading.strip_suffix('*').filter(|_| !without_leading.is_empty());
    let ends = after_suffix.is_some();
    let inner = after_suffix.unwrap_or(without_leading);

    if inner.contains('*') {
        return classify_wildcard(pattern);
    }

    match (starts, ends) {
        (true, true) => Ok((PatternKind::Substring, inner.to_string())),
        (true, false) => Ok((PatternKind::Suffix, inner.to_string())),
        (false, true) => Ok((PatternKind::Prefix, inner.to_string())),
        (false, false) => Ok((PatternKind::Suffix, pattern.to_string())),
    }
}

fn classify_wildcard(pattern: &str) -> Result<(PatternKind, String), PatternError> {
    if !pattern.contains(['*', '?']) {
        return Err(PatternError::InvalidWildcard(pattern.to_string()));
    }
    Ok((PatternKind::Pattern, pattern.to_string()))
}

/// Compiles a shell-style glob (`*`, `?`) to an anchored regex.
fn glob_to_regex(glob: &str) -> Regex {
    let mut out = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).expect("glob_to_regex always produces a valid pattern")
}

/// Normalizes a DNS name: lowercase, trailing root dot stripped.
pub fn normalize(name: &str) -> String {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    trimmed.to_ascii_lowercase()
}

#[derive(Debug, Default)]
struct SuffixTrieNode {
    children: HashMap<String, SuffixTrieNode>,
    /// Rule ids terminating exactly at this node, in insertion order.
    terminal: Vec<RuleId>,
}

/// A reversed-label trie for label-aligned suffix matching in sub-linear time.
#[derive(Debug, Default)]
struct SuffixTrie {
    root: SuffixTrieNode,
}

impl SuffixTrie {
    fn insert(&mut self, suffix: &str, rule_id: RuleId) {
        let mut node = &mut self.root;
        for label in suffix.rsplit('.') {
            node = node.children.entry(label.to_string()).or_default();
        }
        node.terminal.push(rule_id);
    }

    /// Returns the first terminal node reached while walking labels from the
    /// rightmost (TLD-most) label inward. Because every traversed node
    /// represents a label-aligned suffix of `name` by construction, the
    /// first terminal found is the shortest (coarsest) matching suffix rule.
    fn find(&self, name: &str) -> Option<RuleId> {
        let mut node = &self.root;

        for label in name.rsplit('.') {
            match node.children.get(label) {
                Some(next) => {
                    node = next;
                    if let Some(&first) = node.terminal.first() {
                        return Some(first);
                    }
                }
                None => break,
            }
        }

        None
    }
}

/// Compiled ruleset, indexed by [`PatternKind`] for sub-linear lookup where
/// the data structure supports it (`Exact`, `Suffix`); `Prefix`, `Substring`
/// and `Pattern` are expected to hold few rules and are scanned linearly.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    rules: Vec<Rule>,
    exact: HashMap<String, RuleId>,
    suffix: SuffixTrie,
    prefix: Vec<(RuleId, String)>,
    substring: Vec<(RuleId, String)>,
    pattern: Vec<(RuleId, Regex)>,
}

/// Outcome of [`PatternMatcher::eval`].
pub struct MatchOutcome<'a> {
    pub reject: bool,
    pub reason: &'a str,
    pub time_gate: Option<&'a WeeklyRanges>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and stores `pattern_text`, optionally gated by `time_gate`.
    /// Called only during construction; never mutates after serving begins.
    pub fn add(
        &mut self,
        pattern_text: &str,
        time_gate: Option<WeeklyRanges>,
        line_number: usize,
    ) -> Result<(), PatternError> {
        let normalized = normalize(pattern_text);
        let (kind, key) = classify(&normalized)?;

        let rule_id = self.rules.len();
        self.rules.push(Rule { kind, raw_text: pattern_text.to_string(), line_number, time_gate });

        match kind {
            PatternKind::Exact => {
                self.exact.entry(key).or_insert(rule_id);
            }
            PatternKind::Suffix => self.suffix.insert(&key, rule_id),
            PatternKind::Prefix => self.prefix.push((rule_id, key)),
            PatternKind::Substring => self.substring.push((rule_id, key)),
            PatternKind::Pattern => self.pattern.push((rule_id, glob_to_regex(&key))),
        }

        Ok(())
    }

    /// Evaluates `name` against all compiled rules, honoring the
    /// Exact -> Suffix -> Prefix -> Substring -> Pattern priority order.
    pub fn eval(&self, name: &str) -> MatchOutcome<'_> {
        let normalized = normalize(name);

        if let Some(&rule_id) = self.exact.get(&normalized) {
            return self.outcome(rule_id);
        }

        if let Some(rule_id) = self.suffix.find(&normalized) {
            return self.outcome(rule_id);
        }

        for (rule_id, key) in &self.prefix {
            if normalized.starts_with(key.as_str()) {
                return self.outcome(*rule_id);
            }
        }

        for (rule_id, key) in &self.substring {
            if normalized.contains(key.as_str()) {
                return self.outcome(*rule_id);
            }
        }

        for (rule_id, re) in &self.pattern {
            if re.is_match(&normalized) {
                return self.outcome(*rule_id);
            }
        }

        MatchOutcome { reject: false, reason: "", time_gate: None }
    }

    fn outcome(&self, rule_id: RuleId) -> MatchOutcome<'_> {
        let rule = &self.rules[rule_id];
        MatchOutcome { reject: true, reason: &rule.raw_text, time_gate: rule.time_gate.as_ref() }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher_from(lines: &[(&str, Option<WeeklyRanges>)]) -> PatternMatcher {
        let mut m = PatternMatcher::new();
        for (i, (text, gate)) in lines.iter().enumerate() {
            m.add(text, gate.clone(), i + 1).unwrap();
        }
        m
    }

    #[test]
    fn suffix_rule_matches_subdomain_but_not_lookalike() {
        let m = matcher_from(&[("ads.example", None)]);
        assert!(m.eval("foo.ads.example").reject);
        assert!(!m.eval("fooads.example").reject);
    }

    #[test]
    fn exact_rule_does_not_match_subdomains() {
        let m = matcher_from(&[("=only.example", None)]);
        assert!(m.eval("only.example").reject);
        assert!(!m.eval("sub.only.example").reject);
    }

    #[test]
    fn embedded_wildcard_compiles_to_anchored_regex() {
        let m = matcher_from(&[("*.trk.*", None)]);
        assert!(m.eval("a.trk.net").reject);
        assert!(!m.eval("trk.net").reject);
    }

    #[test]
    fn matching_is_case_insensitive_and_ignores_trailing_dot() {
        let m = matcher_from(&[("Bad.Example", None)]);
        let out = m.eval("BAD.example.");
        assert!(out.reject);
    }

    #[test]
    fn doubled_leading_star_falls_through_to_pattern_kind() {
        // A single leading star is Suffix and requires a label boundary;
        // a doubled one is not absorbed into that key and must compile as
        // an unanchored regex instead, matching even without a dot.
        let suffix = matcher_from(&[("*ads.example", None)]);
        assert!(!suffix.eval("xads.example").reject);

        let pattern = matcher_from(&[("**ads.example", None)]);
        assert!(pattern.eval("xads.example").reject);
        assert!(pattern.eval("foo.ads.example").reject);
    }

    #[test]
    fn prefix_pattern() {
        let m = matcher_from(&[("evil*", None)]);
        assert!(m.eval("evilstuff.net").reject);
        assert!(!m.eval("notevil.net").reject);
    }

    #[test]
    fn substring_pattern() {
        let m = matcher_from(&[("*porn*", None)]);
        assert!(m.eval("somepornsite.com").reject);
        assert!(!m.eval("clean.com").reject);
    }

    #[test]
    fn exact_beats_suffix() {
        let m = matcher_from(&[("example.com", None), ("=sub.example.com", None)]);
        let out = m.eval("sub.example.com");
        assert!(out.reject);
        assert_eq!(out.reason, "=sub.example.com");
    }

    #[test]
    fn first_inserted_wins_within_container() {
        let m = matcher_from(&[("example.com", None), ("example.com", None)]);
        let out = m.eval("sub.example.com");
        assert_eq!(out.reason, "example.com");
    }

    #[test]
    fn pass_through_unmatched() {
        let m = matcher_from(&[("ads.example", None)]);
        assert!(!m.eval("safe.example").reject);
    }

    #[test]
    fn bare_pattern_is_suffix_not_prefix() {
        // "example.com" with no wildcards must be Suffix so "foo.example.com"
        // matches but "example.comx" does not.
        let m = matcher_from(&[("example.com", None)]);
        assert!(m.eval("foo.example.com").reject);
        assert!(!m.eval("example.comx").reject);
    }
}
