//! Crate-wide error types.
//!
//! Configuration and startup errors are loud: they bubble up as a typed
//! [`ConfigError`] / [`AuditInitError`] / [`RuleSetError`] and the CLI turns
//! them into a non-zero exit. Hot-path errors (malformed queries, audit I/O
//! failures) never surface here — they are swallowed or treated as a silent
//! no-op close to where they occur instead.

use std::path::PathBuf;

/// Errors that can occur while compiling a single pattern (`PatternMatcher::add`).
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
    #[error("pattern '{0}' mixes wildcards in an unsupported way")]
    InvalidWildcard(String),
}

/// Errors surfaced while loading an `EngineConfig` from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

/// Errors surfaced while constructing an [`crate::audit::AuditSink`].
#[derive(Debug, thiserror::Error)]
pub enum AuditInitError {
    #[error("unknown audit log format '{0}' (expected \"tsv\" or \"ltsv\")")]
    UnknownFormat(String),
    #[error("cannot open audit log file {path}: {source}")]
    Open { path: PathBuf, source: std::io::Error },
}

/// Errors surfaced while parsing a compact weekly-range spec string
/// (`WeeklyRanges::parse`). Construction from structured intervals
/// (`WeeklyRanges::new`) is infallible.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum WeeklyRangesError {
    #[error("empty weekly range spec")]
    Empty,
    #[error("bad range group '{0}': expected '<days> <HH:MM>-<HH:MM>'")]
    BadGroup(String),
    #[error("unknown day token '{0}'")]
    BadDay(String),
    #[error("bad time '{0}': expected HH:MM")]
    BadTime(String),
}

/// Errors surfaced while loading a rule file from disk
/// ([`crate::ruleset::load_file`]). Per-line syntax problems never produce
/// this error — they are logged and the line is skipped; this is reserved
/// for a missing or unreadable rule file, which fails startup outright.
#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    #[error("cannot read rule file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
}
