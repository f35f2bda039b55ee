//! Name-blocking policy engine for a recursive/forwarding DNS proxy.
//!
//! Given a textual ruleset of name patterns — optionally gated by
//! time-of-week windows — this crate decides whether a query name (or a
//! CNAME alias target found while walking a response) should be rejected,
//! and appends a formatted audit line for every reject decision.
//!
//! The pieces, leaves first:
//!
//! - [`pattern`] compiles rule text into an indexed [`pattern::PatternMatcher`].
//! - [`weekly`] represents named sets of time-of-week windows.
//! - [`ruleset`] parses the rule-file grammar, binding rules to named
//!   time windows from a [`weekly::WeeklyRangesCatalog`].
//! - [`engine`] is the query-time façade, [`engine::PolicyEngine`].
//! - [`walker`] walks a response's CNAME chain, re-evaluating each target.
//! - [`audit`] is the rotating, formatted append-only log writer.
//! - [`config`] loads an [`config::EngineConfig`] from TOML for hosts that
//!   want a ready-made collaborator instead of wiring the pieces by hand.
//!
//! DNS wire-format parsing, upstream resolution, answer caching, and the
//! whitelisting policy itself are out of scope; this crate only consumes a
//! ruleset, a time-range catalog, and per-query context, and only honors a
//! `whitelisted` session flag set by another component.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod ruleset;
pub mod walker;
pub mod weekly;

pub use audit::{AuditFormat, AuditRecord, AuditSink, RotationPolicy};
pub use engine::{global_engine, set_global_engine, Decision, PolicyEngine, QueryContext, SessionFlags, TransportKind};
pub use error::{AuditInitError, ConfigError, PatternError, RuleSetError, WeeklyRangesError};
pub use pattern::{PatternKind, PatternMatcher};
pub use ruleset::{LoadReport, LoadWarning};
pub use walker::{AnswerRecord, RecordClass, RecordType, ResponseWalker, SimpleAnswerRecord};
pub use weekly::{WeeklyRanges, WeeklyRangesCatalog};
