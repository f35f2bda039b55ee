//! Query-time policy façade.
//!
//! [`PolicyEngine`] is the hot-path entry point: given a query name (or a
//! CNAME alias target surfaced by [`crate::walker::ResponseWalker`]) and the
//! per-query [`QueryContext`], it consults the [`PatternMatcher`], applies
//! the time gate, and — on reject — writes one [`AuditRecord`] before
//! mutating the context's decision.

use crate::audit::{AuditRecord, AuditSink};
use crate::pattern::PatternMatcher;
use chrono::Local;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::net::IpAddr;

/// Process-wide engine handle, published once with a one-shot initializer so
/// reads stay lock-free on the hot path. An unset handle means no blocking
/// is configured and every query passes; hosts that can thread an explicit
/// `&PolicyEngine` through their own dispatch should prefer that and never
/// touch this static.
static GLOBAL_ENGINE: OnceCell<PolicyEngine> = OnceCell::new();

/// Publishes `engine` as the process-wide handle. Returns the engine back as
/// `Err` if one was already published — the slot is one-shot by design.
pub fn set_global_engine(engine: PolicyEngine) -> Result<(), PolicyEngine> {
    GLOBAL_ENGINE.set(engine)
}

/// Returns the process-wide engine, if one has been published.
pub fn global_engine() -> Option<&'static PolicyEngine> {
    GLOBAL_ENGINE.get()
}

/// Client transport for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Udp,
    Tcp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransportKind::Udp => "udp",
            TransportKind::Tcp => "tcp",
        })
    }
}

/// Per-query session flags. Only the `whitelisted` flag is consulted by the
/// engine; the rest are opaque pass-through state set by other collaborators.
#[derive(Debug, Clone, Default)]
pub struct SessionFlags(HashMap<String, String>);

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn whitelisted(&self) -> bool {
        self.0.contains_key("whitelisted")
    }
}

/// The policy decision recorded on a [`QueryContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pass,
    Reject,
}

/// Per-query mutable state, created by the transport layer and discarded
/// after dispatch.
pub struct QueryContext {
    pub client_ip: IpAddr,
    pub transport: TransportKind,
    pub session_flags: SessionFlags,
    decision: Decision,
    reason: Option<String>,
}

impl QueryContext {
    pub fn new(client_ip: IpAddr, transport: TransportKind, session_flags: SessionFlags) -> Self {
        QueryContext { client_ip, transport, session_flags, decision: Decision::Pass, reason: None }
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn is_rejected(&self) -> bool {
        self.decision == Decision::Reject
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    fn reject(&mut self, reason: String) {
        self.decision = Decision::Reject;
        self.reason = Some(reason);
    }
}

/// The query/response facade. Built once from a compiled [`PatternMatcher`]
/// and an optional [`AuditSink`]; both are read-only for the lifetime of the
/// engine.
pub struct PolicyEngine {
    matcher: PatternMatcher,
    audit: Option<AuditSink>,
}

impl PolicyEngine {
    pub fn new(matcher: PatternMatcher, audit: Option<AuditSink>) -> Self {
        PolicyEngine { matcher, audit }
    }

    /// Evaluates an incoming query's question name. `question_count` models
    /// the "exactly one question" requirement on the surrounding DNS message
    /// without this crate needing to parse wire format; any value other than
    /// 1 is a silent no-op.
    pub fn evaluate_query(&self, ctx: &mut QueryContext, question_count: usize, query_name: &str) {
        if question_count != 1 {
            return;
        }
        self.evaluate_query_aliased(ctx, query_name, None);
    }

    /// Core evaluator shared by [`Self::evaluate_query`] and the response
    /// walker's per-alias calls. `alias_for`, when set, is the original
    /// query name and gets folded into the audit reason.
    pub(crate) fn evaluate_query_aliased(&self, ctx: &mut QueryContext, query_name: &str, alias_for: Option<&str>) {
        if ctx.session_flags.whitelisted() {
            return;
        }

        let outcome = self.matcher.eval(query_name);
        if !outcome.reject {
            return;
        }

        let gate_open = match outcome.time_gate {
            Some(gate) => gate.matches(Local::now().naive_local()),
            None => true,
        };
        if !gate_open {
            return;
        }

        let reason = match alias_for {
            Some(original) => format!("{} (alias for [{original}])", outcome.reason),
            None => outcome.reason.to_string(),
        };

        if let Some(audit) = &self.audit {
            audit.write(&AuditRecord {
                client_ip: ctx.client_ip,
                query_name: query_name.to_string(),
                reason: reason.clone(),
            });
        }

        ctx.reject(reason);
    }

    /// Walks a response's answer records looking for blocked CNAME targets.
    /// `question_count` gates the call the same way [`Self::evaluate_query`]
    /// does; the walk itself is delegated to [`crate::walker::ResponseWalker`].
    pub fn evaluate_response<R: crate::walker::AnswerRecord>(
        &self,
        ctx: &mut QueryContext,
        question_count: usize,
        original_qname: &str,
        answers: &[R],
    ) {
        if question_count != 1 {
            return;
        }
        crate::walker::ResponseWalker::new(self).walk(ctx, original_qname, answers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weekly::WeeklyRanges;
    use std::net::Ipv4Addr;

    fn ctx() -> QueryContext {
        QueryContext::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), TransportKind::Udp, SessionFlags::new())
    }

    #[test]
    fn blocks_unwhitelisted_match() {
        let mut matcher = PatternMatcher::new();
        matcher.add("ads.example", None, 1).unwrap();
        let engine = PolicyEngine::new(matcher, None);

        let mut context = ctx();
        engine.evaluate_query(&mut context, 1, "foo.ads.example");
        assert!(context.is_rejected());
        assert_eq!(context.reason(), Some("ads.example"));
    }

    #[test]
    fn whitelisting_bypasses_evaluation() {
        let mut matcher = PatternMatcher::new();
        matcher.add("ads.example", None, 1).unwrap();
        let engine = PolicyEngine::new(matcher, None);

        let mut context = ctx();
        context.session_flags.set("whitelisted", "1");
        engine.evaluate_query(&mut context, 1, "foo.ads.example");
        assert!(!context.is_rejected());
    }

    #[test]
    fn malformed_question_count_is_noop() {
        let mut matcher = PatternMatcher::new();
        matcher.add("ads.example", None, 1).unwrap();
        let engine = PolicyEngine::new(matcher, None);

        let mut context = ctx();
        engine.evaluate_query(&mut context, 0, "foo.ads.example");
        assert!(!context.is_rejected());
        let mut context2 = ctx();
        engine.evaluate_query(&mut context2, 2, "foo.ads.example");
        assert!(!context2.is_rejected());
    }

    #[test]
    fn time_gated_rule_only_rejects_inside_the_window() {
        use chrono::{NaiveDate, NaiveDateTime};
        let gate = WeeklyRanges::parse("Mon-Fri 09:00-17:00").unwrap();
        let mut matcher = PatternMatcher::new();
        matcher.add("social", Some(gate), 1).unwrap();

        fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, 0).unwrap()
        }
        let noon_wed = dt(2024, 1, 10, 12, 0);
        let noon_sat = dt(2024, 1, 13, 12, 0);

        let outcome = matcher.eval("social");
        assert!(outcome.reject);
        assert!(outcome.time_gate.unwrap().matches(noon_wed));
        assert!(!outcome.time_gate.unwrap().matches(noon_sat));
    }
}
