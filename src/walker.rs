//! Bounded CNAME chain traversal.
//!
//! A query may resolve through a chain of aliases; any intermediate target
//! can itself be blocked. [`ResponseWalker`] walks the answer section in
//! order and re-evaluates each CNAME target through the [`PolicyEngine`],
//! stopping on the first block or after 8 CNAME records, whichever comes
//! first.
//!
//! This crate has no DNS wire-format parser of its own (a non-goal), so the
//! walker is generic over [`AnswerRecord`] — the surrounding transport layer
//! implements that trait for whatever record type it already parses.

use crate::engine::{PolicyEngine, QueryContext};

/// Record class, as carried on the wire. Only `Internet` answers are
/// eligible to consume the alias budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    Internet,
    Other,
}

/// Record type, as carried on the wire. Only `Cname` answers are eligible
/// to consume the alias budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Cname,
    Other,
}

/// Minimal view a DNS answer record must expose for chain-walking purposes.
pub trait AnswerRecord {
    fn class(&self) -> RecordClass;
    fn rtype(&self) -> RecordType;
    /// The CNAME target, normalized or not — `ResponseWalker` normalizes it
    /// before evaluation regardless.
    fn cname_target(&self) -> Option<&str>;
}

/// The maximum number of Internet-class CNAME records inspected per
/// response. Bounds the cost of a pathologically long or cyclic alias
/// chain to constant work per query.
pub const MAX_ALIAS_RECORDS: usize = 8;

/// A minimal [`AnswerRecord`] implementation for tests and for embedding
/// code that hasn't yet wired up its own wire-format record type.
#[derive(Debug, Clone)]
pub struct SimpleAnswerRecord {
    pub class: RecordClass,
    pub rtype: RecordType,
    pub target: Option<String>,
}

impl AnswerRecord for SimpleAnswerRecord {
    fn class(&self) -> RecordClass {
        self.class
    }

    fn rtype(&self) -> RecordType {
        self.rtype
    }

    fn cname_target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

/// Walks a response's answer records, re-evaluating each CNAME target
/// through `engine`.
pub struct ResponseWalker<'a> {
    engine: &'a PolicyEngine,
}

impl<'a> ResponseWalker<'a> {
    pub fn new(engine: &'a PolicyEngine) -> Self {
        ResponseWalker { engine }
    }

    /// Walks `answers` in order against `original_qname`, updating `ctx` in
    /// place. Stops on the first block or after `MAX_ALIAS_RECORDS` CNAME
    /// records, whichever comes first. Non-CNAME and non-Internet records
    /// are skipped without consuming the budget.
    pub fn walk<R: AnswerRecord>(&self, ctx: &mut QueryContext, original_qname: &str, answers: &[R]) {
        let mut consumed = 0usize;

        for record in answers {
            if consumed >= MAX_ALIAS_RECORDS {
                break;
            }
            if record.class() != RecordClass::Internet || record.rtype() != RecordType::Cname {
                continue;
            }
            let Some(target) = record.cname_target() else {
                continue;
            };

            consumed += 1;
            self.engine.evaluate_query_aliased(ctx, target, Some(original_qname));

            if ctx.is_rejected() {
                break;
            }
        }
    }
}
