use blockname::engine::{PolicyEngine, QueryContext, SessionFlags, TransportKind};
use blockname::walker::{RecordClass, RecordType, ResponseWalker, SimpleAnswerRecord};
use blockname::{config, ruleset, weekly::WeeklyRanges, weekly::WeeklyRangesCatalog};
use std::net::{IpAddr, Ipv4Addr};

fn ctx() -> QueryContext {
    QueryContext::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5)), TransportKind::Udp, SessionFlags::new())
}

#[test]
fn end_to_end_rule_file_drives_query_decisions() {
    let rule_text = "\
# comment
ads.example
=strict.example.com
*.trk.*
evil*
*porn*
social.example @weekday-eve
";

    let mut catalog = WeeklyRangesCatalog::new();
    catalog.insert("weekday-eve", WeeklyRanges::parse("Mon-Fri 17:00-22:00").unwrap());

    let report = ruleset::load(rule_text, &catalog);
    assert!(report.warnings.is_empty());
    assert_eq!(report.matcher.len(), 6);

    let engine = PolicyEngine::new(report.matcher, None);

    let mut pass = ctx();
    engine.evaluate_query(&mut pass, 1, "fooads.example");
    assert!(!pass.is_rejected());

    let mut reject = ctx();
    engine.evaluate_query(&mut reject, 1, "foo.ads.example");
    assert!(reject.is_rejected());
    assert_eq!(reject.reason(), Some("ads.example"));
}

#[test]
fn end_to_end_whitelisting_bypasses_blocked_name() {
    let report = ruleset::load("ads.example\n", &WeeklyRangesCatalog::new());
    let engine = PolicyEngine::new(report.matcher, None);

    let mut context = ctx();
    context.session_flags.set("whitelisted", "yes");
    engine.evaluate_query(&mut context, 1, "foo.ads.example");
    assert!(!context.is_rejected());
}

#[test]
fn end_to_end_cname_chain_blocks_with_alias_reason() {
    let report = ruleset::load("tracker.net\n", &WeeklyRangesCatalog::new());
    let engine = PolicyEngine::new(report.matcher, None);
    let walker = ResponseWalker::new(&engine);

    let mut context = ctx();
    let answers = vec![
        SimpleAnswerRecord { class: RecordClass::Internet, rtype: RecordType::Cname, target: Some("a.tracker.net".to_string()) },
        SimpleAnswerRecord { class: RecordClass::Internet, rtype: RecordType::Cname, target: Some("b".to_string()) },
    ];
    walker.walk(&mut context, "x", &answers);

    assert!(context.is_rejected());
    assert_eq!(context.reason(), Some("tracker.net (alias for [x])"));
}

#[test]
fn end_to_end_config_file_drives_a_real_engine() {
    let dir = tempfile::tempdir().unwrap();
    let rule_path = dir.path().join("rules.txt");
    let log_path = dir.path().join("blocked.log");
    std::fs::write(&rule_path, "ads.example\n").unwrap();

    let toml = format!(
        "block_name_file = {rule:?}\nblock_name_log_file = {log:?}\nblock_name_format = \"tsv\"\n",
        rule = rule_path.to_str().unwrap(),
        log = log_path.to_str().unwrap(),
    );
    let cfg = config::load_from_str(&toml, "in-memory").unwrap();

    let report = ruleset::load_file(cfg.block_name_file_path().unwrap(), &WeeklyRangesCatalog::new()).unwrap();
    let sink = blockname::AuditSink::open(&log_path, &cfg.block_name_format, cfg.rotation_policy()).unwrap();
    let engine = PolicyEngine::new(report.matcher, Some(sink));

    let mut context = ctx();
    engine.evaluate_query(&mut context, 1, "foo.ads.example");
    assert!(context.is_rejected());

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(contents.lines().count(), 1);
}

#[test]
fn end_to_end_audit_line_written_before_reject_observed() {
    use blockname::{AuditSink, RotationPolicy};

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("blocked.log");
    let sink = AuditSink::open(&log_path, "tsv", RotationPolicy::default()).unwrap();

    let report = ruleset::load("ads.example\n", &WeeklyRangesCatalog::new());
    let engine = PolicyEngine::new(report.matcher, Some(sink));

    let mut context = ctx();
    engine.evaluate_query(&mut context, 1, "foo.ads.example");
    assert!(context.is_rejected());

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("192.0.2.5"));
    assert!(contents.contains("\"ads.example\""));
}
