mod debug_report;

use blockname::audit;
use blockname::config;
use blockname::engine::{PolicyEngine, QueryContext, SessionFlags, TransportKind};
use blockname::pattern::PatternMatcher;
use blockname::ruleset;
use blockname::weekly::WeeklyRangesCatalog;
use blockname::AuditFormat;
use std::io::{self, IsTerminal};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Usage(msg)) => {
            eprintln!("{msg}");
            ExitCode::from(2)
        }
        Err(Failure::Internal(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(1)
        }
    }
}

enum Failure {
    Usage(String),
    Internal(String),
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Failure::Internal(msg)
    }
}

fn run() -> Result<(), Failure> {
    let mut args = std::env::args().skip(1).peekable();
    let color = io::stdout().is_terminal();

    let Some(subcommand) = args.next() else {
        return Err(Failure::Usage(help_text()));
    };

    match subcommand.as_str() {
        "-h" | "--help" => {
            println!("{}", help_text());
            Ok(())
        }
        "-V" | "--version" => {
            println!("blockname {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "check" => run_check(args, color),
        "eval" => run_eval(args, color),
        "run" => run_run(args, color),
        "explain" => run_explain(args, color),
        other => Err(Failure::Usage(format!("error: unknown subcommand '{other}'\n\n{}", help_text()))),
    }
}

fn run_check(mut args: std::iter::Peekable<impl Iterator<Item = String>>, color: bool) -> Result<(), Failure> {
    let path = args.next().ok_or_else(|| Failure::Usage("error: 'check' expects a rule file path".to_string()))?;
    if args.peek().is_some() {
        return Err(Failure::Usage("error: 'check' takes exactly one argument".to_string()));
    }

    let text = std::fs::read_to_string(&path).map_err(|err| format!("cannot read '{path}': {err}"))?;
    let report = ruleset::load(&text, &WeeklyRangesCatalog::new());
    debug_report::print_check(&path, &report, color);
    Ok(())
}

fn run_eval(mut args: std::iter::Peekable<impl Iterator<Item = String>>, color: bool) -> Result<(), Failure> {
    let path = args
        .next()
        .ok_or_else(|| Failure::Usage("error: 'eval' expects <rule-file> <name>".to_string()))?;
    let name = args
        .next()
        .ok_or_else(|| Failure::Usage("error: 'eval' expects <rule-file> <name>".to_string()))?;
    if args.peek().is_some() {
        return Err(Failure::Usage("error: 'eval' takes exactly two arguments".to_string()));
    }

    let text = std::fs::read_to_string(&path).map_err(|err| format!("cannot read '{path}': {err}"))?;
    let report = ruleset::load(&text, &WeeklyRangesCatalog::new());
    let outcome = report.matcher.eval(&name);
    let gated = outcome.time_gate.is_some();
    let reason = if outcome.reject { Some(outcome.reason) } else { None };
    debug_report::print_eval(&name, outcome.reject, reason, gated, color);
    Ok(())
}

/// Loads an `EngineConfig` from `<config-file>`, builds a real `PolicyEngine`
/// from it (rule file, audit sink, rotation policy all driven by the file
/// on disk), and evaluates a single name against it.
fn run_run(mut args: std::iter::Peekable<impl Iterator<Item = String>>, color: bool) -> Result<(), Failure> {
    let config_path = args
        .next()
        .ok_or_else(|| Failure::Usage("error: 'run' expects <config-file> <name>".to_string()))?;
    let name = args.next().ok_or_else(|| Failure::Usage("error: 'run' expects <config-file> <name>".to_string()))?;
    if args.peek().is_some() {
        return Err(Failure::Usage("error: 'run' takes exactly two arguments".to_string()));
    }

    let cfg = config::load(Path::new(&config_path)).map_err(|err| err.to_string())?;

    let catalog = WeeklyRangesCatalog::new();
    let matcher = match cfg.block_name_file_path() {
        Some(path) => ruleset::load_file(path, &catalog).map_err(|err| err.to_string())?.matcher,
        None => PatternMatcher::new(),
    };

    let sink = if cfg.audit_enabled() {
        let path = Path::new(&cfg.block_name_log_file);
        Some(audit::AuditSink::open(path, &cfg.block_name_format, cfg.rotation_policy()).map_err(|err| err.to_string())?)
    } else {
        None
    };

    let engine = PolicyEngine::new(matcher, sink);
    let mut context = QueryContext::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), TransportKind::Udp, SessionFlags::new());
    engine.evaluate_query(&mut context, 1, &name);
    debug_report::print_decision(&name, context.is_rejected(), context.reason(), color);
    Ok(())
}

/// Decodes a previously written audit line back into its labeled fields.
fn run_explain(mut args: std::iter::Peekable<impl Iterator<Item = String>>, color: bool) -> Result<(), Failure> {
    let format_name = args
        .next()
        .ok_or_else(|| Failure::Usage("error: 'explain' expects <format> <audit-line>".to_string()))?;
    let line = args
        .next()
        .ok_or_else(|| Failure::Usage("error: 'explain' expects <format> <audit-line>".to_string()))?;
    if args.peek().is_some() {
        return Err(Failure::Usage("error: 'explain' takes exactly two arguments".to_string()));
    }

    let format: AuditFormat = format_name.parse().map_err(|err: blockname::AuditInitError| err.to_string())?;
    let fields = audit::explain_line(format, &line);
    debug_report::print_explain(&fields, color);
    Ok(())
}

fn help_text() -> String {
    format!(
        "blockname {version}

Name-blocking policy engine CLI: operate on a rule file without a live resolver.

Usage:
  blockname check <rule-file>
  blockname eval <rule-file> <name>
  blockname run <config-file> <name>
  blockname explain <format> <audit-line>

Options:
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  Internal error.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
