//! Colorized terminal output for the CLI subcommands.

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

use ansi::Palette;
use blockname::ruleset::LoadReport;

/// Prints a summary of a [`LoadReport`]: rule count and every degraded line.
pub fn print_check(path: &str, report: &LoadReport, color: bool) {
    let palette = Palette::new(color);
    println!("{}", palette.bold(format!("checked {path}")));
    println!("  rules loaded: {}", report.matcher.len());

    if report.warnings.is_empty() {
        println!("  {}", palette.paint("no warnings", ansi::GREEN));
        return;
    }

    println!("  {}", palette.paint(format!("{} warning(s):", report.warnings.len()), ansi::YELLOW));
    for warning in &report.warnings {
        println!("    {}", palette.paint(warning.to_string(), ansi::YELLOW));
    }
}

/// Prints the outcome of evaluating a single name against a matcher.
pub fn print_eval(name: &str, reject: bool, reason: Option<&str>, gated: bool, color: bool) {
    let palette = Palette::new(color);
    if reject {
        println!("{} {}", palette.bold(palette.paint("REJECT", ansi::RED)), name);
        if let Some(reason) = reason {
            println!("  reason: {reason}");
        }
        if gated {
            println!("  {}", palette.dim("(gated by a time range; evaluated against current local time)"));
        }
    } else {
        println!("{} {}", palette.bold(palette.paint("PASS", ansi::GREEN)), name);
    }
}

/// Prints the outcome of running a single name through a config-built engine.
pub fn print_decision(name: &str, reject: bool, reason: Option<&str>, color: bool) {
    let palette = Palette::new(color);
    if reject {
        println!("{} {}", palette.bold(palette.paint("REJECT", ansi::RED)), name);
        if let Some(reason) = reason {
            println!("  reason: {reason}");
        }
    } else {
        println!("{} {}", palette.bold(palette.paint("PASS", ansi::GREEN)), name);
    }
}

/// Prints a decoded audit line, field by field.
pub fn print_explain(fields: &[(String, String)], color: bool) {
    let palette = Palette::new(color);
    for (label, value) in fields {
        println!("  {}: {value}", palette.bold(label));
    }
}
