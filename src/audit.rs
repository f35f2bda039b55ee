//! Append-only audit logging.
//!
//! Every rejected query produces one [`AuditRecord`], formatted as either a
//! `tsv` or `ltsv` line and appended to a rotating file. Writes are
//! serialized behind a single lock so concurrent handlers never interleave
//! partial lines; I/O failures are swallowed — a dropped log line is
//! cheaper than a dropped DNS response.

use crate::error::AuditInitError;
use chrono::Local;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// A single rejected-query record.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub client_ip: IpAddr,
    pub query_name: String,
    pub reason: String,
}

/// Selects the on-disk line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditFormat {
    Tsv,
    Ltsv,
}

impl std::str::FromStr for AuditFormat {
    type Err = AuditInitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tsv" => Ok(AuditFormat::Tsv),
            "ltsv" => Ok(AuditFormat::Ltsv),
            other => Err(AuditInitError::UnknownFormat(other.to_string())),
        }
    }
}

/// Quotes `s` the way both audit formats require: wrapped in `"…"`, with
/// `"` and `\` backslash-escaped and ASCII control characters escaped as
/// `\xNN`. Operates on `char`s, not bytes, so multi-byte UTF-8 (an
/// unencoded IDN label, non-ASCII rule text) passes through unchanged
/// instead of being split into corrupt Latin-1 codepoints.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Reverses [`quote`]: strips the surrounding `"…"` and undoes `\"`, `\\`,
/// and `\xNN` escapes. Used only by the `explain` CLI subcommand to decode
/// a previously written field back to its original text.
fn unquote(raw: &str) -> String {
    let inner = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    out.push(byte as char);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Decodes one previously written audit line back into its labeled fields,
/// for the `explain` CLI subcommand. Best-effort: a line that doesn't match
/// the expected shape still returns whatever fields could be split out.
pub fn explain_line(format: AuditFormat, line: &str) -> Vec<(String, String)> {
    let line = line.trim_end_matches('\n');
    match format {
        AuditFormat::Tsv => {
            let parts: Vec<&str> = line.splitn(4, '\t').collect();
            vec![
                ("timestamp".to_string(), parts.first().copied().unwrap_or("").trim_matches(['[', ']']).to_string()),
                ("client_ip".to_string(), parts.get(1).copied().unwrap_or("").to_string()),
                ("query_name".to_string(), unquote(parts.get(2).copied().unwrap_or(""))),
                ("reason".to_string(), unquote(parts.get(3).copied().unwrap_or(""))),
            ]
        }
        AuditFormat::Ltsv => line
            .split('\t')
            .filter_map(|field| field.split_once(':'))
            .map(|(key, value)| (key.to_string(), unquote(value)))
            .collect(),
    }
}

fn format_line(format: AuditFormat, record: &AuditRecord) -> String {
    match format {
        AuditFormat::Tsv => {
            let now = Local::now();
            format!(
                "[{}]\t{}\t{}\t{}\n",
                now.format("%Y-%m-%d %H:%M:%S"),
                record.client_ip,
                quote(&record.query_name),
                quote(&record.reason),
            )
        }
        AuditFormat::Ltsv => {
            let unix = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_secs();
            format!(
                "time:{}\thost:{}\tqname:{}\tmessage:{}\n",
                unix,
                record.client_ip,
                quote(&record.query_name),
                quote(&record.reason),
            )
        }
    }
}

/// Rotation thresholds: roll the current file over once it exceeds
/// `max_size_bytes` or has been open longer than `max_age`, keeping at most
/// `max_backups` numbered backups (`.1` newest).
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    pub max_size_bytes: u64,
    pub max_age: Duration,
    pub max_backups: u32,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy { max_size_bytes: 100 * 1024 * 1024, max_age: Duration::from_secs(7 * 24 * 3600), max_backups: 5 }
    }
}

#[derive(Debug)]
struct RotatingWriter {
    path: PathBuf,
    policy: RotationPolicy,
    file: File,
    opened_at: SystemTime,
}

impl RotatingWriter {
    fn open(path: &Path, policy: RotationPolicy) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(RotatingWriter { path: path.to_path_buf(), policy, file, opened_at: SystemTime::now() })
    }

    fn should_rotate(&self) -> bool {
        if let Ok(meta) = self.file.metadata() {
            if self.policy.max_size_bytes > 0 && meta.len() >= self.policy.max_size_bytes {
                return true;
            }
        }
        if self.policy.max_age > Duration::ZERO {
            if let Ok(age) = self.opened_at.elapsed() {
                if age >= self.policy.max_age {
                    return true;
                }
            }
        }
        false
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        if self.policy.max_backups == 0 {
            self.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
            self.opened_at = SystemTime::now();
            return Ok(());
        }

        for idx in (1..self.policy.max_backups).rev() {
            let from = backup_path(&self.path, idx);
            let to = backup_path(&self.path, idx + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }
        let _ = std::fs::rename(&self.path, backup_path(&self.path, 1));

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.opened_at = SystemTime::now();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        if self.should_rotate() {
            self.rotate()?;
        }
        self.file.write_all(line.as_bytes())
    }
}

fn backup_path(path: &Path, idx: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{idx}"));
    PathBuf::from(name)
}

/// A rotating, format-selectable append-only sink for [`AuditRecord`]s.
///
/// Writes are serialized through a single `parking_lot::Mutex`, held only
/// for the duration of one formatted line.
#[derive(Debug)]
pub struct AuditSink {
    format: AuditFormat,
    writer: Mutex<RotatingWriter>,
}

impl AuditSink {
    pub fn open(path: &Path, format_name: &str, policy: RotationPolicy) -> Result<Self, AuditInitError> {
        let format: AuditFormat = format_name.parse()?;
        let writer = RotatingWriter::open(path, policy)
            .map_err(|source| AuditInitError::Open { path: path.to_path_buf(), source })?;
        Ok(AuditSink { format, writer: Mutex::new(writer) })
    }

    /// Appends `record` to the log. I/O failures are swallowed: a dropped
    /// audit line is not worth holding up the DNS response path.
    pub fn write(&self, record: &AuditRecord) {
        let line = format_line(self.format, record);
        let mut writer = self.writer.lock();
        if let Err(err) = writer.write_line(&line) {
            tracing::debug!(error = %err, "audit write failed, dropping line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn tsv_line_matches_expected_shape() {
        let record = AuditRecord {
            client_ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5)),
            query_name: "q".to_string(),
            reason: "r".to_string(),
        };
        let line = format_line(AuditFormat::Tsv, &record);
        let re = regex::Regex::new(r#"^\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\]\t192\.0\.2\.5\t"q"\t"r"\n$"#).unwrap();
        assert!(re.is_match(&line), "line was: {line:?}");
    }

    #[test]
    fn ltsv_line_matches_expected_shape() {
        let record = AuditRecord {
            client_ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5)),
            query_name: "q".to_string(),
            reason: "r".to_string(),
        };
        let line = format_line(AuditFormat::Ltsv, &record);
        let re = regex::Regex::new(r#"^time:\d+\thost:192\.0\.2\.5\tqname:"q"\tmessage:"r"\n$"#).unwrap();
        assert!(re.is_match(&line), "line was: {line:?}");
    }

    #[test]
    fn quoting_escapes_special_characters() {
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(quote("a\tb"), "\"a\\x09b\"");
    }

    #[test]
    fn explain_line_decodes_a_tsv_line_back_to_its_fields() {
        let record = AuditRecord {
            client_ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5)),
            query_name: "foo.ads.example".to_string(),
            reason: "ads.example".to_string(),
        };
        let line = format_line(AuditFormat::Tsv, &record);
        let fields = explain_line(AuditFormat::Tsv, &line);
        assert_eq!(fields[1], ("client_ip".to_string(), "192.0.2.5".to_string()));
        assert_eq!(fields[2], ("query_name".to_string(), "foo.ads.example".to_string()));
        assert_eq!(fields[3], ("reason".to_string(), "ads.example".to_string()));
    }

    #[test]
    fn explain_line_decodes_an_ltsv_line_back_to_its_fields() {
        let record = AuditRecord {
            client_ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5)),
            query_name: "foo.ads.example".to_string(),
            reason: "ads.example".to_string(),
        };
        let line = format_line(AuditFormat::Ltsv, &record);
        let fields = explain_line(AuditFormat::Ltsv, &line);
        assert!(fields.contains(&("host".to_string(), "192.0.2.5".to_string())));
        assert!(fields.contains(&("qname".to_string(), "foo.ads.example".to_string())));
    }

    #[test]
    fn quoting_passes_multi_byte_utf8_through_unchanged() {
        assert_eq!(quote("xn--caf-dma.example"), "\"xn--caf-dma.example\"");
        assert_eq!(quote("café.example"), "\"café.example\"");
        assert_eq!(quote("日本語.example"), "\"日本語.example\"");
    }

    #[test]
    fn unknown_format_is_fatal_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let err = AuditSink::open(&path, "xml", RotationPolicy::default()).unwrap_err();
        assert!(matches!(err, AuditInitError::UnknownFormat(_)));
    }

    #[test]
    fn concurrent_writes_produce_intact_non_interleaved_lines() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = Arc::new(AuditSink::open(&path, "tsv", RotationPolicy::default()).unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let sink = Arc::clone(&sink);
            handles.push(thread::spawn(move || {
                sink.write(&AuditRecord {
                    client_ip: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                    query_name: format!("q{i}"),
                    reason: "blocked".to_string(),
                });
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 20);
        for line in &lines {
            assert!(line.ends_with('"'), "line not intact: {line:?}");
        }
    }
}
