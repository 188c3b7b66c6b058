//! Best-effort line parser: timestamp, severity, `name[pid]:` token, and
//! message extraction. Never fails; malformed input yields an entry with
//! unset fields.

use super::{LogEntry, Severity};
use chrono::{Datelike, Local, NaiveDateTime};
use regex::Regex;
use std::path::Path;
use tracing::warn;

/// `(strptime format, needs current year prepended)` tried per regex match.
const TIMESTAMP_FORMATS: [(&str, bool); 3] = [
    ("%b %d %H:%M:%S", true),
    ("%Y-%m-%dT%H:%M:%S", false),
    ("%Y-%m-%d %H:%M:%S", false),
];

pub struct LogParser {
    date_patterns: Vec<Regex>,
    process_re: Regex,
    message_re: Regex,
}

impl LogParser {
    /// Compile the configured timestamp patterns; invalid ones are
    /// skipped with a warning so one bad pattern never disables parsing.
    pub fn new(date_format_patterns: &[String]) -> Self {
        let date_patterns = date_format_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "ignoring invalid timestamp pattern");
                    None
                }
            })
            .collect();
        Self {
            date_patterns,
            process_re: Regex::new(r"(\w+)\[(\d+)\]:").expect("valid process pattern"),
            // Greedy prefix pins the capture to the last colon boundary.
            message_re: Regex::new(r"^.*:\s*(.+)$").expect("valid message pattern"),
        }
    }

    fn parse_timestamp(&self, line: &str) -> Option<NaiveDateTime> {
        for re in &self.date_patterns {
            let Some(captures) = re.captures(line) else { continue };
            let matched = captures.get(1).or_else(|| captures.get(0))?.as_str();
            for (format, needs_year) in TIMESTAMP_FORMATS {
                let parsed = if needs_year {
                    // Syslog timestamps carry no year; assume the current one.
                    let year = Local::now().year();
                    NaiveDateTime::parse_from_str(
                        &format!("{year} {matched}"),
                        &format!("%Y {format}"),
                    )
                } else {
                    NaiveDateTime::parse_from_str(matched, format)
                };
                if let Ok(ts) = parsed {
                    return Some(ts);
                }
            }
        }
        None
    }

    /// Parse one raw line into a [`LogEntry`].
    pub fn parse(&self, line: &str, file_path: &Path, line_number: u64) -> LogEntry {
        let raw_line = line.trim().to_string();

        let (process, pid) = match self.process_re.captures(line) {
            Some(captures) => (
                captures.get(1).map(|m| m.as_str().to_string()),
                captures.get(2).and_then(|m| m.as_str().parse().ok()),
            ),
            None => (None, None),
        };

        // Fallback chain keeps `message` non-empty for any non-empty input:
        // trimmed raw line, then the untrimmed line for whitespace-only input.
        let message = self
            .message_re
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if raw_line.is_empty() {
                    line.to_string()
                } else {
                    raw_line.clone()
                }
            });

        LogEntry {
            timestamp: self.parse_timestamp(line),
            level: Severity::detect(line),
            process,
            pid,
            message,
            raw_line,
            file_path: file_path.to_path_buf(),
            line_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogAnalysisConfig;
    use chrono::{NaiveDate, Timelike};

    fn parser() -> LogParser {
        LogParser::new(&LogAnalysisConfig::default().date_format_patterns)
    }

    #[test]
    fn parses_syslog_line() {
        let p = parser();
        let entry = p.parse(
            "Oct 15 14:30:45 web01 nginx[1234]: ERROR: disk full on /var",
            Path::new("/var/log/syslog"),
            7,
        );
        let ts = entry.timestamp.expect("timestamp");
        assert_eq!((ts.month(), ts.day()), (10, 15));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (14, 30, 45));
        assert_eq!(ts.year(), Local::now().year());
        assert_eq!(entry.process.as_deref(), Some("nginx"));
        assert_eq!(entry.pid, Some(1234));
        assert_eq!(entry.level, Some(Severity::Error));
        assert_eq!(entry.message, "disk full on /var");
        assert_eq!(entry.line_number, 7);
    }

    #[test]
    fn parses_iso_timestamp() {
        let p = parser();
        let entry = p.parse(
            "2023-10-15T14:30:45 app WARNING something odd",
            Path::new("app.log"),
            1,
        );
        assert_eq!(
            entry.timestamp,
            NaiveDate::from_ymd_opt(2023, 10, 15)
                .unwrap()
                .and_hms_opt(14, 30, 45)
        );
        assert_eq!(entry.level, Some(Severity::Warning));
    }

    #[test]
    fn message_uses_last_colon_boundary() {
        let p = parser();
        let entry = p.parse(
            "Oct 15 14:30:45 host sshd[22]: pam_unix: session opened",
            Path::new("auth.log"),
            1,
        );
        assert_eq!(entry.message, "session opened");
    }

    #[test]
    fn malformed_line_degrades_to_raw_message() {
        let p = parser();
        let entry = p.parse("  just some text without structure  ", Path::new("x.log"), 3);
        assert_eq!(entry.timestamp, None);
        assert_eq!(entry.level, None);
        assert_eq!(entry.process, None);
        assert_eq!(entry.pid, None);
        assert_eq!(entry.message, "just some text without structure");
        assert_eq!(entry.raw_line, "just some text without structure");
    }

    #[test]
    fn message_never_empty_even_for_trailing_colon() {
        let p = parser();
        let entry = p.parse("weird line ends with:", Path::new("x.log"), 1);
        assert!(!entry.message.is_empty());
    }

    #[test]
    fn whitespace_only_line_keeps_nonempty_message() {
        let p = parser();
        let entry = p.parse("   \t ", Path::new("x.log"), 1);
        assert!(!entry.message.is_empty());
        assert_eq!(entry.message, "   \t ");
    }

    #[test]
    fn invalid_configured_pattern_is_skipped() {
        let p = LogParser::new(&["(unclosed".to_string(), r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})".to_string()]);
        let entry = p.parse("2023-01-02T03:04:05 ok", Path::new("x.log"), 1);
        assert!(entry.timestamp.is_some());
    }
}
