//! Log discovery, parsing, and querying.
//!
//! Linux-first: scans common syslog-style locations with conservative
//! bounds, reads gzip-rotated files transparently, and returns structured
//! entries for downstream filtering.

mod discovery;
mod parser;
mod query;

pub use discovery::discover_log_files;
pub use parser::LogParser;
pub use query::{statistics, DateRange, LogQueryEngine, LogStatistics};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fixed severity vocabulary, most severe first. Detection scans a line
/// for the first token in this order; absence leaves the level unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Severity {
    /// All levels in detection priority order.
    pub const PRIORITY: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }

    /// First severity token found anywhere in the line, case-insensitive.
    pub fn detect(line: &str) -> Option<Severity> {
        let upper = line.to_uppercase();
        Self::PRIORITY
            .iter()
            .find(|level| upper.contains(level.as_str()))
            .copied()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort structured parse of one raw log line. `message` is never
/// empty; it falls back to the trimmed raw line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub message: String,
    pub raw_line: String,
    pub file_path: PathBuf,
    pub line_number: u64,
}

/// Input contract to [`LogQueryEngine::query`]. All filters are ANDed;
/// unset filters pass everything.
#[derive(Debug, Clone)]
pub struct LogQuery {
    /// Case-insensitive substring over the raw line
    pub text_filter: String,
    /// Allowed severities; entries without a level are excluded when set
    pub level_filter: Option<Vec<Severity>>,
    /// Case-insensitive substring over the extracted process name
    pub process_filter: String,
    /// Case-insensitive regex over the raw line; a malformed pattern
    /// disables regex filtering for this query
    pub regex_pattern: Option<String>,
    /// Inclusive bounds; entries without a timestamp always pass
    pub time_range: Option<(NaiveDateTime, NaiveDateTime)>,
    /// Overrides the configured discovery globs
    pub file_patterns: Option<Vec<String>>,
    /// Hard cap on returned entries; falls back to the config default
    pub limit: Option<usize>,
    /// Newest first (default true)
    pub reverse_order: bool,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            text_filter: String::new(),
            level_filter: None,
            process_filter: String::new(),
            regex_pattern: None,
            time_range: None,
            file_patterns: None,
            limit: None,
            reverse_order: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_uses_priority_order() {
        assert_eq!(
            Severity::detect("CRITICAL failure then ERROR text"),
            Some(Severity::Critical)
        );
        assert_eq!(Severity::detect("plain error line"), Some(Severity::Error));
        assert_eq!(Severity::detect("nothing to see"), None);
    }

    #[test]
    fn severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"WARNING\"");
    }
}
