//! Configuration for the sampling engines and the log query engine.
//! Loaded from JSON when present; every section carries safe defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostmonConfig {
    /// System sampling engine parameters
    pub monitor: MonitorConfig,
    /// Process-filtered monitoring parameters
    pub process: ProcessMatchConfig,
    /// Log discovery/parsing tuning
    pub logs: LogAnalysisConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in seconds (fractional allowed)
    pub interval_secs: f64,
    /// Optional path (file or directory) for JSONL persistence
    pub output_path: Option<PathBuf>,
    /// Rotate the sink after this many lines
    pub rotate_max_lines: Option<u64>,
    /// Rotate the sink after this many bytes
    pub rotate_max_bytes: Option<u64>,
    /// Keep collected samples in memory for the stop() report
    pub keep_in_memory: bool,
    /// Write a `.summary.json` next to the JSONL file on stop
    pub summary_on_stop: bool,
}

/// Fields of a process a filter string is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Name,
    Cmdline,
    Exe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessMatchConfig {
    /// Filter strings; a process matches when any filter matches any
    /// configured field. Empty means match everything.
    pub filters: Vec<String>,
    /// Process fields checked by the filters
    pub match_fields: Vec<MatchField>,
    pub case_sensitive: bool,
    /// Treat filters as regular expressions instead of substrings
    pub use_regex: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogAnalysisConfig {
    /// Default glob patterns for common syslog-style locations
    pub log_paths: Vec<String>,
    /// Include `.gz` rotated siblings in discovery
    pub include_rotated: bool,
    pub max_files_per_pattern: usize,
    pub max_file_size_mb: u64,
    /// Result cap applied when a query does not set its own limit
    pub default_limit: usize,
    /// Timestamp regexes tried in priority order; group 1 is the date text
    pub date_format_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60.0,
            output_path: None,
            rotate_max_lines: None,
            rotate_max_bytes: None,
            keep_in_memory: true,
            summary_on_stop: true,
        }
    }
}

impl Default for ProcessMatchConfig {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            match_fields: vec![MatchField::Name, MatchField::Cmdline],
            case_sensitive: false,
            use_regex: false,
        }
    }
}

impl Default for LogAnalysisConfig {
    fn default() -> Self {
        Self {
            log_paths: vec![
                "/var/log/syslog*".to_string(),
                "/var/log/messages*".to_string(),
                "/var/log/kern.log*".to_string(),
                "/var/log/auth.log*".to_string(),
            ],
            include_rotated: true,
            max_files_per_pattern: 10,
            max_file_size_mb: 100,
            default_limit: 100,
            date_format_patterns: vec![
                // Oct 15 14:30:45
                r"(\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})".to_string(),
                // 2023-10-15T14:30:45
                r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})".to_string(),
                // 2023-10-15 14:30:45
                r"(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})".to_string(),
            ],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl HostmonConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<HostmonConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}
