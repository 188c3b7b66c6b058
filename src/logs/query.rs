//! Query engine: scatter per-file scanning across a bounded worker pool,
//! merge, sort, truncate. Read-only and idempotent; per-file failures
//! degrade to partial results.

use super::{discover_log_files, LogEntry, LogParser, LogQuery, Severity};
use crate::config::LogAnalysisConfig;
use chrono::{NaiveDateTime, Timelike};
use flate2::read::MultiGzDecoder;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Files scanned in parallel per query.
const WORKER_THREADS: usize = 4;

pub struct LogQueryEngine {
    config: LogAnalysisConfig,
    parser: LogParser,
}

impl LogQueryEngine {
    pub fn new(config: LogAnalysisConfig) -> Self {
        let parser = LogParser::new(&config.date_format_patterns);
        Self { config, parser }
    }

    pub fn config(&self) -> &LogAnalysisConfig {
        &self.config
    }

    /// Run `query` against the discovered corpus. Always returns an
    /// ordered (possibly empty) list of at most `limit` entries.
    pub fn query(&self, query: &LogQuery) -> Vec<LogEntry> {
        let limit = query.limit.unwrap_or(self.config.default_limit);
        let regex = compile_query_regex(query.regex_pattern.as_deref());
        let regex = regex.as_ref();

        let files = discover_log_files(&self.config, query.file_patterns.as_deref());
        let queue: Mutex<VecDeque<_>> = Mutex::new(files.into());

        let mut results: Vec<LogEntry> = Vec::new();
        std::thread::scope(|scope| {
            let mut workers = Vec::with_capacity(WORKER_THREADS);
            for _ in 0..WORKER_THREADS {
                workers.push(scope.spawn(|| {
                    let mut collected = Vec::new();
                    loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .pop_front();
                        let Some(path) = next else { break };
                        match self.scan_file(&path, query, regex) {
                            Ok(mut entries) => collected.append(&mut entries),
                            Err(e) => {
                                debug!(file = %path.display(), error = %e, "skipping unreadable log file");
                            }
                        }
                    }
                    collected
                }));
            }
            for worker in workers {
                match worker.join() {
                    Ok(mut entries) => results.append(&mut entries),
                    Err(_) => warn!("log scan worker panicked, results degraded"),
                }
            }
        });

        // Total order (timestamp, path, line) keeps identical queries
        // byte-identical regardless of worker scheduling.
        results.sort_by(|a, b| {
            let ka = (a.timestamp.unwrap_or(NaiveDateTime::MIN), &a.file_path, a.line_number);
            let kb = (b.timestamp.unwrap_or(NaiveDateTime::MIN), &b.file_path, b.line_number);
            if query.reverse_order {
                kb.cmp(&ka)
            } else {
                ka.cmp(&kb)
            }
        });
        results.truncate(limit);
        results
    }

    /// Stream one file, pre-filter raw lines, parse survivors, and apply
    /// the parsed-entry filters. Mid-file read errors end the scan early
    /// and return the partial result.
    fn scan_file(
        &self,
        path: &Path,
        query: &LogQuery,
        regex: Option<&Regex>,
    ) -> io::Result<Vec<LogEntry>> {
        let file = File::open(path)?;
        let mut reader: Box<dyn BufRead> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let text_filter = query.text_filter.to_lowercase();
        let process_filter = query.process_filter.to_lowercase();
        let mut entries = Vec::new();
        let mut buf = Vec::new();
        let mut line_number = 0u64;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "read failed mid-file, keeping partial results");
                    break;
                }
            }
            line_number += 1;
            // Invalid byte sequences are replaced, never fatal.
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            // Cheap line-level filters before the cost of parsing.
            if !text_filter.is_empty() && !line.to_lowercase().contains(&text_filter) {
                continue;
            }
            if let Some(re) = regex {
                if !re.is_match(line) {
                    continue;
                }
            }

            let entry = self.parser.parse(line, path, line_number);

            if let Some(levels) = &query.level_filter {
                match entry.level {
                    Some(level) if levels.contains(&level) => {}
                    _ => continue,
                }
            }
            if !process_filter.is_empty() {
                match &entry.process {
                    Some(p) if p.to_lowercase().contains(&process_filter) => {}
                    _ => continue,
                }
            }
            if let (Some((start, end)), Some(ts)) = (&query.time_range, entry.timestamp) {
                if ts < *start || ts > *end {
                    continue;
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Fold over an already-fetched entry set. Empty input yields empty
/// distributions, not an error.
pub fn statistics(entries: &[LogEntry]) -> LogStatistics {
    let mut stats = LogStatistics {
        total_entries: entries.len(),
        ..LogStatistics::default()
    };

    let timestamps: Vec<NaiveDateTime> = entries.iter().filter_map(|e| e.timestamp).collect();
    if let (Some(earliest), Some(latest)) =
        (timestamps.iter().min().copied(), timestamps.iter().max().copied())
    {
        stats.date_range = Some(DateRange {
            earliest,
            latest,
            span_hours: (latest - earliest).num_seconds() as f64 / 3600.0,
        });
    }

    for entry in entries {
        if let Some(level) = entry.level {
            *stats.level_distribution.entry(level).or_default() += 1;
        }
        if let Some(process) = &entry.process {
            *stats.process_distribution.entry(process.clone()).or_default() += 1;
        }
        if let Some(name) = entry.file_path.file_name() {
            *stats
                .file_distribution
                .entry(name.to_string_lossy().into_owned())
                .or_default() += 1;
        }
        if let Some(ts) = entry.timestamp {
            *stats.hourly_distribution.entry(ts.hour()).or_default() += 1;
        }
    }
    stats
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LogStatistics {
    pub total_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    pub level_distribution: BTreeMap<Severity, usize>,
    pub process_distribution: BTreeMap<String, usize>,
    pub file_distribution: BTreeMap<String, usize>,
    pub hourly_distribution: BTreeMap<u32, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub earliest: NaiveDateTime,
    pub latest: NaiveDateTime,
    pub span_hours: f64,
}

/// Case-insensitive compile; a malformed pattern disables regex
/// filtering for the query instead of failing it.
fn compile_query_regex(pattern: Option<&str>) -> Option<Regex> {
    let pattern = pattern?;
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "malformed query regex, ignoring regex filter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn entry(ts: Option<NaiveDateTime>, level: Option<Severity>, process: Option<&str>) -> LogEntry {
        LogEntry {
            timestamp: ts,
            level,
            process: process.map(String::from),
            pid: None,
            message: "m".to_string(),
            raw_line: "m".to_string(),
            file_path: PathBuf::from("/var/log/syslog"),
            line_number: 1,
        }
    }

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn statistics_empty_input() {
        let stats = statistics(&[]);
        assert_eq!(stats.total_entries, 0);
        assert!(stats.date_range.is_none());
        assert!(stats.level_distribution.is_empty());
    }

    #[test]
    fn statistics_distributions() {
        let entries = vec![
            entry(Some(ts(3)), Some(Severity::Error), Some("nginx")),
            entry(Some(ts(9)), Some(Severity::Error), Some("sshd")),
            entry(Some(ts(3)), Some(Severity::Info), Some("nginx")),
            entry(None, None, None),
        ];
        let stats = statistics(&entries);
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.level_distribution[&Severity::Error], 2);
        assert_eq!(stats.level_distribution[&Severity::Info], 1);
        assert_eq!(stats.process_distribution["nginx"], 2);
        assert_eq!(stats.file_distribution["syslog"], 4);
        assert_eq!(stats.hourly_distribution[&3], 2);
        let range = stats.date_range.unwrap();
        assert_eq!(range.span_hours, 6.0);
    }

    #[test]
    fn malformed_regex_compiles_to_none() {
        assert!(compile_query_regex(Some("(unclosed")).is_none());
        assert!(compile_query_regex(Some("ok.*")).is_some());
        assert!(compile_query_regex(None).is_none());
    }
}
