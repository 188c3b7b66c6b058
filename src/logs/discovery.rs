//! Glob-based candidate file discovery: newest first, bounded per
//! pattern, oversized files dropped. Best-effort across patterns.

use crate::config::LogAnalysisConfig;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Expand `patterns` (or the configured defaults) into an ordered file
/// list: per pattern sorted by mtime descending, truncated to
/// `max_files_per_pattern`, files over `max_file_size_mb` excluded.
/// Unreadable patterns/files are skipped, never fatal.
pub fn discover_log_files(config: &LogAnalysisConfig, patterns: Option<&[String]>) -> Vec<PathBuf> {
    let default_patterns = &config.log_paths;
    let patterns = patterns.unwrap_or(default_patterns);
    let max_bytes = config.max_file_size_mb.saturating_mul(1024 * 1024);
    let mut discovered = Vec::new();

    for pattern in patterns {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "invalid discovery pattern");
                continue;
            }
        };

        let mut candidates: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!(pattern = %pattern, error = %e, "unreadable path during discovery");
                    continue;
                }
            };
            if !config.include_rotated && path.extension().is_some_and(|e| e == "gz") {
                continue;
            }
            let Ok(meta) = fs::metadata(&path) else { continue };
            if !meta.is_file() {
                continue;
            }
            let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
            candidates.push((path, mtime, meta.len()));
        }

        // mtime descending; path as tie-break so repeat calls agree.
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(config.max_files_per_pattern);

        for (path, _, len) in candidates {
            if len <= max_bytes {
                discovered.push(path);
            } else {
                debug!(
                    file = %path.display(),
                    size_mb = len / (1024 * 1024),
                    "skipping oversized log file"
                );
            }
        }
    }

    debug!(count = discovered.len(), "discovered log files");
    discovered
}
