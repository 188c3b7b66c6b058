//! Append-only JSONL sink with line/byte rotation.
//!
//! One JSON object per line, flushed on every append so a crashed
//! monitoring session loses at most the in-flight sample. Rotation
//! renames the active file with a timestamp suffix and reopens a fresh
//! file at the resolved path.

use chrono::Local;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct RotatingSink {
    resolved_path: PathBuf,
    file: Option<File>,
    rotate_max_lines: Option<u64>,
    rotate_max_bytes: Option<u64>,
    lines_written: u64,
    bytes_written: u64,
}

impl RotatingSink {
    /// Open a sink at `path`. An existing directory (or a path without a
    /// file extension, which is created as one) gets a timestamped
    /// `monitor-*.jsonl` file synthesized inside it; a path with an
    /// extension is used as-is, creating parent directories as needed.
    pub fn open(
        path: &Path,
        rotate_max_lines: Option<u64>,
        rotate_max_bytes: Option<u64>,
    ) -> io::Result<Self> {
        let resolved_path = resolve_output_path(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved_path)?;
        // Seed the byte counter from pre-existing content so byte-based
        // rotation accounts for an appended-to file.
        let bytes_written = fs::metadata(&resolved_path).map(|m| m.len()).unwrap_or(0);
        debug!(path = %resolved_path.display(), "opened sample sink");
        Ok(Self {
            resolved_path,
            file: Some(file),
            rotate_max_lines,
            rotate_max_bytes,
            lines_written: 0,
            bytes_written,
        })
    }

    /// File currently being written.
    pub fn resolved_path(&self) -> &Path {
        &self.resolved_path
    }

    /// Sibling path for the session summary.
    pub fn summary_path(&self) -> PathBuf {
        self.resolved_path.with_extension("summary.json")
    }

    /// Serialize one record as a JSON line, write, flush, and rotate if a
    /// threshold was crossed. A record that fails to serialize is written
    /// in its debug-string form rather than dropped.
    pub fn append<T: Serialize + std::fmt::Debug>(&mut self, record: &T) -> io::Result<()> {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "record not serializable, storing debug form");
                serde_json::json!({ "unserializable": format!("{record:?}") }).to_string()
            }
        };
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "sink is closed"))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        self.lines_written += 1;
        self.bytes_written += line.len() as u64 + 1;
        self.maybe_rotate()
    }

    fn maybe_rotate(&mut self) -> io::Result<()> {
        let by_lines = self
            .rotate_max_lines
            .is_some_and(|max| self.lines_written >= max);
        let by_bytes = self
            .rotate_max_bytes
            .is_some_and(|max| self.bytes_written >= max);
        if !(by_lines || by_bytes) {
            return Ok(());
        }

        self.file = None;
        let rotated = rotated_path(&self.resolved_path);
        match fs::rename(&self.resolved_path, &rotated) {
            Ok(()) => {
                info!(
                    from = %self.resolved_path.display(),
                    to = %rotated.display(),
                    "rotated sample file"
                );
            }
            Err(e) => {
                // Keep appending to the oversized file rather than lose data.
                warn!(error = %e, path = %self.resolved_path.display(), "rotation rename failed");
            }
        }
        self.file = Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.resolved_path)?,
        );
        self.lines_written = 0;
        self.bytes_written = fs::metadata(&self.resolved_path).map(|m| m.len()).unwrap_or(0);
        Ok(())
    }

    /// Flush and release the handle. Safe to call more than once.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

impl Drop for RotatingSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn default_file_name() -> String {
    format!("monitor-{}.jsonl", Local::now().format("%Y%m%d-%H%M%S"))
}

fn resolve_output_path(path: &Path) -> io::Result<PathBuf> {
    if path.is_dir() {
        return Ok(path.join(default_file_name()));
    }
    if path.extension().is_some() {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        return Ok(path.to_path_buf());
    }
    // No suffix: treat as a directory to create.
    fs::create_dir_all(path)?;
    Ok(path.join(default_file_name()))
}

/// `<stem>.<YYYYMMDD-HHMMSS><ext>`, with a numeric tail when two
/// rotations land in the same second.
fn rotated_path(active: &Path) -> PathBuf {
    let stem = active
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "monitor".to_string());
    let ext = active
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let ts = Local::now().format("%Y%m%d-%H%M%S");
    let parent = active.parent().unwrap_or_else(|| Path::new(""));

    let mut candidate = parent.join(format!("{stem}.{ts}{ext}"));
    let mut n = 0u32;
    while candidate.exists() {
        n += 1;
        candidate = parent.join(format!("{stem}.{ts}-{n}{ext}"));
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn count_lines(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn resolves_directory_to_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RotatingSink::open(dir.path(), None, None).unwrap();
        let name = sink.resolved_path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("monitor-"));
        assert!(name.ends_with(".jsonl"));
        assert_eq!(sink.resolved_path().parent().unwrap(), dir.path());
    }

    #[test]
    fn resolves_missing_suffixless_path_as_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data");
        let sink = RotatingSink::open(&target, None, None).unwrap();
        assert!(target.is_dir());
        assert_eq!(sink.resolved_path().parent().unwrap(), target);
    }

    #[test]
    fn rotates_by_line_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        let mut sink = RotatingSink::open(&path, Some(2), None).unwrap();
        for i in 0..5 {
            sink.append(&json!({ "i": i })).unwrap();
        }
        sink.close().unwrap();

        // 2 full rotated files of 2 lines each, plus the active file with 1.
        let rotated: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p != &path)
            .collect();
        assert_eq!(rotated.len(), 2);
        for r in &rotated {
            assert_eq!(count_lines(r), 2);
        }
        assert_eq!(count_lines(&path), 1);
    }

    #[test]
    fn rotates_by_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        let mut sink = RotatingSink::open(&path, None, Some(1)).unwrap();
        sink.append(&json!({ "a": 1 })).unwrap();
        sink.append(&json!({ "a": 2 })).unwrap();
        sink.close().unwrap();
        let entries = fs::read_dir(dir.path()).unwrap().count();
        // Every append exceeds one byte, so each triggers a rotation.
        assert_eq!(entries, 3);
    }

    #[test]
    fn byte_counter_seeds_from_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        fs::write(&path, "x".repeat(100)).unwrap();
        let sink = RotatingSink::open(&path, None, None).unwrap();
        assert_eq!(sink.bytes_written, 100);
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RotatingSink::open(&dir.path().join("s.jsonl"), None, None).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.append(&json!({})).is_err());
    }

    #[test]
    fn summary_path_replaces_extension() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RotatingSink::open(&dir.path().join("run.jsonl"), None, None).unwrap();
        assert_eq!(
            sink.summary_path().file_name().unwrap().to_string_lossy(),
            "run.summary.json"
        );
    }
}
