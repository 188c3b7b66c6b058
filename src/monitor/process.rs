//! Process-filtered monitoring: the system loop specialized to a matched
//! process list with per-tick aggregates.

use super::{tick_interval, SessionState, StopEvent, MAX_PROVIDER_FAILURES, STOP_JOIN_TIMEOUT};
use crate::config::{MatchField, MonitorConfig, ProcessMatchConfig};
use crate::error::Error;
use crate::metrics::{human_bytes, MetricsProvider, ProcessSample};
use crate::storage::RotatingSink;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Matched processes observed in one tick, with derived aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSnapshot {
    pub timestamp: DateTime<Utc>,
    pub processes: Vec<ProcessSample>,
    pub process_count: usize,
    pub total_cpu_percent: f64,
    pub total_memory_rss: u64,
    pub total_memory_human: String,
}

impl ProcessSnapshot {
    fn from_processes(processes: Vec<ProcessSample>) -> Self {
        let total_cpu_percent = processes.iter().map(|p| f64::from(p.cpu_percent)).sum();
        let total_memory_rss = processes.iter().map(|p| p.memory_rss).sum();
        Self {
            timestamp: Utc::now(),
            process_count: processes.len(),
            total_cpu_percent,
            total_memory_rss,
            total_memory_human: human_bytes(total_memory_rss),
            processes,
        }
    }
}

/// Summary over a finished process-monitoring session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessSummary {
    pub duration_seconds: f64,
    pub avg_process_count: f64,
    pub peak_process_count: usize,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl ProcessSummary {
    fn from_snapshots(snapshots: &[ProcessSnapshot], interval_secs: f64) -> Self {
        if snapshots.is_empty() {
            return Self::default();
        }
        let n = snapshots.len() as f64;
        let mut summary = Self {
            duration_seconds: n * interval_secs,
            start_time: snapshots.first().map(|s| s.timestamp),
            end_time: snapshots.last().map(|s| s.timestamp),
            ..Self::default()
        };
        for s in snapshots {
            summary.avg_process_count += s.process_count as f64;
            summary.cpu_avg += s.total_cpu_percent;
            summary.cpu_max = summary.cpu_max.max(s.total_cpu_percent);
            summary.peak_process_count = summary.peak_process_count.max(s.process_count);
        }
        summary.avg_process_count /= n;
        summary.cpu_avg /= n;
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub summary: ProcessSummary,
    pub snapshots: Vec<ProcessSnapshot>,
    pub total_points: usize,
}

/// Compiled process-match predicate: any filter against any configured
/// field, substring containment or regex.
pub struct ProcessMatcher {
    filters: Vec<String>,
    regexes: Option<Vec<Regex>>,
    fields: Vec<MatchField>,
    case_sensitive: bool,
}

impl ProcessMatcher {
    pub fn new(config: &ProcessMatchConfig) -> Result<Self, Error> {
        let regexes = if config.use_regex {
            let mut compiled = Vec::with_capacity(config.filters.len());
            for filter in &config.filters {
                compiled.push(
                    RegexBuilder::new(filter)
                        .case_insensitive(!config.case_sensitive)
                        .build()?,
                );
            }
            Some(compiled)
        } else {
            None
        };
        let filters = if config.case_sensitive {
            config.filters.clone()
        } else {
            config.filters.iter().map(|f| f.to_lowercase()).collect()
        };
        Ok(Self {
            filters,
            regexes,
            fields: config.match_fields.clone(),
            case_sensitive: config.case_sensitive,
        })
    }

    pub fn matches(&self, process: &ProcessSample) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        for field in &self.fields {
            let value = match field {
                MatchField::Name => Some(process.name.as_str()),
                MatchField::Cmdline => process.cmdline.as_deref(),
                MatchField::Exe => process.exe.as_deref(),
            };
            let Some(value) = value else { continue };
            if let Some(regexes) = &self.regexes {
                if regexes.iter().any(|re| re.is_match(value)) {
                    return true;
                }
            } else if self.case_sensitive {
                if self.filters.iter().any(|f| value.contains(f)) {
                    return true;
                }
            } else {
                let value = value.to_lowercase();
                if self.filters.iter().any(|f| value.contains(f)) {
                    return true;
                }
            }
        }
        false
    }
}

pub type SnapshotCallback = Box<dyn Fn(&ProcessSnapshot) + Send + 'static>;

/// Interval-driven monitor over processes matching a predicate. Same
/// session lifecycle as [`super::SystemMonitor`].
pub struct ProcessMonitor {
    config: MonitorConfig,
    matcher: Arc<ProcessMatcher>,
    provider: Arc<Mutex<Box<dyn MetricsProvider>>>,
    buffer: Arc<Mutex<Vec<ProcessSnapshot>>>,
    state: Arc<Mutex<SessionState>>,
    stop_event: Arc<StopEvent>,
    done_rx: Option<mpsc::Receiver<()>>,
}

impl ProcessMonitor {
    /// Fails with [`Error::InvalidFilter`] when `use_regex` is set and a
    /// filter does not compile.
    pub fn new(
        config: MonitorConfig,
        match_config: &ProcessMatchConfig,
        provider: Box<dyn MetricsProvider>,
    ) -> Result<Self, Error> {
        Ok(Self {
            config,
            matcher: Arc::new(ProcessMatcher::new(match_config)?),
            provider: Arc::new(Mutex::new(provider)),
            buffer: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stop_event: Arc::new(StopEvent::new()),
            done_rx: None,
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub fn snapshots(&self) -> Vec<ProcessSnapshot> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn start(
        &mut self,
        duration: Option<Duration>,
        callback: Option<SnapshotCallback>,
    ) -> Result<(), Error> {
        if self.state() != SessionState::Idle {
            return Err(Error::AlreadyRunning);
        }

        let mut sink = match &self.config.output_path {
            Some(path) => Some(RotatingSink::open(
                path,
                self.config.rotate_max_lines,
                self.config.rotate_max_bytes,
            )?),
            None => None,
        };

        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.stop_event = Arc::new(StopEvent::new());
        let (done_tx, done_rx) = mpsc::channel();
        self.done_rx = Some(done_rx);

        let interval = tick_interval(self.config.interval_secs);
        let keep_in_memory = self.config.keep_in_memory;
        let matcher = Arc::clone(&self.matcher);
        let provider = Arc::clone(&self.provider);
        let buffer = Arc::clone(&self.buffer);
        let state = Arc::clone(&self.state);
        let stop = Arc::clone(&self.stop_event);

        *state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Running;
        info!(interval_secs = self.config.interval_secs, "starting process monitoring");

        std::thread::spawn(move || {
            let started = Instant::now();
            let mut consecutive_failures = 0u32;

            loop {
                if stop.is_set() {
                    break;
                }
                if let Some(cap) = duration {
                    if started.elapsed() >= cap {
                        info!("monitoring duration reached");
                        break;
                    }
                }

                let listed = provider
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .processes();
                match listed {
                    Ok(processes) => {
                        consecutive_failures = 0;
                        let matched: Vec<ProcessSample> = processes
                            .into_iter()
                            .filter(|p| matcher.matches(p))
                            .collect();
                        let snapshot = ProcessSnapshot::from_processes(matched);
                        if keep_in_memory {
                            buffer
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(snapshot.clone());
                        }
                        if let Some(sink) = sink.as_mut() {
                            if let Err(e) = sink.append(&snapshot) {
                                warn!(error = %e, "process sink write failed");
                            }
                        }
                        if let Some(cb) = &callback {
                            if catch_unwind(AssertUnwindSafe(|| cb(&snapshot))).is_err() {
                                warn!("snapshot callback panicked");
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(error = %e, consecutive_failures, "process enumeration failed, skipping tick");
                        if consecutive_failures >= MAX_PROVIDER_FAILURES {
                            error!("metrics provider failing persistently, stopping session");
                            break;
                        }
                    }
                }

                if stop.wait_timeout(interval) {
                    break;
                }
            }

            if let Some(sink) = sink.as_mut() {
                if let Err(e) = sink.close() {
                    warn!(error = %e, "process sink close failed");
                }
            }
            *state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Stopped;
            debug!("process monitor worker exited");
            let _ = done_tx.send(());
        });

        Ok(())
    }

    pub fn stop(&mut self) -> Result<ProcessReport, Error> {
        let done_rx = self.done_rx.take().ok_or(Error::NotRunning)?;
        self.stop_event.set();
        match done_rx.recv_timeout(STOP_JOIN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!("process worker did not exit in time, reporting what was collected");
            }
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Stopped;

        let snapshots = self.snapshots();
        let summary = ProcessSummary::from_snapshots(&snapshots, self.config.interval_secs);
        info!(total_points = snapshots.len(), "process monitoring stopped");
        Ok(ProcessReport {
            summary,
            total_points: snapshots.len(),
            snapshots,
        })
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        self.done_rx = None;
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(name: &str, cmdline: Option<&str>, exe: Option<&str>) -> ProcessSample {
        ProcessSample {
            pid: 1,
            name: name.to_string(),
            cmdline: cmdline.map(String::from),
            exe: exe.map(String::from),
            cpu_percent: 1.0,
            memory_percent: 0.5,
            memory_rss: 1024,
        }
    }

    #[test]
    fn substring_match_is_case_insensitive_by_default() {
        let matcher = ProcessMatcher::new(&ProcessMatchConfig {
            filters: vec!["PYTHON".to_string()],
            ..ProcessMatchConfig::default()
        })
        .unwrap();
        assert!(matcher.matches(&proc("python3", None, None)));
        assert!(matcher.matches(&proc("sh", Some("/usr/bin/python script.py"), None)));
        assert!(!matcher.matches(&proc("nginx", Some("nginx -g daemon"), None)));
    }

    #[test]
    fn case_sensitive_match() {
        let matcher = ProcessMatcher::new(&ProcessMatchConfig {
            filters: vec!["Python".to_string()],
            case_sensitive: true,
            ..ProcessMatchConfig::default()
        })
        .unwrap();
        assert!(!matcher.matches(&proc("python3", None, None)));
        assert!(matcher.matches(&proc("Python3", None, None)));
    }

    #[test]
    fn regex_match_on_configured_fields() {
        let matcher = ProcessMatcher::new(&ProcessMatchConfig {
            filters: vec![r"(firefox|chrome)".to_string()],
            match_fields: vec![MatchField::Name, MatchField::Exe],
            use_regex: true,
            ..ProcessMatchConfig::default()
        })
        .unwrap();
        assert!(matcher.matches(&proc("Firefox", None, None)));
        assert!(matcher.matches(&proc("web", None, Some("/opt/chrome/chrome"))));
        // Cmdline is not a configured field here.
        assert!(!matcher.matches(&proc("web", Some("chrome --headless"), None)));
    }

    #[test]
    fn invalid_regex_is_rejected_at_construction() {
        let result = ProcessMatcher::new(&ProcessMatchConfig {
            filters: vec!["(unclosed".to_string()],
            use_regex: true,
            ..ProcessMatchConfig::default()
        });
        assert!(matches!(result, Err(Error::InvalidFilter(_))));
    }

    #[test]
    fn empty_filters_match_everything() {
        let matcher = ProcessMatcher::new(&ProcessMatchConfig::default()).unwrap();
        assert!(matcher.matches(&proc("anything", None, None)));
    }

    #[test]
    fn snapshot_aggregates() {
        let snapshot = ProcessSnapshot::from_processes(vec![
            ProcessSample { cpu_percent: 2.5, memory_rss: 1024, ..proc("a", None, None) },
            ProcessSample { cpu_percent: 1.5, memory_rss: 1024, ..proc("b", None, None) },
        ]);
        assert_eq!(snapshot.process_count, 2);
        assert!((snapshot.total_cpu_percent - 4.0).abs() < 1e-9);
        assert_eq!(snapshot.total_memory_rss, 2048);
        assert_eq!(snapshot.total_memory_human, "2.0 KB");
    }
}
