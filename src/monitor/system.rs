//! Whole-host sampling engine with crash-safe persistence.

use super::{tick_interval, SessionState, StopEvent, MAX_PROVIDER_FAILURES, STOP_JOIN_TIMEOUT};
use crate::config::MonitorConfig;
use crate::error::Error;
use crate::metrics::{MetricsProvider, Sample, Summary};
use crate::storage::RotatingSink;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Invoked on the worker thread for every collected sample.
pub type SampleCallback = Box<dyn Fn(&Sample) + Send + 'static>;

/// Everything a finished session hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub summary: Summary,
    pub samples: Vec<Sample>,
    pub total_points: usize,
}

/// Interval-driven system monitor.
///
/// One session per instance: Idle → (start) → Running → (duration cap,
/// `stop()`, or repeated provider failures) → Stopped. `reset()` returns
/// a Stopped engine to Idle for a fresh session.
pub struct SystemMonitor {
    config: MonitorConfig,
    provider: Arc<Mutex<Box<dyn MetricsProvider>>>,
    buffer: Arc<Mutex<Vec<Sample>>>,
    state: Arc<Mutex<SessionState>>,
    stop_event: Arc<StopEvent>,
    done_rx: Option<mpsc::Receiver<()>>,
}

impl SystemMonitor {
    pub fn new(config: MonitorConfig, provider: Box<dyn MetricsProvider>) -> Self {
        Self {
            config,
            provider: Arc::new(Mutex::new(provider)),
            buffer: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stop_event: Arc::new(StopEvent::new()),
            done_rx: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Snapshot of the samples collected so far (crash-tolerant read;
    /// usable while Running and after a crash of the worker).
    pub fn samples(&self) -> Vec<Sample> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Begin the background sampling loop. Fails with [`Error::AlreadyRunning`]
    /// unless the engine is Idle; a Stopped engine needs `reset()` first.
    pub fn start(
        &mut self,
        duration: Option<Duration>,
        callback: Option<SampleCallback>,
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
        let interval_secs = self.config.interval_secs;
        let keep_in_memory = self.config.keep_in_memory;
        let summary_on_stop = self.config.summary_on_stop;
        let provider = Arc::clone(&self.provider);
        let buffer = Arc::clone(&self.buffer);
        let state = Arc::clone(&self.state);
        let stop = Arc::clone(&self.stop_event);

        *state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Running;
        info!(interval_secs, ?duration, "starting system monitoring");

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

                let sampled = provider
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .sample();
                match sampled {
                    Ok(sample) => {
                        consecutive_failures = 0;
                        if keep_in_memory {
                            buffer
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(sample.clone());
                        }
                        if let Some(sink) = sink.as_mut() {
                            if let Err(e) = sink.append(&sample) {
                                warn!(error = %e, "sample sink write failed");
                            }
                        }
                        if let Some(cb) = &callback {
                            if catch_unwind(AssertUnwindSafe(|| cb(&sample))).is_err() {
                                warn!("sample callback panicked");
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(error = %e, consecutive_failures, "sample collection failed, skipping tick");
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
                if summary_on_stop {
                    let samples = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                    let summary = Summary::from_samples(&samples[..], interval_secs);
                    drop(samples);
                    match serde_json::to_vec_pretty(&summary) {
                        Ok(bytes) => {
                            if let Err(e) = std::fs::write(sink.summary_path(), bytes) {
                                warn!(error = %e, "summary file write failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "summary serialization failed"),
                    }
                }
                if let Err(e) = sink.close() {
                    warn!(error = %e, "sample sink close failed");
                }
            }

            *state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Stopped;
            debug!("monitor worker exited");
            let _ = done_tx.send(());
        });

        Ok(())
    }

    /// Signal the worker, wait (bounded) for it to exit, and return the
    /// session report. A session that already hit its duration cap is
    /// still collectable here; [`Error::NotRunning`] is returned only
    /// when no uncollected session exists.
    pub fn stop(&mut self) -> Result<MonitorReport, Error> {
        let done_rx = self.done_rx.take().ok_or(Error::NotRunning)?;
        self.stop_event.set();
        match done_rx.recv_timeout(STOP_JOIN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!("monitor worker did not exit in time, reporting what was collected");
            }
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Stopped;

        let samples = self.samples();
        let summary = Summary::from_samples(&samples, self.config.interval_secs);
        info!(total_points = samples.len(), "system monitoring stopped");
        Ok(MonitorReport {
            summary,
            total_points: samples.len(),
            samples,
        })
    }

    /// Return a Stopped engine to Idle, discarding buffered samples.
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
