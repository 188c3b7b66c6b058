//! Hostmon — Host metrics sampling and log query engine.
//!
//! Modular structure:
//! - [`metrics`] — Sample types and the sysinfo-backed provider
//! - [`monitor`] — Background system and process sampling sessions
//! - [`storage`] — Rotating JSONL persistence
//! - [`logs`] — Log file discovery, parsing, and querying
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod logging;
pub mod logs;
pub mod metrics;
pub mod monitor;
pub mod storage;

pub use config::{HostmonConfig, LogAnalysisConfig, MonitorConfig, ProcessMatchConfig};
pub use error::Error;
pub use logging::StructuredLogger;
pub use logs::{LogEntry, LogQuery, LogQueryEngine, LogStatistics, Severity};
pub use metrics::{MetricsProvider, Sample, Summary, SysinfoProvider};
pub use monitor::{MonitorReport, ProcessMonitor, ProcessReport, SystemMonitor};
pub use storage::RotatingSink;
