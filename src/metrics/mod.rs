//! Metric sample types and summary statistics.

mod provider;

pub use provider::{MetricsProvider, SysinfoProvider};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative network counters at the time of a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// One point-in-time metrics snapshot. Fields are always present;
/// a provider that cannot measure something reports zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network_io: NetworkIo,
}

/// Resource usage of a single running process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exe: Option<String>,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_rss: u64,
}

/// Summary statistics over one monitoring session, computed once on stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub duration_seconds: f64,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub memory_avg: f64,
    pub memory_peak: f64,
    pub disk_avg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Summary {
    /// Fold collected samples into summary statistics. An empty slice
    /// yields an empty (all-zero) summary, not an error.
    pub fn from_samples(samples: &[Sample], interval_secs: f64) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mut summary = Self {
            duration_seconds: n * interval_secs,
            start_time: samples.first().map(|s| s.timestamp),
            end_time: samples.last().map(|s| s.timestamp),
            ..Self::default()
        };
        for s in samples {
            summary.cpu_avg += s.cpu_percent;
            summary.memory_avg += s.memory_percent;
            summary.disk_avg += s.disk_percent;
            summary.cpu_max = summary.cpu_max.max(s.cpu_percent);
            summary.memory_peak = summary.memory_peak.max(s.memory_percent);
        }
        summary.cpu_avg /= n;
        summary.memory_avg /= n;
        summary.disk_avg /= n;
        summary
    }
}

/// Format a byte count for display ("1.5 MB").
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64, mem: f64, disk: f64) -> Sample {
        Sample {
            timestamp: Utc::now(),
            cpu_percent: cpu,
            memory_percent: mem,
            disk_percent: disk,
            network_io: NetworkIo::default(),
        }
    }

    #[test]
    fn summary_empty_is_zero() {
        let s = Summary::from_samples(&[], 1.0);
        assert_eq!(s, Summary::default());
    }

    #[test]
    fn summary_avg_and_max() {
        let samples = vec![
            sample(10.0, 40.0, 70.0),
            sample(30.0, 60.0, 80.0),
            sample(20.0, 50.0, 90.0),
        ];
        let s = Summary::from_samples(&samples, 5.0);
        assert_eq!(s.duration_seconds, 15.0);
        assert!((s.cpu_avg - 20.0).abs() < 1e-9);
        assert_eq!(s.cpu_max, 30.0);
        assert_eq!(s.memory_peak, 60.0);
        assert!((s.disk_avg - 80.0).abs() < 1e-9);
        assert!(s.cpu_max >= s.cpu_avg && s.cpu_avg >= 0.0);
        assert_eq!(s.start_time, Some(samples[0].timestamp));
        assert_eq!(s.end_time, Some(samples[2].timestamp));
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
        assert_eq!(human_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn sample_jsonl_shape() {
        let s = sample(1.5, 2.5, 3.5);
        let v: serde_json::Value = serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
        assert!(v["timestamp"].is_string());
        assert_eq!(v["cpu_percent"], 1.5);
        assert_eq!(v["network_io"]["bytes_sent"], 0);
        assert_eq!(v["network_io"]["packets_recv"], 0);
    }
}
