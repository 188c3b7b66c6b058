//! Metrics provider seam (cross-platform via sysinfo).
//!
//! The engines only see the [`MetricsProvider`] trait, so tests can drive
//! them with scripted providers and the sysinfo backend stays swappable.

use super::{NetworkIo, ProcessSample, Sample};
use crate::error::Error;
use chrono::Utc;
use sysinfo::{Disks, Networks, System};

/// On-demand source of host metrics. Called once per tick by a sampling
/// engine; expected to be cheap and, for real backends, total.
pub trait MetricsProvider: Send {
    /// One point-in-time system snapshot.
    fn sample(&mut self) -> Result<Sample, Error>;

    /// Enumerate currently running processes.
    fn processes(&mut self) -> Result<Vec<ProcessSample>, Error>;
}

/// sysinfo-backed provider. CPU percentages are measured between
/// consecutive refreshes, so the first sample after construction may
/// report zero CPU.
pub struct SysinfoProvider {
    sys: System,
    disks: Disks,
    networks: Networks,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_cpu();
        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    fn disk_percent(&self) -> f64 {
        // Root filesystem when present, otherwise all disks combined.
        let root = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"));
        let (total, available) = match root {
            Some(d) => (d.total_space(), d.available_space()),
            None => self
                .disks
                .list()
                .iter()
                .fold((0u64, 0u64), |(t, a), d| {
                    (t + d.total_space(), a + d.available_space())
                }),
        };
        if total == 0 {
            return 0.0;
        }
        (total - available) as f64 / total as f64 * 100.0
    }

    fn network_io(&self) -> NetworkIo {
        let mut io = NetworkIo::default();
        for (_name, data) in &self.networks {
            io.bytes_sent += data.total_transmitted();
            io.bytes_recv += data.total_received();
            io.packets_sent += data.total_packets_transmitted();
            io.packets_recv += data.total_packets_received();
        }
        io
    }
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for SysinfoProvider {
    fn sample(&mut self) -> Result<Sample, Error> {
        self.sys.refresh_cpu();
        self.sys.refresh_memory();
        self.disks.refresh();
        self.networks.refresh();

        let memory_percent = if self.sys.total_memory() > 0 {
            self.sys.used_memory() as f64 / self.sys.total_memory() as f64 * 100.0
        } else {
            0.0
        };

        Ok(Sample {
            timestamp: Utc::now(),
            cpu_percent: f64::from(self.sys.global_cpu_info().cpu_usage()),
            memory_percent,
            disk_percent: self.disk_percent(),
            network_io: self.network_io(),
        })
    }

    fn processes(&mut self) -> Result<Vec<ProcessSample>, Error> {
        self.sys.refresh_processes();
        self.sys.refresh_memory();
        let total_memory = self.sys.total_memory();

        let mut out = Vec::with_capacity(self.sys.processes().len());
        for (pid, proc_) in self.sys.processes() {
            let cmdline = if proc_.cmd().is_empty() {
                None
            } else {
                Some(proc_.cmd().join(" "))
            };
            let memory_rss = proc_.memory();
            let memory_percent = if total_memory > 0 {
                (memory_rss as f64 / total_memory as f64 * 100.0) as f32
            } else {
                0.0
            };
            out.push(ProcessSample {
                pid: pid.as_u32(),
                name: proc_.name().to_string(),
                cmdline,
                exe: proc_.exe().map(|p| p.to_string_lossy().into_owned()),
                cpu_percent: proc_.cpu_usage(),
                memory_percent,
                memory_rss,
            });
        }
        Ok(out)
    }
}
