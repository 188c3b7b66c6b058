//! Hostmon entrypoint: starts a background sampling session, persists
//! JSONL samples until Ctrl+C, then prints the session summary.

use hostmon::{
    config::HostmonConfig, logging::StructuredLogger, metrics::SysinfoProvider,
    monitor::SystemMonitor,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("HOSTMON_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = HostmonConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(
        interval_secs = config.monitor.interval_secs,
        output = ?config.monitor.output_path,
        "hostmon starting"
    );

    let mut monitor = SystemMonitor::new(config.monitor.clone(), Box::new(SysinfoProvider::new()));
    monitor.start(None, None)?;

    static STOP: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);
    let _ = ctrlc::set_handler(|| {
        STOP.store(true, std::sync::atomic::Ordering::Relaxed);
    });

    info!("sampling (Ctrl+C to stop)");
    while !STOP.load(std::sync::atomic::Ordering::Relaxed) && monitor.is_running() {
        std::thread::sleep(Duration::from_millis(200));
    }

    let report = monitor.stop()?;
    info!(
        total_points = report.total_points,
        cpu_avg = report.summary.cpu_avg,
        cpu_max = report.summary.cpu_max,
        memory_peak = report.summary.memory_peak,
        "hostmon stopping"
    );
    println!("{}", serde_json::to_string_pretty(&report.summary)?);

    Ok(())
}
