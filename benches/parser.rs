//! Parser benchmark: raw log lines → structured entries (bulk-scan hot path).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hostmon::config::LogAnalysisConfig;
use hostmon::logs::{LogParser, Severity};
use std::path::Path;

fn make_syslog_lines(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            format!(
                "Jan 15 03:{:02}:{:02} host proc{}[{}]: ERROR request {} failed with timeout",
                i % 60,
                i % 60,
                i,
                1000 + i,
                i
            )
        })
        .collect()
}

fn bench_parse_syslog(c: &mut Criterion) {
    let config = LogAnalysisConfig::default();
    let parser = LogParser::new(&config.date_format_patterns);
    let lines = make_syslog_lines(1000);
    let path = Path::new("/var/log/syslog");

    c.bench_function("parse_1000_syslog_lines", |b| {
        b.iter(|| {
            for (i, line) in lines.iter().enumerate() {
                black_box(parser.parse(black_box(line), path, i as u64 + 1));
            }
        })
    });
}

fn bench_parse_iso_line(c: &mut Criterion) {
    let config = LogAnalysisConfig::default();
    let parser = LogParser::new(&config.date_format_patterns);
    let line = "2024-01-15T03:04:05 host nginx[100]: WARNING upstream slow to respond";
    let path = Path::new("/var/log/app.log");

    c.bench_function("parse_iso_line", |b| {
        b.iter(|| black_box(parser.parse(black_box(line), path, 1)))
    });
}

fn bench_severity_detect(c: &mut Criterion) {
    let lines = make_syslog_lines(1000);

    c.bench_function("severity_detect_1000_lines", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(Severity::detect(black_box(line)));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_parse_syslog,
    bench_parse_iso_line,
    bench_severity_detect
);
criterion_main!(benches);
