use colored::{Color, Colorize};

use crate::metrics::MetricsSnapshot;

use super::context::SlowRequestRecord;
use super::models::IterationReport;

pub fn print_iteration_report(report: &IterationReport) {
    let status_color = if report.status >= 400 {
        Color::Red
    } else if report.status >= 300 {
        Color::Yellow
    } else {
        Color::Green
    };

    println!(
        "{} {} {}",
        report.endpoint.bold(),
        report.method.bold(),
        report.url.cyan()
    );
    println!(
        "{} {} {}{}",
        "Status:".bold(),
        format!("{}", report.status).color(status_color),
        format!("({} ms)", report.duration_ms).dimmed(),
        if report.slow { " SLOW".red().bold() } else { "".normal() }
    );

    for (label, passed) in report.checks.iter() {
        let mark = if passed { "✓".green() } else { "✗".red() };
        println!("  {mark} {label}");
    }
}

pub fn print_run_summary(snapshot: &MetricsSnapshot, slow_requests: &[SlowRequestRecord]) {
    println!("{}", "Run summary".bold());
    println!(
        "  {} {} {}",
        "Iterations:".bold(),
        snapshot.iterations,
        format!(
            "({} failed, {:.1}%)",
            snapshot.failed_requests,
            snapshot.failed_rate * 100.0
        )
        .dimmed()
    );

    for (endpoint, stats) in &snapshot.endpoints {
        println!(
            "  {} min {:.0} ms / mean {:.0} ms / p95 {:.0} ms / max {:.0} ms ({} samples)",
            format!("{endpoint}:").cyan(),
            stats.min_ms,
            stats.mean_ms,
            stats.p95_ms,
            stats.max_ms,
            stats.count
        );
    }

    if !snapshot.validation_failures.is_empty() {
        println!("{}", "Validation failures".bold());
        for (label, count) in &snapshot.validation_failures {
            println!("  {} {count}", format!("{label}:").yellow());
        }
    }

    if !slow_requests.is_empty() {
        println!("{}", "Slow requests".bold());
        for record in slow_requests {
            println!(
                "  {} {} {} {} ms {}",
                record.endpoint.cyan(),
                record.method,
                record.url.dimmed(),
                record.duration_ms,
                format!("(> {} ms, status {})", record.threshold_ms, record.status).dimmed()
            );
        }
    }
}
