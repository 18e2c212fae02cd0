//! Console summary and failure report formatting.

use std::time::Duration;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::ExportStats;

use super::exporter::{ExportReport, FailureReport};
use super::timestamp;

/// Failures echoed to the console when the report file is not available.
pub const SAMPLE_FAILURES: usize = 5;

/// Formats the end-of-run summary.
#[must_use]
pub fn format_summary(report: &ExportReport) -> String {
    let stats = &report.stats;
    let mut out = vec![
        format!("{}", "📊 Export Summary".bold()),
        format!("  Time taken: {}", format_elapsed(report.elapsed).cyan()),
    ];

    if let Some(timeframe) = format_timeframe(stats) {
        out.push(format!("  Message timeframe: {timeframe}"));
    }

    out.push(stats_table(stats).to_string());

    if report.dry_run {
        out.push(format!(
            "{}",
            "🧪 This was a DRY RUN - no files were modified".yellow()
        ));
    } else {
        out.push(format!(
            "📂 Export written to: {}",
            report.output_dir.display().to_string().cyan()
        ));
    }

    match &report.failure_report {
        FailureReport::NotNeeded => {}
        FailureReport::Written(path) => {
            out.push(format!("📋 Failed attachments logged to: {}", path.display()));
        }
        FailureReport::DryRun => out.extend(sample_lines(&stats.failed_files)),
        FailureReport::WriteFailed(reason) => {
            out.push(format!(
                "{} {reason}",
                "Could not write failed_attachments.txt:".red()
            ));
            out.extend(sample_lines(&stats.failed_files));
        }
    }

    out.join("\n")
}

fn sample_lines(failures: &[String]) -> Vec<String> {
    let mut lines = vec!["💡 Sample failed files:".to_string()];
    lines.extend(
        failure_samples(failures, SAMPLE_FAILURES)
            .into_iter()
            .map(|line| format!("   {line}")),
    );
    lines
}

/// Per-category counts as a two-column table.
fn stats_table(stats: &ExportStats) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Metric", "Count"]);

    let rows = [
        ("Conversations exported", stats.conversations),
        ("Total messages", stats.messages),
        ("Attachments found", stats.attachments_found),
        ("Attachments copied", stats.attachments_copied),
        ("Skipped (already exist)", stats.attachments_skipped),
        ("App/plugin data skipped", stats.plugin_attachments_skipped),
        ("Found via search", stats.attachments_found_alternative),
        ("Attachments failed", stats.attachments_failed),
    ];

    for (label, count) in rows {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }

    table
}

/// `12.3 seconds`
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1} seconds", elapsed.as_secs_f64())
}

/// `<earliest> to <latest>`, when any dated message was seen.
#[must_use]
pub fn format_timeframe(stats: &ExportStats) -> Option<String> {
    let earliest = stats.earliest_message?;
    let latest = stats.latest_message?;
    Some(format!(
        "{} to {}",
        timestamp::decode(Some(earliest)),
        timestamp::decode(Some(latest))
    ))
}

/// The first `limit` failures, then a `... and N more` line if some were cut.
#[must_use]
pub fn failure_samples(failures: &[String], limit: usize) -> Vec<String> {
    let mut samples: Vec<String> = failures.iter().take(limit).cloned().collect();
    if failures.len() > limit {
        samples.push(format!("... and {} more", failures.len() - limit));
    }
    samples
}

/// Contents of `failed_attachments.txt`.
#[must_use]
pub fn format_failure_report(failures: &[String]) -> String {
    let mut out = String::from("FAILED ATTACHMENTS REPORT\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    out.push_str(&format!("Total failed: {}\n\n", failures.len()));

    for (i, failure) in failures.iter().enumerate() {
        out.push_str(&format!("{}. {failure}\n", i + 1));
    }

    out
}
