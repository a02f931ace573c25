//! Report output
//!
//! Human-readable summaries for terminals, or the report as JSON.

use std::path::Path;
use std::time::Duration;

use crate::check::{Check, CheckStatus};
use crate::cli::{OutputFormat, VerbosityLevel};
use crate::report::{Classification, Report};

/// Output formatter for validation reports
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Formatter with colours forced on or off
    pub fn with_colors(verbosity: VerbosityLevel, show_colors: bool) -> Self {
        Self {
            verbosity,
            show_colors,
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Render a report in the requested format
    pub fn render(&self, report: &Report, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Human => Ok(self.format_report(report)),
            OutputFormat::Json => format_json(report),
        }
    }

    pub fn format_report(&self, report: &Report) -> String {
        let mut output = self.format_summary(report);

        if self.verbosity == VerbosityLevel::Quiet {
            return output;
        }

        let listed: Vec<&Check> = report
            .checks
            .iter()
            .filter(|c| self.verbosity == VerbosityLevel::Verbose || c.status != CheckStatus::Pass)
            .collect();
        if !listed.is_empty() {
            output.push('\n');
            for check in listed {
                output.push_str(&self.format_check(check));
                output.push('\n');
            }
        }
        output
    }

    pub fn format_check(&self, check: &Check) -> String {
        let label = match check.status {
            CheckStatus::Pass => self.colorize("✓ PASS", "32"),
            CheckStatus::Warn => self.colorize("⚠ WARN", "33"),
            CheckStatus::Fail => self.colorize("✗ FAIL", "31"),
        };
        match &check.info {
            Some(info) => format!("{}  {} - {}", label, check.id, info),
            None => format!("{}  {}", label, check.id),
        }
    }

    fn format_summary(&self, report: &Report) -> String {
        let counts = report.counts();
        let classification = match report.scan.classification {
            Classification::Copc => self.colorize("COPC", "32"),
            Classification::Las => self.colorize("LAS", "33"),
            Classification::Unknown => self.colorize("Unknown", "31"),
        };

        if self.verbosity == VerbosityLevel::Quiet {
            return format!(
                "{}: {} (pass: {} warn: {} fail: {})\n",
                report.name, classification, counts.pass, counts.warn, counts.fail
            );
        }

        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Source: {}\n", report.name));
        output.push_str(&format!("  Classification: {}\n", classification));
        output.push_str(&format!("  Scan mode: {}\n", report.scan.mode));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Pass:", "32"),
            counts.pass
        ));
        if counts.warn > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Warn:", "33"),
                counts.warn
            ));
        }
        if counts.fail > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Fail:", "31"),
                counts.fail
            ));
        }
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(Duration::from_millis(report.scan.duration_ms))
        ));
        if let Some(error) = &report.error {
            output.push_str(&format!("  Error: {}\n", error));
        }
        if let Some(copc_error) = &report.copc_error {
            output.push_str(&format!("  COPC error: {}\n", copc_error));
        }
        output
    }
}

/// The report as pretty-printed JSON
pub fn format_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Write rendered output to `path`, or to stdout when no path is given
pub async fn write_output(rendered: &str, path: Option<&Path>) -> std::io::Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, rendered).await,
        None => {
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
