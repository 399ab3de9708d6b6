//! Output module for building and writing sweep reports
//!
//! This module handles:
//! - Folding pages and verdicts into a deterministic report
//! - Writing the report as markdown or JSON
//! - Printing a console summary

mod aggregator;
mod markdown;
pub mod stats;
mod types;

pub use aggregator::Aggregator;
pub use markdown::{format_markdown_report, write_markdown_report};
pub use stats::print_summary;
pub use types::{
    HostSummary, OutputError, OutputResult, PageStats, Report, ReportMeta, ReportSummary,
};

use crate::config::ReportFormat;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Formats a report as pretty-printed JSON
pub fn format_json_report(report: &Report) -> OutputResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Writes a report to `output_path` in the requested format
pub fn write_report(report: &Report, format: ReportFormat, output_path: &Path) -> OutputResult<()> {
    match format {
        ReportFormat::Markdown => write_markdown_report(report, output_path),
        ReportFormat::Json => {
            let json = format_json_report(report)?;
            let mut file = File::create(output_path)?;
            file.write_all(json.as_bytes())?;
            Ok(())
        }
    }
}
