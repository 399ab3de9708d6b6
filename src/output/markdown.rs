//! Markdown report generation
//!
//! Renders a [`Report`] as a human-readable markdown document: run details,
//! summary counts, every issue with the pages that reference it, and the
//! pages and hosts that could not be checked.

use crate::output::types::{OutputResult, Report};
use crate::validator::LinkVerdict;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Occurrences listed per issue before the rest are collapsed
const MAX_OCCURRENCES: usize = 20;

/// Writes the markdown report to `output_path`
///
/// # Arguments
///
/// * `report` - The finished report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_markdown_report(report: &Report, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a report as markdown
pub fn format_markdown_report(report: &Report) -> String {
    let mut md = String::new();
    let summary = &report.summary;

    md.push_str("# Link Check Report\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", report.seed));
    md.push_str(&format!("- **Origin**: {}\n", report.origin_host));
    md.push_str(&format!(
        "- **Generated**: {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        report.elapsed_ms as f64 / 1000.0
    ));
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    if report.cancelled {
        md.push_str("- **Status**: cancelled (partial results)\n");
    } else {
        md.push_str("- **Status**: completed\n");
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Pages crawled | {} |\n", summary.total_pages));
    md.push_str(&format!(
        "| Pages with errors | {} |\n",
        summary.pages_with_errors
    ));
    md.push_str(&format!(
        "| References found | {} |\n",
        summary.total_references
    ));
    md.push_str(&format!("| Unique links | {} |\n", summary.unique_links));
    md.push_str(&format!("| Checked | {} |\n", summary.checked));
    md.push_str(&format!("| Skipped | {} |\n", summary.skipped));
    md.push_str(&format!("| OK | {} |\n", summary.ok));
    md.push_str(&format!("| Broken | {} |\n", summary.broken));
    md.push_str(&format!("| Warnings | {} |\n", summary.warnings));
    md.push_str(&format!("| Redirects | {} |\n\n", summary.redirects));
    md.push_str(&format!(
        "Broken rate: {:.2}% of {} resolved links\n\n",
        summary.broken_rate(),
        summary.resolved()
    ));

    write_issue_section(&mut md, "Broken Links", report.broken());
    write_issue_section(&mut md, "Warnings", report.warnings());
    write_issue_section(&mut md, "Redirects", report.redirects());

    // Pages that could not be fetched
    let failed_pages: Vec<_> = report.pages.iter().filter(|p| p.error.is_some()).collect();
    if !failed_pages.is_empty() {
        md.push_str("## Pages With Errors\n\n");
        md.push_str("| Page | Status | Error |\n");
        md.push_str("|------|--------|-------|\n");
        for page in failed_pages {
            let status = page
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                page.url,
                status,
                escape_cell(page.error.as_deref().unwrap_or_default())
            ));
        }
        md.push('\n');
    }

    if !report.hosts.dns_failed.is_empty() {
        md.push_str("## Unreachable Hosts\n\n");
        for host in &report.hosts.dns_failed {
            md.push_str(&format!("- {}\n", host));
        }
        md.push('\n');
    }

    if !report.hosts.circuit_open.is_empty() {
        md.push_str("## Hosts Not Fully Checked\n\n");
        md.push_str("These hosts stopped answering; their remaining links are reported as warnings.\n\n");
        for host in &report.hosts.circuit_open {
            md.push_str(&format!("- {}\n", host));
        }
        md.push('\n');
    }

    md
}

fn write_issue_section<'a>(
    md: &mut String,
    title: &str,
    issues: impl Iterator<Item = &'a LinkVerdict>,
) {
    let issues: Vec<_> = issues.collect();
    if issues.is_empty() {
        return;
    }

    md.push_str(&format!("## {} ({})\n\n", title, issues.len()));

    for verdict in issues {
        md.push_str(&format!("### {}\n\n", verdict.url));
        md.push_str(&format!("- **Result**: {}\n", verdict.outcome));
        md.push_str(&format!(
            "- **Referenced from** ({}):\n",
            verdict.occurrences.len()
        ));

        for occurrence in verdict.occurrences.iter().take(MAX_OCCURRENCES) {
            if occurrence.text.is_empty() {
                md.push_str(&format!(
                    "  - {} ({})\n",
                    occurrence.page_url, occurrence.kind
                ));
            } else {
                md.push_str(&format!(
                    "  - {} ({}: \"{}\")\n",
                    occurrence.page_url, occurrence.kind, occurrence.text
                ));
            }
        }
        if verdict.occurrences.len() > MAX_OCCURRENCES {
            md.push_str(&format!(
                "  - ... and {} more\n",
                verdict.occurrences.len() - MAX_OCCURRENCES
            ));
        }
        md.push('\n');
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
