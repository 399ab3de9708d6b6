//! Console summary of a finished sweep

use crate::output::types::Report;
use crate::validator::LinkVerdict;

/// Issues listed on the console before the rest are left to the report file
const MAX_LISTED: usize = 25;

/// Prints the report summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_summary(report: &Report) {
    let summary = &report.summary;

    println!("=== Link Check Summary ===\n");

    println!("Overview:");
    println!("  Seed: {}", report.seed);
    println!("  Pages crawled: {}", summary.total_pages);
    println!("  Pages with errors: {}", summary.pages_with_errors);
    println!("  References found: {}", summary.total_references);
    println!("  Unique links: {}", summary.unique_links);
    println!(
        "  Checked: {} ({} requests across {} hosts), skipped: {}",
        summary.checked, report.hosts.requests, report.hosts.checked, summary.skipped
    );
    println!("  Duration: {:.1}s", report.elapsed_ms as f64 / 1000.0);
    println!();

    println!("Results:");
    let resolved = summary.resolved();
    for (label, count) in [
        ("OK", summary.ok),
        ("Broken", summary.broken),
        ("Warnings", summary.warnings),
        ("Redirects", summary.redirects),
    ] {
        let percentage = if resolved > 0 {
            (count as f64 / resolved as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage);
    }
    println!();

    if summary.broken > 0 {
        println!("Broken Links ({}):", summary.broken);
        for verdict in report.broken().take(MAX_LISTED) {
            println!(
                "  - {} [{}] (on {} page(s))",
                verdict.url,
                verdict.outcome,
                distinct_pages(verdict)
            );
        }
        if summary.broken > MAX_LISTED {
            println!("  ... and {} more", summary.broken - MAX_LISTED);
        }
        println!();
    }

    if !report.hosts.dns_failed.is_empty() {
        println!("Unreachable Hosts ({}):", report.hosts.dns_failed.len());
        for host in &report.hosts.dns_failed {
            println!("  - {}", host);
        }
        println!();
    }

    if !report.hosts.circuit_open.is_empty() {
        println!("Rate Limited Hosts ({}):", report.hosts.circuit_open.len());
        for host in &report.hosts.circuit_open {
            println!("  - {}", host);
        }
        println!();
    }

    if report.cancelled {
        println!("Sweep was cancelled; results are partial.");
    }
}

fn distinct_pages(verdict: &LinkVerdict) -> usize {
    let mut pages: Vec<_> = verdict.occurrences.iter().map(|o| &o.page_url).collect();
    pages.dedup();
    pages.len()
}
