//! Summaries of queries and download batches
//!
//! This module condenses a [`QueryResult`] or a finished download batch into
//! counters and prints them to stdout.

use crate::download::{DownloadOutcome, StatsSnapshot};
use crate::query::QueryResult;
use crate::DownloadError;

/// Query summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStatistics {
    /// Pages retrieved
    pub pages: usize,

    /// Filings in the result
    pub filings: usize,

    /// Filings matching the query according to the API
    pub query_filing_count: Option<i64>,

    /// Distinct entities linked to the result
    pub entities: usize,

    /// Distinct validation messages linked to the result
    pub validation_messages: usize,

    pub duplicate_filings: usize,
    pub missing_references: usize,
    pub orphans: usize,
    pub unexpected_types: usize,
    pub value_failures: usize,
    pub unaccessed_key_paths: usize,
}

impl QueryStatistics {
    pub fn from_result(result: &QueryResult) -> Self {
        let diagnostics = &result.diagnostics;
        Self {
            pages: result.pages.len(),
            filings: result.filings.len(),
            query_filing_count: result.query_filing_count,
            entities: result.filings.entities().len(),
            validation_messages: result.filings.validation_messages().len(),
            duplicate_filings: diagnostics.duplicate_filings().len(),
            missing_references: diagnostics.missing_references().len(),
            orphans: diagnostics.orphans().len(),
            unexpected_types: diagnostics.unexpected_resource_types().count(),
            value_failures: diagnostics.value_failures().len(),
            unaccessed_key_paths: diagnostics.unaccessed_key_paths().count(),
        }
    }

    /// Number of inconsistencies found in the upstream data
    pub fn issue_count(&self) -> usize {
        self.duplicate_filings
            + self.missing_references
            + self.orphans
            + self.unexpected_types
            + self.value_failures
    }
}

/// Download batch summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStatistics {
    pub total: usize,
    pub succeeded: usize,
    /// Connection errors, error statuses and timeouts
    pub transport_errors: usize,
    /// Checksum mismatches
    pub corrupt: usize,
    /// IO and other errors
    pub other_errors: usize,
    pub bytes_received: u64,
}

impl DownloadStatistics {
    pub fn from_outcomes<T>(outcomes: &[DownloadOutcome<T>], snapshot: StatsSnapshot) -> Self {
        let mut stats = Self {
            total: outcomes.len(),
            bytes_received: snapshot.bytes_received,
            ..Self::default()
        };

        for outcome in outcomes {
            match &outcome.error {
                None => stats.succeeded += 1,
                Some(e) if e.is_transport() => stats.transport_errors += 1,
                Some(e) if e.is_corrupt() => stats.corrupt += 1,
                Some(_) => stats.other_errors += 1,
            }
        }
        stats
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

/// Prints query statistics to stdout
pub fn print_query_statistics(stats: &QueryStatistics) {
    println!("=== Query Statistics ===\n");

    println!("Overview:");
    println!("  Pages retrieved: {}", stats.pages);
    match stats.query_filing_count {
        Some(count) => println!("  Filings: {} (of {} matching)", stats.filings, count),
        None => println!("  Filings: {}", stats.filings),
    }
    println!("  Entities: {}", stats.entities);
    println!("  Validation messages: {}", stats.validation_messages);
    println!();

    if stats.issue_count() > 0 {
        println!("Data Issues:");
        for (label, count) in [
            ("Duplicate filings", stats.duplicate_filings),
            ("Missing references", stats.missing_references),
            ("Orphaned subresources", stats.orphans),
            ("Unexpected resource types", stats.unexpected_types),
            ("Unparseable values", stats.value_failures),
        ] {
            if count > 0 {
                println!("  {}: {}", label, count);
            }
        }
        println!();
    }

    if stats.unaccessed_key_paths > 0 {
        println!(
            "Unknown API fields: {} (run with -v to list them)",
            stats.unaccessed_key_paths
        );
        println!();
    }
}

/// Prints download statistics to stdout
pub fn print_download_statistics<T>(stats: &DownloadStatistics, outcomes: &[DownloadOutcome<T>]) {
    println!("=== Download Statistics ===\n");

    println!("  Files: {}", stats.total);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Transport errors: {}", stats.transport_errors);
    println!("  Corrupt: {}", stats.corrupt);
    if stats.other_errors > 0 {
        println!("  Other errors: {}", stats.other_errors);
    }
    println!("  Bytes received: {}", stats.bytes_received);
    println!();

    let failures: Vec<&DownloadError> = outcomes.iter().filter_map(|o| o.error.as_ref()).collect();
    if !failures.is_empty() {
        println!("Failures ({}):", failures.len());
        for error in failures {
            println!("  - {}", error);
        }
        println!();
    }

    let success_rate = if stats.total > 0 {
        (stats.succeeded as f64 / stats.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} files downloaded)",
        success_rate, stats.succeeded, stats.total
    );
}
