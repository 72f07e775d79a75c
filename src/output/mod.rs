//! Output of query and download results
//!
//! This module handles:
//! - Summary statistics of queries and download batches
//! - Tab-separated listings of filings and diagnostics

mod listing;
pub mod stats;

pub use listing::{write_diagnostics, write_filings, write_key_path_availability};
pub use stats::{
    print_download_statistics, print_query_statistics, DownloadStatistics, QueryStatistics,
};
