//! Downloading of filing artifacts
//!
//! This module handles:
//! - Bounded-concurrency scheduling with deterministic start order
//! - File name resolution and stem patterns
//! - Streaming bodies to disk under a temporary name
//! - SHA-256 verification of downloaded files

pub mod checksum;
pub mod filename;
pub mod orchestrator;
pub mod scheduler;
pub mod types;
pub mod writer;

pub use checksum::{sha256_file, sha256_hex, ChecksumVerifier, Verification};
pub use filename::{validate_stem_pattern, PlaceholderNames, NAME_PLACEHOLDER};
pub use orchestrator::{DownloadOptions, DownloadStats, DownloadStream, Downloader, StatsSnapshot};
pub use scheduler::{BoundedScheduler, Concurrency, Dispatch, SchedulerError, TaskOutcome};
pub use types::{first_error, into_result, DownloadDescriptor, DownloadOutcome};
pub use writer::{AtomicFileWriter, WriteOutcome, CORRUPT_SUFFIX, UNFINISHED_SUFFIX};
