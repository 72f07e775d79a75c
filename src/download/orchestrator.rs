//! Download orchestrator
//!
//! Fetches batches of [`DownloadDescriptor`]s under a concurrency cap. Every
//! descriptor produces exactly one [`DownloadOutcome`]; a failed item never
//! aborts the rest of the batch.
//!
//! # Per-item flow
//!
//! 1. Resolve the file name (explicit, URL path, or `fileNNNN` placeholder)
//! 2. GET the URL with the configured timeout; the next item may start as
//!    soon as the request has been handed to the transport
//! 3. On a 2xx status, stream the body into `<name>.unfinished`
//! 4. Verify the SHA-256 digest if one was given
//! 5. Rename to `<name>`, or to `<name>.corrupt` on mismatch

use super::filename::{resolve_filename, validate_stem_pattern, PlaceholderNames};
use super::scheduler::{BoundedScheduler, Concurrency, Dispatch, TaskOutcome};
use super::types::{DownloadDescriptor, DownloadJob, DownloadOutcome};
use super::writer::{AtomicFileWriter, WriteOutcome};
use crate::config::Config;
use crate::http::{build_http_client, classify_download_error};
use crate::DownloadError;
use reqwest::Client;
use std::future::{poll_fn, Future};
use std::path::PathBuf;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use tokio::sync::mpsc;

/// Batch settings of a [`Downloader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Maximum number of downloads in flight
    pub concurrency: Concurrency,

    /// Timeout of a single request, body included
    pub timeout: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Counters shared by all batches of one downloader
#[derive(Debug, Default)]
pub struct DownloadStats {
    requests_started: AtomicU64,
    requests_finished: AtomicU64,
    files_saved: AtomicU64,
    bytes_received: AtomicU64,
}

/// Point-in-time copy of [`DownloadStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests handed to the transport
    pub requests_started: u64,

    /// Requests that received a response head or failed
    pub requests_finished: u64,

    /// Files renamed to their clean name
    pub files_saved: u64,

    /// Body bytes written to disk
    pub bytes_received: u64,
}

impl DownloadStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            requests_finished: self.requests_finished.load(Ordering::Relaxed),
            files_saved: self.files_saved.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.requests_started.store(0, Ordering::Relaxed);
        self.requests_finished.store(0, Ordering::Relaxed);
        self.files_saved.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
    }
}

/// Downloads files in bounded-concurrency batches
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    options: DownloadOptions,
    stats: Arc<DownloadStats>,
}

/// Result of one fetch with its place in the start sequence
struct Fetched {
    start_seq: Option<u64>,
    result: Result<PathBuf, DownloadError>,
}

type RawOutcome = TaskOutcome<Fetched>;

impl Downloader {
    /// Creates a downloader on top of an existing HTTP client
    pub fn new(client: Client, options: DownloadOptions) -> Self {
        Self {
            client,
            options,
            stats: Arc::new(DownloadStats::default()),
        }
    }

    /// Creates a downloader from the `[download]` and `[user-agent]` config
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent)?;
        Ok(Self::new(
            client,
            DownloadOptions {
                concurrency: Concurrency::from_limit(config.download.max_concurrent),
                timeout: Duration::from_secs(config.download.timeout_secs),
            },
        ))
    }

    pub fn options(&self) -> DownloadOptions {
        self.options
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Downloads a single file
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Clean path of the saved file
    /// * `Err(DownloadError)` - Transport, verification or IO failure
    pub async fn download_one<T>(
        &self,
        descriptor: DownloadDescriptor<T>,
    ) -> Result<PathBuf, DownloadError> {
        let (job, _token) = descriptor.into_parts();
        self.fetch(job, &PlaceholderNames::new(), Dispatch::detached())
            .await
            .result
    }

    /// Downloads a batch and waits for all of it
    ///
    /// # Returns
    ///
    /// One outcome per descriptor, in submission order
    pub async fn download_all<T>(
        &self,
        descriptors: Vec<DownloadDescriptor<T>>,
    ) -> Vec<DownloadOutcome<T>> {
        let count = descriptors.len();
        tracing::info!(
            "Downloading {} file(s), concurrency {:?}",
            count,
            self.options.concurrency
        );

        let mut slots: Vec<Option<DownloadOutcome<T>>> = (0..count).map(|_| None).collect();
        let mut stream = self.download_stream(descriptors);
        while let Some((index, outcome)) = stream.next_indexed().await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(outcome);
            }
        }

        let outcomes: Vec<DownloadOutcome<T>> = slots.into_iter().flatten().collect();
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            "Download batch finished: {} succeeded, {} failed",
            outcomes.len() - failed,
            failed
        );
        outcomes
    }

    /// Starts a batch and yields outcomes as they complete
    ///
    /// Must be called from within a Tokio runtime. Dropping the stream does
    /// not cancel downloads that are already running.
    pub fn download_stream<T>(&self, descriptors: Vec<DownloadDescriptor<T>>) -> DownloadStream<T> {
        let placeholders = Arc::new(PlaceholderNames::new());
        let mut pending = Vec::with_capacity(descriptors.len());
        let mut tasks = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let (job, token) = descriptor.into_parts();
            pending.push(Some((job.url.clone(), token)));

            let downloader = self.clone();
            let placeholders = placeholders.clone();
            tasks.push(move |dispatch: Dispatch| async move {
                downloader.fetch(job, &placeholders, dispatch).await
            });
        }

        let scheduler = BoundedScheduler::new(self.options.concurrency);
        DownloadStream {
            remaining: pending.len(),
            receiver: scheduler.run_streaming(tasks),
            pending,
        }
    }

    async fn fetch(
        &self,
        job: DownloadJob,
        placeholders: &PlaceholderNames,
        dispatch: Dispatch,
    ) -> Fetched {
        if let Err(error) = validate_stem_pattern(job.stem_pattern.as_deref()) {
            return Fetched {
                start_seq: None,
                result: Err(error),
            };
        }

        let filename = resolve_filename(
            &job.url,
            &job.to_dir,
            job.filename.as_deref(),
            job.stem_pattern.as_deref(),
            placeholders,
        );
        let destination = job.to_dir.join(&filename);

        tracing::debug!("GET {}", job.url);
        let request = self
            .client
            .get(&job.url)
            .timeout(self.options.timeout)
            .send();
        let (start_seq, sent) = self.hand_off(request, dispatch).await;
        self.stats.requests_finished.fetch_add(1, Ordering::Relaxed);

        Fetched {
            start_seq: Some(start_seq),
            result: self.receive(job, destination, sent).await,
        }
    }

    /// Polls `request` once so that the transport has taken it, then
    /// releases `dispatch` and waits for the output
    ///
    /// Returns the start sequence number of the request with the output.
    async fn hand_off<F: Future>(&self, request: F, dispatch: Dispatch) -> (u64, F::Output) {
        let mut request = pin!(request);
        let early = poll_fn(|cx| match request.as_mut().poll(cx) {
            Poll::Ready(output) => Poll::Ready(Some(output)),
            Poll::Pending => Poll::Ready(None),
        })
        .await;

        let start_seq = self.stats.requests_started.fetch_add(1, Ordering::Relaxed);
        dispatch.release();

        let output = match early {
            Some(output) => output,
            None => request.await,
        };
        (start_seq, output)
    }

    async fn receive(
        &self,
        job: DownloadJob,
        destination: PathBuf,
        sent: reqwest::Result<reqwest::Response>,
    ) -> Result<PathBuf, DownloadError> {
        let mut response = sent.map_err(|e| classify_download_error(&job.url, e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!("HTTP {} for {}", status.as_u16(), job.url);
            return Err(DownloadError::Status {
                url: job.url,
                status: status.as_u16(),
            });
        }

        tokio::fs::create_dir_all(&job.to_dir)
            .await
            .map_err(|source| DownloadError::Io {
                path: job.to_dir.clone(),
                source,
            })?;

        let mut writer = AtomicFileWriter::create(destination.clone(), job.sha256.as_deref())
            .await
            .map_err(|source| DownloadError::Io {
                path: destination.clone(),
                source,
            })?;
        let temp_path = writer.temp_path().to_path_buf();

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_download_error(&job.url, e))?
        {
            writer
                .write_chunk(&chunk)
                .await
                .map_err(|source| DownloadError::Io {
                    path: temp_path.clone(),
                    source,
                })?;
            self.stats
                .bytes_received
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }

        let finished = writer.finish().await.map_err(|source| DownloadError::Io {
            path: temp_path.clone(),
            source,
        })?;

        match finished {
            WriteOutcome::Complete { path, bytes } => {
                self.stats.files_saved.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Saved {} ({} bytes)", path.display(), bytes);
                Ok(path)
            }
            WriteOutcome::Corrupt {
                path,
                expected,
                calculated,
                ..
            } => {
                tracing::warn!(
                    "Checksum mismatch for {}: expected {}, calculated {}",
                    job.url,
                    expected,
                    calculated
                );
                Err(DownloadError::Corrupt {
                    url: job.url,
                    path,
                    expected,
                    calculated,
                })
            }
        }
    }
}

/// Outcomes of a running batch in completion order
pub struct DownloadStream<T> {
    receiver: mpsc::Receiver<(usize, RawOutcome)>,
    pending: Vec<Option<(String, T)>>,
    remaining: usize,
}

impl<T> DownloadStream<T> {
    /// Waits for the next finished download
    ///
    /// Returns `None` once every descriptor has produced its outcome.
    pub async fn next(&mut self) -> Option<DownloadOutcome<T>> {
        self.next_indexed().await.map(|(_, outcome)| outcome)
    }

    /// Number of outcomes not yet returned
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub(crate) async fn next_indexed(&mut self) -> Option<(usize, DownloadOutcome<T>)> {
        if self.remaining == 0 {
            return None;
        }

        while let Some((index, raw)) = self.receiver.recv().await {
            if let Some((url, token)) = self.pending.get_mut(index).and_then(Option::take) {
                self.remaining -= 1;
                let (start_seq, result) = match raw {
                    Ok(fetched) => (fetched.start_seq, fetched.result),
                    Err(source) => (
                        None,
                        Err(DownloadError::Task {
                            url: url.clone(),
                            source,
                        }),
                    ),
                };
                let outcome = DownloadOutcome::from_result(url, result, start_seq, token);
                return Some((index, outcome));
            }
        }

        // Scheduler went away; hand back the remaining tokens
        let index = self.pending.iter().position(Option::is_some)?;
        let (url, token) = self.pending.get_mut(index).and_then(Option::take)?;
        self.remaining -= 1;
        let error = DownloadError::Task {
            url: url.clone(),
            source: super::scheduler::SchedulerError::Cancelled,
        };
        Some((index, DownloadOutcome::from_result(url, Err(error), None, token)))
    }
}
