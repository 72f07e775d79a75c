//! Bounded task scheduler
//!
//! Runs an ordered list of independent tasks with at most `n` in flight.
//! Concurrency is limited with a semaphore: a permit is acquired before a
//! task is spawned and released when it finishes.
//!
//! Tasks are launched strictly in list order. Each task receives a
//! [`Dispatch`] token and the next task is not launched before the token is
//! released (or dropped). This holds for [`Concurrency::Unlimited`] too.
//! Downloads release the token as soon as the request has been handed to the
//! transport, so start order equals submission order while a slow response
//! never holds back later tasks beyond the cap.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Semaphore};

/// Maximum number of tasks in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Limited(NonZeroUsize),
    Unlimited,
}

impl Concurrency {
    /// Converts a numeric limit, where zero means unlimited
    pub fn from_limit(limit: usize) -> Self {
        NonZeroUsize::new(limit)
            .map(Concurrency::Limited)
            .unwrap_or(Concurrency::Unlimited)
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Concurrency::Limited(n) => Some(n.get()),
            Concurrency::Unlimited => None,
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::from_limit(5)
    }
}

/// Failure of a task that did not produce a value
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled")]
    Cancelled,
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(error: tokio::task::JoinError) -> Self {
        if !error.is_panic() {
            return SchedulerError::Cancelled;
        }

        let payload = error.into_panic();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        SchedulerError::Panicked(message)
    }
}

/// Outcome of a single scheduled task
pub type TaskOutcome<T> = Result<T, SchedulerError>;

/// Start-of-work token handed to each task
///
/// The scheduler launches the next task once this token is released or
/// dropped.
#[derive(Debug)]
pub struct Dispatch {
    notify: Option<oneshot::Sender<()>>,
}

impl Dispatch {
    /// A token that is not connected to any scheduler
    pub fn detached() -> Self {
        Self { notify: None }
    }

    /// Signals that this task has started its work
    pub fn release(mut self) {
        if let Some(notify) = self.notify.take() {
            let _ = notify.send(());
        }
    }
}

/// Runs tasks in order under a concurrency cap
#[derive(Debug, Clone)]
pub struct BoundedScheduler {
    concurrency: Concurrency,
}

impl BoundedScheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum number of tasks in flight
    pub fn new(concurrency: Concurrency) -> Self {
        Self { concurrency }
    }

    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    /// Launches all tasks and returns their outcomes in completion order
    ///
    /// Each item is `(index, outcome)` where `index` is the position of the
    /// task in `tasks`. The receiver yields exactly one item per task and is
    /// closed afterwards.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run_streaming<F, Fut, T>(&self, tasks: Vec<F>) -> mpsc::Receiver<(usize, TaskOutcome<T>)>
    where
        F: FnOnce(Dispatch) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (results, receiver) = mpsc::channel(tasks.len().max(1));
        let semaphore = self
            .concurrency
            .limit()
            .map(|n| Arc::new(Semaphore::new(n)));

        tokio::spawn(async move {
            for (index, task) in tasks.into_iter().enumerate() {
                let permit = match &semaphore {
                    Some(semaphore) => match semaphore.clone().acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                    None => None,
                };

                let (notify, started) = oneshot::channel();
                let handle = tokio::spawn(task(Dispatch {
                    notify: Some(notify),
                }));

                let results = results.clone();
                tokio::spawn(async move {
                    let outcome = handle.await.map_err(SchedulerError::from);
                    drop(permit);
                    let _ = results.send((index, outcome)).await;
                });

                // Released or dropped both count as started
                let _ = started.await;
                tracing::trace!("Dispatched task {}", index);
            }
        });

        receiver
    }

    /// Launches all tasks and waits for every outcome
    ///
    /// # Returns
    ///
    /// One outcome per task, in the order of `tasks`
    pub async fn run<F, Fut, T>(&self, tasks: Vec<F>) -> Vec<TaskOutcome<T>>
    where
        F: FnOnce(Dispatch) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let count = tasks.len();
        let mut slots: Vec<Option<TaskOutcome<T>>> = (0..count).map(|_| None).collect();
        let mut receiver = self.run_streaming(tasks);

        while let Some((index, outcome)) = receiver.recv().await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(outcome);
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(SchedulerError::Cancelled)))
            .collect()
    }
}
