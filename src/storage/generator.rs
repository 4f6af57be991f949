//! Deterministic user generator
//!
//! [`generate`] and [`generate_range`] are pure: record `i` (0-based) always
//! has id `i + 1` and the same attribute values, so tests and the mock server
//! agree on the dataset without shipping it.
//!
//! Large datasets are produced off the async runtime by [`GeneratorTask`],
//! which runs on a blocking thread and streams [`GeneratorMessage`]s through a
//! bounded channel:
//!
//! ```text
//! spawn_blocking ──Batch/Progress──▶ mpsc(channel_capacity) ──▶ GeneratorTask::recv()
//!       ▲                                                            │
//!       └──────────────── cancel flag (AtomicBool) ◀─────────── cancel()
//! ```

use crate::cache::events::{CacheEvent, CacheEvents};
use crate::config::GeneratorSettings;
use crate::core::error::{CacheError, CacheResult};
use crate::core::user::User;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEPARTMENTS: [&str; 4] = ["IT", "HR", "Sales", "Marketing"];
const COMPANIES: [&str; 3] = ["Company A", "Company B", "Company C"];
const JOB_TITLES: [&str; 3] = ["Developer", "Manager", "Director"];

/// The record at 0-based position `index`
pub fn user_at(index: usize) -> User {
    User {
        id: index as u64 + 1,
        name: format!("User{}", index),
        surname: format!("Surname{}", index % 100),
        age: 18 + (index % 50) as u32,
        email: format!("user{}@test.com", index),
        department: DEPARTMENTS[index % DEPARTMENTS.len()].to_string(),
        company: COMPANIES[index % COMPANIES.len()].to_string(),
        job_title: JOB_TITLES[index % JOB_TITLES.len()].to_string(),
    }
}

/// The first `count` records
pub fn generate(count: usize) -> Vec<User> {
    generate_range(0, count)
}

/// `len` records starting at 0-based position `start`
pub fn generate_range(start: usize, len: usize) -> Vec<User> {
    (start..start.saturating_add(len)).map(user_at).collect()
}

/// Message from the generator thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratorMessage {
    /// Records at positions `start..start + users.len()`
    Batch { start: usize, users: Vec<User> },
    /// `loaded` of `total` records have been sent
    Progress { loaded: usize, total: usize },
    /// Every record was sent
    Complete { total: usize },
    /// Generation stopped early
    Error { message: String },
}

/// Handle to a running generator
pub struct GeneratorTask {
    receiver: mpsc::Receiver<GeneratorMessage>,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    total: usize,
}

impl GeneratorTask {
    /// Start generating `count` records on a blocking thread
    ///
    /// Counts up to `batch_threshold` arrive as one batch.
    pub fn spawn(count: usize, settings: &GeneratorSettings) -> Self {
        let batch_size = if count > settings.batch_threshold {
            settings.batch_size.max(1)
        } else {
            count.max(1)
        };
        let (sender, receiver) = mpsc::channel(settings.channel_capacity.max(1));
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancel);
        let handle = tokio::task::spawn_blocking(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                produce(count, batch_size, &sender, &flag)
            }));
            if outcome.is_err() {
                let _ = sender.blocking_send(GeneratorMessage::Error {
                    message: "generator thread panicked".to_string(),
                });
            }
        });

        tracing::info!(count, batch_size, "generator started");
        Self {
            receiver,
            cancel,
            handle,
            total: count,
        }
    }

    /// Number of records this task produces
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next message, or `None` once the generator is done
    pub async fn recv(&mut self) -> Option<GeneratorMessage> {
        self.receiver.recv().await
    }

    /// Ask the generator to stop after the current batch
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Stop the generator and wait for its thread to exit
    pub async fn cancel_and_join(self) -> CacheResult<()> {
        self.cancel();
        let Self {
            receiver, handle, ..
        } = self;
        // A generator blocked on a full channel wakes up with a send error
        drop(receiver);
        handle
            .await
            .map_err(|e| CacheError::Internal(format!("generator thread failed: {}", e)))
    }

    /// Receive everything and return the records in order
    pub async fn collect(self) -> CacheResult<Vec<User>> {
        self.collect_inner(None).await
    }

    /// Like [`collect`](Self::collect), publishing progress on `events`
    pub async fn collect_reporting(self, events: &CacheEvents) -> CacheResult<Vec<User>> {
        self.collect_inner(Some(events)).await
    }

    async fn collect_inner(mut self, events: Option<&CacheEvents>) -> CacheResult<Vec<User>> {
        let mut users = Vec::with_capacity(self.total);
        let mut failure = None;

        while let Some(message) = self.recv().await {
            match message {
                GeneratorMessage::Batch { users: batch, .. } => users.extend(batch),
                GeneratorMessage::Progress { loaded, total } => {
                    tracing::debug!(loaded, total, "generator progress");
                    if let Some(events) = events {
                        events.publish(CacheEvent::GeneratorProgress { loaded, total });
                    }
                }
                GeneratorMessage::Complete { total } => {
                    tracing::info!(total, "generator complete");
                }
                GeneratorMessage::Error { message } => {
                    failure = Some(CacheError::Internal(message));
                }
            }
        }

        self.handle
            .await
            .map_err(|e| CacheError::Internal(format!("generator thread failed: {}", e)))?;
        match failure {
            Some(err) => Err(err),
            None => Ok(users),
        }
    }
}

fn produce(
    count: usize,
    batch_size: usize,
    sender: &mpsc::Sender<GeneratorMessage>,
    cancel: &AtomicBool,
) {
    let mut start = 0;
    while start < count {
        if cancel.load(Ordering::Acquire) {
            tracing::debug!(loaded = start, total = count, "generator cancelled");
            return;
        }

        let len = batch_size.min(count - start);
        let users = generate_range(start, len);
        if sender
            .blocking_send(GeneratorMessage::Batch { start, users })
            .is_err()
        {
            return;
        }
        start += len;

        if sender
            .blocking_send(GeneratorMessage::Progress {
                loaded: start,
                total: count,
            })
            .is_err()
        {
            return;
        }
    }
    let _ = sender.blocking_send(GeneratorMessage::Complete { total: count });
}
