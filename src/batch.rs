//! Batched, resumable submission of work items to the collection service.
//!
//! Work is cut into consecutive chunks of at most `batch_size` items and sent
//! one chunk at a time through [`with_backoff`]. After every confirmed chunk
//! the processed set is persisted before anything else happens, so a crash
//! loses at most the chunk in flight.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::SpoderConfig;
use crate::retry::{RetryPolicy, with_backoff};
use crate::spotify::{CollectionError, CollectionService, WorkItem};
use crate::state_machine::Session;
use crate::store::CredentialStore;
use crate::ui::{Reporter, Status};

/// Percentages announced once each as a run progresses.
pub const PROGRESS_THRESHOLDS: [u8; 6] = [1, 5, 10, 20, 50, 90];

/// Tracks confirmed work and which thresholds have been announced.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    done: usize,
    announced: BTreeSet<u8>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            announced: BTreeSet::new(),
        }
    }

    /// `floor(done * 100 / total)`; an empty run counts as complete.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.done * 100 / self.total
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Count `confirmed` more items and return the thresholds crossed for
    /// the first time, ascending.
    pub fn record(&mut self, confirmed: usize) -> Vec<u8> {
        self.done += confirmed;
        let percent = self.percent();
        PROGRESS_THRESHOLDS
            .iter()
            .copied()
            .filter(|&t| percent >= usize::from(t) && self.announced.insert(t))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub pause_ms: u64,
    pub pause_jitter_ms: u64,
}

impl From<&SpoderConfig> for BatchSettings {
    fn from(config: &SpoderConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            retry: config.submit_retry,
            pause_ms: config.batch_pause_ms,
            pause_jitter_ms: config.batch_pause_jitter_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Chunks sent, including ones that ultimately failed.
    pub submitted_batches: usize,
    /// Items confirmed by the service during this run.
    pub confirmed: usize,
    /// Chunks that failed after exhausting retries.
    pub failed_batches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// No acting user or no credential; nothing was sent.
    MissingPrerequisites,
    /// Every chunk was attempted.
    Finished(BatchReport),
    /// The service rejected the credential; remaining chunks were skipped.
    Unauthorized(BatchReport),
}

pub struct BatchSubmitter {
    collection: Arc<dyn CollectionService>,
    store: CredentialStore,
    session: Arc<Session>,
    reporter: Arc<dyn Reporter>,
    settings: BatchSettings,
}

impl BatchSubmitter {
    pub fn new(
        collection: Arc<dyn CollectionService>,
        store: CredentialStore,
        session: Arc<Session>,
        reporter: Arc<dyn Reporter>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            collection,
            store,
            session,
            reporter,
            settings,
        }
    }

    async fn pause(&self) {
        let jitter = if self.settings.pause_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.settings.pause_jitter_ms)
        };
        let delay = self.settings.pause_ms + jitter;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    /// Submit `work` in order, one chunk at a time.
    pub async fn submit(&self, work: &[WorkItem]) -> BatchOutcome {
        let user = self.store.acting_user();
        let credential = self.session.credential();
        let (Some(user), Some(credential)) = (user, credential) else {
            tracing::warn!("missing credential or acting user, nothing submitted");
            self.reporter.report(&Status::MissingPrerequisites);
            return BatchOutcome::MissingPrerequisites;
        };

        let mut progress = ProgressTracker::new(work.len());
        let mut report = BatchReport::default();

        for (index, chunk) in work.chunks(self.settings.batch_size).enumerate() {
            if index > 0 {
                self.pause().await;
            }

            let ids: Vec<String> = chunk.iter().map(|item| item.id.clone()).collect();
            report.submitted_batches += 1;

            let result = with_backoff(&self.settings.retry, || {
                self.collection.add_items(&credential, &user, &ids)
            })
            .await;

            match result {
                Ok(()) => {
                    self.session.merge_processed(ids.iter().cloned());
                    report.confirmed += ids.len();
                    self.store.save_processed(&self.session.processed_snapshot());

                    for percent in progress.record(ids.len()) {
                        self.reporter.report(&Status::Progress {
                            percent,
                            done: progress.done(),
                            total: progress.total(),
                        });
                    }
                    tracing::debug!(batch = index, size = ids.len(), "batch confirmed");
                }
                Err(CollectionError::Unauthorized) => {
                    tracing::warn!(batch = index, "credential rejected, halting run");
                    self.session.invalidate_credential();
                    self.store.clear_credential();
                    self.reporter.report(&Status::Unauthorized);
                    return BatchOutcome::Unauthorized(report);
                }
                Err(e) => {
                    tracing::warn!(error = %e, batch = index, "batch failed after retries");
                    report.failed_batches += 1;
                    self.reporter.report(&Status::BatchFailed { ids });
                }
            }
        }

        if report.confirmed > 0 {
            self.reporter.report(&Status::Summary {
                confirmed: report.confirmed,
            });
        } else {
            self.reporter.report(&Status::NothingNew);
        }
        BatchOutcome::Finished(report)
    }
}
