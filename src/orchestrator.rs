use std::sync::Arc;
use std::time::Duration;

use crate::acquisition::{CredentialAcquirer, CredentialCapture};
use crate::batch::{BatchOutcome, BatchSettings, BatchSubmitter};
use crate::config::SpoderConfig;
use crate::spotify::{
    ArtistSource, CollectionClient, CollectionService, HttpArtistSource, WorkItem,
};
use crate::state_machine::{AcquisitionState, CredentialSource, Diagnostics, Session};
use crate::store::{CredentialStore, LocalStore};
use crate::transport::{HttpTransport, RequestObserver};
use crate::ui::{Reporter, Status};

/// What a call to [`RunController::run`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A run already happened in this lifetime; nothing was done.
    AlreadyRan,
    /// The artist list was empty or could not be loaded.
    NoArtists,
    /// Every artist in the list was already processed.
    AllDone,
    /// Remaining work was handed to the batch submitter.
    Submitted(BatchOutcome),
    /// The pipeline panicked; the failure was logged and contained.
    Failed,
}

/// Runs the whole pipeline at most once per lifetime.
pub struct RunController {
    session: Arc<Session>,
    source: Arc<dyn ArtistSource>,
    store: CredentialStore,
    submitter: BatchSubmitter,
    reporter: Arc<dyn Reporter>,
}

impl RunController {
    pub fn new(
        session: Arc<Session>,
        source: Arc<dyn ArtistSource>,
        store: CredentialStore,
        submitter: BatchSubmitter,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            session,
            source,
            store,
            submitter,
            reporter,
        }
    }

    /// First call runs the pipeline; later calls return
    /// [`RunOutcome::AlreadyRan`] without side effects. Nothing escapes: a
    /// panic inside the pipeline is caught here and logged.
    pub async fn run(self: &Arc<Self>) -> RunOutcome {
        self.run_claimed(|| {}).await
    }

    /// Like [`run`](Self::run), calling `on_begin` only if this call is the
    /// one that performs the run.
    async fn run_claimed(self: &Arc<Self>, on_begin: impl FnOnce()) -> RunOutcome {
        if !self.session.begin_run() {
            return RunOutcome::AlreadyRan;
        }
        on_begin();

        let this = Arc::clone(self);
        match tokio::spawn(async move { this.execute().await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "run aborted");
                self.reporter.report(&Status::RunFailed {
                    reason: e.to_string(),
                });
                RunOutcome::Failed
            }
        }
    }

    async fn execute(&self) -> RunOutcome {
        let artists = self.source.fetch_artists().await;
        if artists.is_empty() {
            return RunOutcome::NoArtists;
        }

        self.session.merge_processed(self.store.load_processed());
        let todo: Vec<WorkItem> = artists
            .iter()
            .filter(|a| !self.session.is_processed(&a.id))
            .cloned()
            .collect();

        tracing::info!(total = artists.len(), remaining = todo.len(), "work planned");
        self.reporter.report(&Status::WorkPlanned {
            total: artists.len(),
            remaining: todo.len(),
        });

        if todo.is_empty() {
            self.reporter.report(&Status::AllDone);
            return RunOutcome::AllDone;
        }

        RunOutcome::Submitted(self.submitter.submit(&todo).await)
    }
}

/// External collaborators a [`Spoder`] is built from.
pub struct Collaborators {
    pub store: Arc<dyn LocalStore>,
    pub source: Arc<dyn ArtistSource>,
    pub collection: Arc<dyn CollectionService>,
    pub reporter: Arc<dyn Reporter>,
}

impl Collaborators {
    /// Artist source and collection client speaking HTTP over `transport`.
    pub fn http(
        config: &SpoderConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn LocalStore>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let source = HttpArtistSource::new(
            transport.clone(),
            config.source_url.as_str(),
            config.source_retry,
            reporter.clone(),
        );
        let collection = CollectionClient::new(
            transport,
            config.collection_url.as_str(),
            config.collection_set.as_str(),
            config.item_uri_prefix.as_str(),
        );
        Self {
            store,
            source: Arc::new(source),
            collection: Arc::new(collection),
            reporter,
        }
    }
}

/// Control surface handed to the host: start, run now, diagnostics, stop.
pub struct Spoder {
    session: Arc<Session>,
    acquirer: CredentialAcquirer,
    capture: Arc<CredentialCapture>,
    controller: Arc<RunController>,
    reporter: Arc<dyn Reporter>,
}

impl Spoder {
    pub fn new(config: &SpoderConfig, parts: Collaborators) -> Self {
        let session = Arc::new(Session::new());
        let store = CredentialStore::new(parts.store, config.store.clone());

        let acquirer = CredentialAcquirer::new(
            session.clone(),
            store.clone(),
            parts.reporter.clone(),
            Duration::from_millis(config.poll_interval_ms),
            config.poll_max_attempts,
        );
        let capture = Arc::new(CredentialCapture::new(
            session.clone(),
            parts.reporter.clone(),
        ));
        let submitter = BatchSubmitter::new(
            parts.collection,
            store.clone(),
            session.clone(),
            parts.reporter.clone(),
            BatchSettings::from(config),
        );
        let controller = Arc::new(RunController::new(
            session.clone(),
            parts.source,
            store,
            submitter,
            parts.reporter.clone(),
        ));

        Self {
            session,
            acquirer,
            capture,
            controller,
            reporter: parts.reporter,
        }
    }

    /// Observer to register on the host's transport for passive capture.
    pub fn observer(&self) -> Arc<dyn RequestObserver> {
        self.capture.clone()
    }

    /// Acquire a credential, then run once. Returns `None` when no
    /// credential was obtained and therefore nothing ran automatically.
    pub async fn start(&self) -> Option<RunOutcome> {
        self.acquire().await?;
        Some(self.run_acquired().await)
    }

    /// First half of [`start`](Self::start): wait for a credential.
    pub async fn acquire(&self) -> Option<CredentialSource> {
        self.reporter.report(&Status::Loaded);
        let source = self.acquirer.acquire().await?;
        tracing::info!(%source, "credential adopted");
        Some(source)
    }

    /// Second half of [`start`](Self::start). The state moves to RUNNING
    /// only if this call performs the run.
    pub async fn run_acquired(&self) -> RunOutcome {
        self.controller
            .run_claimed(|| {
                tracing::info!("starting run");
                self.session.advance(AcquisitionState::Running);
            })
            .await
    }

    /// Trigger a run manually. A no-op after the first run.
    pub async fn run_now(&self) -> RunOutcome {
        self.controller.run().await
    }

    pub fn diag(&self) -> Diagnostics {
        self.session.diagnostics()
    }

    /// Halt credential polling. An in-flight run is not affected.
    pub fn stop(&self) {
        self.acquirer.stop();
        self.reporter.report(&Status::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchReport;
    use crate::store::MemoryStore;
    use crate::test_support::{
        RecordingReporter, Reply, ScriptedCollection, StaticSource, fast_config, items,
    };
    use crate::transport::OutboundRequest;
    use async_trait::async_trait;

    struct Fixture {
        spoder: Spoder,
        store: Arc<MemoryStore>,
        source: Arc<StaticSource>,
        collection: Arc<ScriptedCollection>,
        reporter: Arc<RecordingReporter>,
    }

    fn fixture(
        config: SpoderConfig,
        store: MemoryStore,
        artists: Vec<WorkItem>,
        replies: Vec<Reply>,
    ) -> Fixture {
        let store = Arc::new(store);
        let source = Arc::new(StaticSource::new(artists));
        let collection = Arc::new(ScriptedCollection::with_replies(replies));
        let reporter = Arc::new(RecordingReporter::default());
        let spoder = Spoder::new(
            &config,
            Collaborators {
                store: store.clone(),
                source: source.clone(),
                collection: collection.clone(),
                reporter: reporter.clone(),
            },
        );
        Fixture {
            spoder,
            store,
            source,
            collection,
            reporter,
        }
    }

    fn logged_in(extra: &[(&str, &str)]) -> MemoryStore {
        let store = MemoryStore::with_entries([("zoe:prefs", "{}"), ("spotifyAccessToken", "tok")]);
        for (k, v) in extra {
            store.set(k, v).unwrap();
        }
        store
    }

    fn persisted(store: &MemoryStore) -> Vec<String> {
        let raw = store.get("spoderBlockedArtists").unwrap().unwrap_or_else(|| "[]".into());
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn start_with_stored_credential_runs_pipeline() {
        let config = SpoderConfig {
            batch_size: 2,
            ..fast_config()
        };
        let f = fixture(config, logged_in(&[]), items(&["1", "2", "3"]), vec![]);

        let outcome = f.spoder.start().await;

        assert_eq!(
            outcome,
            Some(RunOutcome::Submitted(BatchOutcome::Finished(BatchReport {
                submitted_batches: 2,
                confirmed: 3,
                failed_batches: 0,
            })))
        );
        assert_eq!(
            f.collection.batches(),
            vec![vec!["1".to_string(), "2".to_string()], vec!["3".to_string()]]
        );
        assert_eq!(persisted(&f.store), vec!["1", "2", "3"]);
        assert!(f.reporter.contains(&Status::Summary { confirmed: 3 }));

        let diag = f.spoder.diag();
        assert!(diag.has_credential);
        assert!(diag.has_run);
        assert_eq!(diag.processed_count, 3);
        assert_eq!(diag.poll_attempts, 0);
        assert_eq!(diag.state, AcquisitionState::Running);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let f = fixture(fast_config(), logged_in(&[]), items(&["1"]), vec![]);

        f.spoder.start().await;
        let again = f.spoder.run_now().await;
        let third = f.spoder.run_now().await;

        assert_eq!(again, RunOutcome::AlreadyRan);
        assert_eq!(third, RunOutcome::AlreadyRan);
        assert_eq!(f.source.fetches(), 1);
        assert_eq!(f.collection.call_count(), 1);
    }

    #[tokio::test]
    async fn everything_already_processed_submits_nothing() {
        let store = logged_in(&[("spoderBlockedArtists", r#"["1","2"]"#)]);
        let f = fixture(fast_config(), store, items(&["1", "2"]), vec![]);

        let outcome = f.spoder.start().await;

        assert_eq!(outcome, Some(RunOutcome::AllDone));
        assert_eq!(f.collection.call_count(), 0);
        assert!(f.reporter.contains(&Status::AllDone));
        assert_eq!(f.spoder.diag().processed_count, 2);
    }

    #[tokio::test]
    async fn only_remaining_items_are_submitted() {
        let store = logged_in(&[("spoderBlockedArtists", r#"["2"]"#)]);
        let f = fixture(fast_config(), store, items(&["1", "2", "3"]), vec![]);

        f.spoder.start().await;

        assert_eq!(
            f.collection.batches(),
            vec![vec!["1".to_string(), "3".to_string()]]
        );
        assert!(f.reporter.contains(&Status::WorkPlanned {
            total: 3,
            remaining: 2
        }));
        assert_eq!(persisted(&f.store), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn empty_source_ends_quietly() {
        let f = fixture(fast_config(), logged_in(&[]), vec![], vec![]);
        assert_eq!(f.spoder.start().await, Some(RunOutcome::NoArtists));
        assert_eq!(f.collection.call_count(), 0);
    }

    #[tokio::test]
    async fn unauthorized_mid_run_keeps_confirmed_progress() {
        let config = SpoderConfig {
            batch_size: 1,
            ..fast_config()
        };
        let f = fixture(
            config,
            logged_in(&[]),
            items(&["1", "2", "3"]),
            vec![Reply::Ok, Reply::Unauthorized],
        );

        f.spoder.start().await;

        let diag = f.spoder.diag();
        assert!(!diag.has_credential);
        assert_eq!(diag.processed_count, 1);
        assert_eq!(f.collection.call_count(), 2);
        assert_eq!(f.store.get("spotifyAccessToken").unwrap(), None);
        assert_eq!(persisted(&f.store), vec!["1"]);
    }

    #[tokio::test]
    async fn no_credential_means_no_automatic_run() {
        let config = SpoderConfig {
            poll_max_attempts: 2,
            ..fast_config()
        };
        let store = MemoryStore::with_entries([("zoe:prefs", "{}")]);
        let f = fixture(config, store, items(&["1"]), vec![]);

        assert_eq!(f.spoder.start().await, None);

        let diag = f.spoder.diag();
        assert!(!diag.has_run);
        assert_eq!(diag.poll_attempts, 2);
        assert_eq!(diag.state, AcquisitionState::NotFound);
        assert_eq!(f.source.fetches(), 0);

        // A manual run still goes through but has nothing to authenticate with.
        let outcome = f.spoder.run_now().await;
        assert_eq!(
            outcome,
            RunOutcome::Submitted(BatchOutcome::MissingPrerequisites)
        );
        assert_eq!(f.collection.call_count(), 0);
    }

    #[tokio::test]
    async fn captured_credential_triggers_exactly_one_run() {
        let config = SpoderConfig {
            poll_max_attempts: 1000,
            ..fast_config()
        };
        let store = MemoryStore::with_entries([("zoe:prefs", "{}")]);
        let f = Arc::new(fixture(config, store, items(&["1", "2"]), vec![]));

        let runner = f.clone();
        let task = tokio::spawn(async move { runner.spoder.start().await });
        tokio::time::sleep(Duration::from_millis(12)).await;

        let observer = f.spoder.observer();
        observer.on_header("Authorization", "Bearer captured");
        observer.on_request(&OutboundRequest::get("x").header("authorization", "Bearer other"));

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, Some(RunOutcome::Submitted(_))));
        assert_eq!(f.source.fetches(), 1);
        assert_eq!(
            f.collection.last_caller().map(|(cred, _)| cred),
            Some("Bearer captured".to_string())
        );
    }

    #[tokio::test]
    async fn stop_reports_and_halts_polling() {
        let config = SpoderConfig {
            poll_max_attempts: 1000,
            ..fast_config()
        };
        let f = Arc::new(fixture(config, MemoryStore::new(), items(&["1"]), vec![]));

        let runner = f.clone();
        let task = tokio::spawn(async move { runner.spoder.start().await });
        tokio::time::sleep(Duration::from_millis(12)).await;
        f.spoder.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let attempts = f.spoder.diag().poll_attempts;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.spoder.diag().poll_attempts, attempts);
        assert!(f.reporter.contains(&Status::Stopped));
        task.abort();
    }

    #[tokio::test]
    async fn start_after_manual_run_leaves_state_alone() {
        let f = fixture(fast_config(), logged_in(&[]), items(&["1"]), vec![]);

        // Nothing adopted yet, so the manual run has no credential to use.
        assert_eq!(
            f.spoder.run_now().await,
            RunOutcome::Submitted(BatchOutcome::MissingPrerequisites)
        );
        assert_eq!(f.spoder.start().await, Some(RunOutcome::AlreadyRan));

        let diag = f.spoder.diag();
        assert!(diag.has_credential);
        assert_eq!(diag.state, AcquisitionState::Found);
        assert_eq!(f.source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_does_not_cancel_an_in_flight_run() {
        let config = SpoderConfig {
            batch_size: 1,
            batch_pause_ms: 1000,
            ..fast_config()
        };
        let f = Arc::new(fixture(config, logged_in(&[]), items(&["1", "2", "3"]), vec![]));

        let runner = f.clone();
        let task = tokio::spawn(async move { runner.spoder.start().await });

        // Lands inside the pause after the first chunk.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(f.collection.call_count(), 1);
        f.spoder.stop();

        let outcome = task.await.unwrap();
        assert_eq!(
            outcome,
            Some(RunOutcome::Submitted(BatchOutcome::Finished(BatchReport {
                submitted_batches: 3,
                confirmed: 3,
                failed_batches: 0,
            })))
        );
        assert!(f.reporter.contains(&Status::Stopped));
        assert_eq!(persisted(&f.store), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn interrupted_acquisition_runs_nothing() {
        let config = SpoderConfig {
            poll_max_attempts: 1000,
            ..fast_config()
        };
        let f = fixture(config, MemoryStore::new(), items(&["1"]), vec![]);

        let acquired = tokio::select! {
            source = f.spoder.acquire() => source,
            _ = tokio::time::sleep(Duration::from_millis(20)) => {
                f.spoder.stop();
                None
            }
        };

        assert_eq!(acquired, None);
        assert!(!f.spoder.diag().has_run);
        assert_eq!(f.source.fetches(), 0);
        assert!(f.reporter.contains(&Status::Stopped));
    }

    struct PanickingSource;

    #[async_trait]
    impl ArtistSource for PanickingSource {
        async fn fetch_artists(&self) -> Vec<WorkItem> {
            panic!("source exploded");
        }
    }

    #[tokio::test]
    async fn pipeline_panic_is_contained() {
        let reporter = Arc::new(RecordingReporter::default());
        let spoder = Spoder::new(
            &fast_config(),
            Collaborators {
                store: Arc::new(logged_in(&[])),
                source: Arc::new(PanickingSource),
                collection: Arc::new(ScriptedCollection::default()),
                reporter: reporter.clone(),
            },
        );

        assert_eq!(spoder.start().await, Some(RunOutcome::Failed));
        assert!(
            reporter
                .events()
                .iter()
                .any(|s| matches!(s, Status::RunFailed { .. }))
        );
        assert_eq!(spoder.run_now().await, RunOutcome::AlreadyRan);
    }
}
