//! Credential acquisition.
//!
//! Three strategies race to fill the session's one-shot adoption slot:
//!
//! 1. a direct read of the saved credential at startup,
//! 2. [`CredentialCapture`], a [`RequestObserver`] that picks up the
//!    authorization value from the host's outgoing requests and header calls,
//! 3. a poll loop that re-reads the store every `poll_interval_ms`.
//!
//! [`CredentialAcquirer::acquire`] resolves once, with the winning source, or
//! with `None` when polling runs out of attempts. Whatever wins, the poll loop
//! ends there.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, interval_at};

use crate::state_machine::{AcquisitionState, Credential, CredentialSource, Session};
use crate::store::CredentialStore;
use crate::transport::{OutboundRequest, RequestObserver};
use crate::ui::{Reporter, Status};

const AUTHORIZATION: &str = "authorization";

/// Observer adopting the first authorization value seen on host traffic.
///
/// Stays installed for the whole lifetime; after adoption it does nothing.
pub struct CredentialCapture {
    session: Arc<Session>,
    reporter: Arc<dyn Reporter>,
}

impl CredentialCapture {
    pub fn new(session: Arc<Session>, reporter: Arc<dyn Reporter>) -> Self {
        Self { session, reporter }
    }

    fn capture(&self, value: &str, source: CredentialSource) {
        if self.session.is_adopted() {
            return;
        }
        let Some(credential) = Credential::from_header(value) else {
            return;
        };
        if self.session.adopt(credential, source) {
            tracing::info!(%source, "credential captured");
            self.reporter.report(&Status::CredentialFound { source });
        }
    }
}

impl RequestObserver for CredentialCapture {
    fn on_request(&self, request: &OutboundRequest) {
        if let Some(value) = request.header_value(AUTHORIZATION) {
            self.capture(value, CredentialSource::Request);
        }
    }

    fn on_header(&self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case(AUTHORIZATION) {
            self.capture(value, CredentialSource::HeaderMutation);
        }
    }
}

/// Drives the direct read and the poll loop, and waits for the first adoption.
pub struct CredentialAcquirer {
    session: Arc<Session>,
    store: CredentialStore,
    reporter: Arc<dyn Reporter>,
    poll_interval: Duration,
    poll_max_attempts: u32,
    stop: Notify,
}

impl CredentialAcquirer {
    pub fn new(
        session: Arc<Session>,
        store: CredentialStore,
        reporter: Arc<dyn Reporter>,
        poll_interval: Duration,
        poll_max_attempts: u32,
    ) -> Self {
        Self {
            session,
            store,
            reporter,
            poll_interval,
            poll_max_attempts,
            stop: Notify::new(),
        }
    }

    /// Halt the poll loop. Passive capture keeps working and can still
    /// complete a pending [`acquire`](Self::acquire).
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    fn adopt_stored(&self, source: CredentialSource) -> bool {
        let Some(credential) = self.store.load_credential() else {
            return false;
        };
        let adopted = self.session.adopt(credential, source);
        if adopted {
            tracing::info!(%source, "credential read from local store");
            self.reporter.report(&Status::CredentialFound { source });
        }
        adopted
    }

    /// Wait for a credential to be adopted. Returns the winning source, or
    /// `None` if polling exhausted its attempts (or acquisition already ran).
    pub async fn acquire(&self) -> Option<CredentialSource> {
        let Some(mut adopted) = self.session.take_adoption_receiver() else {
            tracing::debug!("acquisition already started");
            return None;
        };

        if self.adopt_stored(CredentialSource::Stored) || self.session.is_adopted() {
            return adopted.await.ok();
        }

        self.session.advance(AcquisitionState::Searching);
        self.reporter.report(&Status::PollStarted);

        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        let mut polling = true;

        loop {
            tokio::select! {
                biased;

                source = &mut adopted => {
                    return source.ok();
                }

                _ = self.stop.notified(), if polling => {
                    polling = false;
                    tracing::info!("credential polling stopped");
                    self.reporter.report(&Status::PollStopped);
                }

                _ = ticker.tick(), if polling => {
                    let attempts = self.session.record_poll_attempt();
                    tracing::debug!(attempts, max = self.poll_max_attempts, "credential poll");

                    if self.adopt_stored(CredentialSource::Poll) {
                        continue;
                    }
                    if attempts >= self.poll_max_attempts {
                        self.session.advance(AcquisitionState::NotFound);
                        tracing::warn!(attempts, "no credential found, giving up");
                        self.reporter.report(&Status::CredentialNotFound);
                        return None;
                    }
                }
            }
        }
    }
}
