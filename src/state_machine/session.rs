use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::oneshot;

use super::credential::{Credential, CredentialSource};
use super::state::AcquisitionState;

/// Point-in-time view of the session, as exposed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub has_credential: bool,
    pub has_run: bool,
    pub processed_count: usize,
    pub poll_attempts: u32,
    pub state: AcquisitionState,
}

#[derive(Debug)]
struct SessionState {
    credential: Option<Credential>,
    adoption_tx: Option<oneshot::Sender<CredentialSource>>,
    adoption_rx: Option<oneshot::Receiver<CredentialSource>>,
    acquisition: AcquisitionState,
    has_run: bool,
    poll_attempts: u32,
    processed: BTreeSet<String>,
}

/// Mutable state shared by acquisition, the run controller and the batch
/// submitter for the lifetime of one [`crate::Spoder`].
///
/// Every method takes the lock, mutates, and releases before returning, so
/// no caller ever holds it across an `.await`.
#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            state: Mutex::new(SessionState {
                credential: None,
                adoption_tx: Some(tx),
                adoption_rx: Some(rx),
                acquisition: AcquisitionState::Idle,
                has_run: false,
                poll_attempts: 0,
                processed: BTreeSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adopt `credential` if no credential has ever been adopted.
    ///
    /// The first caller wins and wakes whoever holds the adoption receiver;
    /// every later call is a no-op returning `false`, even after the
    /// credential has been invalidated.
    pub fn adopt(&self, credential: Credential, source: CredentialSource) -> bool {
        let mut state = self.lock();
        let Some(tx) = state.adoption_tx.take() else {
            return false;
        };
        state.credential = Some(credential);
        if state.acquisition.can_transition_to(AcquisitionState::Found) {
            state.acquisition = AcquisitionState::Found;
        }
        // The receiver may already be gone (acquisition gave up); the
        // credential is still kept for manual runs.
        let _ = tx.send(source);
        true
    }

    pub fn is_adopted(&self) -> bool {
        self.lock().adoption_tx.is_none()
    }

    /// Hand out the adoption receiver. Only the first caller gets it.
    pub(crate) fn take_adoption_receiver(&self) -> Option<oneshot::Receiver<CredentialSource>> {
        self.lock().adoption_rx.take()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }

    /// Drop the active credential after the remote service rejected it.
    pub fn invalidate_credential(&self) {
        self.lock().credential = None;
    }

    /// Move the acquisition state machine forward. Illegal transitions are
    /// ignored and reported as `false`.
    pub fn advance(&self, next: AcquisitionState) -> bool {
        let mut state = self.lock();
        if state.acquisition.can_transition_to(next) {
            tracing::debug!(from = %state.acquisition, to = %next, "acquisition state");
            state.acquisition = next;
            true
        } else {
            false
        }
    }

    pub fn acquisition_state(&self) -> AcquisitionState {
        self.lock().acquisition
    }

    /// Flip `has_run` from false to true. Returns `true` only for the first caller.
    pub fn begin_run(&self) -> bool {
        let mut state = self.lock();
        if state.has_run {
            false
        } else {
            state.has_run = true;
            true
        }
    }

    /// Count one poll tick and return the new total.
    pub fn record_poll_attempt(&self) -> u32 {
        let mut state = self.lock();
        state.poll_attempts += 1;
        state.poll_attempts
    }

    /// Add identifiers to the processed set. The set never shrinks.
    pub fn merge_processed<I>(&self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lock().processed.extend(ids);
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.lock().processed.contains(id)
    }

    pub fn processed_snapshot(&self) -> BTreeSet<String> {
        self.lock().processed.clone()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let state = self.lock();
        Diagnostics {
            has_credential: state.credential.is_some(),
            has_run: state.has_run,
            processed_count: state.processed.len(),
            poll_attempts: state.poll_attempts,
            state: state.acquisition,
        }
    }
}
