//! Spoder: adds every artist from a shared list to the logged-in user's
//! banned collection, in batches, remembering what was already done.
//!
//! The pipeline has two halves. [`acquisition`] finds the session
//! credential (stored value, passive capture on the host's outgoing
//! requests, or polling the store). [`orchestrator`] then fetches the artist
//! list and hands the remaining work to [`batch`].

pub mod acquisition;
pub mod batch;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod spotify;
pub mod state_machine;
pub mod store;
pub mod transport;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::SpoderConfig;
pub use orchestrator::{RunController, RunOutcome, Spoder};
pub use state_machine::{AcquisitionState, Credential, CredentialSource, Diagnostics, Session};
