//! Fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::SpoderConfig;
use crate::retry::RetryPolicy;
use crate::spotify::{ArtistSource, CollectionError, CollectionService, WorkItem};
use crate::state_machine::Credential;
use crate::ui::{Reporter, Status};

#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Status>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<Status> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, status: &Status) -> bool {
        self.events.lock().unwrap().contains(status)
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|s| match s {
                Status::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, status: &Status) {
        self.events.lock().unwrap().push(status.clone());
    }
}

/// Canned reply for one collection write attempt.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Ok,
    Unauthorized,
    Status(u16),
}

/// Collection service that replays [`Reply`]s and records every call.
/// Once the script runs out every call succeeds.
#[derive(Default)]
pub struct ScriptedCollection {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl ScriptedCollection {
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Ids sent on each call, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, ids)| ids.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_caller(&self) -> Option<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(cred, user, _)| (cred.clone(), user.clone()))
    }
}

#[async_trait]
impl CollectionService for ScriptedCollection {
    async fn add_items(
        &self,
        credential: &Credential,
        user: &str,
        ids: &[String],
    ) -> Result<(), CollectionError> {
        self.calls.lock().unwrap().push((
            credential.as_str().to_string(),
            user.to_string(),
            ids.to_vec(),
        ));
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => Ok(()),
            Reply::Unauthorized => Err(CollectionError::Unauthorized),
            Reply::Status(status) => Err(CollectionError::Status {
                status,
                message: "scripted".into(),
            }),
        }
    }
}

/// Source returning a fixed list and counting fetches.
pub struct StaticSource {
    items: Vec<WorkItem>,
    fetches: Mutex<usize>,
}

impl StaticSource {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            fetches: Mutex::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl ArtistSource for StaticSource {
    async fn fetch_artists(&self) -> Vec<WorkItem> {
        *self.fetches.lock().unwrap() += 1;
        self.items.clone()
    }
}

pub fn items(ids: &[&str]) -> Vec<WorkItem> {
    ids.iter()
        .map(|id| WorkItem::new(format!("Artist {id}"), *id))
        .collect()
}

/// Defaults with every wait shortened to keep tests fast.
pub fn fast_config() -> SpoderConfig {
    let instant = RetryPolicy {
        max_retries: 2,
        base_delay_ms: 0,
        jitter_ms: 0,
    };
    SpoderConfig {
        source_retry: instant,
        submit_retry: instant,
        poll_interval_ms: 5,
        batch_pause_ms: 0,
        batch_pause_jitter_ms: 0,
        ..SpoderConfig::default()
    }
}
