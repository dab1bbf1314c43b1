//! Data shapes exchanged with the artist list and the collection endpoint.

use serde::{Deserialize, Serialize};

/// One artist to add to the banned collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Display name, only used for reporting.
    pub name: String,
    /// Spotify artist id.
    pub id: String,
}

impl WorkItem {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Body of a collection write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionWrite {
    pub username: String,
    pub set: String,
    pub items: Vec<CollectionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub uri: String,
}

impl CollectionWrite {
    /// Build a write for `ids`, turning each id into `<uri_prefix><id>`.
    pub fn new(username: &str, set: &str, uri_prefix: &str, ids: &[String]) -> Self {
        Self {
            username: username.to_string(),
            set: set.to_string(),
            items: ids
                .iter()
                .map(|id| CollectionItem {
                    uri: format!("{uri_prefix}{id}"),
                })
                .collect(),
        }
    }
}
