use std::sync::Arc;

use async_trait::async_trait;

use super::error::SourceError;
use super::types::WorkItem;
use crate::retry::{RetryPolicy, with_backoff};
use crate::transport::{HttpTransport, OutboundRequest};
use crate::ui::{Reporter, Status};

pub const SOURCE_URL: &str =
    "https://raw.githubusercontent.com/cor-bee/spoder/refs/heads/main/SpotifyRussianArtists.csv";

/// Words whose presence in the first line marks it as a header.
const HEADER_MARKERS: &[&str] = &["artist", "spotify_id", "name", "id"];

/// Supplies the ordered list of artists to process.
///
/// Implementations never fail: a list that cannot be obtained is empty.
#[async_trait]
pub trait ArtistSource: Send + Sync {
    async fn fetch_artists(&self) -> Vec<WorkItem>;
}

/// Artist list downloaded as `name,id` text lines.
pub struct HttpArtistSource {
    transport: Arc<dyn HttpTransport>,
    url: String,
    retry: RetryPolicy,
    reporter: Arc<dyn Reporter>,
}

impl HttpArtistSource {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        url: impl Into<String>,
        retry: RetryPolicy,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            retry,
            reporter,
        }
    }

    async fn download(&self) -> Result<String, SourceError> {
        let response = self
            .transport
            .send(OutboundRequest::get(self.url.as_str()).header("Cache-Control", "no-cache"))
            .await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(SourceError::Status {
                status: response.status,
            })
        }
    }
}

#[async_trait]
impl ArtistSource for HttpArtistSource {
    async fn fetch_artists(&self) -> Vec<WorkItem> {
        self.reporter.report(&Status::SourceLoading);
        match with_backoff(&self.retry, || self.download()).await {
            Ok(text) => {
                let artists = parse_artist_list(&text);
                tracing::info!(count = artists.len(), url = %self.url, "artist list loaded");
                self.reporter.report(&Status::SourceLoaded {
                    count: artists.len(),
                });
                artists
            }
            Err(e) => {
                tracing::error!(error = %e, url = %self.url, "artist list unavailable");
                self.reporter.report(&Status::SourceFailed);
                Vec::new()
            }
        }
    }
}

/// Parse `name,id` lines into work items.
///
/// The id is whatever follows the last comma, so names may contain commas.
/// A first line mentioning `artist`, `spotify_id`, `name` or `id` is treated
/// as a header. Lines without a comma, or with an empty name or id, are
/// skipped.
pub fn parse_artist_list(text: &str) -> Vec<WorkItem> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some(first) = lines.first() else {
        return Vec::new();
    };
    let first = first.to_lowercase();
    let skip = usize::from(HEADER_MARKERS.iter().any(|m| first.contains(m)));

    lines
        .iter()
        .skip(skip)
        .filter_map(|line| parse_line(line))
        .collect()
}

fn parse_line(line: &str) -> Option<WorkItem> {
    let cleaned = line.replace('\u{FEFF}', "");
    let cleaned = cleaned.trim();
    let (name, id) = cleaned.rsplit_once(',')?;
    let name = strip_quotes(name).trim();
    let id = strip_quotes(id).trim();
    if name.is_empty() || id.is_empty() {
        tracing::debug!(line = cleaned, "skipping malformed artist line");
        return None;
    }
    Some(WorkItem::new(name, id))
}

// One leading and one trailing quote, like a CSV field.
fn strip_quotes(field: &str) -> &str {
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}
