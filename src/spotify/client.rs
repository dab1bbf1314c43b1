use std::sync::Arc;

use async_trait::async_trait;

use super::error::CollectionError;
use super::types::CollectionWrite;
use crate::state_machine::Credential;
use crate::transport::{HttpTransport, OutboundRequest};

pub const COLLECTION_URL: &str =
    "https://spclient.wg.spotify.com/collection/v2/write?market=from_token";

/// Adds item ids to a user's collection set.
#[async_trait]
pub trait CollectionService: Send + Sync {
    async fn add_items(
        &self,
        credential: &Credential,
        user: &str,
        ids: &[String],
    ) -> Result<(), CollectionError>;
}

/// [`CollectionService`] speaking the collection write endpoint over HTTP.
pub struct CollectionClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    set: String,
    uri_prefix: String,
}

impl CollectionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoint: impl Into<String>,
        set: impl Into<String>,
        uri_prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            set: set.into(),
            uri_prefix: uri_prefix.into(),
        }
    }
}

#[async_trait]
impl CollectionService for CollectionClient {
    async fn add_items(
        &self,
        credential: &Credential,
        user: &str,
        ids: &[String],
    ) -> Result<(), CollectionError> {
        let body = CollectionWrite::new(user, &self.set, &self.uri_prefix, ids);
        let request = OutboundRequest::post(self.endpoint.as_str())
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("authorization", credential.as_str())
            .json(&body)?;

        let response = self.transport.send(request).await?;

        if response.is_success() {
            return Ok(());
        }
        if response.status == 401 {
            return Err(CollectionError::Unauthorized);
        }
        Err(CollectionError::Status {
            status: response.status,
            message: response.body,
        })
    }
}
