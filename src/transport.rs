//! HTTP boundary shared by the host application and this crate.
//!
//! Requests are plain [`OutboundRequest`] values sent through an
//! [`HttpTransport`]. [`InterceptingTransport`] decorates any transport with
//! [`RequestObserver`]s: each observer sees every request on `send` and every
//! explicit `set_header` on an [`ObservedRequest`], and the request is always
//! forwarded unchanged. A panicking observer is contained and logged; the
//! host's request goes through regardless.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;

use crate::error::{CaptureError, TransportError};

/// A request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, TransportError> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundResponse {
    pub status: u16,
    pub body: String,
}

impl InboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError>;
}

/// Transport backed by a `reqwest` client.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(InboundResponse { status, body })
    }
}

/// Passive hook on outgoing traffic. Observers must not fail or block.
pub trait RequestObserver: Send + Sync {
    /// Called with every request before it is forwarded.
    fn on_request(&self, _request: &OutboundRequest) {}

    /// Called for every explicit header set on an [`ObservedRequest`].
    fn on_header(&self, _name: &str, _value: &str) {}
}

/// Run one observer hook, turning a panic into a [`CaptureError`].
fn guarded(hook: &'static str, call: impl FnOnce()) -> Result<(), CaptureError> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        CaptureError::ObserverPanicked { hook, message }
    })
}

/// Decorator that lets observers look at traffic without changing it.
#[derive(Clone)]
pub struct InterceptingTransport {
    inner: Arc<dyn HttpTransport>,
    observers: Vec<Arc<dyn RequestObserver>>,
}

impl InterceptingTransport {
    pub fn new(inner: Arc<dyn HttpTransport>) -> Self {
        Self {
            inner,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Start a request whose header calls are visible to observers.
    pub fn request(&self, method: Method, url: impl Into<String>) -> ObservedRequest<'_> {
        ObservedRequest {
            transport: self,
            request: OutboundRequest::new(method, url),
        }
    }
}

#[async_trait]
impl HttpTransport for InterceptingTransport {
    async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        for observer in &self.observers {
            if let Err(e) = guarded("on_request", || observer.on_request(&request)) {
                tracing::warn!(error = %e, "request observer failed");
            }
        }
        self.inner.send(request).await
    }
}

/// Request under construction on an [`InterceptingTransport`].
pub struct ObservedRequest<'a> {
    transport: &'a InterceptingTransport,
    request: OutboundRequest,
}

impl ObservedRequest<'_> {
    pub fn set_header(mut self, name: &str, value: &str) -> Self {
        for observer in &self.transport.observers {
            if let Err(e) = guarded("on_header", || observer.on_header(name, value)) {
                tracing::warn!(error = %e, header = name, "header observer failed");
            }
        }
        self.request = self.request.header(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    pub async fn send(self) -> Result<InboundResponse, TransportError> {
        self.transport.send(self.request).await
    }
}
