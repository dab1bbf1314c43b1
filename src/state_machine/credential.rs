use std::fmt;

use serde::Serialize;

/// Authorization scheme prepended to stored tokens that lack one.
pub const SCHEME: &str = "Bearer";

/// Bearer-style authorization value used for collection writes.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Build a credential from a previously saved token, adding the scheme
    /// prefix when it is missing. Blank input yields `None`.
    pub fn from_stored(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() {
            None
        } else if token.starts_with(SCHEME) {
            Some(Self(token.to_string()))
        } else {
            Some(Self(format!("{SCHEME} {token}")))
        }
    }

    /// Take an authorization header value exactly as the host sent it.
    pub fn from_header(raw: &str) -> Option<Self> {
        let value = raw.trim();
        (!value.is_empty()).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Which acquisition strategy produced the adopted credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Read from the local store at startup.
    Stored,
    /// Seen on an outgoing request passing through the transport.
    Request,
    /// Seen on an explicit set-header call.
    HeaderMutation,
    /// Read from the local store on a poll tick.
    Poll,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Stored => write!(f, "local store"),
            CredentialSource::Request => write!(f, "outgoing request"),
            CredentialSource::HeaderMutation => write!(f, "request header"),
            CredentialSource::Poll => write!(f, "local store (poll)"),
        }
    }
}
