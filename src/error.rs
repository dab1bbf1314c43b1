use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure underneath an HTTP exchange, before any status code is known.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to encode request body: {0}")]
    Body(#[from] serde_json::Error),
}

/// An observer hook failed while looking at host traffic.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("observer panicked in {hook}: {message}")]
    ObserverPanicked { hook: &'static str, message: String },
}
