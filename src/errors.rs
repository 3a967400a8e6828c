use thiserror::Error;

/// Top-level application error.
/// Every variant renders to a human-readable message, which is what ends up in
/// the `error` field of an outbound `error` event.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // ── Upstream errors ──────────────────────────────────────────────────────
    #[error("Completion provider unavailable at {host}")]
    UpstreamUnavailable { host: String },

    #[error("Inference error: {message}")]
    Inference { message: String },

    // ── Encoding errors ──────────────────────────────────────────────────────
    #[error("Failed to encode event: {message}")]
    Serialization { message: String },

    // ── Startup configuration ────────────────────────────────────────────────
    #[error("{name} must be set")]
    MissingConfig { name: String },

    #[error("Invalid value for {name}: {message}")]
    InvalidConfig { name: String, message: String },
}

impl AppError {
    pub fn empty_field(field_name: impl Into<String>) -> Self {
        AppError::EmptyField { field_name: field_name.into() }
    }

    pub fn inference(message: impl Into<String>) -> Self {
        AppError::Inference { message: message.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. } | AppError::InvalidRequest { .. })
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, AppError::UpstreamUnavailable { .. } | AppError::Inference { .. })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InvalidRequest { message: e.to_string() }
    }
}
