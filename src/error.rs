use axum::{http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

/// Failure of a single upstream call. The gateway never retries; the polling
/// cell stores the classified kind in its state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport-level failure: no response was obtained.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx reply, or a reply whose payload could not be understood.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Well-formed empty result for a specific-id query.
    #[error("not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Payload-shape problems on an otherwise successful reply.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::upstream(200, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Network(_) => ErrorKind::Network,
            GatewayError::Upstream { .. } => ErrorKind::Upstream,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            let text = status.canonical_reason().unwrap_or("unknown status");
            return GatewayError::upstream(status.as_u16(), text);
        }
        if e.is_decode() {
            return GatewayError::malformed(e.to_string());
        }
        GatewayError::Network(e.to_string())
    }
}

/// Coarse error class kept in `RefreshState`. Display surfaces map it to a
/// fixed message rather than showing raw upstream text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Upstream,
    NotFound,
}

impl ErrorKind {
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Network => "Could not reach the data provider",
            ErrorKind::Upstream => "The data provider returned an error",
            ErrorKind::NotFound => "No data found for this match",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Upstream => "upstream",
            ErrorKind::NotFound => "not_found",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown panel: {0}")]
    UnknownPanel(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::UnknownPanel(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) | AppError::Config(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(GatewayError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_variant() {
        assert_eq!(GatewayError::Network("reset".into()).kind(), ErrorKind::Network);
        assert_eq!(GatewayError::upstream(503, "Service Unavailable").kind(), ErrorKind::Upstream);
        assert_eq!(GatewayError::NotFound("999".into()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn upstream_display_carries_status_text() {
        let e = GatewayError::upstream(429, "Too Many Requests");
        assert_eq!(e.to_string(), "upstream error (429): Too Many Requests");
    }

    #[test]
    fn unknown_panel_maps_to_404() {
        let resp = AppError::UnknownPanel("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
