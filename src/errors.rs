use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Error body returned by the ambient endpoints (health/status). The callback
/// endpoint itself never returns this shape: its failures collapse to the
/// configured redirect.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Cart 550e8400-e29b-41d4-a716-446655440000 not found",
    "details": null,
    "timestamp": "2026-08-06T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Internal error taxonomy for the reconciliation pipeline. Externally all of
/// these collapse to the same failure redirect; the variants exist so the logs
/// can tell a bad quote from a persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Webhook signature rejected: {0}")]
    SignatureRejected(String),

    #[error("Cart not found: {0}")]
    CartNotFound(String),

    #[error("Cart has no items: {0}")]
    EmptyCart(uuid::Uuid),

    #[error("Cart is flagged with an error: {0}")]
    ErroredCart(uuid::Uuid),

    #[error("Address error: {0}")]
    AddressError(String),

    #[error("Customer error: {0}")]
    CustomerError(String),

    #[error("Settings error: {0}")]
    SettingsError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error. Single source of truth
    /// for error-to-status mapping on the ambient endpoints.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::AddressError(_) => StatusCode::BAD_REQUEST,
            Self::SignatureRejected(_) => StatusCode::UNAUTHORIZED,
            Self::CartNotFound(_) => StatusCode::NOT_FOUND,
            Self::EmptyCart(_) | Self::ErroredCart(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CustomerError(_)
            | Self::SettingsError(_)
            | Self::DatabaseError(_)
            | Self::SerializationError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message suitable for HTTP responses. Internal errors get
    /// generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Short machine-readable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::SignatureRejected(_) => "signature_rejected",
            Self::CartNotFound(_) => "cart_not_found",
            Self::EmptyCart(_) => "empty_cart",
            Self::ErroredCart(_) => "errored_cart",
            Self::AddressError(_) => "address_error",
            Self::CustomerError(_) => "customer_error",
            Self::SettingsError(_) => "settings_error",
            Self::DatabaseError(_) => "database_error",
            Self::SerializationError(_) => "serialization_error",
            Self::Other(_) => "other",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
