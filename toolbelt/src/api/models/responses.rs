//! Response envelope shared by the tool endpoints and every error response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Envelope returned by conversion endpoints and by every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    /// Whether the request succeeded
    pub success: bool,
    /// Human readable outcome
    #[schema(example = "Conversion successful")]
    pub message: String,
    /// Tool output, present on success
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    /// Error detail, present on failure
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Body of the root route
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WelcomeResponse {
    #[schema(example = "Welcome to Toolbelt API")]
    pub message: String,
}
