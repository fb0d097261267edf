//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement for accepted write operations.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Always `"success"` for a 200.
    pub status: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self { status: "success".to_string() }
    }
}

/// Error body returned alongside non-2xx statuses.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
